use chrono::{Local, NaiveDateTime, SubsecRound};

use crate::{
    config,
    crawler::{
        alpha_vantage::{global_quote, AlphaVantage},
        QuoteSource,
    },
    database::{table::stock_data::StockData, PostgresSQL, QuoteStore},
    error::IngestError,
    logging,
};

/// 一次成功執行的結果
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub record: StockData,
    /// false 表示相同 (symbol, timestamp) 已存在，本次未寫入
    pub inserted: bool,
}

/// 抓取設定中的股票報價並寫入資料庫，結果只記錄一次日誌。
///
/// 排程與主程式都透過這裡執行；回傳值讓呼叫端能分辨失敗與略過。
pub async fn execute(app: &config::App) -> Result<Ingested, IngestError> {
    logging::info_file_async("Starting data fetching and storage process...".to_string());

    let result = match AlphaVantage::new(&app.alpha_vantage) {
        Ok(source) => {
            let store = PostgresSQL::new(&app.postgresql);
            let now = Local::now().naive_local();
            fetch_and_store(&app.alpha_vantage, &source, &store, now).await
        }
        Err(why) => Err(why),
    };

    log_outcome(&app.alpha_vantage.symbol, &result);

    result
}

/// START → KEY_CHECKED → REQUESTED → PARSED → EXTRACTED → CONVERTED → STORED
///
/// 任何一步失敗都直接結束，不重試。
pub async fn fetch_and_store(
    settings: &config::AlphaVantage,
    source: &dyn QuoteSource,
    store: &dyn QuoteStore,
    now: NaiveDateTime,
) -> Result<Ingested, IngestError> {
    let api_key = settings.api_key.trim();
    if api_key.is_empty() {
        return Err(IngestError::ConfigMissing(
            "STOCK_API_KEY is not set. Please check your environment variables.".to_string(),
        ));
    }

    let body = source.fetch_global_quote(&settings.symbol, api_key).await?;
    let data = global_quote::decode(&body)?;
    let raw = global_quote::extract(&data).inspect_err(|_| {
        logging::debug_file_async(format!("Received data: {}", body));
    })?;
    let quote = raw.convert()?;

    // TIMESTAMP 只保存到微秒
    let record = StockData::new(
        settings.symbol.clone(),
        quote.price,
        quote.volume,
        now.trunc_subsecs(6),
    );
    let rows_affected = store.insert_quote(&record).await?;

    Ok(Ingested {
        record,
        inserted: rows_affected > 0,
    })
}

fn log_outcome(symbol: &str, result: &Result<Ingested, IngestError>) {
    match result {
        Ok(ingested) if ingested.inserted => logging::info_file_async(format!(
            "Successfully inserted data for {}: {:?}",
            symbol, ingested.record
        )),
        Ok(ingested) => logging::info_file_async(format!(
            "Data for {} at {} already exists, skipped",
            symbol, ingested.record.timestamp
        )),
        Err(why) if why.is_skip() => {
            logging::warn_file_async(format!("{}. Skipping insertion for {}.", why, symbol))
        }
        Err(why) => logging::error_file_async(format!(
            "Failed to fetch and store data for {} because {}",
            symbol, why
        )),
    }
}
