use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{postgres::PgQueryResult, Connection, PgConnection};

use crate::{error::IngestError, logging};

/// 每日抓取的股票報價（`stock_data`）。
///
/// (symbol, timestamp) 為主鍵，同一組資料只會寫入第一次。
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct StockData {
    /// 股票代號，最多 10 個字元
    pub symbol: String,
    /// 價格，DECIMAL(10, 2)
    pub price: Decimal,
    /// 成交量
    pub volume: i32,
    /// 抓取時間
    pub timestamp: NaiveDateTime,
}

impl StockData {
    pub fn new(symbol: String, price: Decimal, volume: i32, timestamp: NaiveDateTime) -> Self {
        StockData {
            symbol,
            price,
            volume,
            timestamp,
        }
    }

    /// 建立資料表（已存在時不動作）
    pub async fn create_table(conn: &mut PgConnection) -> Result<PgQueryResult, IngestError> {
        let sql = r#"
CREATE TABLE IF NOT EXISTS stock_data (
    symbol VARCHAR(10) NOT NULL,
    price DECIMAL(10, 2) NOT NULL,
    volume INT NOT NULL,
    timestamp TIMESTAMP NOT NULL,
    PRIMARY KEY (symbol, timestamp)
);
"#;
        let mut transaction = conn.begin().await?;
        match sqlx::query(sql).execute(&mut *transaction).await {
            Ok(r) => {
                transaction.commit().await?;
                Ok(r)
            }
            Err(why) => Err(storage_error(
                "Failed to create table stock_data".to_string(),
                why,
                transaction.rollback().await,
            )),
        }
    }

    /// 寫入一筆報價，主鍵衝突時不做任何事
    pub async fn insert_or_ignore(
        &self,
        conn: &mut PgConnection,
    ) -> Result<PgQueryResult, IngestError> {
        let sql = r#"
INSERT INTO stock_data (symbol, price, volume, timestamp)
VALUES ($1, $2, $3, $4)
ON CONFLICT (symbol, timestamp) DO NOTHING;
"#;
        let mut transaction = conn.begin().await?;
        match sqlx::query(sql)
            .bind(&self.symbol)
            .bind(self.price)
            .bind(self.volume)
            .bind(self.timestamp)
            .execute(&mut *transaction)
            .await
        {
            Ok(r) => {
                transaction.commit().await?;
                Ok(r)
            }
            Err(why) => Err(storage_error(
                format!("Failed to insert stock_data({:?})", self),
                why,
                transaction.rollback().await,
            )),
        }
    }
}

/// 以原始的 SQL 錯誤回報；rollback 失敗只記錄，不覆蓋原因
fn storage_error(
    context: String,
    why: sqlx::Error,
    rollback: Result<(), sqlx::Error>,
) -> IngestError {
    if let Err(rollback_why) = rollback {
        logging::warn_file_async(format!(
            "{}: rollback failed because {}",
            context, rollback_why
        ));
    }

    IngestError::Storage(format!("{} because: {}", context, why))
}
