use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgQueryResult},
    Connection, PgConnection,
};

use crate::{config, database::table::stock_data::StockData, error::IngestError, logging};

pub mod table;

/// 報價儲存端。
///
/// 正式環境使用 [`PostgresSQL`]，測試時可替換成記憶體實作。
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// 確保資料表存在，可重複執行。
    async fn ensure_schema(&self) -> Result<(), IngestError>;

    /// 寫入一筆報價，(symbol, timestamp) 已存在時略過並回傳 0。
    async fn insert_quote(&self, record: &StockData) -> Result<u64, IngestError>;
}

/// PostgreSQL 儲存端。
///
/// 每次操作都各自開一條連線，結束時不論成功或失敗都會關閉。
pub struct PostgresSQL {
    options: PgConnectOptions,
}

impl PostgresSQL {
    pub fn new(settings: &config::PostgreSQL) -> Self {
        let options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.db)
            .application_name(env!("CARGO_PKG_NAME"));

        Self { options }
    }

    async fn connect(&self) -> Result<PgConnection, IngestError> {
        let conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(|why| IngestError::Storage(format!("Failed to connect: {}", why)))?;
        logging::debug_file_async(format!(
            "Connected to postgres://{}/{}",
            self.options.get_host(),
            self.options.get_database().unwrap_or_default()
        ));

        Ok(conn)
    }

    async fn close(conn: PgConnection) {
        if let Err(why) = conn.close().await {
            logging::warn_file_async(format!("Failed to close connection because {:?}", why));
        }
    }
}

#[async_trait]
impl QuoteStore for PostgresSQL {
    async fn ensure_schema(&self) -> Result<(), IngestError> {
        let mut conn = self.connect().await?;
        let result = StockData::create_table(&mut conn).await;
        Self::close(conn).await;

        result.map(|_| ())
    }

    async fn insert_quote(&self, record: &StockData) -> Result<u64, IngestError> {
        let mut conn = self.connect().await?;
        let result = record.insert_or_ignore(&mut conn).await;
        Self::close(conn).await;

        result.map(|r: PgQueryResult| r.rows_affected())
    }
}
