//! 抓取報價並寫入資料庫時可能發生的錯誤種類。
//!
//! 每一種錯誤都在發生處轉成 [`IngestError`]，由 `event::stock_quote` 統一記錄後回傳給呼叫端，
//! 排程或主程式可依此區分「真正失敗」與「沒有資料可寫」。

use thiserror::Error;

/// 報價擷取流程的錯誤分類。
#[derive(Error, Debug)]
pub enum IngestError {
    /// 缺少必要設定（例如 API Key）。
    #[error("Configuration missing: {0}")]
    ConfigMissing(String),

    /// 連線失敗、逾時或 HTTP 狀態碼非 2xx。
    #[error("Network error: {0}")]
    Network(String),

    /// 回應內容不是合法的 JSON 物件。
    #[error("Parse error: {0}")]
    Parse(String),

    /// 回應中沒有價格或成交量。
    #[error("Data missing: {0}")]
    DataMissing(String),

    /// 價格或成交量無法轉成數值，保留原始字串方便追查。
    #[error("Type conversion error: {reason}. Raw data: price={price}, volume={volume}")]
    TypeConversion {
        reason: String,
        price: String,
        volume: String,
    },

    /// 資料庫連線、建表或寫入失敗。
    #[error("Storage error: {0}")]
    Storage(String),
}

impl IngestError {
    /// 是否屬於「略過本次寫入」而非失敗。
    ///
    /// 上游沒有提供報價時只記警告，不視為錯誤。
    pub fn is_skip(&self) -> bool {
        matches!(self, IngestError::DataMissing(_))
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        // 請求網址帶有 apikey，不寫進錯誤訊息
        IngestError::Network(err.without_url().to_string())
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        IngestError::Storage(err.to_string())
    }
}
