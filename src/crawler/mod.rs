use async_trait::async_trait;

use crate::error::IngestError;

/// Alpha Vantage
pub mod alpha_vantage;

/// 報價來源。
///
/// 只負責取得原始回應內容，解析與型別轉換由 [`alpha_vantage::global_quote`] 處理，
/// 方便在測試中以假資料替換。
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_global_quote(&self, symbol: &str, api_key: &str) -> Result<String, IngestError>;
}
