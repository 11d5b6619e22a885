use std::time::{Duration, Instant};

use reqwest::Client;

use crate::{error::IngestError, logging};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// 建立 reqwest client，`timeout` 為單次請求（含讀取回應）的上限。
pub fn build_client(timeout: Duration) -> Result<Client, IngestError> {
    // 已安裝過時會回傳 Err，可忽略
    let _ = rustls::crypto::ring::default_provider().install_default();

    Client::builder()
        // ===== 壓縮 =====
        .gzip(true)
        // ===== 超時設置 =====
        .connect_timeout(timeout)
        .timeout(timeout)
        // ===== TCP 優化 =====
        .tcp_nodelay(true)
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| IngestError::Network(format!("Failed to create reqwest client: {:?}", e)))
}

/// 送出一次 GET 並回傳文字內容，不重試。
///
/// 連線失敗、逾時或狀態碼非 2xx 都回傳 [`IngestError::Network`]。
/// `query` 可能含有金鑰，因此日誌只記錄不含參數的網址。
pub async fn get_text(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<String, IngestError> {
    let start = Instant::now();
    let res = client
        .get(url)
        .query(query)
        .send()
        .await
        .and_then(|response| response.error_for_status());
    let elapsed = start.elapsed().as_millis();

    match res {
        Ok(response) => {
            logging::info_file_async(format!("GET:{} {} {} ms", url, response.status(), elapsed));
            Ok(response.text().await?)
        }
        // 失敗由呼叫端統一記錄，這裡只留耗時
        Err(why) => {
            logging::debug_file_async(format!("GET:{} failed after {} ms", url, elapsed));
            Err(why.into())
        }
    }
}
