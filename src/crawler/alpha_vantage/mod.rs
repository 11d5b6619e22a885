//! # Alpha Vantage 報價模組
//!
//! 透過 `GLOBAL_QUOTE` 端點取得單一股票的最新報價。
//!
//! - 存取方式：HTTP GET，以 `apikey` 查詢參數驗證
//! - 回應格式：`{"Global Quote": {"05. price": "...", "06. volume": "..."}}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::{config, crawler::QuoteSource, error::IngestError, util};

/// 報價解析子模組。
pub mod global_quote;

const FUNCTION: &str = "GLOBAL_QUOTE";

/// Alpha Vantage 報價採集器。
pub struct AlphaVantage {
    client: Client,
    endpoint: String,
}

impl AlphaVantage {
    pub fn new(settings: &config::AlphaVantage) -> Result<Self, IngestError> {
        Ok(AlphaVantage {
            client: util::http::build_client(Duration::from_secs(settings.timeout_secs))?,
            endpoint: settings.endpoint.clone(),
        })
    }
}

#[async_trait]
impl QuoteSource for AlphaVantage {
    async fn fetch_global_quote(&self, symbol: &str, api_key: &str) -> Result<String, IngestError> {
        let query = [("function", FUNCTION), ("symbol", symbol), ("apikey", api_key)];
        util::http::get_text(&self.client, &self.endpoint, &query).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration as StdDuration;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        sync::oneshot,
    };

    use super::*;
    use crate::crawler::alpha_vantage::global_quote;

    /// 本機單次回應的 HTTP 服務，回傳 (endpoint, 收到的 request line)
    pub(crate) async fn serve_once(response: String) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/query", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::with_capacity(1024);
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let request = String::from_utf8_lossy(&buf).to_string();
            let request_line = request.lines().next().unwrap_or_default().to_string();
            let _ = tx.send(request_line);

            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        (endpoint, rx)
    }

    fn settings_for(endpoint: String, timeout_secs: u64) -> config::AlphaVantage {
        config::AlphaVantage {
            api_key: "k".to_string(),
            endpoint,
            timeout_secs,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_request_line_and_body() {
        let body = r#"{"Global Quote": {"05. price": "150.23", "06. volume": "1000000"}}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let (endpoint, request_line) = serve_once(response).await;
        let av = AlphaVantage::new(&settings_for(endpoint, 5)).unwrap();

        let result = av.fetch_global_quote("AAPL", "k").await;

        assert_eq!(result.unwrap(), body);
        assert_eq!(
            request_line.await.unwrap(),
            "GET /query?function=GLOBAL_QUOTE&symbol=AAPL&apikey=k HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_server_error_status_is_network_error() {
        let (endpoint, request_line) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                .to_string(),
        )
        .await;
        let av = AlphaVantage::new(&settings_for(endpoint, 5)).unwrap();

        let result = av.fetch_global_quote("AAPL", "k").await;

        match result {
            Err(IngestError::Network(msg)) => {
                assert!(msg.contains("500"), "{}", msg);
                assert!(!msg.contains("apikey"), "{}", msg);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(request_line.await.unwrap().starts_with("GET /query?function=GLOBAL_QUOTE"));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/query", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(StdDuration::from_secs(10)).await;
        });
        let av = AlphaVantage::new(&settings_for(endpoint, 1)).unwrap();

        let started = std::time::Instant::now();
        let result = av.fetch_global_quote("AAPL", "k").await;

        assert!(matches!(result, Err(IngestError::Network(_))));
        assert!(started.elapsed() < StdDuration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let settings = config::AlphaVantage {
            api_key: "demo".to_string(),
            endpoint: "http://127.0.0.1:9/query".to_string(),
            timeout_secs: 1,
            ..Default::default()
        };
        let av = AlphaVantage::new(&settings).unwrap();

        let result = av.fetch_global_quote("AAPL", "demo").await;

        assert!(matches!(result, Err(IngestError::Network(_))));
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_global_quote() {
        dotenv::dotenv().ok();
        let app = config::App::load().unwrap();
        let av = AlphaVantage::new(&app.alpha_vantage).unwrap();

        let body = av
            .fetch_global_quote(&app.alpha_vantage.symbol, &app.alpha_vantage.api_key)
            .await
            .unwrap();
        let quote = global_quote::parse(&body).and_then(|raw| raw.convert());

        dbg!(&quote);
        assert!(quote.is_ok());
    }
}
