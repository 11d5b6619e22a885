use std::{env, fmt, path::PathBuf, str::FromStr};

use anyhow::Result;
use config::{Config as config_config, File as config_file};
use serde::{Deserialize, Serialize};

const CONFIG_PATH: &str = "app.json";

/// 應用程式設定，啟動時載入一次後以參考傳給各模組。
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct App {
    #[serde(default)]
    pub postgresql: PostgreSQL,
    #[serde(default)]
    pub alpha_vantage: AlphaVantage,
    #[serde(default)]
    pub scheduler: Scheduler,
}

const POSTGRESQL_HOST: &str = "POSTGRESQL_HOST";
/// Airflow 部署時沿用的主機變數名稱
const AIRFLOW_VAR_DB_HOST: &str = "AIRFLOW_VAR_DB_HOST";
const POSTGRESQL_PORT: &str = "POSTGRESQL_PORT";
const POSTGRESQL_USER: &str = "POSTGRESQL_USER";
const POSTGRESQL_PASSWORD: &str = "POSTGRESQL_PASSWORD";
const POSTGRESQL_DB: &str = "POSTGRESQL_DB";

#[derive(Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PostgreSQL {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub db: String,
}

impl Default for PostgreSQL {
    fn default() -> Self {
        PostgreSQL {
            host: "postgres".to_string(),
            port: 5432,
            user: "stock_user".to_string(),
            password: "stock_password".to_string(),
            db: "stock_data".to_string(),
        }
    }
}

impl fmt::Debug for PostgreSQL {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgreSQL")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &mask(&self.password))
            .field("db", &self.db)
            .finish()
    }
}

const STOCK_API_KEY: &str = "STOCK_API_KEY";
const AIRFLOW_VAR_STOCK_API_KEY: &str = "AIRFLOW_VAR_STOCK_API_KEY";
const STOCK_SYMBOL: &str = "STOCK_SYMBOL";
const STOCK_API_ENDPOINT: &str = "STOCK_API_ENDPOINT";
const STOCK_API_TIMEOUT_SECS: &str = "STOCK_API_TIMEOUT_SECS";

/// Alpha Vantage 報價 API 設定
#[derive(Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AlphaVantage {
    /// 必填，未設定時於執行抓取流程時回報錯誤
    pub api_key: String,
    pub symbol: String,
    pub endpoint: String,
    /// 單次請求的逾時秒數
    pub timeout_secs: u64,
}

impl Default for AlphaVantage {
    fn default() -> Self {
        AlphaVantage {
            api_key: String::new(),
            symbol: "AAPL".to_string(),
            endpoint: "https://www.alphavantage.co/query".to_string(),
            timeout_secs: 10,
        }
    }
}

impl fmt::Debug for AlphaVantage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlphaVantage")
            .field("api_key", &mask(&self.api_key))
            .field("symbol", &self.symbol)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

const SCHEDULER_ENABLED: &str = "SCHEDULER_ENABLED";
const SCHEDULER_CRON: &str = "SCHEDULER_CRON";
const SCHEDULER_RUN_ON_START: &str = "SCHEDULER_RUN_ON_START";
const SCHEDULER_FAIL_ON_ERROR: &str = "SCHEDULER_FAIL_ON_ERROR";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Scheduler {
    /// false 時只執行一次後結束
    pub enabled: bool,
    /// sec  min  hour  day-of-month  month  day-of-week (UTC)
    pub cron: String,
    pub run_on_start: bool,
    /// 單次執行失敗時以非零狀態碼結束，預設與排程器看到的結果一致（一律成功）
    pub fail_on_error: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler {
            enabled: false,
            cron: "0 0 0 * * *".to_string(),
            run_on_start: false,
            fail_on_error: false,
        }
    }
}

impl App {
    /// 載入設定：有 app.json 就以它為底，再用環境變數覆蓋；沒有則使用預設值加上環境變數。
    pub fn load() -> Result<Self> {
        let config_path = config_path();
        if config_path.exists() {
            let config: App = config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize()?;
            return Ok(config.override_with_env());
        }

        Ok(App::from_env())
    }

    /// 從 env 中讀取設定值
    fn from_env() -> Self {
        App::default().override_with_env()
    }

    /// 將來至於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(self) -> Self {
        self.override_with(|key| env::var(key).ok())
    }

    fn override_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(POSTGRESQL_HOST).or_else(|| lookup(AIRFLOW_VAR_DB_HOST)) {
            self.postgresql.host = host;
        }

        if let Some(port) = lookup(POSTGRESQL_PORT) {
            self.postgresql.port = u16::from_str(port.trim()).unwrap_or(5432);
        }

        if let Some(user) = lookup(POSTGRESQL_USER) {
            self.postgresql.user = user;
        }

        if let Some(password) = lookup(POSTGRESQL_PASSWORD) {
            self.postgresql.password = password;
        }

        if let Some(db) = lookup(POSTGRESQL_DB) {
            self.postgresql.db = db;
        }

        if let Some(api_key) = lookup(STOCK_API_KEY).or_else(|| lookup(AIRFLOW_VAR_STOCK_API_KEY)) {
            self.alpha_vantage.api_key = api_key;
        }

        if let Some(symbol) = lookup(STOCK_SYMBOL) {
            self.alpha_vantage.symbol = symbol;
        }

        if let Some(endpoint) = lookup(STOCK_API_ENDPOINT) {
            self.alpha_vantage.endpoint = endpoint;
        }

        if let Some(secs) = lookup(STOCK_API_TIMEOUT_SECS) {
            self.alpha_vantage.timeout_secs = u64::from_str(secs.trim()).unwrap_or(10);
        }

        if let Some(enabled) = lookup(SCHEDULER_ENABLED) {
            self.scheduler.enabled = parse_bool(&enabled);
        }

        if let Some(cron) = lookup(SCHEDULER_CRON) {
            self.scheduler.cron = cron;
        }

        if let Some(run_on_start) = lookup(SCHEDULER_RUN_ON_START) {
            self.scheduler.run_on_start = parse_bool(&run_on_start);
        }

        if let Some(fail_on_error) = lookup(SCHEDULER_FAIL_ON_ERROR) {
            self.scheduler.fail_on_error = parse_bool(&fail_on_error);
        }

        self
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "******"
    }
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}
