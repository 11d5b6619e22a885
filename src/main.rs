use std::{process::ExitCode, sync::Arc};

use anyhow::Result;
use tokio_cron_scheduler::JobScheduler;

use crate::{
    database::{PostgresSQL, QuoteStore},
    error::IngestError,
    event::stock_quote::Ingested,
};

#[cfg(all(target_os = "linux", target_env = "musl"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod config;
pub mod crawler;
pub mod database;
pub mod error;
pub mod event;
pub mod logging;
pub mod scheduler;
pub mod util;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    logging::info_console(format!(
        "{} {} started, OS/Arch: {}/{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    ));

    let code = match run().await {
        Ok(code) => code,
        Err(why) => {
            logging::error_console(format!("{:?}", why));
            ExitCode::FAILURE
        }
    };
    logging::flush();

    code
}

async fn run() -> Result<ExitCode> {
    let app = Arc::new(config::App::load()?);
    logging::info_file_async(format!("Configuration loaded: {:?}", app));

    let store = PostgresSQL::new(&app.postgresql);
    match store.ensure_schema().await {
        Ok(_) => logging::info_file_async("Table 'stock_data' checked/created successfully.".to_string()),
        Err(why) => logging::error_file_async(format!("Error creating table: {}", why)),
    }

    if !app.scheduler.enabled {
        let result = event::stock_quote::execute(&app).await;
        if should_fail(&result, app.scheduler.fail_on_error) {
            return Ok(ExitCode::FAILURE);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let mut sched = JobScheduler::new().await?;
    scheduler::start(&sched, Arc::clone(&app)).await?;

    tokio::signal::ctrl_c().await?;
    logging::info_file_async("Shutting down scheduler".to_string());
    sched.shutdown().await?;

    Ok(ExitCode::SUCCESS)
}

/// 單次執行是否以非零狀態碼結束。
///
/// 錯誤已在 execute 中記錄；預設一律成功，開啟 `fail_on_error` 後失敗（不含略過）才回傳 true。
fn should_fail(result: &Result<Ingested, IngestError>, fail_on_error: bool) -> bool {
    matches!(result, Err(why) if fail_on_error && !why.is_skip())
}
