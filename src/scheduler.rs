use std::{future::Future, sync::Arc};

use anyhow::Result;
use tokio::task;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{config, event, logging};

/// 啟動排程，依 `scheduler.cron` 每日抓取一次報價
pub async fn start(sched: &JobScheduler, app: Arc<config::App>) -> Result<()> {
    let job_app = Arc::clone(&app);
    let job = create_job(&app.scheduler.cron, move || {
        let app = Arc::clone(&job_app);
        async move { fetch_quote(&app).await }
    })?;
    sched.add(job).await?;
    sched.start().await?;

    if app.scheduler.run_on_start {
        let app = Arc::clone(&app);
        task::spawn(async move {
            let _ = fetch_quote(&app).await;
        });
    }

    logging::info_file_async(format!(
        "Scheduler started, {} will be fetched at '{}'",
        app.alpha_vantage.symbol, app.scheduler.cron
    ));

    Ok(())
}

/// 沒有資料可寫不算失敗
async fn fetch_quote(app: &config::App) -> Result<()> {
    match event::stock_quote::execute(app).await {
        Ok(_) => Ok(()),
        Err(why) if why.is_skip() => Ok(()),
        Err(why) => Err(why.into()),
    }
}

fn create_job<F, Fut>(cron_expr: &str, task: F) -> Result<Job>
where
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    let cron = cron_expr.to_string();
    Ok(Job::new_async(cron_expr, move |_uuid, _l| {
        let task = task.clone();
        let cron = cron.clone();
        Box::pin(async move {
            // 錯誤細節已在 execute 中記錄
            if let Err(why) = task().await {
                logging::debug_file_async(format!(
                    "Task({}) finished with error: {}",
                    cron, why
                ));
            }
        })
    })?)
}
