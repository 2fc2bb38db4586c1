use crate::config::AutopilotConfig;
use anyhow::Result;
use chrono::{DateTime, Local, NaiveTime, TimeZone};
use std::future::Future;
use tracing::{error, info};

/// First moment at `at` strictly after `now`: today if still ahead,
/// otherwise tomorrow. Times skipped by a DST change move to the next day.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    loop {
        if let Some(candidate) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            if candidate > *now {
                return candidate;
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => return now.clone(),
        }
    }
}

/// Run the job once, logging instead of propagating failure
pub async fn run_once<F, Fut>(job: &mut F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    info!("Autopilot run starting at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    match job().await {
        Ok(()) => {
            info!("Autopilot run complete");
            true
        }
        Err(e) => {
            error!("Autopilot run failed: {:#}", e);
            false
        }
    }
}

/// Sleep until the configured time of day, run the job, repeat. Never
/// returns unless the configured time is invalid.
pub async fn run_daily<F, Fut>(config: &AutopilotConfig, mut job: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let at = config.run_time()?;
    info!("Autopilot started, running daily at {}", at.format("%H:%M"));

    loop {
        let now = Local::now();
        let next = next_run_after(&now, at);
        let wait = (next.clone() - now).to_std().unwrap_or_default();
        info!(
            "Next run at {} (in {}h {}m)",
            next.format("%Y-%m-%d %H:%M"),
            wait.as_secs() / 3600,
            wait.as_secs() % 3600 / 60
        );
        tokio::time::sleep(wait).await;
        run_once(&mut job).await;
    }
}
