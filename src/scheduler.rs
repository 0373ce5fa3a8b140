//! Daily in-process timer driving full pipeline runs.
//!
//! Runs are awaited one at a time; the next fire time is computed only after a
//! run returns, so fire times that pass during a long run are skipped rather
//! than queued.

use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::error::{EtlError, Result};
use crate::pipeline::Pipeline;

/// Parse a cron expression (sec min hour day-of-month month day-of-week [year]).
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    Schedule::from_str(expression).map_err(|e| EtlError::Schedule {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// First fire time strictly after `after`
pub fn next_fire<Z: TimeZone>(schedule: &Schedule, after: &DateTime<Z>) -> Option<DateTime<Z>> {
    schedule.after(after).next()
}

/// Run the pipeline on its configured schedule until Ctrl-C.
/// A failed run is logged and the loop waits for the next fire time.
pub async fn run_scheduled(pipeline: &Pipeline) -> Result<()> {
    let expression = pipeline.config().schedule.cron.clone();
    let schedule = parse_schedule(&expression)?;
    info!("Scheduler started with '{}'", expression);

    loop {
        let now = Local::now();
        let Some(next) = next_fire(&schedule, &now) else {
            warn!("Schedule '{}' has no upcoming fire time, stopping", expression);
            return Ok(());
        };
        let wait = (next - now).to_std().unwrap_or_default();
        info!("Next ETL run at {}", next.format("%Y-%m-%d %H:%M:%S %z"));

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, stopping scheduler");
                return Ok(());
            }
        }

        match pipeline.run().await {
            Ok(report) => info!(run_id = %report.run_id, "Scheduled run completed"),
            Err(e) => error!("Scheduled run failed: {}", e),
        }
    }
}
