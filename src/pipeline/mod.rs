// ETL pipeline: fetch, normalize, load and aggregate, strictly in that order

pub mod aggregate;
pub mod fetch;
pub mod load;
pub mod normalize;
pub mod tsv;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::app::ports::HttpClientPort;
use crate::config::Config;
use crate::error::{EtlError, Result};
use crate::infra::http_client::ReqwestHttp;

pub use aggregate::{build_analytics, AggregateReport};
pub use fetch::{fetch_datasets, FetchReport};
pub use load::{load_processed, LoadReport};
pub use normalize::{normalize_staged, NormalizeReport};

/// One pipeline task. External schedulers must run them in `Stage::ALL` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Normalize,
    Load,
    Aggregate,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Fetch, Stage::Normalize, Stage::Load, Stage::Aggregate];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Normalize => "normalize",
            Stage::Load => "load",
            Stage::Aggregate => "aggregate",
        }
    }
}

/// Everything a run produced, stage by stage
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub fetch: Option<FetchReport>,
    pub normalize: Option<NormalizeReport>,
    pub load: Option<LoadReport>,
    pub aggregate: Option<AggregateReport>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            fetch: None,
            normalize: None,
            load: None,
            aggregate: None,
        }
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Pipeline {
    config: Arc<Config>,
    http: Arc<dyn HttpClientPort>,
}

impl Pipeline {
    pub fn new(config: Config, http: Arc<dyn HttpClientPort>) -> Self {
        Self {
            config: Arc::new(config),
            http,
        }
    }

    /// Pipeline backed by a real HTTP client built from the source settings
    pub fn from_config(config: Config) -> Result<Self> {
        let timeout = config.source.timeout_seconds.map(Duration::from_secs);
        let http = ReqwestHttp::new(timeout)?;
        Ok(Self::new(config, Arc::new(http)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run all four stages in order. The first failing stage aborts the run.
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::new();
        let span = tracing::info_span!("etl_run", run_id = %report.run_id);
        let t_run = std::time::Instant::now();

        let result = async {
            info!("ETL process started");
            for stage in Stage::ALL {
                self.run_stage(stage, &mut report).await?;
            }
            info!("ETL process finished");
            Ok::<(), EtlError>(())
        }
        .instrument(span)
        .await;

        crate::metrics::run::finished(result.is_ok(), t_run.elapsed().as_secs_f64());
        if let Err(e) = result {
            error!(run_id = %report.run_id, "ETL run failed: {}", e);
            return Err(e);
        }
        report.finished_at = Some(Utc::now());
        Ok(report)
    }

    /// Run a single stage, recording its outcome in `report`.
    pub async fn run_stage(&self, stage: Stage, report: &mut RunReport) -> Result<()> {
        let span = tracing::info_span!("stage", stage = stage.name());
        let t_stage = std::time::Instant::now();
        async {
            info!("Stage {} started", stage.name());
            match stage {
                Stage::Fetch => {
                    let fetched = fetch_datasets(&self.config, self.http.as_ref()).await?;
                    let complete = fetched.is_complete();
                    let failed: Vec<String> =
                        fetched.failed.iter().map(|f| f.file_name.clone()).collect();
                    report.fetch = Some(fetched);
                    if !complete && self.config.source.fail_on_missing_downloads {
                        return Err(EtlError::IncompleteDownload(failed));
                    }
                }
                Stage::Normalize => {
                    report.normalize = Some(self.blocking(normalize_staged).await?);
                }
                Stage::Load => {
                    report.load = Some(self.blocking(load_processed).await?);
                }
                Stage::Aggregate => {
                    report.aggregate = Some(self.blocking(build_analytics).await?);
                }
            }
            info!("Stage {} finished", stage.name());
            Ok::<(), EtlError>(())
        }
        .instrument(span)
        .await?;
        crate::metrics::run::stage_finished(stage.name(), t_stage.elapsed().as_secs_f64());
        Ok(())
    }

    /// Run a file/database bound stage on the blocking pool
    async fn blocking<T, F>(&self, stage: F) -> Result<T>
    where
        F: FnOnce(&Config) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || stage(&config)).await?
    }
}
