use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use imdb_etl::config::Config;
use imdb_etl::pipeline::{Pipeline, RunReport, Stage};
use imdb_etl::{logging, metrics, scheduler};

#[derive(Parser)]
#[command(name = "imdb_etl")]
#[command(about = "Nightly ETL of the IMDb dataset dumps into SQLite")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./imdb_etl.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fetch, normalize, load and aggregate once
    Run {
        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Run the whole pipeline on the configured daily schedule
    Schedule,
    /// Run a single stage, for external schedulers that sequence the tasks themselves
    Stage {
        #[arg(value_enum)]
        stage: Stage,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    logging::init_logging(&config.logging.dir);
    metrics::init_metrics();

    let pipeline = Pipeline::from_config(config)?;

    match cli.command {
        Commands::Run { json } => {
            let report = pipeline.run().await?;
            print_summary(&report);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Commands::Schedule => {
            scheduler::run_scheduled(&pipeline).await?;
        }
        Commands::Stage { stage } => {
            let mut report = RunReport::new();
            if let Err(e) = pipeline.run_stage(stage, &mut report).await {
                error!("Stage {} failed: {}", stage.name(), e);
                return Err(e.into());
            }
            print_summary(&report);
        }
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    if let Some(fetch) = &report.fetch {
        info!(
            "fetch: {} downloaded, {} skipped, {} failed",
            fetch.downloaded.len(),
            fetch.skipped.len(),
            fetch.failed.len()
        );
        for failed in &fetch.failed {
            info!("  {} (status {})", failed.file_name, failed.status);
        }
    }
    if let Some(normalize) = &report.normalize {
        info!("normalize: {} file(s)", normalize.files.len());
    }
    if let Some(load) = &report.load {
        for table in &load.tables {
            info!("load: {} <- {} ({} rows)", table.table, table.file, table.rows);
        }
    }
    if let Some(aggregate) = &report.aggregate {
        for (table, rows) in &aggregate.tables {
            info!("aggregate: {} ({} rows)", table, rows);
        }
    }
}
