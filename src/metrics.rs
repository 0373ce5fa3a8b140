use std::net::SocketAddr;

/// Install the Prometheus exporter when `IMDB_ETL_METRICS_PORT` is set.
pub fn init_metrics() {
    let port: u16 = match std::env::var("IMDB_ETL_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
    {
        Some(p) => p,
        None => return,
    };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            tracing::info!("Prometheus exporter listening on http://{}/metrics", addr);
        }
        Err(e) => {
            tracing::warn!("Prometheus exporter install failed (possibly already installed): {}", e);
        }
    }
}

pub mod fetch {
    pub fn downloaded(dataset: &str, bytes: u64) {
        metrics::counter!("imdb_etl_downloads_total", "dataset" => dataset.to_string(), "outcome" => "ok")
            .increment(1);
        metrics::counter!("imdb_etl_download_bytes_total").increment(bytes);
    }

    pub fn skipped(dataset: &str) {
        metrics::counter!("imdb_etl_downloads_total", "dataset" => dataset.to_string(), "outcome" => "skipped")
            .increment(1);
    }

    pub fn failed(dataset: &str, status: u16) {
        metrics::counter!(
            "imdb_etl_downloads_total",
            "dataset" => dataset.to_string(),
            "outcome" => "failed",
            "status" => status.to_string()
        )
        .increment(1);
    }
}

pub mod normalize {
    pub fn file_normalized(rows: u64, nulls: u64) {
        metrics::counter!("imdb_etl_files_normalized_total").increment(1);
        metrics::counter!("imdb_etl_rows_normalized_total").increment(rows);
        metrics::counter!("imdb_etl_null_cells_total").increment(nulls);
    }
}

pub mod load {
    pub fn table_loaded(table: &str, rows: u64) {
        metrics::counter!("imdb_etl_tables_loaded_total").increment(1);
        metrics::counter!("imdb_etl_rows_loaded_total", "table" => table.to_string()).increment(rows);
    }
}

pub mod run {
    pub fn stage_finished(stage: &'static str, duration_secs: f64) {
        metrics::histogram!("imdb_etl_stage_duration_seconds", "stage" => stage).record(duration_secs);
    }

    pub fn finished(success: bool, duration_secs: f64) {
        let outcome = if success { "success" } else { "failure" };
        metrics::counter!("imdb_etl_runs_total", "outcome" => outcome).increment(1);
        metrics::histogram!("imdb_etl_run_duration_seconds").record(duration_secs);
    }
}
