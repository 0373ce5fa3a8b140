pub mod app;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod db;
pub mod error;
pub mod infra;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
