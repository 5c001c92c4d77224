//! appd-stats - Controller Application Statistics Reporter
//!
//! Collects per-application call/error counts and health rule status from
//! one or more controllers and writes a report per controller.

mod aggregate;
mod config;
mod controller;
mod model;
mod pipeline;
mod report;
mod timerange;

use config::AppConfig;

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // The log file location comes from the config, so load it first
    let cfg = AppConfig::load()?;
    init_logging(cfg.log_file.as_deref())?;

    tracing::info!("Loaded {} controller(s)", cfg.stats.len());
    tracing::info!("Writing reports to {}", cfg.output.dir.display());

    let sinks = report::sinks_for(&cfg.output);
    let summary = pipeline::run(&cfg, &sinks).await;

    tracing::info!(
        "Finished: {} report(s), {} failed controller(s), {} artifact(s)",
        summary.completed,
        summary.failed,
        summary.artifacts
    );

    if summary.aborted {
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(EnvFilter::from_default_env().add_directive("appd_stats=info".parse()?))
        .init();

    Ok(())
}
