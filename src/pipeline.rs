//! Per-controller collection pipeline and the run over all controllers.
//!
//! Stages run strictly in sequence: login, token, inventory, summary
//! stats, health rules, aggregation. A failed stage leaves its fields at
//! zero and the rest of the pipeline carries on; only an unsupported time
//! range or an undecodable inventory stops a controller.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::Instrument;

use crate::aggregate::{aggregate, duplicate_names};
use crate::config::{AppConfig, ConfigError, ControllerConfig, TimeRangeFailure};
use crate::controller::{ControllerClient, ControllerError, Stage, REQUEST_TIMEOUT};
use crate::report::{ControllerReport, ReportMeta, ReportSink};
use crate::timerange::{self, TimeWindow};

/// Errors that stop a single controller.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("inventory response could not be decoded: {0}")]
    Inventory(ControllerError),
    #[error(transparent)]
    Client(ControllerError),
}

/// Outcome of a whole run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Controllers that produced a report.
    pub completed: usize,
    /// Controllers stopped by a pipeline error.
    pub failed: usize,
    /// Artifacts written across all sinks.
    pub artifacts: usize,
    /// Set when an unsupported time range stopped the run.
    pub aborted: bool,
}

/// Collect the report for one controller, with `now` as the window end.
pub async fn collect(cfg: &ControllerConfig, now: DateTime<Utc>) -> Result<ControllerReport, PipelineError> {
    let window = timerange::resolve_at(&cfg.report.timerange, now)?;
    tracing::info!(
        "Reporting on {} to {} ({} days)",
        window.start_rfc3339(),
        window.end_rfc3339(),
        window.duration_ms() / timerange::DAY_MS
    );
    let client = ControllerClient::new(&cfg.url, REQUEST_TIMEOUT).map_err(PipelineError::Client)?;
    collect_with(&client, cfg, window).await
}

async fn collect_with(
    client: &ControllerClient,
    cfg: &ControllerConfig,
    window: TimeWindow,
) -> Result<ControllerReport, PipelineError> {
    let mut degraded = Vec::new();

    let session = match client.login(&cfg.auth).await {
        Ok(session) => Some(session),
        Err(e) => {
            stage_failed(Stage::Login, &e);
            degraded.push(Stage::Login);
            None
        }
    };

    tracing::info!("Fetching access token for {}", cfg.name);
    let token = match client
        .access_token(&cfg.client, &cfg.account, &cfg.secret, cfg.token_min_length)
        .await
    {
        Ok(token) => Some(token),
        Err(e) => {
            stage_failed(Stage::Token, &e);
            degraded.push(Stage::Token);
            None
        }
    };

    let identities = match &token {
        Some(token) => match client.list_applications(token).await {
            Ok(apps) => apps,
            Err(e) if e.is_parse() => {
                tracing::error!(stage = %Stage::Inventory, "Inventory response is malformed: {}", e);
                return Err(PipelineError::Inventory(e));
            }
            Err(e) => {
                stage_failed(Stage::Inventory, &e);
                degraded.push(Stage::Inventory);
                Vec::new()
            }
        },
        None => {
            stage_skipped(Stage::Inventory, "no access token");
            degraded.push(Stage::Inventory);
            Vec::new()
        }
    };

    for name in duplicate_names(&identities) {
        tracing::warn!("Application name {:?} appears more than once; its summary stats are shared", name);
    }

    let stats = match &session {
        Some(session) => match client.fetch_summary(session, &identities, window).await {
            Ok(stats) => stats,
            Err(e) => {
                stage_failed(Stage::SummaryStats, &e);
                degraded.push(Stage::SummaryStats);
                HashMap::new()
            }
        },
        None => {
            stage_skipped(Stage::SummaryStats, "no login session");
            degraded.push(Stage::SummaryStats);
            HashMap::new()
        }
    };

    let rules = match &token {
        Some(token) => match client
            .fetch_health_rules(token, &identities, cfg.health_rule_failures)
            .await
        {
            Ok(results) => {
                if !results.failures.is_empty() {
                    tracing::warn!(
                        "Health rules missing for {} of {} applications",
                        results.failures.len(),
                        identities.len()
                    );
                    degraded.push(Stage::HealthRules);
                }
                results.rules
            }
            Err(e) => {
                stage_failed(Stage::HealthRules, &e);
                degraded.push(Stage::HealthRules);
                HashMap::new()
            }
        },
        None => {
            stage_skipped(Stage::HealthRules, "no access token");
            degraded.push(Stage::HealthRules);
            HashMap::new()
        }
    };

    let records = aggregate(&identities, &stats, &rules);
    for r in &records {
        let m = &r.metrics;
        tracing::debug!(
            "{}: {} calls, {} errors, {:.1} ms average response, {}/{} alerts enabled",
            r.name(),
            m.number_of_calls,
            m.number_of_errors,
            m.average_response_time,
            m.active_health_rules,
            m.active_health_rules + m.inactive_health_rules
        );
    }
    tracing::info!("Aggregated {} application records", records.len());

    Ok(ControllerReport {
        controller: cfg.name.clone(),
        url: cfg.url.clone(),
        window,
        meta: ReportMeta::from(&cfg.report),
        records,
        degraded,
    })
}

fn stage_failed(stage: Stage, error: &ControllerError) {
    match error {
        ControllerError::CredentialExpired { .. } => {
            tracing::error!(stage = %stage, "Credentials expired during {}: {}", stage, error)
        }
        _ => tracing::error!(stage = %stage, status = ?error.status(), "{} stage failed: {}", stage, error),
    }
}

fn stage_skipped(stage: Stage, reason: &str) {
    tracing::warn!(stage = %stage, "Skipping {} stage: {}", stage, reason);
}

/// Process every configured controller in order and hand each finished
/// report to all sinks.
pub async fn run(cfg: &AppConfig, sinks: &[Box<dyn ReportSink>]) -> RunSummary {
    let mut summary = RunSummary::default();

    for ctrl in &cfg.stats {
        let span = tracing::info_span!("controller", name = %ctrl.name);
        let result = collect(ctrl, Utc::now()).instrument(span.clone()).await;
        let _guard = span.enter();

        match result {
            Ok(report) => {
                if !report.degraded.is_empty() {
                    tracing::warn!("Report for {} is incomplete: {}", report.controller, report.degraded_stages());
                }
                summary.completed += 1;
                summary.artifacts += publish(&report, sinks);
            }
            Err(PipelineError::Config(e)) => {
                summary.failed += 1;
                match cfg.on_unsupported_timerange {
                    TimeRangeFailure::AbortRun => {
                        tracing::error!("{}; aborting run", e);
                        summary.aborted = true;
                        break;
                    }
                    TimeRangeFailure::SkipController => {
                        tracing::error!("{}; skipping controller", e);
                    }
                }
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!("No report for {}: {}", ctrl.name, e);
            }
        }
    }

    summary
}

fn publish(report: &ControllerReport, sinks: &[Box<dyn ReportSink>]) -> usize {
    let mut written = 0;
    for sink in sinks {
        match sink.write(report) {
            Ok(path) => {
                tracing::info!("Wrote {} report to {}", sink.name(), path.display());
                written += 1;
            }
            Err(e) => tracing::error!("Failed to write {} report: {}", sink.name(), e),
        }
    }
    written
}
