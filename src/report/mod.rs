//! Report sinks.
//!
//! A sink consumes the finished records of one controller and writes a
//! human-readable artifact.

mod csv;
mod html;

pub use self::csv::*;
pub use self::html::*;

use std::path::PathBuf;
use thiserror::Error;

use crate::config::{OutputConfig, OutputFormat, ReportConfig};
use crate::controller::Stage;
use crate::model::ApplicationRecord;
use crate::timerange::TimeWindow;

/// Report error types.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Display metadata printed around the records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportMeta {
    pub name: String,
    pub subtitle: String,
    pub scope: String,
    pub team: String,
    pub description: String,
    /// Free-text lines shown above the title.
    pub headers: [String; 4],
}

impl From<&ReportConfig> for ReportMeta {
    fn from(cfg: &ReportConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            subtitle: cfg.subtitle.clone(),
            scope: cfg.scope.clone(),
            team: cfg.team.clone(),
            description: cfg.description.clone(),
            headers: [
                cfg.header.b2.clone(),
                cfg.header.b3.clone(),
                cfg.header.b4.clone(),
                cfg.header.b5.clone(),
            ],
        }
    }
}

/// Everything a sink needs for one controller.
#[derive(Debug, Clone)]
pub struct ControllerReport {
    pub controller: String,
    pub url: String,
    pub window: TimeWindow,
    pub meta: ReportMeta,
    /// Records in inventory order.
    pub records: Vec<ApplicationRecord>,
    /// Stages that failed or were skipped; their fields are zero.
    pub degraded: Vec<Stage>,
}

impl ControllerReport {
    /// Comma-separated names of the degraded stages, empty when every
    /// stage delivered.
    pub fn degraded_stages(&self) -> String {
        let names: Vec<String> = self.degraded.iter().map(|s| s.to_string()).collect();
        names.join(", ")
    }
}

/// Consumer of finished controller reports.
pub trait ReportSink {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Write the report and return the path of the artifact.
    fn write(&self, report: &ControllerReport) -> Result<PathBuf, ReportError>;
}

/// Build the sinks selected by the output configuration.
pub fn sinks_for(output: &OutputConfig) -> Vec<Box<dyn ReportSink>> {
    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();
    for format in &output.formats {
        let sink: Box<dyn ReportSink> = match format {
            OutputFormat::Html => Box::new(HtmlReport::new(output.dir.clone())),
            OutputFormat::Csv => Box::new(CsvReport::new(output.dir.clone())),
        };
        if !sinks.iter().any(|s| s.name() == sink.name()) {
            sinks.push(sink);
        }
    }
    sinks
}

/// File name stem for a controller: anything outside `[A-Za-z0-9._-]`
/// becomes `_`.
pub fn file_stem(controller: &str) -> String {
    let stem: String = controller
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "controller".to_string()
    } else {
        stem
    }
}

fn write_file(path: PathBuf, content: &str) -> Result<PathBuf, ReportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ReportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(&path, content).map_err(|source| ReportError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
