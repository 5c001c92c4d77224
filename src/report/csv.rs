//! Semicolon-separated export.

use std::path::PathBuf;

use super::{file_stem, write_file, ControllerReport, ReportError, ReportSink};
use crate::model::HealthRule;

const HEADER: [&str; 9] = [
    "Application Name",
    "Controller",
    "Number of Calls",
    "Number of Errors",
    "Calls per Minute",
    "Errors per Minute",
    "Active Alerts (health rules)",
    "Inactive Alerts (health rules)",
    "Alert List (name, id, enabled)",
];

/// Writes `<dir>/<controller>.csv`, replacing any previous export.
pub struct CsvReport {
    dir: PathBuf,
}

impl CsvReport {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl ReportSink for CsvReport {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn write(&self, report: &ControllerReport) -> Result<PathBuf, ReportError> {
        let path = self.dir.join(format!("{}.csv", file_stem(&report.controller)));
        write_file(path, &render_csv(report))
    }
}

pub fn render_csv(report: &ControllerReport) -> String {
    let mut out = String::new();
    push_row(&mut out, HEADER.iter().map(|h| h.to_string()));

    for record in &report.records {
        let m = &record.metrics;
        push_row(
            &mut out,
            [
                record.identity.name.clone(),
                report.controller.clone(),
                m.number_of_calls.to_string(),
                m.number_of_errors.to_string(),
                m.calls_per_minute.to_string(),
                m.errors_per_minute.to_string(),
                m.active_health_rules.to_string(),
                m.inactive_health_rules.to_string(),
                alert_list(&record.health_rules),
            ],
        );
    }

    out
}

fn alert_list(rules: &[HealthRule]) -> String {
    let items: Vec<String> = rules
        .iter()
        .map(|r| format!("{} ({}, {})", r.name, r.id, r.active))
        .collect();
    items.join(", ")
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let row: Vec<String> = fields.into_iter().map(|f| quote(&f)).collect();
    out.push_str(&row.join(";"));
    out.push('\n');
}

fn quote(field: &str) -> String {
    if field.contains([';', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
