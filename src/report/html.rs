//! Styled HTML report, one page per controller.

use std::path::PathBuf;

use super::{file_stem, write_file, ControllerReport, ReportError, ReportSink};

const REPORT_TEMPLATE: &str = include_str!("templates/report.html");

/// Writes `<dir>/<controller>.html`.
pub struct HtmlReport {
    dir: PathBuf,
}

impl HtmlReport {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl ReportSink for HtmlReport {
    fn name(&self) -> &'static str {
        "html"
    }

    fn write(&self, report: &ControllerReport) -> Result<PathBuf, ReportError> {
        let path = self.dir.join(format!("{}.html", file_stem(&report.controller)));
        write_file(path, &render_html(report))
    }
}

pub fn render_html(report: &ControllerReport) -> String {
    let meta = &report.meta;
    let rows: Vec<String> = report
        .records
        .iter()
        .map(|r| {
            format!(
                "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
                escape(r.name()),
                r.metrics.number_of_errors,
                r.metrics.number_of_calls,
                r.metrics.active_health_rules,
                r.metrics.inactive_health_rules,
            )
        })
        .collect();

    let notice = if report.degraded.is_empty() {
        String::new()
    } else {
        format!(
            "<p class=\"notice\">Incomplete data: the {} stage(s) failed or were skipped; their columns show zero.</p>",
            escape(&report.degraded_stages())
        )
    };

    REPORT_TEMPLATE
        .replace("{{title}}", &escape(&meta.name))
        .replace("{{controller}}", &escape(&report.controller))
        .replace("{{url}}", &escape(&report.url))
        .replace("{{subtitle}}", &escape(&meta.subtitle))
        .replace("{{header_1}}", &escape(&meta.headers[0]))
        .replace("{{header_2}}", &escape(&meta.headers[1]))
        .replace("{{header_3}}", &escape(&meta.headers[2]))
        .replace("{{header_4}}", &escape(&meta.headers[3]))
        .replace("{{from}}", &report.window.start_rfc3339())
        .replace("{{until}}", &report.window.end_rfc3339())
        .replace("{{scope}}", &escape(&meta.scope))
        .replace("{{team}}", &escape(&meta.team))
        .replace("{{description}}", &escape(&meta.description))
        .replace("{{notice}}", &notice)
        .replace("{{rows}}", &rows.join("\n"))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
