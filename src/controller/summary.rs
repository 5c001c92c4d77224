//! Bulk summary statistics for all applications.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::decode::{array, parse_body, Record};
use super::{transport, ControllerClient, ControllerError, Session, Stage};
use crate::model::{ApplicationIdentity, SummaryStats};
use crate::timerange::TimeWindow;

const SUMMARY_PATH: &str = "/controller/restui/v1/app/list/ids";

/// Columns requested from the application list view.
pub const RESULT_COLUMNS: [&str; 7] = [
    "APP_OVERALL_HEALTH",
    "CALLS",
    "CALLS_PER_MINUTE",
    "AVERAGE_RESPONSE_TIME",
    "ERROR_PERCENT",
    "ERRORS",
    "ERRORS_PER_MINUTE",
];

/// Filter payload for the application list view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    pub request_filter: Vec<i64>,
    pub time_range_start: i64,
    pub time_range_end: i64,
    pub search_filters: Option<Vec<String>>,
    pub column_sorts: Option<Vec<String>>,
    pub result_columns: Vec<String>,
    pub offset: i64,
    /// -1 means no limit.
    pub limit: i64,
}

impl SummaryRequest {
    pub fn new(identities: &[ApplicationIdentity], window: TimeWindow) -> Self {
        Self {
            request_filter: identities.iter().map(|app| app.id).collect(),
            time_range_start: window.start,
            time_range_end: window.end,
            search_filters: None,
            column_sorts: None,
            result_columns: RESULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            offset: 0,
            limit: -1,
        }
    }
}

impl ControllerClient {
    /// Fetch calls, errors and response times for every application in
    /// one request, keyed by application name.
    ///
    /// Applications missing from the response are simply absent from the
    /// map; rows naming unknown applications are ignored.
    pub async fn fetch_summary(
        &self,
        session: &Session,
        identities: &[ApplicationIdentity],
        window: TimeWindow,
    ) -> Result<HashMap<String, SummaryStats>, ControllerError> {
        if session.is_expired() {
            return Err(ControllerError::CredentialExpired {
                stage: Stage::SummaryStats,
            });
        }

        let url = self.url(SUMMARY_PATH);
        let payload = SummaryRequest::new(identities, window);

        let response = self
            .http
            .post(&url)
            .header("Cookie", session.cookie_header())
            .header(session.csrf_token.name.as_str(), session.csrf_token.value.as_str())
            .header("Content-Type", "application/json;charset=UTF-8")
            .header("Accept", "application/json, text/plain, */*")
            .json(&payload)
            .send()
            .await
            .map_err(transport(Stage::SummaryStats))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport(Stage::SummaryStats))?;
        if status != 200 {
            tracing::error!("Got HTTP {} while calling {}: {}", status, url, body);
            return Err(ControllerError::Http {
                stage: Stage::SummaryStats,
                status,
                url,
            });
        }

        let json = parse_body(Stage::SummaryStats, &body)?;
        let stats = decode_summary(&json, identities)?;
        tracing::info!("Got summary stats for {} of {} applications", stats.len(), identities.len());
        Ok(stats)
    }
}

/// Match the `data` rows back to the inventory by exact name.
pub fn decode_summary(
    json: &serde_json::Value,
    identities: &[ApplicationIdentity],
) -> Result<HashMap<String, SummaryStats>, ControllerError> {
    let root = Record::new(Stage::SummaryStats, "$".to_string(), json)?;
    let data = root.value("data")?;
    let known: HashSet<&str> = identities.iter().map(|app| app.name.as_str()).collect();

    let mut stats = HashMap::new();
    for (i, row) in array(Stage::SummaryStats, "data", data)?.iter().enumerate() {
        let record = Record::new(Stage::SummaryStats, format!("data[{}]", i), row)?;
        let name = record.str("name")?;
        if !known.contains(name) {
            continue;
        }

        stats.insert(
            name.to_string(),
            SummaryStats {
                number_of_calls: record.count("numberOfCalls")?,
                number_of_errors: record.count("numberOfErrors")?,
                calls_per_minute: record.f64("callsPerMinute")?,
                errors_per_minute: record.f64("errorsPerMinute")?,
                average_response_time: record.f64("averageResponseTime")?,
            },
        );
    }

    Ok(stats)
}
