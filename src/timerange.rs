//! Relative time range presets resolved to absolute report windows.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::config::ConfigError;

/// One day in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

/// A named relative time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRangePreset {
    LastDay,
    LastWeek,
    LastTwoWeeks,
    LastMonth,
    LastThreeMonths,
    LastSixMonths,
    LastYear,
}

impl TimeRangePreset {
    pub const ALL: [TimeRangePreset; 7] = [
        TimeRangePreset::LastDay,
        TimeRangePreset::LastWeek,
        TimeRangePreset::LastTwoWeeks,
        TimeRangePreset::LastMonth,
        TimeRangePreset::LastThreeMonths,
        TimeRangePreset::LastSixMonths,
        TimeRangePreset::LastYear,
    ];

    /// Parse a preset name, ignoring case and surrounding whitespace.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        let preset = match name.trim().to_lowercase().as_str() {
            "last 1 day" => Self::LastDay,
            "last 1 week" => Self::LastWeek,
            "last 2 weeks" => Self::LastTwoWeeks,
            "last 1 month" => Self::LastMonth,
            "last 3 months" => Self::LastThreeMonths,
            "last 6 months" => Self::LastSixMonths,
            "last 1 year" => Self::LastYear,
            _ => return Err(ConfigError::UnsupportedTimeRange(name.to_string())),
        };
        Ok(preset)
    }

    /// Canonical (lowercase) name of the preset.
    pub fn name(self) -> &'static str {
        match self {
            Self::LastDay => "last 1 day",
            Self::LastWeek => "last 1 week",
            Self::LastTwoWeeks => "last 2 weeks",
            Self::LastMonth => "last 1 month",
            Self::LastThreeMonths => "last 3 months",
            Self::LastSixMonths => "last 6 months",
            Self::LastYear => "last 1 year",
        }
    }

    /// Length of the window in whole days. A "year" is 360 days.
    pub fn days(self) -> i64 {
        match self {
            Self::LastDay => 1,
            Self::LastWeek => 7,
            Self::LastTwoWeeks => 14,
            Self::LastMonth => 30,
            Self::LastThreeMonths => 90,
            Self::LastSixMonths => 180,
            Self::LastYear => 360,
        }
    }
}

/// An absolute `[start, end)` window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    /// Window ending at `now` and covering the preset's duration.
    pub fn ending_at(preset: TimeRangePreset, now: DateTime<Utc>) -> Self {
        let end = now.timestamp_millis();
        Self {
            start: end - preset.days() * DAY_MS,
            end,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }

    /// Start of the window as an RFC 3339 timestamp.
    pub fn start_rfc3339(&self) -> String {
        format_millis(self.start)
    }

    /// End of the window as an RFC 3339 timestamp.
    pub fn end_rfc3339(&self) -> String {
        format_millis(self.end)
    }
}

/// Canonical names of every supported preset, comma-separated.
pub fn supported_presets() -> String {
    let names: Vec<&str> = TimeRangePreset::ALL.iter().map(|p| p.name()).collect();
    names.join(", ")
}

/// Resolve a preset name into the window ending at `now`.
pub fn resolve_at(preset: &str, now: DateTime<Utc>) -> Result<TimeWindow, ConfigError> {
    let preset = TimeRangePreset::parse(preset)?;
    Ok(TimeWindow::ending_at(preset, now))
}

fn format_millis(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => ms.to_string(),
    }
}
