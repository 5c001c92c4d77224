//! Per-application record types.

/// An application as listed by the controller's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicationIdentity {
    pub id: i64,
    pub name: String,
}

/// Metrics collected for an application over the report window.
///
/// Every field stays zero until the stage that owns it succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub number_of_calls: i64,
    pub number_of_errors: i64,
    pub calls_per_minute: f64,
    pub errors_per_minute: f64,
    pub average_response_time: f64,
    pub active_health_rules: u32,
    pub inactive_health_rules: u32,
}

/// The part of [`Metrics`] delivered by the bulk summary-stats call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SummaryStats {
    pub number_of_calls: i64,
    pub number_of_errors: i64,
    pub calls_per_minute: f64,
    pub errors_per_minute: f64,
    pub average_response_time: f64,
}

/// An alerting rule attached to an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthRule {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

/// One application's merged identity, metrics and health rules.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationRecord {
    pub identity: ApplicationIdentity,
    pub metrics: Metrics,
    /// Rules in controller response order.
    pub health_rules: Vec<HealthRule>,
}

impl ApplicationRecord {
    pub fn new(identity: ApplicationIdentity) -> Self {
        Self {
            identity,
            metrics: Metrics::default(),
            health_rules: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }
}
