//! Merge of inventory, summary stats and health rules into report records.

use std::collections::{HashMap, HashSet};

use crate::model::{ApplicationIdentity, ApplicationRecord, HealthRule, SummaryStats};

/// Build one record per inventory entry, in inventory order.
///
/// Stats are joined by application name, health rules by id. Missing
/// inputs leave the corresponding fields at zero.
pub fn aggregate(
    identities: &[ApplicationIdentity],
    stats: &HashMap<String, SummaryStats>,
    rules: &HashMap<i64, Vec<HealthRule>>,
) -> Vec<ApplicationRecord> {
    identities
        .iter()
        .map(|identity| {
            let mut record = ApplicationRecord::new(identity.clone());

            if let Some(s) = stats.get(&identity.name) {
                record.metrics.number_of_calls = s.number_of_calls;
                record.metrics.number_of_errors = s.number_of_errors;
                record.metrics.calls_per_minute = s.calls_per_minute;
                record.metrics.errors_per_minute = s.errors_per_minute;
                record.metrics.average_response_time = s.average_response_time;
            }

            if let Some(app_rules) = rules.get(&identity.id) {
                let (active, inactive) = count_rules(app_rules);
                record.metrics.active_health_rules = active;
                record.metrics.inactive_health_rules = inactive;
                record.health_rules = app_rules.clone();
            }

            record
        })
        .collect()
}

/// Count (enabled, disabled) rules.
pub fn count_rules(rules: &[HealthRule]) -> (u32, u32) {
    let active = rules.iter().filter(|r| r.active).count() as u32;
    (active, rules.len() as u32 - active)
}

/// Names that appear more than once in the inventory. The name join
/// would hand each of them the same stats row.
pub fn duplicate_names(identities: &[ApplicationIdentity]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut dups = Vec::new();
    for app in identities {
        if !seen.insert(app.name.as_str()) && !dups.contains(&app.name.as_str()) {
            dups.push(app.name.as_str());
        }
    }
    dups
}
