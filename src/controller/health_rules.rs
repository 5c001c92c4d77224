//! Per-application health-rule enumeration.

use std::collections::HashMap;

use super::decode::{array, Record};
use super::{AccessToken, ControllerClient, ControllerError, Stage};
use crate::config::HealthRuleFailure;
use crate::model::{ApplicationIdentity, HealthRule};

/// Health rules gathered for a controller, keyed by application id.
#[derive(Debug, Default)]
pub struct HealthRuleResults {
    pub rules: HashMap<i64, Vec<HealthRule>>,
    /// Applications skipped under [`HealthRuleFailure::Isolate`].
    pub failures: Vec<(ApplicationIdentity, ControllerError)>,
}

impl ControllerClient {
    /// Fetch the health rules of a single application.
    pub async fn fetch_application_health_rules(
        &self,
        token: &AccessToken,
        app_id: i64,
    ) -> Result<Vec<HealthRule>, ControllerError> {
        let url = self.url(&format!("/controller/alerting/rest/v1/applications/{}/health-rules", app_id));
        let request = self.http.get(&url).header("Authorization", token.bearer());
        let json = self.send_json(Stage::HealthRules, &url, request).await?;
        decode_health_rules(&json)
    }

    /// Fetch health rules for every application, one request at a time in
    /// inventory order.
    ///
    /// With [`HealthRuleFailure::AbortStage`] the first failure discards
    /// everything gathered so far and is returned as the error.
    pub async fn fetch_health_rules(
        &self,
        token: &AccessToken,
        identities: &[ApplicationIdentity],
        policy: HealthRuleFailure,
    ) -> Result<HealthRuleResults, ControllerError> {
        let mut results = HealthRuleResults::default();

        for app in identities {
            match self.fetch_application_health_rules(token, app.id).await {
                Ok(rules) => {
                    tracing::debug!("{}: {} health rules", app.name, rules.len());
                    results.rules.insert(app.id, rules);
                }
                Err(e) => match policy {
                    HealthRuleFailure::AbortStage => {
                        tracing::error!("Health rules for {} (id {}) failed, aborting stage: {}", app.name, app.id, e);
                        return Err(e);
                    }
                    HealthRuleFailure::Isolate => {
                        tracing::warn!("Health rules for {} (id {}) failed, skipping: {}", app.name, app.id, e);
                        results.failures.push((app.clone(), e));
                    }
                },
            }
        }

        Ok(results)
    }
}

fn decode_health_rules(json: &serde_json::Value) -> Result<Vec<HealthRule>, ControllerError> {
    array(Stage::HealthRules, "$", json)?
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let record = Record::new(Stage::HealthRules, format!("[{}]", i), item)?;
            Ok(HealthRule {
                id: record.id("id")?,
                name: record.str("name")?.to_string(),
                active: record.bool("enabled")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::REQUEST_TIMEOUT;
    use httpmock::{Method::GET, Mock, MockServer};
    use serde_json::json;

    fn apps() -> Vec<ApplicationIdentity> {
        (1..=3)
            .map(|id| ApplicationIdentity {
                id,
                name: format!("app-{}", id),
            })
            .collect()
    }

    fn rules_path(id: i64) -> String {
        format!("/controller/alerting/rest/v1/applications/{}/health-rules", id)
    }

    #[test]
    fn test_decode_rules() {
        let json = json!([
            {"id": 10, "name": "CPU", "enabled": true, "affectedEntityType": "TIER"},
            {"id": 11, "name": "Errors", "enabled": false},
        ]);
        let rules = decode_health_rules(&json).unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules[0].active);
        assert_eq!(rules[1].name, "Errors");
        assert!(!rules[1].active);
    }

    #[test]
    fn test_decode_rule_with_bad_enabled() {
        let err = decode_health_rules(&json!([{"id": 1, "name": "x", "enabled": "yes"}])).unwrap_err();
        match err {
            ControllerError::Parse { field, .. } => assert_eq!(field, "[0].enabled"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    /// App 2 fails; returns the mock serving app 3.
    async fn mock_failing_second_app(server: &MockServer) -> Mock<'_> {
        server
            .mock_async(|when, then| {
                when.method(GET).path(rules_path(1));
                then.status(200).json_body(json!([{"id": 1, "name": "r1", "enabled": true}]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(rules_path(2));
                then.status(500);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(rules_path(3));
                then.status(200).json_body(json!([{"id": 3, "name": "r3", "enabled": false}]));
            })
            .await
    }

    #[tokio::test]
    async fn test_abort_stage_on_first_failure() {
        let server = MockServer::start_async().await;
        let third = mock_failing_second_app(&server).await;
        let client = ControllerClient::new(&server.base_url(), REQUEST_TIMEOUT).unwrap();
        let token = AccessToken::new("tok".to_string(), 0);

        let err = client
            .fetch_health_rules(&token, &apps(), HealthRuleFailure::AbortStage)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(third.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_isolate_keeps_other_applications() {
        let server = MockServer::start_async().await;
        let third = mock_failing_second_app(&server).await;
        let client = ControllerClient::new(&server.base_url(), REQUEST_TIMEOUT).unwrap();
        let token = AccessToken::new("tok".to_string(), 0);

        let results = client
            .fetch_health_rules(&token, &apps(), HealthRuleFailure::Isolate)
            .await
            .unwrap();
        third.assert_async().await;
        assert_eq!(results.rules.len(), 2);
        assert_eq!(results.rules[&1][0].name, "r1");
        assert_eq!(results.rules[&3][0].name, "r3");
        assert_eq!(results.failures.len(), 1);
        assert_eq!(results.failures[0].0.id, 2);
    }

    #[tokio::test]
    async fn test_rejected_token_is_credential_expired() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(rules_path(1));
                then.status(401);
            })
            .await;

        let client = ControllerClient::new(&server.base_url(), REQUEST_TIMEOUT).unwrap();
        let token = AccessToken::new("stale".to_string(), 0);
        let err = client.fetch_application_health_rules(&token, 1).await.unwrap_err();
        assert!(matches!(err, ControllerError::CredentialExpired { stage: Stage::HealthRules }));
    }
}
