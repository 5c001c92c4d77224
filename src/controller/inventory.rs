//! Application inventory.

use super::decode::{array, Record};
use super::{AccessToken, ControllerClient, ControllerError, Stage};
use crate::model::ApplicationIdentity;

const APPLICATIONS_PATH: &str = "/controller/rest/applications?output=json";

impl ControllerClient {
    /// List every application known to the controller.
    ///
    /// Any element without a string `name` and an integral `id` fails the
    /// whole call; later joins rely on every identity being present.
    pub async fn list_applications(&self, token: &AccessToken) -> Result<Vec<ApplicationIdentity>, ControllerError> {
        let url = self.url(APPLICATIONS_PATH);
        let request = self.http.get(&url).header("Authorization", token.bearer());
        let json = self.send_json(Stage::Inventory, &url, request).await?;

        let apps = decode_applications(&json)?;
        tracing::info!("Found {} applications", apps.len());
        Ok(apps)
    }
}

fn decode_applications(json: &serde_json::Value) -> Result<Vec<ApplicationIdentity>, ControllerError> {
    array(Stage::Inventory, "$", json)?
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let record = Record::new(Stage::Inventory, format!("[{}]", i), item)?;
            Ok(ApplicationIdentity {
                id: record.id("id")?,
                name: record.str("name")?.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::REQUEST_TIMEOUT;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    #[test]
    fn test_decode_preserves_order() {
        let json = json!([
            {"name": "checkout", "id": 12, "description": ""},
            {"name": "catalog", "id": 7.0},
        ]);
        let apps = decode_applications(&json).unwrap();
        assert_eq!(
            apps,
            vec![
                ApplicationIdentity { id: 12, name: "checkout".to_string() },
                ApplicationIdentity { id: 7, name: "catalog".to_string() },
            ]
        );
    }

    #[test]
    fn test_malformed_element_fails_whole_call() {
        let json = json!([
            {"name": "checkout", "id": 12},
            {"name": 5, "id": 13},
        ]);
        match decode_applications(&json) {
            Err(ControllerError::Parse { stage, field, .. }) => {
                assert_eq!(stage, Stage::Inventory);
                assert_eq!(field, "[1].name");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_not_an_array() {
        assert!(decode_applications(&json!({"applications": []})).unwrap_err().is_parse());
    }

    #[tokio::test]
    async fn test_list_applications_sends_bearer() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/controller/rest/applications")
                    .query_param("output", "json")
                    .header("Authorization", "Bearer tok");
                then.status(200).json_body(json!([{"name": "A", "id": 1}]));
            })
            .await;

        let client = ControllerClient::new(&server.base_url(), REQUEST_TIMEOUT).unwrap();
        let token = AccessToken::new("tok".to_string(), 0);
        let apps = client.list_applications(&token).await.unwrap();

        mock.assert_async().await;
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "A");
    }

    #[tokio::test]
    async fn test_list_applications_http_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/controller/rest/applications");
                then.status(500).body("boom");
            })
            .await;

        let client = ControllerClient::new(&server.base_url(), REQUEST_TIMEOUT).unwrap();
        let token = AccessToken::new("tok".to_string(), 0);
        let err = client.list_applications(&token).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_parse());
    }
}
