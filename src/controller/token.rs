//! OAuth2 client-credentials token exchange.

use std::fmt;
use url::form_urlencoded;

use super::decode::{parse_body, Record};
use super::{transport, ControllerClient, ControllerError, Stage};

const TOKEN_PATH: &str = "/api/oauth/access_token";
const TOKEN_CONTENT_TYPE: &str = "application/vnd.appd.cntrl+protobuf;v=1";

/// Bearer token for the REST endpoints. Valid for a few minutes.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    /// Set when the token is shorter than expected; the controller may
    /// have changed its token format.
    pub suspect: bool,
}

impl AccessToken {
    pub fn new(value: String, min_length: usize) -> Self {
        let suspect = value.len() < min_length;
        Self { value, suspect }
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("len", &self.value.len())
            .field("suspect", &self.suspect)
            .finish()
    }
}

impl ControllerClient {
    /// Exchange API client credentials for a temporary access token.
    ///
    /// Tokens shorter than `min_length` are returned but flagged as suspect.
    pub async fn access_token(
        &self,
        client: &str,
        account: &str,
        secret: &str,
        min_length: usize,
    ) -> Result<AccessToken, ControllerError> {
        let url = self.url(TOKEN_PATH);
        let body = grant_body(client, account, secret);

        let response = self
            .http
            .post(&url)
            .header("Content-Type", TOKEN_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| ControllerError::AuthHttp {
                stage: Stage::Token,
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            tracing::error!("Got HTTP {} while waiting for access token from {}", status, self.base_url);
            return Err(ControllerError::AuthHttp {
                stage: Stage::Token,
                status: Some(status),
                detail: format!("HTTP {}", status),
            });
        }

        let body = response.text().await.map_err(transport(Stage::Token))?;
        let json = parse_body(Stage::Token, &body)?;
        let record = Record::new(Stage::Token, "$".to_string(), &json)?;
        let token = AccessToken::new(record.str("access_token")?.to_string(), min_length);

        if token.suspect {
            tracing::warn!(
                "Got a short access token from {} (expected at least {} chars, got {})",
                self.base_url,
                min_length,
                token.len()
            );
        } else {
            tracing::info!("Validated access token (length: {})", token.len());
        }

        Ok(token)
    }
}

/// Client-credentials grant, form-encoded so secrets may contain `&`,
/// `=` or `+`.
fn grant_body(client: &str, account: &str, secret: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "client_credentials")
        .append_pair("client_id", &format!("{}@{}", client, account))
        .append_pair("client_secret", secret)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::REQUEST_TIMEOUT;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[test]
    fn test_suspect_threshold() {
        assert!(AccessToken::new("short".to_string(), 100).suspect);
        assert!(!AccessToken::new("x".repeat(100), 100).suspect);
        assert_eq!(AccessToken::new("abc".to_string(), 1).bearer(), "Bearer abc");
    }

    #[test]
    fn test_grant_body_is_form_encoded() {
        assert_eq!(
            grant_body("reporter", "customer1", "a&b=c+d e"),
            "grant_type=client_credentials&client_id=reporter%40customer1&client_secret=a%26b%3Dc%2Bd+e"
        );
    }

    #[test]
    fn test_debug_hides_value() {
        let token = AccessToken::new("very-secret".to_string(), 1);
        assert!(!format!("{:?}", token).contains("very-secret"));
    }

    #[tokio::test]
    async fn test_token_exchange() {
        let server = MockServer::start_async().await;
        let long_token = "t".repeat(600);
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/oauth/access_token")
                    .header("Content-Type", TOKEN_CONTENT_TYPE)
                    .body("grant_type=client_credentials&client_id=reporter%40customer1&client_secret=s3cr3t");
                then.status(200)
                    .json_body(json!({"access_token": long_token, "expires_in": 300}));
            })
            .await;

        let client = ControllerClient::new(&server.base_url(), REQUEST_TIMEOUT).unwrap();
        let token = client
            .access_token("reporter", "customer1", "s3cr3t", 100)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(token.len(), 600);
        assert!(!token.suspect);
    }

    #[tokio::test]
    async fn test_short_token_is_accepted_but_suspect() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/oauth/access_token");
                then.status(200).json_body(json!({"access_token": "abc"}));
            })
            .await;

        let client = ControllerClient::new(&server.base_url(), REQUEST_TIMEOUT).unwrap();
        let token = client.access_token("c", "a", "s", 100).await.unwrap();
        assert_eq!(token.bearer(), "Bearer abc");
        assert!(token.suspect);
    }

    #[tokio::test]
    async fn test_token_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/oauth/access_token");
                then.status(401).body("bad client");
            })
            .await;

        let client = ControllerClient::new(&server.base_url(), REQUEST_TIMEOUT).unwrap();
        let err = client.access_token("c", "a", "s", 100).await.unwrap_err();
        assert!(matches!(err, ControllerError::AuthHttp { stage: Stage::Token, status: Some(401), .. }));
    }

    #[tokio::test]
    async fn test_token_missing_field() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/oauth/access_token");
                then.status(200).json_body(json!({"token": "abc"}));
            })
            .await;

        let client = ControllerClient::new(&server.base_url(), REQUEST_TIMEOUT).unwrap();
        let err = client.access_token("c", "a", "s", 100).await.unwrap_err();
        match err {
            ControllerError::Parse { field, .. } => assert_eq!(field, "$.access_token"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
