//! Cookie-based session login.

use std::time::{Duration, Instant};

use super::{ControllerClient, ControllerError, Stage};

/// Session identifier cookie set by the login endpoint.
pub const SESSION_COOKIE: &str = "JSESSIONID";
/// Anti-forgery cookie set by the login endpoint, echoed back as a header.
pub const CSRF_COOKIE: &str = "X-CSRF-TOKEN";
/// How long the controller keeps a login session valid.
pub const SESSION_TTL: Duration = Duration::from_secs(300);

const LOGIN_PATH: &str = "/auth?action=login";

/// A short-lived credential taken from a login response cookie.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub name: String,
    pub value: String,
    pub ttl: Duration,
    obtained_at: Instant,
}

impl SessionCredential {
    pub fn new(name: &str, value: &str, ttl: Duration) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            ttl,
            obtained_at: Instant::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.obtained_at.elapsed() >= self.ttl
    }
}

/// The pair of credentials a successful login yields.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionCredential,
    pub csrf_token: SessionCredential,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.session_id.is_expired() || self.csrf_token.is_expired()
    }

    /// Value for the `Cookie` request header.
    pub fn cookie_header(&self) -> String {
        format!(
            "{}={}; {}={}",
            self.session_id.name, self.session_id.value, self.csrf_token.name, self.csrf_token.value
        )
    }
}

impl ControllerClient {
    /// Log in with an HTTP Basic credential and collect the session cookies.
    ///
    /// `basic_auth` is the already base64-encoded `user@account:password`.
    pub async fn login(&self, basic_auth: &str) -> Result<Session, ControllerError> {
        let url = self.url(LOGIN_PATH);
        tracing::info!("Calling {} for login cookies", url);

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Basic {}", basic_auth))
            .send()
            .await
            .map_err(|e| ControllerError::AuthHttp {
                stage: Stage::Login,
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            tracing::error!("Login to {} failed with HTTP {}", self.base_url, status);
            return Err(ControllerError::AuthHttp {
                stage: Stage::Login,
                status: Some(status),
                detail: format!("HTTP {}", status),
            });
        }

        let mut session_id = None;
        let mut csrf_token = None;
        for cookie in response.cookies() {
            match cookie.name() {
                SESSION_COOKIE => session_id = Some(SessionCredential::new(SESSION_COOKIE, cookie.value(), SESSION_TTL)),
                CSRF_COOKIE => csrf_token = Some(SessionCredential::new(CSRF_COOKIE, cookie.value(), SESSION_TTL)),
                _ => {}
            }
        }

        // drain the body so the connection can be reused
        let _ = response.bytes().await;

        let session = Session {
            session_id: session_id.ok_or(ControllerError::MissingSessionCookie(SESSION_COOKIE))?,
            csrf_token: csrf_token.ok_or(ControllerError::MissingSessionCookie(CSRF_COOKIE))?,
        };

        tracing::info!("Got login cookies for {}", self.base_url);
        Ok(session)
    }
}
