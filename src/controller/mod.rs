//! Controller REST client.
//!
//! Covers the two authentication flows (session login and OAuth token)
//! and the three data endpoints: application inventory, bulk summary
//! statistics and per-application health rules.

mod decode;
mod health_rules;
mod inventory;
mod session;
mod summary;
mod token;

pub use session::*;
pub use token::*;

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Client-side timeout applied to every controller request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Pipeline stage a controller call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Login,
    Token,
    Inventory,
    SummaryStats,
    HealthRules,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Login => "login",
            Stage::Token => "token",
            Stage::Inventory => "inventory",
            Stage::SummaryStats => "summary-stats",
            Stage::HealthRules => "health-rules",
        };
        f.write_str(name)
    }
}

/// Controller error types.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("{stage} authentication failed: {detail}")]
    AuthHttp {
        stage: Stage,
        status: Option<u16>,
        detail: String,
    },
    #[error("login response did not set the {0} cookie")]
    MissingSessionCookie(&'static str),
    #[error("{stage}: controller returned HTTP {status} for {url}")]
    Http { stage: Stage, status: u16, url: String },
    #[error("{stage}: request failed: {message}")]
    Transport { stage: Stage, message: String },
    #[error("{stage}: malformed response at {field}: {reason}")]
    Parse {
        stage: Stage,
        field: String,
        reason: String,
    },
    #[error("{stage}: credentials expired or were rejected")]
    CredentialExpired { stage: Stage },
}

impl ControllerError {
    /// HTTP status behind the error, if the controller answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthHttp { status, .. } => *status,
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// HTTP client bound to one controller for the duration of a run.
pub struct ControllerClient {
    http: reqwest::Client,
    base_url: String,
}

impl ControllerClient {
    /// Create a client for the controller at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ControllerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ControllerError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a bearer-authenticated request and decode a 200 JSON body.
    ///
    /// A 401 means the token is no longer accepted and is reported as
    /// [`ControllerError::CredentialExpired`].
    async fn send_json(
        &self,
        stage: Stage,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<serde_json::Value, ControllerError> {
        let response = request.send().await.map_err(transport(stage))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport(stage))?;

        if status == 401 {
            tracing::error!("{}: got HTTP 401 while calling {}", stage, url);
            return Err(ControllerError::CredentialExpired { stage });
        }
        if status != 200 {
            tracing::error!("{}: got HTTP {} while calling {}: {}", stage, status, url, body);
            return Err(ControllerError::Http {
                stage,
                status,
                url: url.to_string(),
            });
        }

        decode::parse_body(stage, &body)
    }
}

fn transport(stage: Stage) -> impl FnOnce(reqwest::Error) -> ControllerError {
    move |e| ControllerError::Transport {
        stage,
        message: e.to_string(),
    }
}
