//! Bearer token cache for the directory API.

use crate::error::{UpstreamError, UpstreamResult};
use crate::payload::parse_auth_response;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::{Value, json};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

/// A bearer credential and the instant it stops being accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthToken {
    pub value: String,
    pub expires_at: OffsetDateTime,
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Obtains a fresh token from the directory.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> UpstreamResult<AuthToken>;
}

/// Caches one token and refreshes it lazily.
///
/// A token is reused while `now < expires_at - drift`. Refreshes happen under the
/// cache lock, so concurrent callers wait for one refresh instead of starting their own.
pub struct TokenCache {
    authenticator: Arc<dyn Authenticator>,
    clock: Arc<dyn Clock>,
    drift: Duration,
    current: Mutex<Option<AuthToken>>,
}

impl TokenCache {
    pub fn new(authenticator: Arc<dyn Authenticator>, drift: Duration) -> Self {
        Self::with_clock(authenticator, drift, Arc::new(SystemClock))
    }

    pub fn with_clock(
        authenticator: Arc<dyn Authenticator>,
        drift: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            authenticator,
            clock,
            drift,
            current: Mutex::new(None),
        }
    }

    /// Return a usable token, authenticating if needed.
    ///
    /// `None` means the directory is unavailable for now; the reason is logged.
    pub async fn get_token(&self) -> Option<AuthToken> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            if self.clock.now() < token.expires_at.saturating_sub(self.drift) {
                return Some(token.clone());
            }
            tracing::debug!("Directory token expired or about to expire, refreshing");
        }

        match self.authenticator.authenticate().await {
            Ok(token) => {
                tracing::debug!(expires_at = %token.expires_at, "Obtained directory token");
                *current = Some(token.clone());
                Some(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Directory authentication failed");
                *current = None;
                None
            }
        }
    }

    /// Drop the cached token if it is still `rejected`; the next `get_token`
    /// re-authenticates. A token refreshed by another caller is kept.
    pub async fn invalidate_if(&self, rejected: &str) {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(|token| token.value == rejected) {
            *current = None;
        }
    }
}

/// Authenticates with username and password against the directory's login endpoint.
pub struct HttpAuthenticator {
    http: reqwest::Client,
    url: Url,
    username: Option<String>,
    password: Option<String>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl HttpAuthenticator {
    pub fn new(
        http: reqwest::Client,
        url: Url,
        username: Option<String>,
        password: Option<String>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            http,
            url,
            username,
            password,
            default_ttl,
            clock: Arc::new(SystemClock),
        }
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn authenticate(&self) -> UpstreamResult<AuthToken> {
        let (Some(username), Some(password)) = (
            self.username.as_deref().filter(|u| !u.is_empty()),
            self.password.as_deref().filter(|p| !p.is_empty()),
        ) else {
            return Err(UpstreamError::MissingCredentials);
        };

        let response = self
            .http
            .post(self.url.clone())
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        parse_auth_response(&body, self.clock.now(), self.default_ttl)
            .ok_or_else(|| UpstreamError::Decode("authenticate response has no token".to_string()))
    }
}
