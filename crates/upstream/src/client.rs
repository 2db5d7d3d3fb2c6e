//! HTTP implementation of the directory API.

use crate::error::{UpstreamError, UpstreamResult};
use crate::payload::{parse_franchise_page, parse_outlet_lookup};
use crate::token::{HttpAuthenticator, TokenCache};
use crate::{DirectoryApi, FranchisePage, OutletLookup, PageOutcome};
use async_trait::async_trait;
use dircache_core::config::DirectoryConfig;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use time::Duration;

/// Directory client backed by reqwest.
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: Url,
    franchises_path: String,
    outlet_path: String,
    tokens: Arc<TokenCache>,
}

impl DirectoryClient {
    /// Build a client that authenticates with the configured credentials.
    pub fn new(config: &DirectoryConfig) -> UpstreamResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let base_url = parse_base_url(&config.base_url)?;

        let authenticator = HttpAuthenticator::new(
            http.clone(),
            endpoint(&base_url, &config.auth_path, &[])?,
            config.username.clone(),
            config.password.clone(),
            Duration::seconds(i64::try_from(config.default_token_ttl_secs).unwrap_or(i64::MAX)),
        );
        let tokens = TokenCache::new(
            Arc::new(authenticator),
            Duration::seconds(i64::try_from(config.token_drift_secs).unwrap_or(0)),
        );

        Ok(Self::with_tokens(http, base_url, config, Arc::new(tokens)))
    }

    /// Build a client around an existing token cache.
    pub fn with_tokens(
        http: reqwest::Client,
        base_url: Url,
        config: &DirectoryConfig,
        tokens: Arc<TokenCache>,
    ) -> Self {
        Self {
            http,
            base_url,
            franchises_path: config.franchises_path.clone(),
            outlet_path: config.outlet_path.clone(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Send a request with the current token, re-authenticating and retrying once
    /// if the directory rejects it.
    async fn send_authorized<F>(&self, build: F) -> UpstreamResult<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut retried = false;
        loop {
            let token = self.tokens.get_token().await.ok_or(UpstreamError::NoToken)?;
            let response = build()
                .bearer_auth(&token.value)
                .query(&[("token", token.value.as_str())])
                .send()
                .await?;

            let status = response.status();
            if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
                return Ok(response);
            }

            self.tokens.invalidate_if(&token.value).await;
            if retried {
                return Err(UpstreamError::Unauthorized(status.as_u16()));
            }
            tracing::debug!(status = status.as_u16(), "Directory rejected token, retrying");
            retried = true;
        }
    }

    async fn try_fetch_page(&self, page: u32, page_size: u32) -> UpstreamResult<FranchisePage> {
        let url = endpoint(&self.base_url, &self.franchises_path, &[])?;
        let page_param = page.to_string();
        let size_param = page_size.to_string();

        let response = self
            .send_authorized(|| {
                self.http.get(url.clone()).query(&[
                    ("page", page_param.as_str()),
                    ("per_page", size_param.as_str()),
                ])
            })
            .await?;

        let response = error_for_status(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        let payload = parse_franchise_page(&body);

        Ok(FranchisePage {
            rows: payload.rows,
            total_count: payload.total_count,
            total_pages: payload.total_pages,
            outcome: PageOutcome::Fetched,
        })
    }

    async fn try_fetch_outlet(&self, fid: &str, oid: &str) -> UpstreamResult<OutletLookup> {
        let url = endpoint(
            &self.base_url,
            &self.outlet_path,
            &[("fid", fid), ("oid", oid)],
        )?;

        let response = self
            .send_authorized(|| self.http.get(url.clone()))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(OutletLookup::not_found());
        }

        let response = error_for_status(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(parse_outlet_lookup(&body))
    }
}

#[async_trait]
impl DirectoryApi for DirectoryClient {
    async fn fetch_page(&self, page: u32, page_size: u32) -> FranchisePage {
        match self.try_fetch_page(page, page_size).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(page, page_size, error = %e, "Directory page unavailable");
                FranchisePage::unavailable()
            }
        }
    }

    async fn fetch_outlet(&self, fid: &str, oid: &str) -> Option<OutletLookup> {
        match self.try_fetch_outlet(fid, oid).await {
            Ok(lookup) => Some(lookup),
            Err(e) => {
                tracing::warn!(fid, oid, error = %e, "Directory outlet lookup unavailable");
                None
            }
        }
    }
}

fn parse_base_url(raw: &str) -> UpstreamResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| UpstreamError::Config(format!("invalid directory base_url '{raw}': {e}")))?;
    if url.cannot_be_a_base() {
        return Err(UpstreamError::Config(format!(
            "directory base_url '{raw}' cannot carry a path"
        )));
    }
    Ok(url)
}

/// Append a path template to the base URL.
///
/// `{name}` placeholders are replaced by the matching parameter; every segment is
/// percent-encoded, so identifiers cannot escape their segment.
fn endpoint(base: &Url, template: &str, params: &[(&str, &str)]) -> UpstreamResult<Url> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| UpstreamError::Config("directory base_url cannot carry a path".into()))?;
        segments.pop_if_empty();
        for raw in template.split('/').filter(|s| !s.is_empty()) {
            let segment = params.iter().fold(raw.to_string(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            });
            segments.push(&segment);
        }
    }
    Ok(url)
}

async fn error_for_status(response: Response) -> UpstreamResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path_and_encodes_params() {
        let base = Url::parse("https://dir.example.com/api/v2/").unwrap();
        let url = endpoint(
            &base,
            "/franchises/{fid}/outlets/{oid}",
            &[("fid", "F 1/2"), ("oid", "O-9")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://dir.example.com/api/v2/franchises/F%201%2F2/outlets/O-9"
        );
    }

    #[test]
    fn endpoint_on_bare_host() {
        let base = Url::parse("http://127.0.0.1:8080").unwrap();
        let url = endpoint(&base, "/auth/login", &[]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/auth/login");
    }

    #[test]
    fn base_url_must_carry_a_path() {
        assert!(parse_base_url("mailto:someone@example.com").is_err());
        assert!(parse_base_url("not a url").is_err());
    }
}
