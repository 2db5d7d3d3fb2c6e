//! Bearer token authentication and request tracing middleware.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use tracing::Instrument;
use uuid::Uuid;

/// Request and response header carrying the trace id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Longer client trace ids are truncated.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a client-provided id, keeping only printable ASCII.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Marks a request as allowed to use the protected API.
#[derive(Clone, Debug)]
pub struct AuthenticatedClient {
    /// `false` when no API token is configured and the API is open.
    pub token_checked: bool,
}

/// Extract bearer token from Authorization header. The scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(v[7..].trim())
            } else {
                None
            }
        })
}

fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Hex-encoded SHA-256 of a raw token, the form stored in `api.token_hash`.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Sets up the trace context and checks the bearer token.
///
/// A missing or wrong token does not reject the request here; handlers that need
/// authentication call [`require_auth`]. Health and metrics stay reachable.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let trace_id = extract_or_generate_trace_id(&req);
    let span = tracing::info_span!("request", trace_id = %trace_id);
    req.extensions_mut().insert(trace_id.clone());

    let authenticated = match state.config.api.token_hash.as_deref() {
        None => Some(AuthenticatedClient {
            token_checked: false,
        }),
        Some(expected) => extract_bearer_token(&req)
            .filter(|token| hash_token(token).eq_ignore_ascii_case(expected.trim()))
            .map(|_| AuthenticatedClient {
                token_checked: true,
            }),
    };
    if let Some(client) = authenticated {
        req.extensions_mut().insert(client);
    }

    let mut response = next.run(req).instrument(span).await;
    crate::metrics::record_http_request(response.status());
    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

/// Require an authenticated request.
pub fn require_auth(req: &Request) -> ApiResult<&AuthenticatedClient> {
    req.extensions()
        .get::<AuthenticatedClient>()
        .ok_or_else(|| ApiError::Unauthorized("valid bearer token required".to_string()))
}

/// Get the trace ID from request extensions.
pub fn get_trace_id(req: &Request) -> Option<&TraceId> {
    req.extensions().get::<TraceId>()
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}
