//! Single outlet lookup, passed through to the directory.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct LookupResponse {
    pub franchise_name: Option<String>,
    pub outlet_name: Option<String>,
    pub found: bool,
}

/// GET /v1/lookup/{fid}/{oid} - Ask the directory about one outlet.
///
/// The body is `null` when the directory could not be reached; a 404 from the
/// directory is reported as `found: false`.
pub async fn lookup_outlet(
    State(state): State<AppState>,
    Path((fid, oid)): Path<(String, String)>,
    req: Request,
) -> ApiResult<Json<Option<LookupResponse>>> {
    require_auth(&req)?;

    let (fid, oid) = (fid.trim(), oid.trim());
    if fid.is_empty() || oid.is_empty() {
        return Err(ApiError::BadRequest(
            "franchise and outlet ids are required".to_string(),
        ));
    }

    let lookup = state.directory.fetch_outlet(fid, oid).await;
    if lookup.is_none() {
        tracing::warn!(fid, oid, "Outlet lookup unavailable");
    }

    Ok(Json(lookup.map(|l| LookupResponse {
        franchise_name: l.franchise_name,
        outlet_name: l.outlet_name,
        found: l.found,
    })))
}
