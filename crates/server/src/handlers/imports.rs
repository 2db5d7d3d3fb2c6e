//! Refresh (import job) endpoints.

use crate::auth::{get_trace_id, require_auth};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use dircache_core::ImportTrigger;
use dircache_metadata::models::ImportJobRow;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Start requests carry at most a trigger and a name.
const MAX_START_BODY_SIZE: usize = 16 * 1024;

const DEFAULT_JOB_LIST_LIMIT: u32 = 20;
const MAX_JOB_LIST_LIMIT: u32 = 100;

/// Body of `POST /v1/imports`. Every field is optional; an empty body is accepted.
#[derive(Debug, Default, Deserialize)]
pub struct StartImportRequest {
    pub trigger: Option<String>,
    pub requested_by: Option<String>,
}

/// Import job as returned by the API.
#[derive(Debug, Serialize)]
pub struct ImportJobResponse {
    pub job_id: String,
    pub status: String,
    pub trigger: String,
    pub requested_by: Option<String>,
    pub processed_count: i64,
    pub total_count: Option<i64>,
    pub pages_fetched: i64,
    pub error_message: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub updated_at: String,
}

fn format_time(t: OffsetDateTime, field: &str) -> ApiResult<String> {
    t.format(&Rfc3339)
        .map_err(|e| ApiError::Internal(format!("failed to format {field}: {e}")))
}

impl TryFrom<ImportJobRow> for ImportJobResponse {
    type Error = ApiError;

    fn try_from(job: ImportJobRow) -> ApiResult<Self> {
        Ok(Self {
            job_id: job.job_id.to_string(),
            started_at: format_time(job.started_at, "started_at")?,
            finished_at: job
                .finished_at
                .map(|t| format_time(t, "finished_at"))
                .transpose()?,
            updated_at: format_time(job.updated_at, "updated_at")?,
            status: job.status,
            trigger: job.trigger_source,
            requested_by: job.requested_by,
            processed_count: job.processed_count,
            total_count: job.total_count,
            pages_fetched: job.pages_fetched,
            error_message: job.error_message,
        })
    }
}

/// POST /v1/imports - Start a refresh.
///
/// 202 with the new job, or 200 with the job that is already running.
pub async fn start_import(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<ImportJobResponse>)> {
    require_auth(&req)?;
    let trace_id = get_trace_id(&req).cloned().unwrap_or_default();

    let body: StartImportRequest = {
        let bytes = axum::body::to_bytes(req.into_body(), MAX_START_BODY_SIZE)
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            StartImportRequest::default()
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))?
        }
    };

    let trigger = body
        .trigger
        .as_deref()
        .map(ImportTrigger::parse)
        .transpose()?
        .unwrap_or_default();
    let requested_by = body
        .requested_by
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let outcome = state.coordinator.start(trigger, requested_by).await?;
    tracing::info!(
        trace_id = %trace_id,
        job_id = %outcome.job().job_id,
        started = outcome.is_new(),
        "Import start requested"
    );
    let status = if outcome.is_new() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(outcome.into_job().try_into()?)))
}

/// GET /v1/imports/{job_id} - Job status.
pub async fn get_import(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    req: Request,
) -> ApiResult<Json<ImportJobResponse>> {
    require_auth(&req)?;

    let job_id = Uuid::parse_str(&job_id)
        .map_err(|e| ApiError::BadRequest(format!("invalid job ID: {e}")))?;

    let job = state
        .coordinator
        .status(job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("import job {job_id}")))?;

    Ok(Json(job.try_into()?))
}

#[derive(Debug, Deserialize)]
pub struct ListImportsParams {
    pub limit: Option<u32>,
}

/// GET /v1/imports - Recent jobs, newest first.
pub async fn list_imports(
    State(state): State<AppState>,
    Query(params): Query<ListImportsParams>,
    req: Request,
) -> ApiResult<Json<Vec<ImportJobResponse>>> {
    require_auth(&req)?;

    let limit = params
        .limit
        .unwrap_or(DEFAULT_JOB_LIST_LIMIT)
        .clamp(1, MAX_JOB_LIST_LIMIT);
    let jobs = state.coordinator.recent(limit).await?;

    let responses: ApiResult<Vec<ImportJobResponse>> =
        jobs.into_iter().map(ImportJobResponse::try_from).collect();
    Ok(Json(responses?))
}
