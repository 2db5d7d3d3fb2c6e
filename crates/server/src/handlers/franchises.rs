//! Read API over the active generation.

use crate::auth::require_auth;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, Request, State};
use dircache_core::{DEFAULT_PAGE_SIZE, MAX_READ_PAGE_SIZE, OutletRecord, RecordSort};
use dircache_metadata::models::CacheRecordRow;
use serde::{Deserialize, Serialize};

const DEFAULT_SEARCH_LIMIT: u32 = 50;

/// A cached franchise as returned by the API.
#[derive(Debug, Serialize)]
pub struct FranchiseResponse {
    pub fid: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
    pub company_address: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub outlet_count: i64,
    pub active_outlet_count: i64,
    pub outlets: Vec<OutletRecord>,
    pub import_index: i64,
    pub job_id: String,
}

impl TryFrom<CacheRecordRow> for FranchiseResponse {
    type Error = crate::error::ApiError;

    fn try_from(row: CacheRecordRow) -> ApiResult<Self> {
        let outlets = row.outlets()?;
        Ok(Self {
            fid: row.fid,
            name: row.name,
            company: row.company,
            company_address: row.company_address,
            created_at: row.created_at,
            updated_at: row.updated_at,
            outlet_count: row.outlet_count,
            active_outlet_count: row.active_outlet_count,
            outlets,
            import_index: row.import_index,
            job_id: row.job_id.to_string(),
        })
    }
}

fn to_responses(rows: Vec<CacheRecordRow>) -> ApiResult<Vec<FranchiseResponse>> {
    rows.into_iter().map(FranchiseResponse::try_from).collect()
}

fn parse_sort(raw: Option<&str>) -> ApiResult<RecordSort> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Ok(s.parse::<RecordSort>()?),
        None => Ok(RecordSort::default()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListFranchisesParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FranchisePageResponse {
    pub page: u32,
    pub per_page: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub sort: RecordSort,
    pub records: Vec<FranchiseResponse>,
}

/// GET /v1/franchises - One page of the active generation.
pub async fn list_franchises(
    State(state): State<AppState>,
    Query(params): Query<ListFranchisesParams>,
    req: Request,
) -> ApiResult<Json<FranchisePageResponse>> {
    require_auth(&req)?;

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_READ_PAGE_SIZE);
    let sort = parse_sort(params.sort.as_deref())?;

    let result = state
        .metadata
        .list_active_records(page, per_page, sort)
        .await?;

    Ok(Json(FranchisePageResponse {
        page,
        per_page,
        total_count: result.total_count,
        total_pages: result.total_count.div_ceil(u64::from(per_page)),
        sort,
        records: to_responses(result.records)?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SearchFranchisesParams {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub records: Vec<FranchiseResponse>,
}

/// GET /v1/franchises/search - Case-insensitive substring search.
pub async fn search_franchises(
    State(state): State<AppState>,
    Query(params): Query<SearchFranchisesParams>,
    req: Request,
) -> ApiResult<Json<SearchResponse>> {
    require_auth(&req)?;

    let query = params.q.unwrap_or_default().trim().to_string();
    let sort = parse_sort(params.sort.as_deref())?;
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);

    let rows = state
        .metadata
        .search_active_records(&query, sort, limit)
        .await?;
    let records = to_responses(rows)?;

    Ok(Json(SearchResponse {
        query,
        count: records.len(),
        records,
    }))
}

#[derive(Debug, Serialize)]
pub struct FranchiseMetricsResponse {
    pub total_franchises: u64,
    pub total_outlets: u64,
    pub total_active_outlets: u64,
}

/// GET /v1/franchises/metrics - Aggregates over the active generation.
pub async fn franchise_metrics(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<FranchiseMetricsResponse>> {
    require_auth(&req)?;

    let metrics = state.metadata.active_record_metrics().await?;
    Ok(Json(FranchiseMetricsResponse {
        total_franchises: metrics.total_franchises,
        total_outlets: metrics.total_outlets,
        total_active_outlets: metrics.total_active_outlets,
    }))
}
