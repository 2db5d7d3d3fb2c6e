use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    /// Omitted when the server runs without a token.
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid server URL")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.map(str::to_string),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("failed to build API URL")
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let req = match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        let response = req.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        serde_json::from_str(&body).with_context(|| format!("unexpected response body: {body}"))
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.url("/v1/health")?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn start_import(&self, req: StartImportRequest) -> Result<ImportJobResponse> {
        let url = self.url("/v1/imports")?;
        self.send_json(self.http.post(url).json(&req)).await
    }

    pub async fn get_import(&self, job_id: &str) -> Result<ImportJobResponse> {
        let url = self.url(&format!("/v1/imports/{job_id}"))?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn list_imports(&self, limit: Option<u32>) -> Result<Vec<ImportJobResponse>> {
        let mut url = self.url("/v1/imports")?;
        if let Some(limit) = limit {
            url.query_pairs_mut()
                .append_pair("limit", &limit.to_string());
        }
        self.send_json(self.http.get(url)).await
    }

    pub async fn list_franchises(
        &self,
        page: Option<u32>,
        per_page: Option<u32>,
        sort: Option<&str>,
    ) -> Result<FranchisePageResponse> {
        let mut url = self.url("/v1/franchises")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(page) = page {
                query.append_pair("page", &page.to_string());
            }
            if let Some(per_page) = per_page {
                query.append_pair("per_page", &per_page.to_string());
            }
            if let Some(sort) = sort {
                query.append_pair("sort", sort);
            }
        }
        self.send_json(self.http.get(url)).await
    }

    pub async fn search_franchises(
        &self,
        query: &str,
        sort: Option<&str>,
        limit: Option<u32>,
    ) -> Result<SearchResponse> {
        let mut url = self.url("/v1/franchises/search")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", query);
            if let Some(sort) = sort {
                pairs.append_pair("sort", sort);
            }
            if let Some(limit) = limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        self.send_json(self.http.get(url)).await
    }

    pub async fn franchise_metrics(&self) -> Result<FranchiseMetricsResponse> {
        let url = self.url("/v1/franchises/metrics")?;
        self.send_json(self.http.get(url)).await
    }

    /// `None` when the server could not reach the directory.
    pub async fn lookup(&self, fid: &str, oid: &str) -> Result<Option<LookupResponse>> {
        let mut url = self.url("/v1/lookup/")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("server URL cannot be a base"))?
            .pop_if_empty()
            .push(fid)
            .push(oid);
        self.send_json(self.http.get(url)).await
    }
}

// =============================================================================
// Request/response types (mirrored from server handlers)
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Default, Serialize)]
pub struct StartImportRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
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

impl ImportJobResponse {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutletResponse {
    pub id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub maps_url: Option<String>,
    pub valid_until: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FranchiseResponse {
    pub fid: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
    pub company_address: Option<String>,
    pub outlet_count: i64,
    pub active_outlet_count: i64,
    #[serde(default)]
    pub outlets: Vec<OutletResponse>,
    pub import_index: i64,
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct FranchisePageResponse {
    pub page: u32,
    pub per_page: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub sort: String,
    pub records: Vec<FranchiseResponse>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub records: Vec<FranchiseResponse>,
}

#[derive(Debug, Deserialize)]
pub struct FranchiseMetricsResponse {
    pub total_franchises: u64,
    pub total_outlets: u64,
    pub total_active_outlets: u64,
}

#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    pub franchise_name: Option<String>,
    pub outlet_name: Option<String>,
    pub found: bool,
}
