//! reqwest-backed access to the catalog, job and ledger endpoints.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use shopfloor_allocation::{
    CatalogSource, ConsumeMaterial, FetchError, JobDirectory, LedgerError, MaterialLedger,
};
use shopfloor_catalog::{CatalogSnapshot, InventoryItem, JobStatus, JobSummary, PageInfo};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// List responses come either as a bare array or as a page envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Page {
        data: Vec<T>,
        #[serde(default)]
        page: Option<u32>,
        #[serde(default)]
        limit: Option<u32>,
        #[serde(default)]
        total: Option<u64>,
    },
}

impl<T> Listing<T> {
    fn into_parts(self) -> (Vec<T>, Option<u32>, Option<u32>, Option<u64>) {
        match self {
            Listing::Bare(data) => (data, None, None, None),
            Listing::Page {
                data,
                page,
                limit,
                total,
            } => (data, page, limit, total),
        }
    }
}

/// HTTP client for the shop-floor API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    page: u32,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(Self {
            config,
            http,
            page: 1,
        })
    }

    /// Catalog page requested by [`CatalogSource::fetch_materials`] (1-based).
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Base URL extended with `segments`, each percent-encoded as one segment.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.config.api_url)
            .map_err(|e| ClientError::Config(format!("{}: {e}", self.config.api_url)))?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Config(format!("{} cannot be a base URL", self.config.api_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Check connectivity by hitting the health endpoint.
    pub async fn check_connectivity(&self) -> bool {
        let Ok(url) = self.url(&["health"]) else {
            return false;
        };
        let req = self.authorize(self.http.get(url));
        matches!(req.send().await, Ok(resp) if resp.status().is_success())
    }

    /// Fetch one page of materials and index it as a snapshot.
    pub async fn list_materials(&self, page: u32) -> Result<CatalogSnapshot, ClientError> {
        let limit = self.config.page_size;
        let req = self
            .http
            .get(self.url(&["materials"])?)
            .query(&[("page", page), ("limit", limit)]);

        let listing: Listing<InventoryItem> = self.fetch_json(req).await?;
        let (items, got_page, got_limit, total) = listing.into_parts();
        debug!(count = items.len(), page, "fetched catalog page");

        let snapshot = CatalogSnapshot::new(items, Utc::now())
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        Ok(snapshot.with_page(PageInfo {
            page: got_page.unwrap_or(page),
            limit: got_limit.unwrap_or(limit),
            total,
        }))
    }

    /// List jobs whose status is one of `statuses` (all jobs when empty).
    pub async fn list_jobs_with_status(
        &self,
        statuses: &[JobStatus],
    ) -> Result<Vec<JobSummary>, ClientError> {
        let mut req = self.http.get(self.url(&["jobs"])?);
        if !statuses.is_empty() {
            let joined = statuses
                .iter()
                .map(JobStatus::as_str)
                .collect::<Vec<_>>()
                .join(",");
            req = req.query(&[("status", joined)]);
        }

        let listing: Listing<JobSummary> = self.fetch_json(req).await?;
        let (jobs, ..) = listing.into_parts();
        debug!(count = jobs.len(), "fetched jobs");
        Ok(jobs)
    }

    /// Post a single "consume material" request. Never retried.
    pub async fn consume_material(&self, request: &ConsumeMaterial) -> Result<(), ClientError> {
        let url = self.url(&["jobs", request.job_id.as_str(), "materials"])?;
        let req = self.http.post(url).json(request);

        let resp = self.authorize(req).send().await?;
        check_status(resp).await.map(|_| ())
    }

    async fn fetch_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let resp = self.authorize(req).send().await?;
        let resp = check_status(resp).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}

async fn check_status(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    warn!(status = status.as_u16(), %message, "API request rejected");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Human-readable message for an error response.
///
/// JSON bodies surface `message` (then `error`); anything else is returned
/// verbatim, and an empty body falls back to the status line.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                if !text.trim().is_empty() {
                    return text.to_string();
                }
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl CatalogSource for ApiClient {
    async fn fetch_materials(&self) -> Result<CatalogSnapshot, FetchError> {
        Ok(self.list_materials(self.page).await?)
    }
}

#[async_trait]
impl JobDirectory for ApiClient {
    async fn list_jobs(&self, statuses: &[JobStatus]) -> Result<Vec<JobSummary>, FetchError> {
        Ok(self.list_jobs_with_status(statuses).await?)
    }
}

#[async_trait]
impl MaterialLedger for ApiClient {
    async fn consume(&self, request: &ConsumeMaterial) -> Result<(), LedgerError> {
        Ok(self.consume_material(request).await?)
    }
}
