//! Async ports to the external services.
//!
//! Implemented over HTTP by `shopfloor-client`; tests use in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use shopfloor_catalog::{CatalogSnapshot, JobStatus, JobSummary};
use shopfloor_core::{DomainError, JobId, MaterialId};

/// "Consume material for job" request, one per draft line.
///
/// Serializes to the ledger body `{materialId, quantityNeeded, unitCost, notes}`;
/// the job id travels in the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeMaterial {
    #[serde(skip)]
    pub job_id: JobId,
    pub material_id: MaterialId,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity_needed: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_cost: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Failure of a single ledger request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger refused the request; the message is its payload, verbatim.
    #[error("{0}")]
    Rejected(String),

    /// The request did not get an answer (connect error, timeout, 502-504 gateway).
    #[error("network error: {0}")]
    Unavailable(String),
}

/// Failure fetching catalog or job data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid data: {0}")]
    Invalid(String),
}

impl From<DomainError> for FetchError {
    fn from(err: DomainError) -> Self {
        Self::Invalid(err.to_string())
    }
}

/// Source of catalog snapshots (`GET materials`).
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_materials(&self) -> Result<CatalogSnapshot, FetchError>;
}

/// Job listing for the target-job picker (`GET jobs?status=...`).
#[async_trait]
pub trait JobDirectory: Send + Sync {
    async fn list_jobs(&self, statuses: &[JobStatus]) -> Result<Vec<JobSummary>, FetchError>;
}

/// The job-material ledger (`POST jobs/{jobId}/materials`).
///
/// Implementations must not retry on their own; each call is one attempt.
#[async_trait]
pub trait MaterialLedger: Send + Sync {
    async fn consume(&self, request: &ConsumeMaterial) -> Result<(), LedgerError>;
}

/// Active jobs that can still receive materials.
pub async fn fetch_open_jobs<D>(directory: &D) -> Result<Vec<JobSummary>, FetchError>
where
    D: JobDirectory + ?Sized,
{
    let jobs = directory.list_jobs(&JobStatus::ACTIVE).await?;
    Ok(JobSummary::retain_open(jobs))
}

macro_rules! forward_ports {
    ($($wrapper:ty),* $(,)?) => {$(
        #[async_trait]
        impl<T: CatalogSource + ?Sized> CatalogSource for $wrapper {
            async fn fetch_materials(&self) -> Result<CatalogSnapshot, FetchError> {
                (**self).fetch_materials().await
            }
        }

        #[async_trait]
        impl<T: JobDirectory + ?Sized> JobDirectory for $wrapper {
            async fn list_jobs(
                &self,
                statuses: &[JobStatus],
            ) -> Result<Vec<JobSummary>, FetchError> {
                (**self).list_jobs(statuses).await
            }
        }

        #[async_trait]
        impl<T: MaterialLedger + ?Sized> MaterialLedger for $wrapper {
            async fn consume(&self, request: &ConsumeMaterial) -> Result<(), LedgerError> {
                (**self).consume(request).await
            }
        }
    )*};
}

forward_ports!(Arc<T>, &T);
