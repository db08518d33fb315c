//! `shopfloor-client`
//!
//! **Responsibility:** HTTP access to the catalog, job and job-material
//! ledger services.
//!
//! [`ApiClient`] implements the allocation ports (`CatalogSource`,
//! `JobDirectory`, `MaterialLedger`). The services remain the authority; this
//! client never retries a ledger request and never caches responses.

pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::ApiClient;
