//! Catalog read models (point-in-time, read-only).
//!
//! The catalog and job services own this data; this crate only describes the
//! shapes fetched from them and an id-indexed snapshot for lookups. No IO.

pub mod item;
pub mod job;
pub mod snapshot;

pub use item::InventoryItem;
pub use job::{CustomerRef, JobStatus, JobSummary};
pub use snapshot::{CatalogSnapshot, PageInfo};
