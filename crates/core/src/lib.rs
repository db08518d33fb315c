//! `shopfloor-core`: shared building blocks for the shop-floor CRM client.
//!
//! This crate contains **pure** primitives (identifiers, errors, value objects)
//! with no I/O and no async runtime.

pub mod error;
pub mod id;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{BatchId, JobId, MaterialId};
pub use value_object::ValueObject;
