//! Inventory-to-job material allocation.
//!
//! Flow: catalog snapshot → [`SelectionSet`] → [`AllocationDraft`] (validated
//! per line by [`validate`]) → [`BatchSubmitter`] → [`BatchResult`].
//!
//! Everything up to the submitter is synchronous and pure. The submitter is
//! the only component doing IO, through the [`MaterialLedger`] port; catalog
//! refreshes go through [`CatalogSource`]. [`AllocationWorkflow`] ties the
//! pieces into an explicit, serializable state machine.

pub mod draft;
pub mod error;
pub mod outcome;
pub mod ports;
pub mod selection;
pub mod submitter;
pub mod validator;
pub mod workflow;

pub use draft::{AllocationDraft, AllocationLine};
pub use error::AllocationError;
pub use outcome::{AllocationOutcome, BatchOutcome, BatchResult, FailedLine};
pub use ports::{
    CatalogSource, ConsumeMaterial, FetchError, JobDirectory, LedgerError, MaterialLedger,
    fetch_open_jobs,
};
pub use selection::SelectionSet;
pub use submitter::{BatchSubmitter, SubmissionPlan};
pub use validator::{LineIssue, validate};
pub use workflow::{AllocationPhase, AllocationWorkflow};
