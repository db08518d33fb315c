//! Workflow errors (local, never sent over the network).

use thiserror::Error;

use shopfloor_catalog::JobStatus;
use shopfloor_core::{JobId, MaterialId};

use crate::workflow::AllocationPhase;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// Nothing selected, or none of the selected ids exist in the snapshot.
    #[error("select at least one material from the loaded catalog")]
    EmptySelection,

    #[error("choose a target job before submitting")]
    MissingTargetJob,

    #[error("job {job_id} is {} and does not accept materials", .status.as_str())]
    JobNotAcceptingMaterials { job_id: JobId, status: JobStatus },

    /// Lines that fail stock validation; submission is blocked until fixed.
    #[error("{} line(s) need a valid quantity before submitting", .0.len())]
    InvalidLines(Vec<MaterialId>),

    #[error("draft has no line for material {0}")]
    UnknownLine(MaterialId),

    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        phase: AllocationPhase,
        action: &'static str,
    },

    #[error("the last batch has no failed lines to retry")]
    NothingToRetry,
}
