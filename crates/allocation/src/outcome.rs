//! Per-line outcomes and the aggregated batch result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfloor_core::{BatchId, JobId, MaterialId, ValueObject};

/// Settlement of one submitted line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AllocationOutcome {
    Succeeded,
    Failed { reason: String },
}

impl ValueObject for AllocationOutcome {}

/// A submitted line the ledger did not commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedLine {
    pub material_id: MaterialId,
    pub material_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    AllSucceeded,
    Partial,
    AllFailed,
}

/// Aggregated result of one batch. Partial success is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub batch_id: BatchId,
    pub job_id: JobId,
    pub succeeded: Vec<MaterialId>,
    pub failed_lines: Vec<FailedLine>,
    pub submitted_at: DateTime<Utc>,
    pub settled_at: DateTime<Utc>,
}

impl BatchResult {
    /// Aggregate settled lines, preserving the order they are given in.
    pub fn from_outcomes<I>(
        batch_id: BatchId,
        job_id: JobId,
        submitted_at: DateTime<Utc>,
        outcomes: I,
    ) -> Self
    where
        I: IntoIterator<Item = (MaterialId, String, AllocationOutcome)>,
    {
        let mut succeeded = Vec::new();
        let mut failed_lines = Vec::new();

        for (material_id, material_name, outcome) in outcomes {
            match outcome {
                AllocationOutcome::Succeeded => succeeded.push(material_id),
                AllocationOutcome::Failed { reason } => failed_lines.push(FailedLine {
                    material_id,
                    material_name,
                    reason,
                }),
            }
        }

        Self {
            batch_id,
            job_id,
            succeeded,
            failed_lines,
            submitted_at,
            settled_at: Utc::now(),
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed_lines.len()
    }

    /// Lines sent to the ledger (every one is either succeeded or failed).
    pub fn submitted_count(&self) -> usize {
        self.succeeded_count() + self.failed_count()
    }

    pub fn outcome(&self) -> BatchOutcome {
        if self.failed_lines.is_empty() {
            BatchOutcome::AllSucceeded
        } else if self.succeeded.is_empty() {
            BatchOutcome::AllFailed
        } else {
            BatchOutcome::Partial
        }
    }

    /// Committed lines changed external stock, so the catalog is stale.
    pub fn needs_catalog_refresh(&self) -> bool {
        !self.succeeded.is_empty()
    }

    pub fn is_failed(&self, material_id: &MaterialId) -> bool {
        self.failed_lines.iter().any(|f| f.material_id == *material_id)
    }

    /// One-line human summary, e.g. `Added 3 of 5 materials; 2 failed: ...`.
    pub fn summary(&self) -> String {
        let failures = self
            .failed_lines
            .iter()
            .map(|f| format!("{} ({})", f.material_name, f.reason))
            .collect::<Vec<_>>()
            .join(", ");

        match self.outcome() {
            BatchOutcome::AllSucceeded => format!(
                "Added {} to job {}",
                materials(self.succeeded_count()),
                self.job_id
            ),
            BatchOutcome::Partial => format!(
                "Added {} of {}; {} failed: {}",
                self.succeeded_count(),
                materials(self.submitted_count()),
                self.failed_count(),
                failures
            ),
            BatchOutcome::AllFailed => format!(
                "No materials added; {} failed: {}",
                self.failed_count(),
                failures
            ),
        }
    }
}

fn materials(n: usize) -> String {
    if n == 1 {
        "1 material".to_string()
    } else {
        format!("{n} materials")
    }
}
