use serde::{Deserialize, Serialize};

use shopfloor_core::JobId;

/// Lifecycle status reported by the job service.
///
/// Statuses this client does not know decode as `Unknown` and are treated as
/// open (the ledger has the final say on whether a job accepts materials).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Scheduled,
    InProgress,
    OnHold,
    Completed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Statuses requested from the job service for the job picker.
    pub const ACTIVE: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Scheduled,
        JobStatus::InProgress,
        JobStatus::OnHold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Scheduled => "SCHEDULED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::OnHold => "ON_HOLD",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Canceled => "CANCELED",
            JobStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn accepts_materials(&self) -> bool {
        !matches!(self, JobStatus::Completed | JobStatus::Canceled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub name: String,
}

/// Job row used to populate the target-job picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub title: String,
    pub status: JobStatus,
    #[serde(default)]
    pub customer: Option<CustomerRef>,
}

impl JobSummary {
    /// Label for pickers: `"<title> (<customer>)"`.
    pub fn label(&self) -> String {
        match &self.customer {
            Some(c) => format!("{} ({})", self.title, c.name),
            None => self.title.clone(),
        }
    }

    /// Keep only jobs that can still receive materials.
    ///
    /// The job service is asked for active statuses already; this guards
    /// against it returning closed jobs anyway.
    pub fn retain_open(jobs: Vec<JobSummary>) -> Vec<JobSummary> {
        jobs.into_iter()
            .filter(|job| job.status.accepts_materials())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_job_rows_and_filters_closed_jobs() {
        let json = r#"[
            {"id":"J1","title":"Frame weld","status":"IN_PROGRESS","customer":{"name":"Acme"}},
            {"id":"J2","title":"Old job","status":"COMPLETED","customer":{"name":"Acme"}},
            {"id":"J3","title":"Dropped","status":"CANCELED"},
            {"id":"J4","title":"New kind","status":"QUALITY_REVIEW"}
        ]"#;
        let jobs: Vec<JobSummary> = serde_json::from_str(json).unwrap();
        assert_eq!(jobs[3].status, JobStatus::Unknown);

        let open = JobSummary::retain_open(jobs);
        let ids: Vec<&str> = open.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["J1", "J4"]);
        assert_eq!(open[0].label(), "Frame weld (Acme)");
    }

    #[test]
    fn active_statuses_accept_materials() {
        assert!(JobStatus::ACTIVE.iter().all(|s| s.accepts_materials()));
        assert_eq!(JobStatus::InProgress.as_str(), "IN_PROGRESS");
    }
}
