//! The allocation workflow as an explicit, serializable state machine.
//!
//! ```text
//! Idle ──open_draft──▶ DraftBuilding ◀──edits──▶ Validating
//!   ▲                       │ begin_submission
//!   │                       ▼
//!   ├──abandon_submission── Submitting
//!   │                       │ settle
//!   │                       ▼
//!   └──acknowledge/cancel── Settled ──retry_failed──▶ DraftBuilding / Validating
//! ```
//!
//! `DraftBuilding` means a draft is open and every line is valid;
//! `Validating` means a draft is open and at least one line carries a
//! validation issue (submit is blocked). An in-flight batch cannot be
//! cancelled; if the future driving it is dropped before settling,
//! `abandon_submission` returns the session to `Idle`.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use shopfloor_catalog::{CatalogSnapshot, JobSummary};
use shopfloor_core::{JobId, MaterialId};

use crate::draft::{AllocationDraft, AllocationLine};
use crate::error::AllocationError;
use crate::outcome::{BatchOutcome, BatchResult};
use crate::ports::{CatalogSource, FetchError, MaterialLedger};
use crate::selection::SelectionSet;
use crate::submitter::{BatchSubmitter, SubmissionPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPhase {
    Idle,
    DraftBuilding,
    Validating,
    Submitting,
    Settled,
}

impl AllocationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationPhase::Idle => "idle",
            AllocationPhase::DraftBuilding => "draft_building",
            AllocationPhase::Validating => "validating",
            AllocationPhase::Submitting => "submitting",
            AllocationPhase::Settled => "settled",
        }
    }

    fn has_open_draft(&self) -> bool {
        matches!(self, AllocationPhase::DraftBuilding | AllocationPhase::Validating)
    }
}

impl fmt::Display for AllocationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session state for allocating catalog materials to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationWorkflow {
    phase: AllocationPhase,
    catalog: CatalogSnapshot,
    selection: SelectionSet,
    draft: Option<AllocationDraft>,
    last_result: Option<BatchResult>,
    refresh_error: Option<String>,
}

impl AllocationWorkflow {
    pub fn new(catalog: CatalogSnapshot) -> Self {
        Self {
            phase: AllocationPhase::Idle,
            catalog,
            selection: SelectionSet::new(),
            draft: None,
            last_result: None,
            refresh_error: None,
        }
    }

    /// Fetch the first snapshot and start idle.
    pub async fn load<C>(source: &C) -> Result<Self, FetchError>
    where
        C: CatalogSource + ?Sized,
    {
        Ok(Self::new(source.fetch_materials().await?))
    }

    pub fn phase(&self) -> AllocationPhase {
        self.phase
    }

    pub fn catalog(&self) -> &CatalogSnapshot {
        &self.catalog
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn draft(&self) -> Option<&AllocationDraft> {
        self.draft.as_ref()
    }

    pub fn last_result(&self) -> Option<&BatchResult> {
        self.last_result.as_ref()
    }

    /// Why the last catalog refresh failed, if it did. The catalog shown is stale.
    pub fn refresh_error(&self) -> Option<&str> {
        self.refresh_error.as_deref()
    }

    // -------------------------
    // Selection (Idle only)
    // -------------------------

    pub fn toggle(&mut self, id: MaterialId) -> Result<bool, AllocationError> {
        self.require(&[AllocationPhase::Idle], "change the selection")?;
        Ok(self.selection.toggle(id))
    }

    pub fn select_all(&mut self) -> Result<(), AllocationError> {
        self.require(&[AllocationPhase::Idle], "change the selection")?;
        self.selection.select_all(&self.catalog);
        Ok(())
    }

    pub fn clear_selection(&mut self) -> Result<(), AllocationError> {
        self.require(&[AllocationPhase::Idle], "change the selection")?;
        self.selection.clear();
        Ok(())
    }

    // -------------------------
    // Draft editing
    // -------------------------

    /// "Add to job": build a draft from the selection.
    ///
    /// On [`AllocationError::EmptySelection`] the workflow stays `Idle` so the
    /// caller can re-show the selection.
    pub fn open_draft(&mut self) -> Result<&AllocationDraft, AllocationError> {
        self.require(&[AllocationPhase::Idle], "open a draft")?;
        let draft = AllocationDraft::build(&self.selection, &self.catalog)?;
        debug!(lines = draft.lines().len(), "allocation draft opened");

        self.last_result = None;
        Ok(self.install_draft(draft))
    }

    pub fn set_quantity(
        &mut self,
        material_id: &MaterialId,
        quantity: Decimal,
    ) -> Result<&AllocationLine, AllocationError> {
        let draft = self.open_draft_mut("edit quantities")?;
        draft.set_quantity(material_id, quantity)?;
        self.sync_draft_phase();
        self.draft
            .as_ref()
            .and_then(|d| d.line(material_id))
            .ok_or_else(|| AllocationError::UnknownLine(material_id.clone()))
    }

    pub fn set_notes(
        &mut self,
        material_id: &MaterialId,
        notes: Option<String>,
    ) -> Result<(), AllocationError> {
        self.open_draft_mut("edit notes")?.set_notes(material_id, notes)
    }

    /// Pick the target job from the job directory listing.
    pub fn choose_job(&mut self, job: &JobSummary) -> Result<(), AllocationError> {
        if !job.status.accepts_materials() {
            return Err(AllocationError::JobNotAcceptingMaterials {
                job_id: job.id.clone(),
                status: job.status,
            });
        }
        self.set_target_job(job.id.clone())
    }

    pub fn set_target_job(&mut self, job_id: JobId) -> Result<(), AllocationError> {
        self.open_draft_mut("choose a job")?.set_target_job(job_id);
        Ok(())
    }

    /// Whether the submit action should be enabled.
    pub fn can_submit(&self) -> bool {
        self.phase == AllocationPhase::DraftBuilding
            && self.draft.as_ref().is_some_and(AllocationDraft::is_submittable)
    }

    /// Discard the draft (explicit cancel or dismissal). Not possible mid-submission.
    pub fn cancel(&mut self) -> Result<(), AllocationError> {
        if self.phase == AllocationPhase::Submitting {
            return Err(AllocationError::InvalidTransition {
                phase: self.phase,
                action: "cancel",
            });
        }
        self.draft = None;
        self.phase = AllocationPhase::Idle;
        Ok(())
    }

    // -------------------------
    // Submission
    // -------------------------

    /// Gate the draft and move to `Submitting`. Nothing is sent on error.
    pub fn begin_submission(&mut self) -> Result<SubmissionPlan, AllocationError> {
        self.require(
            &[AllocationPhase::DraftBuilding, AllocationPhase::Validating],
            "submit",
        )?;
        let draft = self
            .draft
            .as_ref()
            .ok_or(AllocationError::EmptySelection)?;
        let plan = SubmissionPlan::from_draft(draft)?;

        self.phase = AllocationPhase::Submitting;
        Ok(plan)
    }

    /// Record a settled batch.
    ///
    /// A fully successful batch discards the draft and clears the selection.
    /// Otherwise the draft is kept so failed lines can be retried.
    pub fn settle(&mut self, result: BatchResult) -> Result<(), AllocationError> {
        self.require(&[AllocationPhase::Submitting], "settle a batch")?;

        if result.outcome() == BatchOutcome::AllSucceeded {
            self.draft = None;
            self.selection.clear();
        }
        self.last_result = Some(result);
        self.phase = AllocationPhase::Settled;
        Ok(())
    }

    /// Leave `Submitting` after the batch future was dropped unsettled.
    ///
    /// Some lines may have committed, so the draft is discarded instead of
    /// being offered again. The selection is kept; refresh the catalog to see
    /// what the ledger recorded.
    pub fn abandon_submission(&mut self) -> Result<(), AllocationError> {
        self.require(&[AllocationPhase::Submitting], "abandon a submission")?;
        warn!("submission abandoned before settling; line outcomes unknown");
        self.draft = None;
        self.last_result = None;
        self.phase = AllocationPhase::Idle;
        Ok(())
    }

    /// Submit the open draft and refresh the catalog once if anything committed.
    ///
    /// A refresh failure is not an error: the stale snapshot is kept and
    /// [`AllocationWorkflow::refresh_error`] reports it.
    pub async fn submit<L, C>(
        &mut self,
        ledger: &L,
        catalog: &C,
    ) -> Result<BatchResult, AllocationError>
    where
        L: MaterialLedger + ?Sized,
        C: CatalogSource + ?Sized,
    {
        let plan = self.begin_submission()?;
        let result = BatchSubmitter::new(ledger).execute(plan).await;
        let refresh = result.needs_catalog_refresh();

        self.settle(result.clone())?;
        if refresh {
            self.refresh_catalog(catalog).await;
        }
        Ok(result)
    }

    /// Re-open the draft with only the lines that failed in the last batch.
    ///
    /// Succeeded lines are gone from the draft and cannot be sent twice.
    /// Remaining lines pick up stock levels from the current snapshot.
    pub fn retry_failed(&mut self) -> Result<&AllocationDraft, AllocationError> {
        self.require(&[AllocationPhase::Settled], "retry failed lines")?;

        let result = match &self.last_result {
            Some(result) if result.failed_count() > 0 => result,
            _ => return Err(AllocationError::NothingToRetry),
        };
        let mut draft = self.draft.take().ok_or(AllocationError::NothingToRetry)?;

        draft.retain_lines(|line| result.is_failed(line.material_id()));
        draft.rebase(&self.catalog);
        debug!(lines = draft.lines().len(), "retrying failed allocation lines");

        Ok(self.install_draft(draft))
    }

    /// Leave the settled result screen.
    pub fn acknowledge(&mut self) -> Result<(), AllocationError> {
        self.require(&[AllocationPhase::Settled], "acknowledge a result")?;
        self.draft = None;
        self.phase = AllocationPhase::Idle;
        Ok(())
    }

    // -------------------------
    // Catalog refresh
    // -------------------------

    /// Re-fetch the catalog. Returns whether the snapshot was replaced.
    pub async fn refresh_catalog<C>(&mut self, source: &C) -> bool
    where
        C: CatalogSource + ?Sized,
    {
        let fetched = source.fetch_materials().await;
        self.apply_refresh(fetched)
    }

    /// Replace the snapshot wholesale, or keep the stale one on error.
    pub fn apply_refresh(&mut self, fetched: Result<CatalogSnapshot, FetchError>) -> bool {
        match fetched {
            Ok(snapshot) => {
                let dropped = self.selection.retain_loaded(&snapshot);
                info!(
                    items = snapshot.len(),
                    dropped_selection = dropped,
                    "catalog snapshot refreshed"
                );
                self.catalog = snapshot;
                self.refresh_error = None;
                true
            }
            Err(err) => {
                warn!(error = %err, "catalog refresh failed; keeping stale snapshot");
                self.refresh_error = Some(err.to_string());
                false
            }
        }
    }

    // -------------------------
    // Internals
    // -------------------------

    fn require(
        &self,
        allowed: &[AllocationPhase],
        action: &'static str,
    ) -> Result<(), AllocationError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(AllocationError::InvalidTransition {
                phase: self.phase,
                action,
            })
        }
    }

    fn open_draft_mut(
        &mut self,
        action: &'static str,
    ) -> Result<&mut AllocationDraft, AllocationError> {
        if !self.phase.has_open_draft() {
            return Err(AllocationError::InvalidTransition {
                phase: self.phase,
                action,
            });
        }
        self.draft.as_mut().ok_or(AllocationError::InvalidTransition {
            phase: self.phase,
            action,
        })
    }

    fn install_draft(&mut self, draft: AllocationDraft) -> &AllocationDraft {
        self.phase = draft_phase(&draft);
        self.draft.insert(draft)
    }

    fn sync_draft_phase(&mut self) {
        self.phase = match &self.draft {
            Some(draft) => draft_phase(draft),
            None => AllocationPhase::Idle,
        };
    }
}

fn draft_phase(draft: &AllocationDraft) -> AllocationPhase {
    if draft.has_invalid_lines() {
        AllocationPhase::Validating
    } else {
        AllocationPhase::DraftBuilding
    }
}
