//! Batch submission of a validated draft.
//!
//! One independent ledger request per line, all in flight at once, joined
//! with an all-settled wait: a failing line never short-circuits its
//! siblings, nothing is rolled back, nothing is retried.

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};

use shopfloor_core::{BatchId, JobId};

use crate::draft::AllocationDraft;
use crate::error::AllocationError;
use crate::outcome::{AllocationOutcome, BatchResult};
use crate::ports::{ConsumeMaterial, MaterialLedger};

/// A checked, ready-to-send batch (owned, so no draft borrow is held across IO).
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionPlan {
    batch_id: BatchId,
    job_id: JobId,
    lines: Vec<PlannedLine>,
}

#[derive(Debug, Clone, PartialEq)]
struct PlannedLine {
    material_name: String,
    request: ConsumeMaterial,
}

impl SubmissionPlan {
    /// Check the draft and turn every line into a request.
    ///
    /// Fails without touching the network if a job is missing or any line is
    /// invalid: either the whole draft is sent or nothing is.
    pub fn from_draft(draft: &AllocationDraft) -> Result<Self, AllocationError> {
        let job_id = draft.check_submittable()?.clone();

        let lines = draft
            .lines()
            .iter()
            .map(|line| PlannedLine {
                material_name: line.material_name().to_string(),
                request: ConsumeMaterial {
                    job_id: job_id.clone(),
                    material_id: line.material_id().clone(),
                    quantity_needed: line.quantity(),
                    unit_cost: line.unit_cost(),
                    notes: line.notes().map(str::to_string),
                },
            })
            .collect();

        Ok(Self {
            batch_id: BatchId::new(),
            job_id,
            lines,
        })
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn requests(&self) -> impl Iterator<Item = &ConsumeMaterial> {
        self.lines.iter().map(|l| &l.request)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Sends submission plans to a [`MaterialLedger`].
#[derive(Debug, Clone)]
pub struct BatchSubmitter<L> {
    ledger: L,
}

impl<L: MaterialLedger> BatchSubmitter<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Validate `draft`, then send it. See [`SubmissionPlan::from_draft`].
    pub async fn submit(&self, draft: &AllocationDraft) -> Result<BatchResult, AllocationError> {
        let plan = SubmissionPlan::from_draft(draft)?;
        Ok(self.execute(plan).await)
    }

    /// Send every planned line concurrently and wait for all of them to settle.
    ///
    /// Outcomes are reported in plan order regardless of settle order.
    pub async fn execute(&self, plan: SubmissionPlan) -> BatchResult {
        let SubmissionPlan {
            batch_id,
            job_id,
            lines,
        } = plan;
        let submitted_at = Utc::now();

        info!(
            batch_id = %batch_id,
            job_id = %job_id,
            lines = lines.len(),
            "submitting allocation batch"
        );

        let ledger = &self.ledger;
        let settled = join_all(lines.into_iter().map(|line| async move {
            let outcome = match ledger.consume(&line.request).await {
                Ok(()) => AllocationOutcome::Succeeded,
                Err(err) => {
                    warn!(
                        batch_id = %batch_id,
                        material_id = %line.request.material_id,
                        error = %err,
                        "ledger rejected material line"
                    );
                    AllocationOutcome::Failed {
                        reason: err.to_string(),
                    }
                }
            };
            (line.request.material_id, line.material_name, outcome)
        }))
        .await;

        let result = BatchResult::from_outcomes(batch_id, job_id, submitted_at, settled);

        info!(
            batch_id = %result.batch_id,
            job_id = %result.job_id,
            succeeded = result.succeeded_count(),
            failed = result.failed_count(),
            "allocation batch settled"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use shopfloor_catalog::{CatalogSnapshot, InventoryItem};
    use shopfloor_core::MaterialId;

    use crate::outcome::BatchOutcome;
    use crate::ports::LedgerError;
    use crate::selection::SelectionSet;

    /// Scripted ledger: per-material rejection and delay, records every call.
    #[derive(Default)]
    struct FakeLedger {
        rejections: HashMap<MaterialId, LedgerError>,
        delays_ms: HashMap<MaterialId, u64>,
        calls: Mutex<Vec<ConsumeMaterial>>,
    }

    impl FakeLedger {
        fn reject(mut self, id: &str, err: LedgerError) -> Self {
            self.rejections.insert(id.into(), err);
            self
        }

        fn delay(mut self, id: &str, ms: u64) -> Self {
            self.delays_ms.insert(id.into(), ms);
            self
        }

        fn calls(&self) -> Vec<ConsumeMaterial> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MaterialLedger for FakeLedger {
        async fn consume(&self, request: &ConsumeMaterial) -> Result<(), LedgerError> {
            if let Some(ms) = self.delays_ms.get(&request.material_id) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            self.calls.lock().unwrap().push(request.clone());
            match self.rejections.get(&request.material_id) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    fn draft(stock: &[(&str, Decimal)]) -> AllocationDraft {
        let items = stock
            .iter()
            .map(|(id, s)| InventoryItem::new(*id, format!("Item {id}"), "pcs", dec!(4), *s))
            .collect();
        let snapshot = CatalogSnapshot::new(items, Utc::now()).unwrap();
        let mut sel = SelectionSet::new();
        sel.select_all(&snapshot);
        AllocationDraft::build(&sel, &snapshot).unwrap()
    }

    #[tokio::test]
    async fn partial_failure_does_not_roll_back_successes() {
        let mut d = draft(&[("A", dec!(10)), ("B", dec!(2))]);
        d.set_quantity(&"B".into(), dec!(2)).unwrap();
        d.set_target_job(JobId::new("J1"));

        let ledger = Arc::new(
            FakeLedger::default().reject("B", LedgerError::Rejected("insufficient stock".into())),
        );
        let result = BatchSubmitter::new(ledger.clone()).submit(&d).await.unwrap();

        assert_eq!(result.succeeded, vec![MaterialId::new("A")]);
        assert_eq!(result.failed_lines.len(), 1);
        assert_eq!(result.failed_lines[0].material_id, MaterialId::new("B"));
        assert_eq!(result.failed_lines[0].reason, "insufficient stock");
        assert_eq!(result.outcome(), BatchOutcome::Partial);

        let calls = ledger.calls();
        assert_eq!(calls.len(), 2);
        let b = calls.iter().find(|c| c.material_id.as_str() == "B").unwrap();
        assert_eq!(b.job_id, JobId::new("J1"));
        assert_eq!(b.quantity_needed, dec!(2));
        assert_eq!(b.unit_cost, dec!(4));
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected_before_any_request() {
        let mut d = draft(&[("A", dec!(10)), ("B", dec!(2))]);
        d.set_target_job(JobId::new("J1"));
        d.set_quantity(&"B".into(), dec!(5)).unwrap();

        let ledger = Arc::new(FakeLedger::default());
        let err = BatchSubmitter::new(ledger.clone()).submit(&d).await.unwrap_err();

        assert_eq!(err, AllocationError::InvalidLines(vec!["B".into()]));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_job_is_rejected_before_any_request() {
        let d = draft(&[("A", dec!(10))]);
        let ledger = Arc::new(FakeLedger::default());

        let err = BatchSubmitter::new(ledger.clone()).submit(&d).await.unwrap_err();
        assert_eq!(err, AllocationError::MissingTargetJob);
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn locally_valid_line_can_still_be_rejected_remotely() {
        let mut d = draft(&[("A", dec!(10))]);
        d.set_target_job(JobId::new("J1"));
        assert!(d.is_submittable());

        let ledger = FakeLedger::default()
            .reject("A", LedgerError::Rejected("stock changed: 0 available".into()));
        let result = BatchSubmitter::new(&ledger).submit(&d).await.unwrap();

        assert_eq!(result.outcome(), BatchOutcome::AllFailed);
        assert_eq!(result.failed_lines[0].reason, "stock changed: 0 available");
        assert!(!result.needs_catalog_refresh());
    }

    #[tokio::test]
    async fn outcomes_follow_draft_order_not_settle_order() {
        let mut d = draft(&[("A", dec!(10)), ("B", dec!(10)), ("C", dec!(10))]);
        d.set_target_job(JobId::new("J1"));

        let ledger = FakeLedger::default()
            .delay("A", 30)
            .delay("B", 10)
            .reject("A", LedgerError::Unavailable("timed out".into()))
            .reject("C", LedgerError::Rejected("job closed".into()));
        let result = BatchSubmitter::new(&ledger).submit(&d).await.unwrap();

        // C settles first, A last; the result is still in draft order.
        let settle_order: Vec<String> = ledger
            .calls()
            .iter()
            .map(|c| c.material_id.to_string())
            .collect();
        assert_eq!(settle_order, vec!["C", "B", "A"]);

        let failed: Vec<&str> = result
            .failed_lines
            .iter()
            .map(|f| f.material_id.as_str())
            .collect();
        assert_eq!(failed, vec!["A", "C"]);
        assert_eq!(result.failed_lines[0].reason, "network error: timed out");
        assert_eq!(result.succeeded, vec![MaterialId::new("B")]);
    }

    /// Every request waits on a shared barrier: this only completes if all
    /// requests are in flight at the same time.
    struct BarrierLedger {
        barrier: tokio::sync::Barrier,
        in_flight_peak: AtomicUsize,
        in_flight: AtomicUsize,
    }

    #[async_trait]
    impl MaterialLedger for BarrierLedger {
        async fn consume(&self, _request: &ConsumeMaterial) -> Result<(), LedgerError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.in_flight_peak.fetch_max(now, Ordering::SeqCst);
            self.barrier.wait().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn requests_are_issued_concurrently() {
        let mut d = draft(&[("A", dec!(10)), ("B", dec!(10)), ("C", dec!(10)), ("D", dec!(10))]);
        d.set_target_job(JobId::new("J1"));

        let ledger = BarrierLedger {
            barrier: tokio::sync::Barrier::new(4),
            in_flight_peak: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
        };
        let submitter = BatchSubmitter::new(&ledger);

        let result = tokio::time::timeout(Duration::from_secs(5), submitter.submit(&d))
            .await
            .expect("requests were not in flight together")
            .unwrap();

        assert_eq!(result.succeeded_count(), 4);
        assert_eq!(ledger.in_flight_peak.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn plan_carries_notes_and_one_request_per_line() {
        let mut d = draft(&[("A", dec!(10)), ("B", dec!(10))]);
        d.set_target_job(JobId::new("J9"));
        d.set_notes(&"A".into(), Some("cut to length".into())).unwrap();

        let plan = SubmissionPlan::from_draft(&d).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.job_id(), &JobId::new("J9"));

        let notes: Vec<Option<&str>> = plan.requests().map(|r| r.notes.as_deref()).collect();
        assert_eq!(notes, vec![Some("cut to length"), None]);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            .. ProptestConfig::default()
        })]

        #[test]
        fn every_submitted_line_is_counted_exactly_once(
            script in proptest::collection::vec((any::<bool>(), 0u64..5), 1..12)
        ) {
            let ids: Vec<String> = (0..script.len()).map(|i| format!("M{i}")).collect();
            let stock: Vec<(&str, Decimal)> =
                ids.iter().map(|id| (id.as_str(), dec!(10))).collect();
            let mut d = draft(&stock);
            d.set_target_job(JobId::new("J1"));

            let mut ledger = FakeLedger::default();
            for (id, (reject, delay)) in ids.iter().zip(&script) {
                ledger = ledger.delay(id, *delay);
                if *reject {
                    ledger = ledger.reject(id, LedgerError::Rejected("no".into()));
                }
            }

            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let result = rt.block_on(BatchSubmitter::new(&ledger).submit(&d)).unwrap();

            let rejected = script.iter().filter(|(r, _)| *r).count();
            prop_assert_eq!(result.submitted_count(), ids.len());
            prop_assert_eq!(result.failed_count(), rejected);
            prop_assert_eq!(result.succeeded_count(), ids.len() - rejected);
            prop_assert_eq!(ledger.calls().len(), ids.len());
        }
    }
}
