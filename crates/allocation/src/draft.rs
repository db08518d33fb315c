//! Allocation draft: one editable line per selected catalog item.
//!
//! Pure client-side working state. A draft is never persisted; it is dropped
//! on successful submission, cancel, or dismissal.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use shopfloor_catalog::{CatalogSnapshot, InventoryItem};
use shopfloor_core::{JobId, MaterialId};

use crate::error::AllocationError;
use crate::selection::SelectionSet;
use crate::validator::{LineIssue, validate};

/// A single line of a draft.
///
/// `total_cost` and `issue` are derived; every mutation recomputes both so
/// that `is_valid() == (0 < quantity <= snapshot_stock_level)` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "LineRecord")]
pub struct AllocationLine {
    material_id: MaterialId,
    material_name: String,
    unit: String,
    quantity: Decimal,
    unit_cost: Decimal,
    total_cost: Decimal,
    snapshot_stock_level: Decimal,
    issue: Option<LineIssue>,
    notes: Option<String>,
}

/// Stored fields of a line; derived fields are recomputed on decode.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineRecord {
    material_id: MaterialId,
    material_name: String,
    unit: String,
    quantity: Decimal,
    unit_cost: Decimal,
    snapshot_stock_level: Decimal,
    #[serde(default)]
    notes: Option<String>,
}

impl From<LineRecord> for AllocationLine {
    fn from(record: LineRecord) -> Self {
        let mut line = Self {
            material_id: record.material_id,
            material_name: record.material_name,
            unit: record.unit,
            quantity: Decimal::ZERO,
            unit_cost: record.unit_cost,
            total_cost: Decimal::ZERO,
            snapshot_stock_level: record.snapshot_stock_level,
            issue: None,
            notes: record.notes,
        };
        line.set_quantity(record.quantity);
        line
    }
}

impl AllocationLine {
    /// New line for `item`: quantity 1, unit cost copied from the item.
    pub fn from_item(item: &InventoryItem) -> Self {
        let mut line = Self {
            material_id: item.id.clone(),
            material_name: item.name.clone(),
            unit: item.unit.clone(),
            quantity: Decimal::ZERO,
            unit_cost: item.unit_price,
            total_cost: Decimal::ZERO,
            snapshot_stock_level: item.current_stock_level,
            issue: None,
            notes: None,
        };
        line.set_quantity(Decimal::ONE);
        line
    }

    /// Replace the quantity (clamped to `>= 0`) and recompute derived fields.
    pub fn set_quantity(&mut self, quantity: Decimal) {
        self.quantity = quantity.max(Decimal::ZERO);
        self.total_cost = self.quantity.saturating_mul(self.unit_cost);
        self.revalidate();
    }

    /// Re-capture the stock level from a newer snapshot and revalidate.
    ///
    /// Unit cost stays as copied at draft creation.
    pub fn rebase_stock(&mut self, snapshot_stock_level: Decimal) {
        self.snapshot_stock_level = snapshot_stock_level;
        self.revalidate();
    }

    fn revalidate(&mut self) {
        self.issue = validate(self.quantity, self.snapshot_stock_level, &self.unit).err();
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = notes.filter(|n| !n.trim().is_empty());
    }

    pub fn material_id(&self) -> &MaterialId {
        &self.material_id
    }

    pub fn material_name(&self) -> &str {
        &self.material_name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    pub fn total_cost(&self) -> Decimal {
        self.total_cost
    }

    pub fn snapshot_stock_level(&self) -> Decimal {
        self.snapshot_stock_level
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn is_valid(&self) -> bool {
        self.issue.is_none()
    }

    pub fn issue(&self) -> Option<&LineIssue> {
        self.issue.as_ref()
    }

    /// Inline message; present exactly when the line is invalid.
    pub fn validation_message(&self) -> Option<String> {
        self.issue.as_ref().map(ToString::to_string)
    }
}

/// In-progress proposal to consume materials against a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationDraft {
    target_job_id: Option<JobId>,
    lines: Vec<AllocationLine>,
}

impl AllocationDraft {
    /// Build a draft from the selection, in selection order.
    ///
    /// Selected ids missing from the snapshot (e.g. after pagination drift)
    /// are dropped silently. If nothing is left the build fails with
    /// [`AllocationError::EmptySelection`] and no draft exists.
    pub fn build(
        selection: &SelectionSet,
        snapshot: &CatalogSnapshot,
    ) -> Result<Self, AllocationError> {
        let mut lines = Vec::with_capacity(selection.len());
        for id in selection.iter() {
            match snapshot.get(id) {
                Some(item) => lines.push(AllocationLine::from_item(item)),
                None => {
                    debug!(material_id = %id, "selected material missing from snapshot; dropped")
                }
            }
        }

        if lines.is_empty() {
            return Err(AllocationError::EmptySelection);
        }

        Ok(Self {
            target_job_id: None,
            lines,
        })
    }

    /// Set the quantity of one line and revalidate that line only.
    pub fn set_quantity(
        &mut self,
        material_id: &MaterialId,
        quantity: Decimal,
    ) -> Result<&AllocationLine, AllocationError> {
        let line = self.line_mut(material_id)?;
        line.set_quantity(quantity);
        Ok(line)
    }

    pub fn set_notes(
        &mut self,
        material_id: &MaterialId,
        notes: Option<String>,
    ) -> Result<(), AllocationError> {
        self.line_mut(material_id)?.set_notes(notes);
        Ok(())
    }

    pub fn set_target_job(&mut self, job_id: JobId) {
        self.target_job_id = Some(job_id);
    }

    pub fn target_job_id(&self) -> Option<&JobId> {
        self.target_job_id.as_ref()
    }

    pub fn lines(&self) -> &[AllocationLine] {
        &self.lines
    }

    pub fn line(&self, material_id: &MaterialId) -> Option<&AllocationLine> {
        self.lines.iter().find(|l| l.material_id == *material_id)
    }

    fn line_mut(
        &mut self,
        material_id: &MaterialId,
    ) -> Result<&mut AllocationLine, AllocationError> {
        self.lines
            .iter_mut()
            .find(|l| l.material_id == *material_id)
            .ok_or_else(|| AllocationError::UnknownLine(material_id.clone()))
    }

    pub fn aggregate_total(&self) -> Decimal {
        self.lines
            .iter()
            .map(AllocationLine::total_cost)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    pub fn invalid_lines(&self) -> Vec<MaterialId> {
        self.lines
            .iter()
            .filter(|l| !l.is_valid())
            .map(|l| l.material_id.clone())
            .collect()
    }

    pub fn has_invalid_lines(&self) -> bool {
        self.lines.iter().any(|l| !l.is_valid())
    }

    /// Gate for the submit action: a job is chosen, the draft is non-empty
    /// and every line is valid. Returns the target job.
    pub fn check_submittable(&self) -> Result<&JobId, AllocationError> {
        if self.lines.is_empty() {
            return Err(AllocationError::EmptySelection);
        }
        let invalid = self.invalid_lines();
        if !invalid.is_empty() {
            return Err(AllocationError::InvalidLines(invalid));
        }
        self.target_job_id
            .as_ref()
            .ok_or(AllocationError::MissingTargetJob)
    }

    pub fn is_submittable(&self) -> bool {
        self.check_submittable().is_ok()
    }

    /// Keep only lines matching `keep` (used to narrow a draft to failed lines).
    pub(crate) fn retain_lines(&mut self, keep: impl Fn(&AllocationLine) -> bool) {
        self.lines.retain(|l| keep(l));
    }

    /// Re-capture stock levels from a refreshed snapshot for lines still listed there.
    pub(crate) fn rebase(&mut self, snapshot: &CatalogSnapshot) {
        for line in &mut self.lines {
            if let Some(stock) = snapshot.stock_level(&line.material_id) {
                line.rebase_stock(stock);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::new(
            vec![
                InventoryItem::new("A", "Steel sheet", "sheets", dec!(12.50), dec!(10)),
                InventoryItem::new("B", "Copper wire", "m", dec!(3), dec!(2)),
            ],
            Utc::now(),
        )
        .unwrap()
    }

    fn select(ids: &[&str]) -> SelectionSet {
        let mut sel = SelectionSet::new();
        for id in ids {
            sel.toggle((*id).into());
        }
        sel
    }

    #[test]
    fn oversized_quantity_is_invalid_and_totals_saturate() {
        let mut draft = AllocationDraft::build(&select(&["A", "B"]), &snapshot()).unwrap();

        let line = draft.set_quantity(&"A".into(), Decimal::MAX).unwrap();
        assert!(!line.is_valid());
        assert_eq!(line.validation_message().as_deref(), Some("Only 10 sheets available"));
        assert_eq!(line.total_cost(), Decimal::MAX);

        draft.set_quantity(&"B".into(), Decimal::MAX).unwrap();
        assert_eq!(draft.aggregate_total(), Decimal::MAX);
        assert!(matches!(
            draft.check_submittable(),
            Err(AllocationError::InvalidLines(ids)) if ids.len() == 2
        ));
    }

    #[test]
    fn build_defaults_each_line_to_one_unit() {
        let draft = AllocationDraft::build(&select(&["A", "B"]), &snapshot()).unwrap();

        assert_eq!(draft.lines().len(), 2);
        for line in draft.lines() {
            assert_eq!(line.quantity(), dec!(1));
            assert!(line.is_valid());
            assert_eq!(line.validation_message(), None);
        }
        assert_eq!(draft.aggregate_total(), dec!(15.50));
        assert_eq!(draft.target_job_id(), None);
    }

    #[test]
    fn empty_selection_never_yields_a_draft() {
        let err = AllocationDraft::build(&SelectionSet::new(), &snapshot()).unwrap_err();
        assert_eq!(err, AllocationError::EmptySelection);
    }

    #[test]
    fn ids_missing_from_snapshot_are_dropped() {
        let draft = AllocationDraft::build(&select(&["A", "gone"]), &snapshot()).unwrap();
        let ids: Vec<&str> = draft.lines().iter().map(|l| l.material_id().as_str()).collect();
        assert_eq!(ids, vec!["A"]);

        let err = AllocationDraft::build(&select(&["gone"]), &snapshot()).unwrap_err();
        assert_eq!(err, AllocationError::EmptySelection);
    }

    #[test]
    fn exceeding_stock_invalidates_only_that_line() {
        let mut draft = AllocationDraft::build(&select(&["A", "B"]), &snapshot()).unwrap();
        draft.set_target_job(JobId::new("J1"));

        let line = draft.set_quantity(&"B".into(), dec!(5)).unwrap();
        assert!(!line.is_valid());
        assert_eq!(line.validation_message().as_deref(), Some("Only 2 m available"));

        assert!(draft.line(&"A".into()).unwrap().is_valid());
        assert_eq!(
            draft.check_submittable(),
            Err(AllocationError::InvalidLines(vec!["B".into()]))
        );

        draft.set_quantity(&"B".into(), dec!(2)).unwrap();
        assert_eq!(draft.check_submittable(), Ok(&JobId::new("J1")));
    }

    #[test]
    fn negative_quantities_clamp_to_zero() {
        let mut draft = AllocationDraft::build(&select(&["A"]), &snapshot()).unwrap();
        let line = draft.set_quantity(&"A".into(), dec!(-4)).unwrap();
        assert_eq!(line.quantity(), dec!(0));
        assert_eq!(line.total_cost(), dec!(0));
        assert_eq!(line.issue(), Some(&LineIssue::NonPositiveQuantity));
    }

    #[test]
    fn missing_job_blocks_submission() {
        let draft = AllocationDraft::build(&select(&["A"]), &snapshot()).unwrap();
        assert_eq!(draft.check_submittable(), Err(AllocationError::MissingTargetJob));
    }

    #[test]
    fn unknown_line_is_reported() {
        let mut draft = AllocationDraft::build(&select(&["A"]), &snapshot()).unwrap();
        let err = draft.set_quantity(&"B".into(), dec!(1)).unwrap_err();
        assert_eq!(err, AllocationError::UnknownLine("B".into()));
    }

    #[test]
    fn blank_notes_are_dropped() {
        let mut draft = AllocationDraft::build(&select(&["A"]), &snapshot()).unwrap();
        draft.set_notes(&"A".into(), Some("  ".to_string())).unwrap();
        assert_eq!(draft.line(&"A".into()).unwrap().notes(), None);

        draft.set_notes(&"A".into(), Some("for bracket".to_string())).unwrap();
        assert_eq!(draft.line(&"A".into()).unwrap().notes(), Some("for bracket"));
    }

    #[test]
    fn decoding_recomputes_derived_fields() {
        let mut draft = AllocationDraft::build(&select(&["A", "B"]), &snapshot()).unwrap();
        draft.set_quantity(&"B".into(), dec!(3)).unwrap();

        let json = serde_json::to_string(&draft).unwrap();
        let back: AllocationDraft = serde_json::from_str(&json).unwrap();
        assert_eq!(back, draft);
    }

    fn quantity() -> impl Strategy<Value = Decimal> {
        (-50i64..200, 0u32..3).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            .. ProptestConfig::default()
        })]

        #[test]
        fn validity_and_totals_hold_after_every_edit(
            edits in proptest::collection::vec((0usize..2, quantity()), 1..20)
        ) {
            let snap = snapshot();
            let mut draft = AllocationDraft::build(&select(&["A", "B"]), &snap).unwrap();
            let ids = [MaterialId::new("A"), MaterialId::new("B")];

            for (which, qty) in edits {
                draft.set_quantity(&ids[which], qty).unwrap();

                for line in draft.lines() {
                    let stock = snap.stock_level(line.material_id()).unwrap();
                    let expected = line.quantity() > Decimal::ZERO && line.quantity() <= stock;
                    prop_assert_eq!(line.is_valid(), expected);
                    prop_assert_eq!(line.validation_message().is_some(), !expected);
                    prop_assert_eq!(line.total_cost(), line.quantity() * line.unit_cost());
                }
                let sum: Decimal = draft.lines().iter().map(|l| l.total_cost()).sum();
                prop_assert_eq!(draft.aggregate_total(), sum);
            }
        }

        #[test]
        fn set_quantity_is_idempotent(qty in quantity()) {
            let mut once = AllocationDraft::build(&select(&["A", "B"]), &snapshot()).unwrap();
            once.set_quantity(&"A".into(), qty).unwrap();

            let mut twice = once.clone();
            twice.set_quantity(&"A".into(), qty).unwrap();

            prop_assert_eq!(once, twice);
        }
    }
}
