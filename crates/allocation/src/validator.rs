//! Stock validation for a single draft line.
//!
//! Only the snapshot stock level captured when the draft was built is
//! consulted. Live stock may have moved since; the ledger's answer at
//! submission time is authoritative.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shopfloor_core::ValueObject;

/// Why a line cannot be submitted. The `Display` text is the inline message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineIssue {
    #[error("Quantity must be greater than zero.")]
    NonPositiveQuantity,

    #[error("Only {}{} available", .available.normalize(), unit_suffix(.unit))]
    ExceedsStock { available: Decimal, unit: String },
}

impl ValueObject for LineIssue {}

fn unit_suffix(unit: &str) -> String {
    if unit.is_empty() {
        String::new()
    } else {
        format!(" {unit}")
    }
}

/// Check `quantity` against the snapshot stock level.
///
/// Rules apply in order: non-positive quantity first, then over-stock.
pub fn validate(
    quantity: Decimal,
    snapshot_stock_level: Decimal,
    unit: &str,
) -> Result<(), LineIssue> {
    if quantity <= Decimal::ZERO {
        return Err(LineIssue::NonPositiveQuantity);
    }
    if quantity > snapshot_stock_level {
        return Err(LineIssue::ExceedsStock {
            available: snapshot_stock_level,
            unit: unit.to_string(),
        });
    }
    Ok(())
}
