use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfloor_core::{DomainError, DomainResult, MaterialId};

/// Inventory item as served by the catalog (matches API response shape).
///
/// `unitPrice` and `currentStockLevel` may arrive as JSON numbers or numeric
/// strings; both decode into `Decimal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: MaterialId,
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub unit: String,
    pub unit_price: Decimal,
    pub current_stock_level: Decimal,
}

impl InventoryItem {
    pub fn new(
        id: impl Into<MaterialId>,
        name: impl Into<String>,
        unit: impl Into<String>,
        unit_price: Decimal,
        current_stock_level: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: String::new(),
            unit: unit.into(),
            unit_price,
            current_stock_level,
        }
    }

    /// Check the catalog-side invariants this client relies on.
    pub fn validate(&self) -> DomainResult<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(DomainError::invalid_id("inventory item id cannot be empty"));
        }
        if self.current_stock_level < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "item {}: stock level cannot be negative ({})",
                self.id, self.current_stock_level
            )));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "item {}: unit price cannot be negative ({})",
                self.id, self.unit_price
            )));
        }
        Ok(())
    }
}
