//! Point-in-time view of one loaded catalog page.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfloor_core::{DomainError, DomainResult, MaterialId};

use crate::item::InventoryItem;

/// Pagination metadata reported by the catalog, when it reports any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: Option<u64>,
}

/// Read-only snapshot of catalog items, indexed by id.
///
/// Replaced wholesale on refresh; nothing mutates a snapshot in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotParts", into = "SnapshotParts")]
pub struct CatalogSnapshot {
    items: Vec<InventoryItem>,
    index: HashMap<MaterialId, usize>,
    fetched_at: DateTime<Utc>,
    page: Option<PageInfo>,
}

/// Serialized form (the index is rebuilt on decode).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotParts {
    items: Vec<InventoryItem>,
    fetched_at: DateTime<Utc>,
    page: Option<PageInfo>,
}

impl CatalogSnapshot {
    /// Build a snapshot from fetched items.
    ///
    /// Every item must pass `InventoryItem::validate` and ids must be unique
    /// within the page.
    pub fn new(items: Vec<InventoryItem>, fetched_at: DateTime<Utc>) -> DomainResult<Self> {
        let mut index = HashMap::with_capacity(items.len());
        for (pos, item) in items.iter().enumerate() {
            item.validate()?;
            if index.insert(item.id.clone(), pos).is_some() {
                return Err(DomainError::validation(format!(
                    "duplicate material id in catalog page: {}",
                    item.id
                )));
            }
        }

        Ok(Self {
            items,
            index,
            fetched_at,
            page: None,
        })
    }

    pub fn with_page(mut self, page: PageInfo) -> Self {
        self.page = Some(page);
        self
    }

    pub fn get(&self, id: &MaterialId) -> Option<&InventoryItem> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    pub fn contains(&self, id: &MaterialId) -> bool {
        self.index.contains_key(id)
    }

    /// Stock level as captured when the snapshot was fetched.
    pub fn stock_level(&self, id: &MaterialId) -> Option<Decimal> {
        self.get(id).map(|item| item.current_stock_level)
    }

    /// Items in the order the catalog returned them.
    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn ids(&self) -> impl Iterator<Item = &MaterialId> {
        self.items.iter().map(|item| &item.id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn page(&self) -> Option<PageInfo> {
        self.page
    }
}

impl TryFrom<SnapshotParts> for CatalogSnapshot {
    type Error = DomainError;

    fn try_from(parts: SnapshotParts) -> Result<Self, Self::Error> {
        let snapshot = Self::new(parts.items, parts.fetched_at)?;
        Ok(match parts.page {
            Some(page) => snapshot.with_page(page),
            None => snapshot,
        })
    }
}

impl From<CatalogSnapshot> for SnapshotParts {
    fn from(snapshot: CatalogSnapshot) -> Self {
        Self {
            items: snapshot.items,
            fetched_at: snapshot.fetched_at,
            page: snapshot.page,
        }
    }
}
