//! User-controlled set of catalog items chosen for allocation.

use serde::{Deserialize, Serialize};

use shopfloor_catalog::CatalogSnapshot;
use shopfloor_core::MaterialId;

/// Ordered set of selected material ids (insertion order, no duplicates).
///
/// Only ids from the currently loaded catalog page are kept once the page
/// changes; see [`SelectionSet::retain_loaded`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet {
    ids: Vec<MaterialId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` if absent, remove it if present. Returns whether it is now selected.
    pub fn toggle(&mut self, id: MaterialId) -> bool {
        match self.ids.iter().position(|existing| *existing == id) {
            Some(pos) => {
                self.ids.remove(pos);
                false
            }
            None => {
                self.ids.push(id);
                true
            }
        }
    }

    /// Select every item on the loaded page (replaces the current selection).
    pub fn select_all(&mut self, page: &CatalogSnapshot) {
        self.ids = page.ids().cloned().collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids that are not on `page`. Returns how many were dropped.
    pub fn retain_loaded(&mut self, page: &CatalogSnapshot) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| page.contains(id));
        before - self.ids.len()
    }

    pub fn is_all_selected(&self, page: &CatalogSnapshot) -> bool {
        !page.is_empty() && page.ids().all(|id| self.contains(id))
    }

    pub fn contains(&self, id: &MaterialId) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialId> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
