//! The game catalog table.

use tracing::info;

use crate::error::StateResult;
use crate::store::StateStore;
use crate::tables::Table;
use crate::types::CatalogEntry;

#[derive(Clone)]
pub struct Catalog {
    store: StateStore,
}

impl Catalog {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn list(&self) -> StateResult<Vec<CatalogEntry>> {
        self.store.scan(Table::Catalog)
    }

    pub fn get(&self, id: &str) -> StateResult<Option<CatalogEntry>> {
        self.store.get(Table::Catalog, id)
    }

    /// Swap the whole catalog for `entries` atomically.
    pub fn replace(&self, entries: &[CatalogEntry]) -> StateResult<usize> {
        let count = self
            .store
            .replace_all(Table::Catalog, entries.iter().map(|e| (e.id.as_str(), e)))?;
        info!(count, "catalog replaced");
        Ok(count)
    }
}
