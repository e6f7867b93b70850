//! Server registry over the `servers` table.

use tracing::{debug, warn};

use crate::condition::Condition;
use crate::error::{StateError, StateResult};
use crate::store::StateStore;
use crate::tables::Table;
use crate::types::{ServerPatch, ServerRecord};

#[derive(Clone)]
pub struct ServerRegistry {
    store: StateStore,
}

impl ServerRegistry {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Insert a new record. Fails with [`StateError::AlreadyExists`] if the name is taken.
    pub fn create(&self, record: &ServerRecord) -> StateResult<()> {
        match self.store.put(
            Table::Servers,
            &record.name,
            record,
            Some(&Condition::ItemNotExists),
        ) {
            Ok(()) => {
                debug!(name = %record.name, "server record created");
                Ok(())
            }
            Err(e) if e.is_condition_failed() => Err(StateError::AlreadyExists(record.name.clone())),
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, name: &str) -> StateResult<Option<ServerRecord>> {
        self.store.get(Table::Servers, name)
    }

    /// Fetch several records. Missing names are skipped and per-item read
    /// failures are logged and skipped.
    pub fn get_many(&self, names: &[String]) -> Vec<ServerRecord> {
        names
            .iter()
            .filter_map(|name| match self.get(name) {
                Ok(found) => found,
                Err(e) => {
                    warn!(%name, error = %e, "failed to read server record");
                    None
                }
            })
            .collect()
    }

    pub fn scan_all(&self) -> StateResult<Vec<ServerRecord>> {
        self.store.scan(Table::Servers)
    }

    /// Apply a patch to an existing record. Each present sub-object replaces
    /// the stored one. Fails with [`StateError::NotFound`] if the row is gone.
    pub fn merge(&self, name: &str, patch: &ServerPatch) -> StateResult<ServerRecord> {
        let result = self.store.update(
            Table::Servers,
            name,
            Some(&Condition::ItemExists),
            |current: Option<ServerRecord>| {
                let mut record = current.unwrap_or_else(|| ServerRecord {
                    name: name.to_string(),
                    game: None,
                    compute: None,
                    status: None,
                    workflow: None,
                });
                record.apply(patch);
                record
            },
        );
        match result {
            Err(e) if e.is_condition_failed() => Err(StateError::NotFound(format!("server {name}"))),
            other => other,
        }
    }

    /// Stamp `status.lastRequest = at` unless another caller stamped the row
    /// after `cutoff`. Only the stamp is written; the rest of the status
    /// sub-object is whatever is stored at commit time.
    pub fn stamp_request(&self, name: &str, at: u64, cutoff: u64) -> StateResult<ServerRecord> {
        let still_stale = Condition::attribute_not_exists("status.lastRequest")
            .or(Condition::less_than("status.lastRequest", cutoff));
        self.store.update(
            Table::Servers,
            name,
            Some(&Condition::ItemExists.and(still_stale)),
            |current: Option<ServerRecord>| {
                let mut record = current.unwrap_or_else(|| ServerRecord::creating(name, ""));
                record.status.get_or_insert_with(Default::default).last_request = Some(at);
                record
            },
        )
    }
}
