//! StateStore — redb-backed conditional key/value persistence for Hearth.
//!
//! Provides typed get / scan / put / update / delete over the tables in
//! [`Table`]. Values are JSON-serialized into redb's `&[u8]` value columns.
//! Writes may carry a [`Condition`]; it is evaluated inside the same write
//! transaction as the write itself, and redb admits a single writer at a
//! time, so check-and-write is atomic for every handle on the database.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::condition::Condition;
use crate::error::{StateError, StateResult};
use crate::tables::Table;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in Table::ALL {
            txn.open_table(table.definition()).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Read one item.
    pub fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table.definition()).map_err(map_err!(Table))?;
        match t.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let item = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// Read every item in a table, ordered by key.
    pub fn scan<T: DeserializeOwned>(&self, table: Table) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table.definition()).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in t.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?);
        }
        Ok(results)
    }

    /// Write a whole item, optionally guarded by a precondition.
    pub fn put<T: Serialize>(
        &self,
        table: Table,
        key: &str,
        item: &T,
        condition: Option<&Condition>,
    ) -> StateResult<()> {
        let value = serde_json::to_value(item).map_err(map_err!(Serialize))?;
        self.update(table, key, condition, |_: Option<Value>| value)
            .map(|_| ())
    }

    /// Read-modify-write in a single transaction.
    ///
    /// `apply` receives the stored item (if any) and returns the item to
    /// write. When `condition` does not hold, nothing is written and
    /// [`StateError::ConditionFailed`] is returned.
    pub fn update<T, F>(
        &self,
        table: Table,
        key: &str,
        condition: Option<&Condition>,
        apply: F,
    ) -> StateResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> T,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let written = {
            let mut t = txn.open_table(table.definition()).map_err(map_err!(Table))?;
            let existing: Option<Vec<u8>> = t
                .get(key)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value().to_vec());

            let existing_json: Option<Value> = existing
                .as_deref()
                .map(serde_json::from_slice)
                .transpose()
                .map_err(map_err!(Deserialize))?;

            if condition.is_some_and(|c| !c.evaluate(existing_json.as_ref())) {
                None
            } else {
                let current: Option<T> = existing_json
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(map_err!(Deserialize))?;
                let next = apply(current);
                let bytes = serde_json::to_vec(&next).map_err(map_err!(Serialize))?;
                t.insert(key, bytes.as_slice()).map_err(map_err!(Write))?;
                Some(next)
            }
        };

        match written {
            Some(item) => {
                txn.commit().map_err(map_err!(Transaction))?;
                debug!(table = table.name(), %key, "item written");
                Ok(item)
            }
            None => {
                txn.abort().map_err(map_err!(Transaction))?;
                debug!(table = table.name(), %key, "precondition failed");
                Err(StateError::ConditionFailed {
                    table: table.name(),
                    key: key.to_string(),
                })
            }
        }
    }

    /// Delete an item. Returns true if it existed.
    pub fn delete(&self, table: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut t = txn.open_table(table.definition()).map_err(map_err!(Table))?;
            existed = t.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = table.name(), %key, existed, "item deleted");
        Ok(existed)
    }

    /// Replace the whole contents of a table in one transaction.
    pub fn replace_all<'a, T, I>(&self, table: Table, items: I) -> StateResult<usize>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = (&'a str, &'a T)>,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut count = 0;
        {
            let mut t = txn.open_table(table.definition()).map_err(map_err!(Table))?;
            let stale: Vec<String> = t
                .iter()
                .map_err(map_err!(Read))?
                .map(|entry| entry.map(|(k, _)| k.value().to_string()))
                .collect::<Result<_, _>>()
                .map_err(map_err!(Read))?;
            for key in &stale {
                t.remove(key.as_str()).map_err(map_err!(Write))?;
            }
            for (key, item) in items {
                let bytes = serde_json::to_vec(item).map_err(map_err!(Serialize))?;
                t.insert(key, bytes.as_slice()).map_err(map_err!(Write))?;
                count += 1;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = table.name(), count, "table replaced");
        Ok(count)
    }
}
