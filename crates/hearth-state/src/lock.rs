//! Single-flight workflow lock over the `locks` table.
//!
//! At most one record exists per resource id. A plain [`WorkflowLock::acquire`]
//! only succeeds when no record exists; [`WorkflowLock::acquire_or_reclaim`]
//! also takes over a record that a [`Reclaim`] policy says is finished or
//! stale. Both are a single conditional write.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info};

use crate::condition::Condition;
use crate::error::{StateError, StateResult};
use crate::store::StateStore;
use crate::tables::Table;
use crate::types::{LockRecord, LockStatus, epoch_millis};

/// When an existing lock record may be taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclaim {
    /// The previous run failed, or was last touched longer ago than the cooldown.
    FailedOrOlderThan(Duration),
    /// The last success is older than `min_interval` (or absent), and the
    /// previous run is not still running unless it stalled for `stale_after`.
    RateLimited {
        min_interval: Duration,
        stale_after: Duration,
    },
}

impl Reclaim {
    fn condition(self, now: u64) -> Condition {
        match self {
            Reclaim::FailedOrOlderThan(cooldown) => Condition::ItemNotExists
                .or(Condition::equals("status", LockStatus::Failed.as_str()))
                .or(Condition::less_than("lastUpdatedAt", before(now, cooldown))),
            Reclaim::RateLimited {
                min_interval,
                stale_after,
            } => {
                let due = Condition::attribute_not_exists("lastSuccessAt")
                    .or(Condition::less_than("lastSuccessAt", before(now, min_interval)));
                let idle = Condition::not_equals("status", LockStatus::Running.as_str())
                    .or(Condition::less_than("lastUpdatedAt", before(now, stale_after)));
                Condition::ItemNotExists.or(due.and(idle))
            }
        }
    }
}

fn before(now: u64, window: Duration) -> u64 {
    now.saturating_sub(window.as_millis() as u64)
}

/// How a locked job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// Record success and replace the payload.
    Success(BTreeMap<String, String>),
    Failed,
}

/// Distributed single-flight lock keyed by resource id.
#[derive(Clone)]
pub struct WorkflowLock {
    store: StateStore,
}

impl WorkflowLock {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Take the lock if no record exists for `resource_id`.
    ///
    /// Fails with [`StateError::AlreadyLocked`] when a record exists,
    /// regardless of its status.
    pub fn acquire(&self, resource_id: &str, action: &str) -> StateResult<LockRecord> {
        let record = LockRecord::running(resource_id, action, epoch_millis());
        match self
            .store
            .put(Table::Locks, resource_id, &record, Some(&Condition::ItemNotExists))
        {
            Ok(()) => {
                debug!(%resource_id, %action, "lock acquired");
                Ok(record)
            }
            Err(e) if e.is_condition_failed() => {
                Err(StateError::AlreadyLocked(resource_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Take the lock if absent, or take over a record the policy allows.
    ///
    /// A taken-over record keeps its payload and `lastSuccessAt`, so callers
    /// can read the previous result back from the returned record.
    pub fn acquire_or_reclaim(
        &self,
        resource_id: &str,
        action: &str,
        policy: Reclaim,
    ) -> StateResult<LockRecord> {
        let now = epoch_millis();
        let condition = policy.condition(now);
        let result = self.store.update(
            Table::Locks,
            resource_id,
            Some(&condition),
            |previous: Option<LockRecord>| {
                let mut record = LockRecord::running(resource_id, action, now);
                if let Some(previous) = previous {
                    record.last_success_at = previous.last_success_at;
                    record.payload = previous.payload;
                }
                record
            },
        );
        match result {
            Ok(record) => {
                info!(%resource_id, %action, "lock acquired for sync job");
                Ok(record)
            }
            Err(e) if e.is_condition_failed() => {
                Err(StateError::AlreadyLocked(resource_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Record how a reclaimable job ended. The record stays in place.
    pub fn complete(&self, resource_id: &str, outcome: LockOutcome) -> StateResult<LockRecord> {
        let now = epoch_millis();
        let result = self.store.update(
            Table::Locks,
            resource_id,
            Some(&Condition::ItemExists),
            |current: Option<LockRecord>| {
                let mut record =
                    current.unwrap_or_else(|| LockRecord::running(resource_id, "", now));
                record.last_updated_at = now;
                match &outcome {
                    LockOutcome::Success(payload) => {
                        record.status = LockStatus::Success;
                        record.last_success_at = Some(now);
                        record.payload = payload.clone();
                    }
                    LockOutcome::Failed => record.status = LockStatus::Failed,
                }
                record
            },
        );
        match result {
            Err(e) if e.is_condition_failed() => Err(StateError::NotFound(format!(
                "lock {resource_id}"
            ))),
            other => other,
        }
    }

    /// Delete the lock record. Returns whether one existed.
    pub fn release(&self, resource_id: &str) -> StateResult<bool> {
        let existed = self.store.delete(Table::Locks, resource_id)?;
        debug!(%resource_id, existed, "lock released");
        Ok(existed)
    }

    pub fn get(&self, resource_id: &str) -> StateResult<Option<LockRecord>> {
        self.store.get(Table::Locks, resource_id)
    }

    /// Overwrite a record as-is. Used to seed state in operator tooling and tests.
    pub fn put_record(&self, record: &LockRecord) -> StateResult<()> {
        self.store
            .put(Table::Locks, &record.resource_id, record, None)
    }
}
