//! hearth-state — conditional state store for Hearth.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for server records, lock records, and the game catalog.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Every write may carry a [`Condition`] that is evaluated against the stored
//! JSON inside the same write transaction, so "insert if absent" and
//! "update if stale" are atomic across every task sharing the store.
//!
//! ```text
//! StateStore (get / scan / put / update / delete, with preconditions)
//!   ├── WorkflowLock   (locks table: single-flight acquire, reclaim, release)
//!   ├── ServerRegistry (servers table: create, get, get_many, scan, merge)
//!   └── Catalog        (catalog table: list, get, full replace)
//! ```
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod catalog;
pub mod condition;
pub mod error;
pub mod lock;
pub mod registry;
pub mod store;
pub mod tables;
pub mod types;

pub use catalog::Catalog;
pub use condition::Condition;
pub use error::{StateError, StateResult};
pub use lock::{LockOutcome, Reclaim, WorkflowLock};
pub use registry::ServerRegistry;
pub use store::StateStore;
pub use tables::Table;
pub use types::*;
