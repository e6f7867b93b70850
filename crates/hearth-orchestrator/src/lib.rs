//! hearth-orchestrator — resource-lifecycle coordination for Hearth.
//!
//! Every operation here is stateless between calls: coordination between
//! concurrent callers happens only through conditional writes in
//! `hearth-state`. Long-running work is handed to an out-of-process
//! [`TaskExecutor`] and observed later through status probes.
//!
//! ```text
//! HearthService (role checks, request surface)
//!   ├── ActionDispatcher  (lock → dispatch → workflow mirror)
//!   ├── ProvisioningSaga  (validate → reserve → allocate → setup, with compensation)
//!   ├── StatusRefresher   (probe throttling on list)
//!   └── SyncCache         (catalog sync + image id resolution behind reclaimable locks)
//!
//! RefreshPoller (client side: re-poll after mutations, reconcile by name)
//! ```

pub mod action;
pub mod collaborators;
pub mod dispatcher;
pub mod error;
pub mod manifest;
pub mod poller;
pub mod provision;
pub mod refresh;
pub mod service;
pub mod sync_cache;
pub mod validate;

pub use action::ServerAction;
pub use collaborators::{
    BoxFuture, CollaboratorError, CollaboratorResult, Execution, InstanceRequest, MachineImage,
    ProvisioningApi, ReleaseFeed, TaskExecutor,
};
pub use dispatcher::{ActionDispatcher, ActionOutcome};
pub use error::{ErrorKind, OrchestratorError, OrchestratorResult};
pub use poller::{PollerSettings, RefreshPoller, ServerSource};
pub use provision::{Created, ProvisioningSaga};
pub use refresh::{ListQuery, StatusRefresher};
pub use service::HearthService;
pub use sync_cache::{CatalogSnapshot, SyncCache};
pub use validate::{CreateServerRequest, PortInput};
