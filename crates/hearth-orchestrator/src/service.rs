//! The request surface, with role checks, over every orchestrator component.

use std::sync::Arc;

use hearth_core::{Caller, HearthConfig};
use hearth_state::{Catalog, Reclaim, ServerRecord, ServerRegistry, StateStore, WorkflowLock};
use tracing::{info, warn};

use crate::action::ServerAction;
use crate::collaborators::{ProvisioningApi, ReleaseFeed, TaskExecutor};
use crate::dispatcher::{ActionDispatcher, ActionOutcome};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::provision::{Created, ProvisioningSaga};
use crate::refresh::{ListQuery, StatusRefresher};
use crate::sync_cache::{CatalogSnapshot, SyncCache};
use crate::validate::CreateServerRequest;

#[derive(Clone)]
pub struct HearthService {
    lock: WorkflowLock,
    dispatcher: ActionDispatcher,
    saga: ProvisioningSaga,
    refresher: StatusRefresher,
    sync: SyncCache,
}

impl HearthService {
    pub fn new(
        store: StateStore,
        config: &HearthConfig,
        provisioning: Arc<dyn ProvisioningApi>,
        executor: Arc<dyn TaskExecutor>,
        feed: Arc<dyn ReleaseFeed>,
    ) -> Self {
        let registry = ServerRegistry::new(store.clone());
        let lock = WorkflowLock::new(store.clone());
        let catalog = Catalog::new(store);

        let dispatcher = ActionDispatcher::new(
            registry.clone(),
            lock.clone(),
            executor,
            provisioning.clone(),
            config.executor.tasks.clone(),
            config.backup.bucket.clone(),
        );
        let sync = SyncCache::new(
            lock.clone(),
            catalog.clone(),
            feed,
            provisioning.clone(),
            config.provisioning.image.clone(),
            config.catalog_cooldown(),
            Reclaim::RateLimited {
                min_interval: config.image_min_interval(),
                stale_after: config.image_stale_after(),
            },
        );
        let saga = ProvisioningSaga::new(
            registry.clone(),
            lock.clone(),
            catalog,
            provisioning,
            dispatcher.clone(),
            sync.clone(),
            config.provisioning.owner_tag.clone(),
            config.locks.release_on_setup_failure,
        );
        let refresher = StatusRefresher::new(registry, dispatcher.clone(), config.probe_window());

        Self {
            lock,
            dispatcher,
            saga,
            refresher,
            sync,
        }
    }

    /// Admin only.
    pub async fn create_server(
        &self,
        caller: &Caller,
        request: &CreateServerRequest,
    ) -> OrchestratorResult<Created> {
        require(caller.role.is_admin())?;
        info!(user = %caller.username, name = %request.server_name, "create server");
        self.saga.create(request).await
    }

    /// Managers and admins; terminate is admin only.
    pub async fn dispatch_action(
        &self,
        caller: &Caller,
        name: &str,
        action: ServerAction,
    ) -> OrchestratorResult<ActionOutcome> {
        require(caller.role.can_operate())?;
        if action.requires_admin() {
            require(caller.role.is_admin())?;
        }
        info!(user = %caller.username, %name, action = action.name(), "server action");
        self.dispatcher.dispatch(name, action).await
    }

    /// Any signed-in role.
    pub async fn list_servers(
        &self,
        _caller: &Caller,
        query: &ListQuery,
    ) -> OrchestratorResult<Vec<ServerRecord>> {
        self.refresher.list(query).await
    }

    /// Clear a stuck lock by instance id. Does not cancel the underlying work.
    pub fn remove_lock(&self, caller: &Caller, instance_id: &str) -> OrchestratorResult<bool> {
        require(caller.role.can_operate())?;
        let existed = self.lock.release(instance_id)?;
        warn!(user = %caller.username, %instance_id, existed, "workflow lock removed by operator");
        Ok(existed)
    }

    /// Any signed-in role.
    pub async fn list_games(&self, _caller: &Caller) -> OrchestratorResult<CatalogSnapshot> {
        self.sync.sync_catalog().await
    }

    /// Admin only: sync the catalog and make sure a boot image id is cached.
    pub async fn prepare_create(&self, caller: &Caller) -> OrchestratorResult<CatalogSnapshot> {
        require(caller.role.is_admin())?;
        let snapshot = self.sync.sync_catalog().await?;
        if let Some(message) = &snapshot.message {
            warn!(%message, "catalog sync degraded, continuing");
        }
        self.sync.refresh_image_id().await?;
        Ok(snapshot)
    }
}

fn require(allowed: bool) -> OrchestratorResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(OrchestratorError::Forbidden)
    }
}
