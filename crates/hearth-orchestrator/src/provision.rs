//! Server provisioning saga.
//!
//! Stages run strictly in order:
//!
//! 1. validate the request (no side effects)
//! 2. reserve the registry row in `creating`
//! 3. resolve the boot image, create the ingress rule, allocate the instance
//! 4. attach the ids and move to `initializing`
//! 5. take the setup lock on the instance id
//! 6. dispatch the setup task
//! 7. mirror the setup workflow onto the row (best effort)
//!
//! A failure after stage 2 runs the compensator: terminate the instance and
//! delete the ingress rule when they were allocated, then mark the row
//! `create_failed`. Every compensating step is attempted even if an earlier
//! one fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use hearth_state::{
    Catalog, ComputeInfo, ComputeStatus, ServerPatch, ServerRecord, ServerRegistry, StateError,
    WorkflowLock,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::collaborators::{Execution, InstanceRequest, ProvisioningApi};
use crate::dispatcher::ActionDispatcher;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::sync_cache::SyncCache;
use crate::validate::{CreateServerRequest, ValidatedCreate, validate_create};

const SETUP_ACTION: &str = "setup";

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    pub message: String,
    pub server_name: String,
}

/// Resources allocated so far; drives the compensator.
#[derive(Debug, Default)]
struct Allocated {
    ingress_rule_id: Option<String>,
    instance_id: Option<String>,
}

#[derive(Clone)]
pub struct ProvisioningSaga {
    registry: ServerRegistry,
    lock: WorkflowLock,
    catalog: Catalog,
    provisioning: Arc<dyn ProvisioningApi>,
    dispatcher: ActionDispatcher,
    sync: SyncCache,
    owner_tag: String,
    release_on_setup_failure: bool,
}

impl ProvisioningSaga {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: ServerRegistry,
        lock: WorkflowLock,
        catalog: Catalog,
        provisioning: Arc<dyn ProvisioningApi>,
        dispatcher: ActionDispatcher,
        sync: SyncCache,
        owner_tag: String,
        release_on_setup_failure: bool,
    ) -> Self {
        Self {
            registry,
            lock,
            catalog,
            provisioning,
            dispatcher,
            sync,
            owner_tag,
            release_on_setup_failure,
        }
    }

    pub async fn create(&self, request: &CreateServerRequest) -> OrchestratorResult<Created> {
        // Fail fast on a taken name before validation reaches the provider.
        // The conditional create below still decides races.
        if self.registry.get(&request.server_name)?.is_some() {
            return Err(OrchestratorError::AlreadyExists("Server".into()));
        }
        let validated = validate_create(request, &self.catalog, self.provisioning.as_ref()).await?;

        self.registry
            .create(&ServerRecord::creating(&validated.name, &validated.game_id))
            .map_err(|e| match e {
                StateError::AlreadyExists(_) => OrchestratorError::AlreadyExists("Server".into()),
                other => other.into(),
            })?;
        info!(name = %validated.name, game = %validated.game_id, "server reserved");

        let mut allocated = Allocated::default();
        match self.run_stages(&validated, &mut allocated).await {
            Ok(execution) => {
                self.dispatcher
                    .record_workflow(&validated.name, SETUP_ACTION, &execution);
                info!(name = %validated.name, "server created, setup running");
                Ok(Created {
                    message: "Server created. Initializing.".to_string(),
                    server_name: validated.name,
                })
            }
            Err(cause) => Err(self.compensate(&validated, &allocated, cause).await),
        }
    }

    async fn run_stages(
        &self,
        validated: &ValidatedCreate,
        allocated: &mut Allocated,
    ) -> OrchestratorResult<Execution> {
        let image_id = self.sync.image_id().await?;

        let rule_name = format!(
            "{}-{}-rule-{}",
            self.owner_tag,
            validated.name,
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let rule_id = self
            .provisioning
            .create_ingress_rule(&rule_name, &validated.ports)
            .await
            .map_err(OrchestratorError::Provisioning)?;
        allocated.ingress_rule_id = Some(rule_id.clone());

        let request = InstanceRequest {
            image_id,
            instance_type: validated.instance_type.clone(),
            ingress_rule_ids: vec![rule_id.clone()],
            storage_gib: validated.storage_gib,
            tags: BTreeMap::from([
                ("Name".to_string(), format!("{}-{}", self.owner_tag, validated.name)),
                ("OwnedBy".to_string(), self.owner_tag.clone()),
            ]),
        };
        let instance_id = self
            .provisioning
            .allocate_instance(&request)
            .await
            .map_err(OrchestratorError::Provisioning)?;
        allocated.instance_id = Some(instance_id.clone());
        info!(name = %validated.name, %instance_id, %rule_id, "instance allocated");

        self.registry.merge(
            &validated.name,
            &ServerPatch::compute(ComputeInfo {
                instance_id: Some(instance_id.clone()),
                instance_type: Some(validated.instance_type.clone()),
                ingress_rule_id: Some(rule_id),
                status: ComputeStatus::Initializing,
                message: None,
            }),
        )?;

        self.lock.acquire(&instance_id, SETUP_ACTION)?;

        let payload = json!({
            "serverName": validated.name,
            "instanceId": instance_id,
            "gameId": validated.game_id,
        });
        let setup_task = self.dispatcher.tasks().setup.clone();
        match self.dispatcher.run_task(&setup_task, payload).await {
            Ok(execution) => Ok(execution),
            Err(e) => {
                if self.release_on_setup_failure {
                    if let Err(release_err) = self.lock.release(&instance_id) {
                        warn!(%instance_id, error = %release_err, "failed to release setup lock");
                    }
                } else {
                    warn!(%instance_id, "setup dispatch failed, setup lock left in place");
                }
                Err(e)
            }
        }
    }

    async fn compensate(
        &self,
        validated: &ValidatedCreate,
        allocated: &Allocated,
        cause: OrchestratorError,
    ) -> OrchestratorError {
        // The row keeps the full diagnostic; the caller only sees the public text.
        let diagnostic = cause.to_string();
        let reason = cause.public_message();
        warn!(name = %validated.name, %diagnostic, "provisioning failed, compensating");
        let mut clean = true;

        if let Some(instance_id) = &allocated.instance_id {
            if let Err(e) = self.provisioning.terminate_instance(instance_id).await {
                error!(%instance_id, error = %e, "failed to terminate instance");
                clean = false;
            }
        }
        if let Some(rule_id) = &allocated.ingress_rule_id {
            if let Err(e) = self.provisioning.delete_ingress_rule(rule_id).await {
                error!(%rule_id, error = %e, "failed to delete ingress rule");
                clean = false;
            }
        }

        let failed = ComputeInfo {
            instance_id: allocated.instance_id.clone(),
            instance_type: Some(validated.instance_type.clone()),
            ingress_rule_id: allocated.ingress_rule_id.clone(),
            status: ComputeStatus::CreateFailed,
            message: Some(diagnostic),
        };
        if let Err(e) = self.registry.merge(&validated.name, &ServerPatch::compute(failed)) {
            error!(name = %validated.name, error = %e, "failed to mark server create_failed");
            clean = false;
        }

        if clean {
            OrchestratorError::CreateFailed { reason }
        } else {
            OrchestratorError::CleanupFailed { reason }
        }
    }
}
