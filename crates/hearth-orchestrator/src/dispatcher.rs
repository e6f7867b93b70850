//! Per-server action dispatch.
//!
//! Tracked actions take the single-flight lock keyed by the server's
//! instance id, hand the work to the task executor, then mirror the
//! execution onto the server's `workflow` sub-object. The lock record is
//! authoritative for "in flight"; the mirror is best effort.

use std::sync::Arc;

use hearth_core::config::TaskNames;
use hearth_state::{
    ServerPatch, ServerRecord, ServerRegistry, StateError, WorkflowInfo, WorkflowLock,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::action::ServerAction;
use crate::collaborators::{Execution, ProvisioningApi, TaskExecutor};
use crate::error::{OrchestratorError, OrchestratorResult};

/// What a successful dispatch did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub message: String,
    /// Present for actions handed to the executor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
}

impl ActionOutcome {
    fn done(message: &str) -> Self {
        Self {
            message: message.to_string(),
            execution_id: None,
        }
    }
}

#[derive(Clone)]
pub struct ActionDispatcher {
    registry: ServerRegistry,
    lock: WorkflowLock,
    executor: Arc<dyn TaskExecutor>,
    provisioning: Arc<dyn ProvisioningApi>,
    tasks: TaskNames,
    backup_bucket: String,
}

impl ActionDispatcher {
    pub fn new(
        registry: ServerRegistry,
        lock: WorkflowLock,
        executor: Arc<dyn TaskExecutor>,
        provisioning: Arc<dyn ProvisioningApi>,
        tasks: TaskNames,
        backup_bucket: String,
    ) -> Self {
        Self {
            registry,
            lock,
            executor,
            provisioning,
            tasks,
            backup_bucket,
        }
    }

    pub fn tasks(&self) -> &TaskNames {
        &self.tasks
    }

    /// Run `action` against the server called `name`.
    pub async fn dispatch(
        &self,
        name: &str,
        action: ServerAction,
    ) -> OrchestratorResult<ActionOutcome> {
        let server = self
            .registry
            .get(name)?
            .ok_or_else(|| OrchestratorError::NotFound("Server".into()))?;
        let instance_id = server
            .instance_id()
            .ok_or_else(|| OrchestratorError::NoComputeId(name.to_string()))?
            .to_string();

        if !action.is_tracked() {
            return self.run_maintenance(&server, &instance_id, action).await;
        }

        match self.lock.acquire(&instance_id, action.name()) {
            Ok(_) => {}
            Err(StateError::AlreadyLocked(_)) => {
                info!(%name, action = action.name(), "action rejected, lock held");
                return Err(OrchestratorError::ActionInProgress(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let payload = self.payload(&server, &instance_id, action);
        let task = action.task(&self.tasks).unwrap_or(action.name());
        let execution = match self.run_task(task, payload).await {
            Ok(execution) => execution,
            Err(e) => {
                if let Err(release_err) = self.lock.release(&instance_id) {
                    warn!(%instance_id, error = %release_err, "failed to release lock after dispatch failure");
                }
                return Err(e);
            }
        };

        self.record_workflow(name, action.name(), &execution);
        Ok(ActionOutcome {
            message: "Started".to_string(),
            execution_id: Some(execution.execution_ref),
        })
    }

    /// Hand a task to the executor.
    pub async fn run_task(&self, task: &str, payload: Value) -> OrchestratorResult<Execution> {
        let execution = self
            .executor
            .dispatch(task, payload)
            .await
            .map_err(OrchestratorError::Dispatch)?;
        info!(%task, execution = %execution.execution_ref, "task dispatched");
        Ok(execution)
    }

    /// Mirror a started execution onto the server row. Failures are logged
    /// and swallowed: the action is already running.
    pub fn record_workflow(&self, name: &str, action: &str, execution: &Execution) {
        let workflow = WorkflowInfo::running(action, &execution.execution_ref, execution.started_at);
        if let Err(e) = self.registry.merge(name, &ServerPatch::workflow(workflow)) {
            warn!(%name, %action, error = %e, "failed to mirror workflow onto server");
        }
    }

    fn payload(&self, server: &ServerRecord, instance_id: &str, action: ServerAction) -> Value {
        let mut payload = json!({
            "serverName": server.name,
            "instanceId": instance_id,
        });
        match action {
            ServerAction::Stop { should_backup } => {
                payload["shouldBackup"] = json!(should_backup);
                payload["backupBucket"] = json!(self.backup_bucket);
            }
            ServerAction::Backup => {
                payload["backupBucket"] = json!(self.backup_bucket);
            }
            ServerAction::Terminate => {
                if let Some(rule_id) = server.ingress_rule_id() {
                    payload["ingressRuleId"] = json!(rule_id);
                }
            }
            _ => {}
        }
        payload
    }

    async fn run_maintenance(
        &self,
        server: &ServerRecord,
        instance_id: &str,
        action: ServerAction,
    ) -> OrchestratorResult<ActionOutcome> {
        info!(name = %server.name, %instance_id, action = action.name(), "maintenance action");
        match action {
            ServerAction::RemoveLock => {
                self.lock.release(instance_id)?;
                Ok(ActionOutcome::done("Workflow lock removed"))
            }
            ServerAction::ForceStartInstance => {
                self.provisioning
                    .start_instance(instance_id)
                    .await
                    .map_err(OrchestratorError::Provisioning)?;
                Ok(ActionOutcome::done("Starting"))
            }
            ServerAction::ForceStopInstance => {
                self.provisioning
                    .stop_instance(instance_id)
                    .await
                    .map_err(OrchestratorError::Provisioning)?;
                Ok(ActionOutcome::done("Stopping"))
            }
            ServerAction::ForceStopService => {
                let payload = self.payload(server, instance_id, action);
                let execution = self.run_task(&self.tasks.stop_service, payload).await?;
                Ok(ActionOutcome {
                    message: "Stopping game server".to_string(),
                    execution_id: Some(execution.execution_ref),
                })
            }
            tracked => Err(OrchestratorError::InvalidRequest(format!(
                "maintenance action {}",
                tracked.name()
            ))),
        }
    }
}
