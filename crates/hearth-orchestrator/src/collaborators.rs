//! Contracts for the out-of-process collaborators the orchestrator drives.
//!
//! Implementations live in `hearth-remote` (HTTP) and in the test fakes.
//! Methods return boxed futures so the traits stay object-safe and can be
//! shared as `Arc<dyn ...>` across request handlers.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use hearth_core::config::ImageFilterConfig;
use hearth_state::PortRule;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Boxed future alias used by every collaborator method.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected by upstream: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Everything needed to allocate one compute instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRequest {
    pub image_id: String,
    pub instance_type: String,
    pub ingress_rule_ids: Vec<String>,
    pub storage_gib: u32,
    pub tags: BTreeMap<String, String>,
}

/// A boot image candidate returned by the provisioning API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineImage {
    pub image_id: String,
    /// RFC 3339 UTC timestamp, when the provider reports one.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Reference to an accepted executor run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub execution_ref: String,
    /// Epoch millis.
    pub started_at: u64,
}

/// Compute provisioning API.
pub trait ProvisioningApi: Send + Sync {
    /// Whether the provider recognizes the instance type.
    fn describe_instance_type<'a>(
        &'a self,
        instance_type: &'a str,
    ) -> BoxFuture<'a, CollaboratorResult<bool>>;

    /// Create an ingress rule set. An empty `rules` slice creates a rule set
    /// with no permissions.
    fn create_ingress_rule<'a>(
        &'a self,
        name: &'a str,
        rules: &'a [PortRule],
    ) -> BoxFuture<'a, CollaboratorResult<String>>;

    fn delete_ingress_rule<'a>(&'a self, rule_id: &'a str) -> BoxFuture<'a, CollaboratorResult<()>>;

    fn allocate_instance<'a>(
        &'a self,
        request: &'a InstanceRequest,
    ) -> BoxFuture<'a, CollaboratorResult<String>>;

    fn terminate_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> BoxFuture<'a, CollaboratorResult<()>>;

    fn start_instance<'a>(&'a self, instance_id: &'a str) -> BoxFuture<'a, CollaboratorResult<()>>;

    fn stop_instance<'a>(&'a self, instance_id: &'a str) -> BoxFuture<'a, CollaboratorResult<()>>;

    fn list_recent_images<'a>(
        &'a self,
        filter: &'a ImageFilterConfig,
    ) -> BoxFuture<'a, CollaboratorResult<Vec<MachineImage>>>;
}

/// Fire-and-forget task executor. Completion is never awaited here.
pub trait TaskExecutor: Send + Sync {
    fn dispatch<'a>(&'a self, task: &'a str, payload: Value)
    -> BoxFuture<'a, CollaboratorResult<Execution>>;
}

/// Release feed publishing the game catalog.
pub trait ReleaseFeed: Send + Sync {
    fn latest_release_tag(&self) -> BoxFuture<'_, CollaboratorResult<String>>;

    /// Raw catalog manifests of a release, one JSON object per game.
    fn download_manifests<'a>(&'a self, tag: &'a str)
    -> BoxFuture<'a, CollaboratorResult<Vec<Value>>>;
}
