//! Domain types for the Hearth state store.
//!
//! These types represent the persisted state of managed servers, lock
//! records, and catalog entries. All types serialize to camelCase JSON for
//! storage in redb tables; timestamps are epoch milliseconds.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// User-chosen server name (immutable, `^[A-Za-z0-9_-]+$`).
pub type ServerName = String;

/// Key of a lock record: an instance id or a singleton job sentinel.
pub type ResourceId = String;

// ── Server ────────────────────────────────────────────────────────

/// Durable record for one managed server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    pub name: ServerName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<GameRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<ComputeInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusInfo>,
    /// Present iff an action has ever been dispatched for this server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowInfo>,
}

/// Catalog entry a server was created from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameRef {
    pub id: String,
}

/// Provider-side view of the server's machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComputeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_rule_id: Option<String>,
    #[serde(default)]
    pub status: ComputeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Coarse lifecycle of the machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeStatus {
    #[default]
    Creating,
    Initializing,
    Running,
    Stopped,
    CreateFailed,
    Terminated,
    /// Any value written by an out-of-process task that this build does not know.
    #[serde(other)]
    Unknown,
}

/// Last observed health, as reported by status probes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_backup: Option<u64>,
    /// Last confirmed probe result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<u64>,
    /// Last probe dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_request: Option<u64>,
}

/// Best-effort mirror of the most recently dispatched action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInfo {
    pub current_task: String,
    pub execution_id: String,
    pub status: WorkflowStatus,
    pub last_updated: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl WorkflowInfo {
    pub fn running(task: &str, execution_id: &str, started_at: u64) -> Self {
        Self {
            current_task: task.to_string(),
            execution_id: execution_id.to_string(),
            status: WorkflowStatus::Running,
            last_updated: started_at,
            message: None,
        }
    }
}

/// Partial update of a server record.
///
/// Each present field replaces the stored sub-object wholesale; leaf fields
/// are never merged individually.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerPatch {
    pub compute: Option<ComputeInfo>,
    pub status: Option<StatusInfo>,
    pub workflow: Option<WorkflowInfo>,
}

impl ServerPatch {
    pub fn compute(compute: ComputeInfo) -> Self {
        Self {
            compute: Some(compute),
            ..Self::default()
        }
    }

    pub fn status(status: StatusInfo) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn workflow(workflow: WorkflowInfo) -> Self {
        Self {
            workflow: Some(workflow),
            ..Self::default()
        }
    }
}

impl ServerRecord {
    /// A fresh row as written by the first provisioning stage.
    pub fn creating(name: &str, game_id: &str) -> Self {
        Self {
            name: name.to_string(),
            game: Some(GameRef {
                id: game_id.to_string(),
            }),
            compute: Some(ComputeInfo::default()),
            status: None,
            workflow: None,
        }
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.compute.as_ref()?.instance_id.as_deref()
    }

    pub fn ingress_rule_id(&self) -> Option<&str> {
        self.compute.as_ref()?.ingress_rule_id.as_deref()
    }

    pub fn has_running_workflow(&self) -> bool {
        self.workflow
            .as_ref()
            .is_some_and(|w| w.status == WorkflowStatus::Running)
    }

    /// A probe was dispatched and no newer result has landed yet.
    pub fn probe_outstanding(&self) -> bool {
        let Some(status) = &self.status else {
            return false;
        };
        match (status.last_request, status.last_updated) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(requested), Some(updated)) => requested > updated,
        }
    }

    /// Apply a patch in memory with the same semantics the store uses.
    pub fn apply(&mut self, patch: &ServerPatch) {
        if let Some(compute) = &patch.compute {
            self.compute = Some(compute.clone());
        }
        if let Some(status) = &patch.status {
            self.status = Some(status.clone());
        }
        if let Some(workflow) = &patch.workflow {
            self.workflow = Some(workflow.clone());
        }
    }
}

// ── Lock ──────────────────────────────────────────────────────────

/// A single-flight lock record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub resource_id: ResourceId,
    /// What is being guarded ("start", "setup", "catalog-sync", ...).
    pub action: String,
    pub status: LockStatus,
    pub started_at: u64,
    pub last_updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<u64>,
    /// Job-specific payload such as a resolved image id or catalog version.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub payload: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    Running,
    Success,
    Failed,
}

impl LockStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LockStatus::Running => "running",
            LockStatus::Success => "success",
            LockStatus::Failed => "failed",
        }
    }
}

impl LockRecord {
    pub fn running(resource_id: &str, action: &str, now: u64) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            action: action.to_string(),
            status: LockStatus::Running,
            started_at: now,
            last_updated_at: now,
            last_success_at: None,
            payload: BTreeMap::new(),
        }
    }
}

// ── Catalog ───────────────────────────────────────────────────────

/// A game that servers can be created from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub display_name: String,
    pub compute: CatalogCompute,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terms_of_service: Vec<TermsOfService>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<OperatorMessage>,
}

/// Recommended machine shape for a catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCompute {
    pub instance_type: String,
    pub minimum_instance_type: String,
    /// Root volume size in GiB.
    pub storage: u32,
    pub ports: Vec<PortRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermsOfService {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatorMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// One ingress rule: a single port on one transport.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PortRule {
    pub port: u16,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Case-insensitive parse of "tcp" / "udp".
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_record_uses_camel_case() {
        let mut server = ServerRecord::creating("box1", "valheim");
        server.status = Some(StatusInfo {
            last_request: Some(10),
            ..StatusInfo::default()
        });
        let value = serde_json::to_value(&server).unwrap();
        assert_eq!(value["compute"]["status"], "creating");
        assert_eq!(value["status"]["lastRequest"], 10);
        assert!(value.get("workflow").is_none());
    }

    #[test]
    fn unknown_statuses_survive_deserialization() {
        let server: ServerRecord = serde_json::from_value(json!({
            "name": "box1",
            "compute": {"instanceId": "i-1", "status": "rebooting"},
            "workflow": {
                "currentTask": "start",
                "executionId": "exec-1",
                "status": "timed_out",
                "lastUpdated": 5
            }
        }))
        .unwrap();
        assert_eq!(server.compute.unwrap().status, ComputeStatus::Unknown);
        assert_eq!(server.workflow.unwrap().status, WorkflowStatus::Unknown);
    }

    #[test]
    fn probe_outstanding_compares_request_and_update() {
        let mut server = ServerRecord::creating("box1", "g");
        assert!(!server.probe_outstanding());

        server.status = Some(StatusInfo {
            last_request: Some(100),
            ..StatusInfo::default()
        });
        assert!(server.probe_outstanding());

        server.status.as_mut().unwrap().last_updated = Some(150);
        assert!(!server.probe_outstanding());

        server.status.as_mut().unwrap().last_request = Some(200);
        assert!(server.probe_outstanding());
    }

    #[test]
    fn patch_replaces_sub_objects_wholesale() {
        let mut server = ServerRecord::creating("box1", "g");
        server.status = Some(StatusInfo {
            address: Some("10.0.0.1".to_string()),
            last_updated: Some(1),
            ..StatusInfo::default()
        });

        server.apply(&ServerPatch::status(StatusInfo {
            last_request: Some(2),
            ..StatusInfo::default()
        }));

        let status = server.status.unwrap();
        assert_eq!(status.last_request, Some(2));
        assert_eq!(status.address, None);
        assert_eq!(status.last_updated, None);
        assert!(server.compute.is_some());
    }

    #[test]
    fn protocol_parse_is_case_insensitive() {
        assert_eq!(Protocol::parse("TCP"), Some(Protocol::Tcp));
        assert_eq!(Protocol::parse("udp"), Some(Protocol::Udp));
        assert_eq!(Protocol::parse("icmp"), None);
    }
}
