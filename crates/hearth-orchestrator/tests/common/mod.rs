//! Shared fakes for orchestrator integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hearth_core::config::ImageFilterConfig;
use hearth_core::{Caller, HearthConfig, Role};
use hearth_orchestrator::{
    BoxFuture, CollaboratorError, CollaboratorResult, CreateServerRequest, Execution,
    HearthService, InstanceRequest, MachineImage, PortInput, ProvisioningApi, ReleaseFeed,
    TaskExecutor,
};
use hearth_state::*;
use serde_json::{Value, json};

pub const INSTANCE_ID: &str = "i-0001";
pub const RULE_ID: &str = "sg-0001";

/// Calls made against the provisioning fake, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningCall {
    DescribeInstanceType(String),
    CreateIngressRule { name: String, rules: Vec<PortRule> },
    DeleteIngressRule(String),
    AllocateInstance(InstanceRequest),
    TerminateInstance(String),
    StartInstance(String),
    StopInstance(String),
    ListImages,
}

pub struct FakeProvisioning {
    pub calls: Mutex<Vec<ProvisioningCall>>,
    pub fail_allocate: AtomicBool,
    pub fail_terminate: AtomicBool,
    pub images: Mutex<Vec<MachineImage>>,
    /// Runs inside `allocate_instance`, before it returns.
    pub on_allocate: Mutex<Option<Box<dyn Fn() + Send>>>,
}

impl Default for FakeProvisioning {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_allocate: AtomicBool::new(false),
            fail_terminate: AtomicBool::new(false),
            images: Mutex::new(vec![
                MachineImage {
                    image_id: "ami-old".into(),
                    created_at: Some("2024-04-25T00:00:00.000Z".into()),
                },
                MachineImage {
                    image_id: "ami-new".into(),
                    created_at: Some("2025-02-01T00:00:00.000Z".into()),
                },
            ]),
            on_allocate: Mutex::new(None),
        }
    }
}

impl FakeProvisioning {
    fn record(&self, call: ProvisioningCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<ProvisioningCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change provider state (describe and list are read-only).
    pub fn mutating_calls(&self) -> Vec<ProvisioningCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !matches!(
                    c,
                    ProvisioningCall::DescribeInstanceType(_) | ProvisioningCall::ListImages
                )
            })
            .collect()
    }
}

impl ProvisioningApi for FakeProvisioning {
    fn describe_instance_type<'a>(
        &'a self,
        instance_type: &'a str,
    ) -> BoxFuture<'a, CollaboratorResult<bool>> {
        self.record(ProvisioningCall::DescribeInstanceType(instance_type.to_string()));
        let known = matches!(instance_type, "t3.large" | "m5.large");
        Box::pin(async move { Ok(known) })
    }

    fn create_ingress_rule<'a>(
        &'a self,
        name: &'a str,
        rules: &'a [PortRule],
    ) -> BoxFuture<'a, CollaboratorResult<String>> {
        self.record(ProvisioningCall::CreateIngressRule {
            name: name.to_string(),
            rules: rules.to_vec(),
        });
        Box::pin(async { Ok(RULE_ID.to_string()) })
    }

    fn delete_ingress_rule<'a>(&'a self, rule_id: &'a str) -> BoxFuture<'a, CollaboratorResult<()>> {
        self.record(ProvisioningCall::DeleteIngressRule(rule_id.to_string()));
        Box::pin(async { Ok(()) })
    }

    fn allocate_instance<'a>(
        &'a self,
        request: &'a InstanceRequest,
    ) -> BoxFuture<'a, CollaboratorResult<String>> {
        self.record(ProvisioningCall::AllocateInstance(request.clone()));
        if let Some(hook) = self.on_allocate.lock().unwrap().as_ref() {
            hook();
        }
        let fail = self.fail_allocate.load(Ordering::SeqCst);
        Box::pin(async move {
            if fail {
                Err(CollaboratorError::Rejected("insufficient capacity".into()))
            } else {
                Ok(INSTANCE_ID.to_string())
            }
        })
    }

    fn terminate_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> BoxFuture<'a, CollaboratorResult<()>> {
        self.record(ProvisioningCall::TerminateInstance(instance_id.to_string()));
        let fail = self.fail_terminate.load(Ordering::SeqCst);
        Box::pin(async move {
            if fail {
                Err(CollaboratorError::Transport("timeout".into()))
            } else {
                Ok(())
            }
        })
    }

    fn start_instance<'a>(&'a self, instance_id: &'a str) -> BoxFuture<'a, CollaboratorResult<()>> {
        self.record(ProvisioningCall::StartInstance(instance_id.to_string()));
        Box::pin(async { Ok(()) })
    }

    fn stop_instance<'a>(&'a self, instance_id: &'a str) -> BoxFuture<'a, CollaboratorResult<()>> {
        self.record(ProvisioningCall::StopInstance(instance_id.to_string()));
        Box::pin(async { Ok(()) })
    }

    fn list_recent_images<'a>(
        &'a self,
        _filter: &'a ImageFilterConfig,
    ) -> BoxFuture<'a, CollaboratorResult<Vec<MachineImage>>> {
        self.record(ProvisioningCall::ListImages);
        let images = self.images.lock().unwrap().clone();
        Box::pin(async move { Ok(images) })
    }
}

#[derive(Default)]
pub struct FakeExecutor {
    pub dispatched: Mutex<Vec<(String, Value)>>,
    pub failing_tasks: Mutex<HashSet<String>>,
    counter: AtomicUsize,
}

impl FakeExecutor {
    pub fn fail_task(&self, task: &str) {
        self.failing_tasks.lock().unwrap().insert(task.to_string());
    }

    pub fn dispatched(&self) -> Vec<(String, Value)> {
        self.dispatched.lock().unwrap().clone()
    }

    pub fn dispatched_tasks(&self) -> Vec<String> {
        self.dispatched().into_iter().map(|(task, _)| task).collect()
    }
}

impl TaskExecutor for FakeExecutor {
    fn dispatch<'a>(
        &'a self,
        task: &'a str,
        payload: Value,
    ) -> BoxFuture<'a, CollaboratorResult<Execution>> {
        let fail = self.failing_tasks.lock().unwrap().contains(task);
        if !fail {
            self.dispatched
                .lock()
                .unwrap()
                .push((task.to_string(), payload));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Box::pin(async move {
            if fail {
                Err(CollaboratorError::Rejected(format!("task {task} unavailable")))
            } else {
                Ok(Execution {
                    execution_ref: format!("exec-{n}"),
                    started_at: epoch_millis(),
                })
            }
        })
    }
}

pub struct FakeFeed {
    pub tag: Mutex<String>,
    pub manifests: Mutex<Vec<Value>>,
    pub fail: AtomicBool,
    pub tag_calls: AtomicUsize,
    pub downloads: AtomicUsize,
}

impl Default for FakeFeed {
    fn default() -> Self {
        Self {
            tag: Mutex::new("v1.0.0".into()),
            manifests: Mutex::new(vec![
                manifest("minecraft", 25565, "tcp"),
                manifest("valheim", 2456, "udp"),
            ]),
            fail: AtomicBool::new(false),
            tag_calls: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }
}

impl ReleaseFeed for FakeFeed {
    fn latest_release_tag(&self) -> BoxFuture<'_, CollaboratorResult<String>> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail.load(Ordering::SeqCst) {
            Err(CollaboratorError::Transport("feed unreachable".into()))
        } else {
            Ok(self.tag.lock().unwrap().clone())
        };
        Box::pin(async move { result })
    }

    fn download_manifests<'a>(
        &'a self,
        _tag: &'a str,
    ) -> BoxFuture<'a, CollaboratorResult<Vec<Value>>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let manifests = self.manifests.lock().unwrap().clone();
        Box::pin(async move { Ok(manifests) })
    }
}

pub fn manifest(id: &str, port: u16, protocol: &str) -> Value {
    json!({
        "id": id,
        "displayName": id,
        "compute": {
            "instanceType": "t3.large",
            "minimumInstanceType": "t3.medium",
            "storage": 8,
            "ports": [{"port": port, "protocol": protocol}]
        }
    })
}

pub fn admin() -> Caller {
    Caller::new("ada", Role::Admin)
}

pub fn manager() -> Caller {
    Caller::new("max", Role::Manager)
}

pub fn newcomer() -> Caller {
    Caller::new("nia", Role::New)
}

/// The canonical create request: box1, one tcp port, 8 GiB.
pub fn create_request(name: &str) -> CreateServerRequest {
    CreateServerRequest {
        server_name: name.to_string(),
        game_id: "minecraft".to_string(),
        instance_type: "t3.large".to_string(),
        storage: 8,
        ports: vec![PortInput {
            port: 25565,
            protocol: "tcp".to_string(),
        }],
    }
}

pub struct Harness {
    pub store: StateStore,
    pub registry: ServerRegistry,
    pub lock: WorkflowLock,
    pub catalog: Catalog,
    pub provisioning: Arc<FakeProvisioning>,
    pub executor: Arc<FakeExecutor>,
    pub feed: Arc<FakeFeed>,
    pub service: HearthService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(HearthConfig::default())
    }

    pub fn with_config(config: HearthConfig) -> Self {
        let store = StateStore::open_in_memory().unwrap();
        let provisioning = Arc::new(FakeProvisioning::default());
        let executor = Arc::new(FakeExecutor::default());
        let feed = Arc::new(FakeFeed::default());
        let service = HearthService::new(
            store.clone(),
            &config,
            provisioning.clone(),
            executor.clone(),
            feed.clone(),
        );
        Self {
            registry: ServerRegistry::new(store.clone()),
            lock: WorkflowLock::new(store.clone()),
            catalog: Catalog::new(store.clone()),
            store,
            provisioning,
            executor,
            feed,
            service,
        }
    }

    /// Catalog with the two default games, without touching the feed.
    pub fn seed_catalog(&self) {
        let entries = hearth_orchestrator::manifest::parse_manifests(
            &self.feed.manifests.lock().unwrap(),
        );
        self.catalog.replace(&entries).unwrap();
    }

    /// Cached boot image id, so creation does not need to resolve one.
    pub fn seed_image(&self, image_id: &str) {
        let mut record = LockRecord::running(
            hearth_orchestrator::sync_cache::IMAGE_RESOLVE,
            "image-resolve",
            epoch_millis(),
        );
        record.status = LockStatus::Success;
        record.last_success_at = Some(epoch_millis());
        record
            .payload
            .insert("imageId".to_string(), image_id.to_string());
        self.lock.put_record(&record).unwrap();
    }

    /// A server that finished provisioning.
    pub fn seed_server(&self, name: &str, instance_id: Option<&str>) {
        let mut record = ServerRecord::creating(name, "minecraft");
        record.compute = Some(ComputeInfo {
            instance_id: instance_id.map(str::to_string),
            instance_type: Some("t3.large".into()),
            ingress_rule_id: instance_id.map(|_| RULE_ID.to_string()),
            status: if instance_id.is_some() {
                ComputeStatus::Running
            } else {
                ComputeStatus::Creating
            },
            message: None,
        });
        self.registry.create(&record).unwrap();
    }

    pub fn server(&self, name: &str) -> ServerRecord {
        self.registry.get(name).unwrap().unwrap()
    }
}
