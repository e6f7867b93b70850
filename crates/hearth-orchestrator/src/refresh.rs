//! Server-side status refresh on listing.
//!
//! A probe is dispatched for a server only when both its last probe request
//! and its last confirmed update are older than the probe window. The
//! request stamp is written before the probe goes out, under a condition
//! that the stored stamp is still stale, so two concurrent listings never
//! probe the same server twice within a window.

use std::time::Duration;

use futures::future::join_all;
use hearth_state::{ServerRecord, ServerRegistry, StatusInfo, epoch_millis};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::dispatcher::ActionDispatcher;
use crate::error::{OrchestratorError, OrchestratorResult};

/// Parameters of a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub refresh_status: bool,
    /// Restrict the listing to these names.
    #[serde(default)]
    pub names: Option<Vec<String>>,
}

/// Whether a server's status is stale enough to probe again.
pub fn needs_probe(status: Option<&StatusInfo>, now: u64, window: Duration) -> bool {
    let window = window.as_millis() as u64;
    let stale = |at: Option<u64>| at.is_none_or(|at| now.saturating_sub(at) > window);
    let (requested, updated) = match status {
        Some(s) => (s.last_request, s.last_updated),
        None => (None, None),
    };
    stale(requested) && stale(updated)
}

enum ProbeResult {
    Dispatched,
    /// Another caller stamped the row first.
    Skipped,
    Failed,
}

#[derive(Clone)]
pub struct StatusRefresher {
    registry: ServerRegistry,
    dispatcher: ActionDispatcher,
    window: Duration,
}

impl StatusRefresher {
    pub fn new(registry: ServerRegistry, dispatcher: ActionDispatcher, window: Duration) -> Self {
        Self {
            registry,
            dispatcher,
            window,
        }
    }

    pub async fn list(&self, query: &ListQuery) -> OrchestratorResult<Vec<ServerRecord>> {
        let mut servers = match &query.names {
            None => self.registry.scan_all()?,
            Some(names) if names.is_empty() => {
                return Err(OrchestratorError::InvalidRequest("request".into()));
            }
            Some(names) => {
                let found = self.registry.get_many(names);
                if found.is_empty() {
                    return Err(OrchestratorError::NoServers);
                }
                found
            }
        };

        if !query.refresh_status {
            return Ok(servers);
        }

        let now = epoch_millis();
        let probes = servers
            .iter_mut()
            .filter(|s| s.instance_id().is_some() && needs_probe(s.status.as_ref(), now, self.window))
            .map(|server| self.probe(server, now));
        let results = join_all(probes).await;

        let dispatched = results
            .iter()
            .filter(|r| matches!(r, ProbeResult::Dispatched))
            .count();
        let failed = results
            .iter()
            .filter(|r| matches!(r, ProbeResult::Failed))
            .count();
        debug!(dispatched, failed, total = servers.len(), "status refresh");

        if failed > 0 {
            return Err(OrchestratorError::PartialRefresh { failed, servers });
        }
        Ok(servers)
    }

    async fn probe(&self, server: &mut ServerRecord, now: u64) -> ProbeResult {
        let Some(instance_id) = server.instance_id().map(str::to_string) else {
            return ProbeResult::Skipped;
        };

        let cutoff = now.saturating_sub(self.window.as_millis() as u64);
        match self.registry.stamp_request(&server.name, now, cutoff) {
            Ok(stored) => *server = stored,
            Err(e) if e.is_condition_failed() => {
                debug!(name = %server.name, "probe already requested by another caller");
                return ProbeResult::Skipped;
            }
            Err(e) => {
                warn!(name = %server.name, error = %e, "failed to stamp probe request");
                return ProbeResult::Failed;
            }
        }

        let payload = json!({"serverName": server.name, "instanceId": instance_id});
        let task = self.dispatcher.tasks().status.clone();
        match self.dispatcher.run_task(&task, payload).await {
            Ok(_) => ProbeResult::Dispatched,
            Err(e) => {
                warn!(name = %server.name, error = %e, "status probe dispatch failed");
                ProbeResult::Failed
            }
        }
    }
}
