//! Client-side refresh loop.
//!
//! After a mutation the client re-polls the listing while anything still
//! looks in flight, up to a fixed attempt budget so a stuck backend cannot
//! keep it polling forever. Each response is reconciled into the last known
//! list by name so a partial response never hides rows.

use std::time::Duration;

use hearth_core::HearthConfig;
use hearth_state::ServerRecord;
use tracing::{debug, warn};

use crate::collaborators::{BoxFuture, CollaboratorResult};

/// Where the poller reads the listing from.
pub trait ServerSource: Send + Sync {
    fn fetch_servers(&self, refresh_status: bool)
    -> BoxFuture<'_, CollaboratorResult<Vec<ServerRecord>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl PollerSettings {
    pub fn from_config(config: &HearthConfig) -> Self {
        Self {
            delay: config.poll_delay(),
            max_attempts: config.poller.max_attempts.max(1),
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 12,
        }
    }
}

/// Per-session poller state.
pub struct RefreshPoller<S> {
    source: S,
    settings: PollerSettings,
    known: Vec<ServerRecord>,
    attempts: u32,
}

impl<S: ServerSource> RefreshPoller<S> {
    pub fn new(source: S, settings: PollerSettings) -> Self {
        Self {
            source,
            settings,
            known: Vec::new(),
            attempts: 0,
        }
    }

    pub fn servers(&self) -> &[ServerRecord] {
        &self.known
    }

    /// Polls made by the most recent refresh run.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Plain fetch without probing, used for the initial load.
    pub async fn load(&mut self) -> CollaboratorResult<&[ServerRecord]> {
        let servers = self.source.fetch_servers(false).await?;
        self.reconcile(servers);
        Ok(&self.known)
    }

    /// Poll until nothing looks in flight or the attempt budget is spent.
    pub async fn refresh_after_mutation(&mut self) -> &[ServerRecord] {
        self.attempts = 0;
        loop {
            self.attempts += 1;
            let polled = match self.source.fetch_servers(true).await {
                Ok(servers) => {
                    self.reconcile(servers);
                    true
                }
                Err(e) => {
                    warn!(attempt = self.attempts, error = %e, "refresh poll failed");
                    false
                }
            };

            if self.attempts >= self.settings.max_attempts {
                debug!(attempts = self.attempts, "poll budget spent");
                break;
            }
            if polled && !self.in_flight() {
                break;
            }
            tokio::time::sleep(self.settings.delay).await;
        }
        &self.known
    }

    /// Whether any known row still has a running workflow or an outstanding probe.
    pub fn in_flight(&self) -> bool {
        self.known
            .iter()
            .any(|s| s.has_running_workflow() || s.probe_outstanding())
    }

    /// Replace rows by name, keep rows the response omitted, append new ones.
    pub fn reconcile(&mut self, fresh: Vec<ServerRecord>) {
        for server in fresh {
            match self.known.iter_mut().find(|k| k.name == server.name) {
                Some(slot) => *slot = server,
                None => self.known.push(server),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::collaborators::CollaboratorError;
    use hearth_state::{StatusInfo, WorkflowInfo, WorkflowStatus};

    struct Scripted {
        responses: Mutex<VecDeque<CollaboratorResult<Vec<ServerRecord>>>>,
        calls: Mutex<Vec<bool>>,
    }

    impl Scripted {
        fn new(responses: Vec<CollaboratorResult<Vec<ServerRecord>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ServerSource for &Scripted {
        fn fetch_servers(
            &self,
            refresh_status: bool,
        ) -> BoxFuture<'_, CollaboratorResult<Vec<ServerRecord>>> {
            self.calls.lock().unwrap().push(refresh_status);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()));
            Box::pin(async move { next })
        }
    }

    fn server(name: &str) -> ServerRecord {
        ServerRecord::creating(name, "g")
    }

    fn running(name: &str) -> ServerRecord {
        let mut s = server(name);
        s.workflow = Some(WorkflowInfo::running("start", "e-1", 1));
        s
    }

    fn finished(name: &str) -> ServerRecord {
        let mut s = running(name);
        if let Some(w) = s.workflow.as_mut() {
            w.status = WorkflowStatus::Succeeded;
        }
        s
    }

    fn probing(name: &str) -> ServerRecord {
        let mut s = server(name);
        s.status = Some(StatusInfo {
            last_request: Some(10),
            ..StatusInfo::default()
        });
        s
    }

    fn settings(max_attempts: u32) -> PollerSettings {
        PollerSettings {
            delay: Duration::from_secs(5),
            max_attempts,
        }
    }

    #[test]
    fn reconcile_keeps_unmatched_rows() {
        let source = Scripted::new(vec![]);
        let mut poller = RefreshPoller::new(&source, settings(3));
        poller.reconcile(vec![server("a"), server("b")]);
        poller.reconcile(vec![running("b"), server("c")]);

        let names: Vec<&str> = poller.servers().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(poller.servers()[1].has_running_workflow());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_once_nothing_is_in_flight() {
        let source = Scripted::new(vec![
            Ok(vec![running("a")]),
            Ok(vec![probing("a")]),
            Ok(vec![finished("a")]),
        ]);
        let mut poller = RefreshPoller::new(&source, settings(10));

        let started = tokio::time::Instant::now();
        poller.refresh_after_mutation().await;

        assert_eq!(poller.attempts(), 3);
        assert!(!poller.in_flight());
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert!(source.calls.lock().unwrap().iter().all(|refresh| *refresh));
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_budget_bounds_a_stuck_backend() {
        let source = Scripted::new((0..20).map(|_| Ok(vec![running("a")])).collect());
        let mut poller = RefreshPoller::new(&source, settings(4));

        poller.refresh_after_mutation().await;

        assert_eq!(poller.attempts(), 4);
        assert_eq!(source.calls.lock().unwrap().len(), 4);
        assert!(poller.in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_poll_keeps_known_rows_and_retries() {
        let source = Scripted::new(vec![
            Ok(vec![server("a"), running("b")]),
            Err(CollaboratorError::Transport("connection reset".into())),
            Ok(vec![finished("b")]),
        ]);
        let mut poller = RefreshPoller::new(&source, settings(5));

        poller.refresh_after_mutation().await;

        assert_eq!(poller.attempts(), 3);
        let names: Vec<&str> = poller.servers().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(!poller.in_flight());
    }

    #[tokio::test]
    async fn load_does_not_request_probes() {
        let source = Scripted::new(vec![Ok(vec![server("a")])]);
        let mut poller = RefreshPoller::new(&source, settings(1));
        assert_eq!(poller.load().await.unwrap().len(), 1);
        assert_eq!(*source.calls.lock().unwrap(), vec![false]);
    }
}
