//! The closed set of actions an operator can run against a server.

use hearth_core::config::TaskNames;
use serde::{Deserialize, Serialize};

/// Tracked actions go through the single-flight lock and the executor;
/// maintenance actions bypass the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ServerAction {
    Start,
    Stop {
        /// Take a backup before stopping.
        #[serde(default, rename = "shouldBackup")]
        should_backup: bool,
    },
    Backup,
    Update,
    Terminate,
    ForceStartInstance,
    ForceStopInstance,
    ForceStopService,
    RemoveLock,
}

impl ServerAction {
    pub fn name(&self) -> &'static str {
        match self {
            ServerAction::Start => "start",
            ServerAction::Stop { .. } => "stop",
            ServerAction::Backup => "backup",
            ServerAction::Update => "update",
            ServerAction::Terminate => "terminate",
            ServerAction::ForceStartInstance => "force-start-instance",
            ServerAction::ForceStopInstance => "force-stop-instance",
            ServerAction::ForceStopService => "force-stop-service",
            ServerAction::RemoveLock => "remove-lock",
        }
    }

    pub fn is_tracked(&self) -> bool {
        matches!(
            self,
            ServerAction::Start
                | ServerAction::Stop { .. }
                | ServerAction::Backup
                | ServerAction::Update
                | ServerAction::Terminate
        )
    }

    pub fn requires_admin(&self) -> bool {
        matches!(self, ServerAction::Terminate)
    }

    /// Executor task behind a tracked action.
    pub fn task<'a>(&self, tasks: &'a TaskNames) -> Option<&'a str> {
        let task = match self {
            ServerAction::Start => &tasks.start,
            ServerAction::Stop { .. } => &tasks.stop,
            ServerAction::Backup => &tasks.backup,
            ServerAction::Update => &tasks.update,
            ServerAction::Terminate => &tasks.terminate,
            ServerAction::ForceStopService => &tasks.stop_service,
            ServerAction::ForceStartInstance
            | ServerAction::ForceStopInstance
            | ServerAction::RemoveLock => return None,
        };
        Some(task.as_str())
    }
}
