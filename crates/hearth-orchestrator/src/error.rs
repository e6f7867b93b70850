//! Orchestrator errors and their caller-facing classification.

use std::fmt;

use hearth_state::{ServerRecord, StateError};
use serde::Serialize;
use thiserror::Error;

use crate::collaborators::CollaboratorError;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// How an error is surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Bad input or a state conflict; shown verbatim, never retried.
    ClientError,
    /// Infrastructure failure; shown with a generic message.
    ServerError,
    /// Some probe dispatches failed while the listing itself succeeded.
    PartialFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ClientError => "ClientError",
            ErrorKind::ServerError => "ServerError",
            ErrorKind::PartialFailure => "PartialFailure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid {0}")]
    InvalidRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Another action in progress on {0}")]
    ActionInProgress(String),

    #[error("server {0} has no instance id")]
    NoComputeId(String),

    #[error("state store error: {0}")]
    Store(#[from] StateError),

    #[error("provisioning API error: {0}")]
    Provisioning(CollaboratorError),

    #[error("task dispatch failed: {0}")]
    Dispatch(CollaboratorError),

    #[error("release feed error: {0}")]
    ReleaseFeed(CollaboratorError),

    #[error("no machine image matches the configured filter")]
    NoImage,

    #[error("no servers found")]
    NoServers,

    #[error("Failed to create server: {reason}. Successfully cleaned up resources.")]
    CreateFailed { reason: String },

    #[error("Failed to create server: {reason}. Resources may need manual cleanup!")]
    CleanupFailed { reason: String },

    #[error("failed to dispatch {failed} status probe(s)")]
    PartialRefresh {
        failed: usize,
        /// The listing that was fetched before the probes went out.
        servers: Vec<ServerRecord>,
    },
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        use OrchestratorError::*;
        match self {
            InvalidRequest(_) | NotFound(_) | AlreadyExists(_) | Forbidden
            | ActionInProgress(_) => ErrorKind::ClientError,
            PartialRefresh { .. } => ErrorKind::PartialFailure,
            NoComputeId(_) | Store(_) | Provisioning(_) | Dispatch(_) | ReleaseFeed(_)
            | NoImage | NoServers | CreateFailed { .. } | CleanupFailed { .. } => {
                ErrorKind::ServerError
            }
        }
    }

    /// Text safe to show the caller. Client errors are shown as-is; server
    /// errors get a generic message, except saga outcomes which must say
    /// whether cleanup succeeded.
    pub fn public_message(&self) -> String {
        use OrchestratorError::*;
        match self {
            InvalidRequest(_) | NotFound(_) | AlreadyExists(_) | Forbidden
            | ActionInProgress(_) | CreateFailed { .. } | CleanupFailed { .. } => self.to_string(),
            NoComputeId(_) => "Server has no instance id".to_string(),
            Store(_) => "Failed to access state".to_string(),
            Provisioning(_) => "Provisioning request failed".to_string(),
            Dispatch(_) => "Failed to start action".to_string(),
            ReleaseFeed(_) => "Failed to update games list.".to_string(),
            NoImage => "Failed to initialize machine image id".to_string(),
            NoServers => "Failed to get servers".to_string(),
            PartialRefresh { .. } => "Failed to get servers status".to_string(),
        }
    }
}
