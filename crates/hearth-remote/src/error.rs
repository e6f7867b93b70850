use hearth_orchestrator::CollaboratorError;
use hearth_state::ServerRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    /// Some status probes failed; the listing came back with the error.
    #[error("partial refresh: {message}")]
    PartialRefresh {
        message: String,
        servers: Vec<ServerRecord>,
    },
}

pub type RemoteResult<T> = Result<T, RemoteError>;

impl From<RemoteError> for CollaboratorError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Http(e) if e.is_decode() => CollaboratorError::Malformed(e.to_string()),
            RemoteError::Http(e) => CollaboratorError::Transport(e.to_string()),
            RemoteError::Status { status, message } => {
                CollaboratorError::Rejected(format!("{status}: {message}"))
            }
            RemoteError::Malformed(m) => CollaboratorError::Malformed(m),
            RemoteError::PartialRefresh { message, .. } => CollaboratorError::Rejected(message),
        }
    }
}
