use thiserror::Error;

use crate::core::task::TaskId;

/// Failures surfaced by the synchronizer and the remote client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The task was not in the list the caller expected. Nothing was sent.
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// Another mutation for the same task has not settled yet.
    #[error("task {0} already has a change in progress")]
    Busy(TaskId),

    #[error("could not reach the task server: {0}")]
    Transport(String),

    #[error("server rejected the request ({status}){}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    ServerRejected { status: u16, message: Option<String> },

    /// The owning screen was torn down.
    #[error("synchronizer closed")]
    Closed,

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Text suitable for a dismissable notice.
    pub fn notice_text(&self) -> String {
        match self {
            Self::Transport(_) => "Could not connect to the server.".to_string(),
            Self::ServerRejected {
                message: Some(m), ..
            } => m.clone(),
            Self::ServerRejected { status, .. } => format!("Request failed ({})", status),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
