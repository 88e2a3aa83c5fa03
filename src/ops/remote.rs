use async_trait::async_trait;

use crate::model::task::{ProjectId, Task, TaskId, TaskPatch};

/// Error type for remote task calls
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteMutationError {
    #[error("remote rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    #[error("malformed remote response: {0}")]
    Malformed(String),
}

impl RemoteMutationError {
    pub fn not_found(id: &TaskId) -> Self {
        RemoteMutationError::Rejected {
            status: 404,
            message: format!("task {} not found", id),
        }
    }
}

/// The backend's task endpoints.
///
/// Token handling, URLs and response-shape cleanup live behind this trait.
/// Calls may be retried by the caller; nothing here retries. Futures are not
/// `Send`: every call runs on the board's single thread.
#[async_trait(?Send)]
pub trait RemoteTaskApi {
    /// Create a task; the response carries the server-assigned id.
    async fn create_task(&self, payload: &Task) -> Result<Task, RemoteMutationError>;

    /// Apply `patch` to the task and return the stored record.
    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, RemoteMutationError>;

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteMutationError>;

    async fn list_tasks_for_project(&self, project: ProjectId) -> Result<Vec<Task>, RemoteMutationError>;
}
