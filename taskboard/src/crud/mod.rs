//! Access to the task CRUD backend.
//!
//! [`CrudClient`] is the seam the mutation gateway talks through. The
//! production implementation is [`http::HttpCrudClient`]; tests substitute
//! in-memory doubles.

pub mod http;

use taskboard_proto::task::{Task, TaskId};

use crate::session::Session;

/// Errors returned by a CRUD backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CrudError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The backend answered successfully but the body could not be read.
    #[error("invalid response body: {0}")]
    InvalidResponse(String),
}

/// Async CRUD operations on tasks, scoped to the acting session.
pub trait CrudClient: Send + Sync {
    /// Fetches every task visible to the session.
    fn list(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, CrudError>> + Send;

    /// Persists a draft and returns the stored record with its new id.
    fn create(
        &self,
        session: &Session,
        draft: &Task,
    ) -> impl std::future::Future<Output = Result<Task, CrudError>> + Send;

    /// Replaces a persisted task and returns the stored record.
    fn update(
        &self,
        session: &Session,
        task: &Task,
    ) -> impl std::future::Future<Output = Result<Task, CrudError>> + Send;

    /// Deletes a task by id.
    fn delete(
        &self,
        session: &Session,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<(), CrudError>> + Send;
}
