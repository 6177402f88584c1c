//! Request and response bodies of the task CRUD endpoint.
//!
//! One endpoint serves every operation; the HTTP method selects it:
//!
//! | method   | request body            | response body          |
//! |----------|-------------------------|------------------------|
//! | `GET`    | none                    | [`TaskListResponse`]   |
//! | `POST`   | [`TaskPayload`] (draft) | [`TaskResponse`]       |
//! | `PUT`    | [`TaskPayload`]         | [`TaskResponse`]       |
//! | `DELETE` | [`DeleteRequest`]       | status only            |

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId};

/// Body of a successful list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

/// Body of a successful create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: Task,
}

/// A task plus the email of the acting user, as sent on create and update.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPayload<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    pub user: &'a str,
}

/// Body of a delete request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(rename = "_id")]
    pub id: TaskId,
}
