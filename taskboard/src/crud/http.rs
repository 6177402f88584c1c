//! HTTP implementation of [`CrudClient`] using `reqwest`.
//!
//! All four operations hit the same endpoint URL; the method selects the
//! operation. Bodies are JSON (see [`taskboard_proto::api`]).

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use url::Url;

use taskboard_proto::api::{DeleteRequest, TaskListResponse, TaskPayload, TaskResponse};
use taskboard_proto::task::{Task, TaskId};

use super::{CrudClient, CrudError};
use crate::session::Session;

/// CRUD client for a JSON-over-HTTP task endpoint.
#[derive(Debug, Clone)]
pub struct HttpCrudClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpCrudClient {
    /// Creates a client for `endpoint`.
    ///
    /// `timeout` bounds each request end to end; `None` waits indefinitely.
    ///
    /// # Errors
    ///
    /// [`CrudError::Network`] if the URL is invalid or not `http(s)`, or
    /// the underlying client cannot be built.
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self, CrudError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| CrudError::Network(format!("invalid endpoint {endpoint:?}: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(CrudError::Network(format!(
                "unsupported endpoint scheme {:?}",
                endpoint.scheme()
            )));
        }
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CrudError::Network(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    /// The endpoint URL requests are sent to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request(&self, method: Method, session: &Session) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint.clone());
        match &session.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, op: &'static str) -> Result<Response, CrudError> {
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(op, error = %e, "task request failed");
            CrudError::Network(e.to_string())
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            body
        };
        tracing::warn!(op, status = status.as_u16(), %message, "task request rejected");
        Err(CrudError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, CrudError> {
    response
        .json::<T>()
        .await
        .map_err(|e| CrudError::InvalidResponse(e.to_string()))
}

impl CrudClient for HttpCrudClient {
    async fn list(&self, session: &Session) -> Result<Vec<Task>, CrudError> {
        let response = self.send(self.request(Method::GET, session), "list").await?;
        let body: TaskListResponse = read_json(response).await?;
        tracing::debug!(count = body.tasks.len(), "fetched tasks");
        Ok(body.tasks)
    }

    async fn create(&self, session: &Session, draft: &Task) -> Result<Task, CrudError> {
        let payload = TaskPayload {
            task: draft,
            user: &session.email,
        };
        let builder = self.request(Method::POST, session).json(&payload);
        let body: TaskResponse = read_json(self.send(builder, "create").await?).await?;
        Ok(body.task)
    }

    async fn update(&self, session: &Session, task: &Task) -> Result<Task, CrudError> {
        let payload = TaskPayload {
            task,
            user: &session.email,
        };
        let builder = self.request(Method::PUT, session).json(&payload);
        let body: TaskResponse = read_json(self.send(builder, "update").await?).await?;
        Ok(body.task)
    }

    async fn delete(&self, session: &Session, id: &TaskId) -> Result<(), CrudError> {
        let builder = self
            .request(Method::DELETE, session)
            .json(&DeleteRequest { id: id.clone() });
        self.send(builder, "delete").await?;
        Ok(())
    }
}
