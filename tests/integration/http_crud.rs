//! Integration tests for the HTTP CRUD client.
//!
//! Runs an in-process axum backend speaking the task endpoint's JSON shape:
//! one URL, method selects the operation, responses wrap tasks in `task` /
//! `tasks`, and due dates come back as full timestamps.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use parking_lot::Mutex;
use serde_json::{Value, json};

use taskboard::crud::http::HttpCrudClient;
use taskboard::crud::{CrudClient, CrudError};
use taskboard::session::Session;
use taskboard_proto::task::{Task, TaskId, TaskPriority, TaskStatus};

#[derive(Default)]
struct Backend {
    tasks: Mutex<Vec<Value>>,
    /// `user` field of each write, in order.
    users: Mutex<Vec<String>>,
    /// Authorization header of each request, in order.
    auth: Mutex<Vec<Option<String>>>,
    next_id: Mutex<u32>,
}

type Shared = Arc<Backend>;

fn record_auth(state: &Backend, headers: &HeaderMap) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.auth.lock().push(auth);
}

/// Stores due dates the way a document database echoes them back.
fn as_stored(mut body: Value) -> Value {
    let stamped = body
        .get("dueDate")
        .and_then(Value::as_str)
        .map(|due| format!("{due}T00:00:00.000Z"));
    if let Some(stamped) = stamped {
        body["dueDate"] = Value::String(stamped);
    }
    if let Some(obj) = body.as_object_mut() {
        obj.remove("user");
    }
    body
}

async fn list(State(state): State<Shared>, headers: HeaderMap) -> Json<Value> {
    record_auth(&state, &headers);
    Json(json!({ "tasks": *state.tasks.lock() }))
}

async fn create(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record_auth(&state, &headers);
    state
        .users
        .lock()
        .push(body["user"].as_str().unwrap_or_default().to_string());
    let mut stored = as_stored(body);
    let id = {
        let mut next = state.next_id.lock();
        *next += 1;
        format!("66a{:021}", *next)
    };
    stored["_id"] = Value::String(id);
    state.tasks.lock().push(stored.clone());
    (StatusCode::CREATED, Json(json!({ "task": stored })))
}

async fn update(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    record_auth(&state, &headers);
    state
        .users
        .lock()
        .push(body["user"].as_str().unwrap_or_default().to_string());
    let stored = as_stored(body);
    let mut tasks = state.tasks.lock();
    let slot = tasks
        .iter_mut()
        .find(|t| t["_id"] == stored["_id"])
        .ok_or((StatusCode::NOT_FOUND, "Task not found".to_string()))?;
    *slot = stored.clone();
    Ok(Json(json!({ "task": stored })))
}

async fn remove(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    record_auth(&state, &headers);
    state.tasks.lock().retain(|t| t["_id"] != body["_id"]);
    Json(json!({ "message": "Task deleted" }))
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn garbage() -> &'static str {
    "<html>not json</html>"
}

async fn start_backend() -> (String, Shared) {
    let state = Shared::default();
    let app = axum::Router::new()
        .route(
            "/api/tasks/crud",
            get(list).post(create).put(update).delete(remove),
        )
        .route("/broken", get(broken))
        .route("/garbage", get(garbage))
        .with_state(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

fn session() -> Session {
    Session::new("ana@example.com").with_name("Ana")
}

fn draft(title: &str) -> Task {
    let mut task = Task::draft();
    task.title = title.to_string();
    task.priority = TaskPriority::High;
    task.due_date = chrono::NaiveDate::from_ymd_opt(2024, 9, 30);
    task
}

#[tokio::test]
async fn full_lifecycle_against_backend() {
    let (base, state) = start_backend().await;
    let client = HttpCrudClient::new(&format!("{base}/api/tasks/crud"), Some(Duration::from_secs(5))).unwrap();

    assert!(client.list(&session()).await.unwrap().is_empty());

    let created = client.create(&session(), &draft("Ship it")).await.unwrap();
    assert!(!created.is_draft());
    assert_eq!(created.title, "Ship it");
    assert_eq!(created.due_date, chrono::NaiveDate::from_ymd_opt(2024, 9, 30));
    assert_eq!(created.status, TaskStatus::ToDo);

    let mut edited = created.clone();
    edited.status = TaskStatus::InProgress;
    let updated = client.update(&session(), &edited).await.unwrap();
    assert_eq!(updated.status, TaskStatus::InProgress);
    assert_eq!(updated.id, created.id);

    let listed = client.list(&session()).await.unwrap();
    assert_eq!(listed, vec![updated]);

    client.delete(&session(), &created.id).await.unwrap();
    assert!(client.list(&session()).await.unwrap().is_empty());

    assert_eq!(*state.users.lock(), vec!["ana@example.com", "ana@example.com"]);
}

#[tokio::test]
async fn draft_is_sent_without_id() {
    let (base, state) = start_backend().await;
    let client = HttpCrudClient::new(&format!("{base}/api/tasks/crud"), None).unwrap();
    client.create(&session(), &draft("No id")).await.unwrap();
    let stored = state.tasks.lock()[0].clone();
    // The backend assigned the only id.
    assert!(stored["_id"].as_str().unwrap().starts_with("66a"));
    assert_eq!(stored["status"], "To Do");
    assert_eq!(stored["priority"], "High");
}

#[tokio::test]
async fn bearer_token_is_forwarded() {
    let (base, state) = start_backend().await;
    let client = HttpCrudClient::new(&format!("{base}/api/tasks/crud"), None).unwrap();
    client
        .list(&session().with_token("tok-123"))
        .await
        .unwrap();
    client.list(&session()).await.unwrap();
    assert_eq!(
        *state.auth.lock(),
        vec![Some("Bearer tok-123".to_string()), None]
    );
}

#[tokio::test]
async fn unknown_task_maps_to_server_error() {
    let (base, _state) = start_backend().await;
    let client = HttpCrudClient::new(&format!("{base}/api/tasks/crud"), None).unwrap();
    let mut ghost = draft("Ghost");
    ghost.id = TaskId::new("missing");
    let err = client.update(&session(), &ghost).await.unwrap_err();
    assert_eq!(
        err,
        CrudError::Server {
            status: 404,
            message: "Task not found".into()
        }
    );
}

#[tokio::test]
async fn empty_error_body_uses_reason_phrase() {
    let (base, _state) = start_backend().await;
    let client = HttpCrudClient::new(&format!("{base}/broken"), None).unwrap();
    let err = client.list(&session()).await.unwrap_err();
    assert_eq!(
        err,
        CrudError::Server {
            status: 500,
            message: "Internal Server Error".into()
        }
    );
}

#[tokio::test]
async fn non_json_body_is_invalid_response() {
    let (base, _state) = start_backend().await;
    let client = HttpCrudClient::new(&format!("{base}/garbage"), None).unwrap();
    let err = client.list(&session()).await.unwrap_err();
    assert!(matches!(err, CrudError::InvalidResponse(_)));
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    let client = HttpCrudClient::new("http://127.0.0.1:1/api/tasks/crud", None).unwrap();
    let err = client.list(&session()).await.unwrap_err();
    assert!(matches!(err, CrudError::Network(_)));
}
