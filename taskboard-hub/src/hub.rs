//! Hub server core: shared state, WebSocket handler, and fan-out.
//!
//! Each client introduces itself with `Hello`, receives a `Welcome` carrying
//! its hub-assigned id, and is placed in the global scope. Everyone already
//! in the global scope is told about the login. Publications are delivered
//! to every member of the target scope except the publisher.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use taskboard_proto::event::Notification;
use taskboard_proto::hub::{self, HubMessage, Scope};
use tokio::sync::{RwLock, mpsc};

use crate::scopes::ScopeRegistry;

/// Default maximum accepted frame size in bytes (64 KB).
const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// `from` value of hub-originated deliveries.
pub const HUB_SENDER: &str = "hub";

#[derive(Debug)]
struct ClientEntry {
    user_name: String,
    sender: mpsc::UnboundedSender<Message>,
}

/// Shared hub state: connected clients and scope membership.
pub struct HubState {
    clients: RwLock<HashMap<String, ClientEntry>>,
    pub scopes: ScopeRegistry,
    max_frame_size: usize,
}

impl Default for HubState {
    fn default() -> Self {
        Self::new()
    }
}

impl HubState {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates hub state accepting frames up to `max_frame_size` bytes.
    #[must_use]
    pub fn with_config(max_frame_size: usize) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            scopes: ScopeRegistry::new(),
            max_frame_size,
        }
    }

    /// Registers a connected client.
    pub async fn register(&self, client_id: &str, user_name: &str, sender: mpsc::UnboundedSender<Message>) {
        self.clients.write().await.insert(
            client_id.to_string(),
            ClientEntry {
                user_name: user_name.to_string(),
                sender,
            },
        );
    }

    /// Removes a client and all its scope memberships.
    pub async fn unregister(&self, client_id: &str) -> bool {
        let existed = self.clients.write().await.remove(client_id).is_some();
        self.scopes.leave_all(client_id).await;
        existed
    }

    pub async fn get_sender(&self, client_id: &str) -> Option<mpsc::UnboundedSender<Message>> {
        self.clients
            .read()
            .await
            .get(client_id)
            .map(|c| c.sender.clone())
    }

    /// Display name given in the client's hello.
    pub async fn user_name(&self, client_id: &str) -> Option<String> {
        self.clients
            .read()
            .await
            .get(client_id)
            .map(|c| c.user_name.clone())
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Queues a Close frame for every connected client. Returns how many
    /// clients were still reachable.
    pub async fn close_all_connections(&self) -> usize {
        let clients = self.clients.read().await;
        let mut closed = 0;
        for (client_id, client) in clients.iter() {
            if client.sender.send(Message::Close(None)).is_ok() {
                tracing::info!(client_id = %client_id, "sending close frame");
                closed += 1;
            } else {
                tracing::debug!(client_id = %client_id, "writer already gone");
            }
        }
        closed
    }
}

/// Handles one upgraded WebSocket connection.
///
/// 1. Wait for `Hello`; reject blank user names.
/// 2. Register, join global, send `Welcome`.
/// 3. Announce the login to the rest of the global scope.
/// 4. Process frames until either side closes.
/// 5. Unregister.
pub async fn handle_socket(socket: WebSocket, state: Arc<HubState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let Some(user_name) = wait_for_hello(&mut ws_receiver).await else {
        tracing::warn!("connection closed before hello");
        return;
    };
    if user_name.trim().is_empty() {
        tracing::warn!("hello with empty user name");
        let err = HubMessage::Error {
            reason: "user name must not be empty".to_string(),
        };
        let _ = send_hub_msg(&mut ws_sender, &err).await;
        let _ = ws_sender.send(Message::Close(None)).await;
        return;
    }

    let client_id = uuid::Uuid::now_v7().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.register(&client_id, &user_name, tx).await;
    if let Err(e) = state.scopes.join(&Scope::Global, &client_id).await {
        tracing::error!(client_id = %client_id, error = %e, "failed to join global scope");
    }

    let welcome = HubMessage::Welcome {
        client_id: client_id.clone(),
    };
    if let Err(e) = send_hub_msg(&mut ws_sender, &welcome).await {
        tracing::error!(client_id = %client_id, error = %e, "failed to send welcome");
        state.unregister(&client_id).await;
        return;
    }
    tracing::info!(client_id = %client_id, user = %user_name, "client connected");

    let login = Notification::user_login(user_name.as_str(), format!("{user_name} logged in"));
    fan_out(&state, HUB_SENDER, &client_id, &Scope::Global, &login).await;

    let writer_id = client_id.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(client_id = %writer_id, "WebSocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let reader_id = client_id.clone();
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    handle_binary_message(&reader_id, &data, &reader_state).await;
                }
                Message::Close(_) => {
                    tracing::info!(client_id = %reader_id, "received close frame");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.unregister(&client_id).await;
    tracing::info!(client_id = %client_id, "client disconnected");
}

/// Waits for the first binary frame and expects a `Hello`.
async fn wait_for_hello(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<String> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Binary(data) => {
                return match hub::decode(&data) {
                    Ok(HubMessage::Hello { user_name }) => Some(user_name),
                    Ok(other) => {
                        tracing::warn!(msg = ?other, "expected Hello, got different message");
                        None
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to decode hello");
                        None
                    }
                };
            }
            Message::Close(_) => return None,
            _ => {}
        }
    }
    None
}

/// Handles a binary frame from a welcomed client.
async fn handle_binary_message(client_id: &str, data: &[u8], state: &Arc<HubState>) {
    if data.len() > state.max_frame_size {
        tracing::warn!(
            client_id = %client_id,
            size = data.len(),
            max = state.max_frame_size,
            "frame exceeds size limit"
        );
        let err = HubMessage::Error {
            reason: format!(
                "frame too large: {} bytes (max {})",
                data.len(),
                state.max_frame_size
            ),
        };
        send_to_client(state, client_id, &err).await;
        return;
    }

    let msg = match hub::decode(data) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(client_id = %client_id, error = %e, "failed to decode frame");
            return;
        }
    };

    match msg {
        HubMessage::Join { scope } => match state.scopes.join(&scope, client_id).await {
            Ok(()) => tracing::debug!(client_id = %client_id, %scope, "joined scope"),
            Err(e) => reject(state, client_id, e.to_string()).await,
        },
        HubMessage::Leave { scope } => match state.scopes.leave(&scope, client_id).await {
            Ok(was_member) => tracing::debug!(client_id = %client_id, %scope, was_member, "left scope"),
            Err(e) => reject(state, client_id, e.to_string()).await,
        },
        HubMessage::Publish {
            scope,
            notification,
        } => {
            tracing::debug!(client_id = %client_id, %scope, kind = %notification.kind, "publication");
            fan_out(state, client_id, client_id, &scope, &notification).await;
        }
        other => {
            tracing::warn!(client_id = %client_id, msg = ?other, "unexpected message type from client");
        }
    }
}

/// Delivers `notification` to every member of `scope` except `exclude`.
///
/// Clients whose channel is closed are unregistered.
async fn fan_out(
    state: &Arc<HubState>,
    from: &str,
    exclude: &str,
    scope: &Scope,
    notification: &Notification,
) -> usize {
    let deliver = HubMessage::Deliver {
        from: from.to_string(),
        scope: scope.clone(),
        notification: notification.clone(),
    };
    let bytes = match hub::encode(&deliver) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode delivery");
            return 0;
        }
    };

    let mut delivered = 0;
    for member in state.scopes.members(scope).await {
        if member == exclude {
            continue;
        }
        let Some(sender) = state.get_sender(&member).await else {
            continue;
        };
        if sender.send(Message::Binary(bytes.clone().into())).is_err() {
            tracing::warn!(client_id = %member, "delivery failed, unregistering");
            state.unregister(&member).await;
        } else {
            delivered += 1;
        }
    }
    tracing::debug!(%scope, delivered, "fan-out complete");
    delivered
}

async fn reject(state: &Arc<HubState>, client_id: &str, reason: String) {
    tracing::warn!(client_id = %client_id, %reason, "request rejected");
    send_to_client(state, client_id, &HubMessage::Error { reason }).await;
}

async fn send_to_client(state: &Arc<HubState>, client_id: &str, msg: &HubMessage) {
    if let Some(sender) = state.get_sender(client_id).await
        && let Ok(bytes) = hub::encode(msg)
    {
        let _ = sender.send(Message::Binary(bytes.into()));
    }
}

/// Encodes and writes a message directly on a WebSocket sink.
async fn send_hub_msg(
    sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    msg: &HubMessage,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let bytes = hub::encode(msg)?;
    sender.send(Message::Binary(bytes.into())).await?;
    Ok(())
}

/// Starts the hub with default state on `addr`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(HubState::new())).await
}

/// Starts the hub with pre-configured [`HubState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<HubState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "hub server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<HubState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
