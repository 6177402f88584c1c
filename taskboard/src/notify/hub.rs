//! WebSocket client for the `taskboard-hub` notification server.
//!
//! [`HubBus::connect`] opens the socket, performs the hello exchange, and
//! spawns a reader task that dispatches deliveries to the registered
//! handlers. Publications go to the bus's default scope unless sent with
//! [`HubBus::publish_to`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use taskboard_proto::event::{EventKind, Notification};
use taskboard_proto::hub::{self, HubMessage, Scope};

use super::{BusError, Handler, NotificationBus, SubscriptionId, Subscriptions};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Timeouts for establishing a hub connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubTimeouts {
    /// WebSocket connect.
    pub connect: Duration,
    /// Wait for `Welcome` after `Hello`.
    pub hello: Duration,
}

impl Default for HubTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            hello: Duration::from_secs(5),
        }
    }
}

/// Notification bus backed by a hub WebSocket connection.
pub struct HubBus {
    client_id: String,
    hub_url: String,
    scope: Scope,
    ws_sender: Arc<Mutex<WsSender>>,
    subscriptions: Arc<Subscriptions>,
    connected: Arc<AtomicBool>,
    reader_handle: tokio::task::JoinHandle<()>,
}

impl HubBus {
    /// Connects to `hub_url` and introduces this client as `user_name`.
    ///
    /// # Errors
    ///
    /// - [`BusError::Timeout`] if connect or hello exceeds its timeout.
    /// - [`BusError::Unreachable`] if nothing is listening.
    /// - [`BusError::Rejected`] if the hub answers the hello with an error.
    /// - [`BusError::WebSocket`] / [`BusError::Codec`] for transport or
    ///   framing failures.
    pub async fn connect(
        hub_url: &str,
        user_name: &str,
        timeouts: HubTimeouts,
    ) -> Result<Self, BusError> {
        let (ws_stream, _response) = tokio::time::timeout(timeouts.connect, connect_async(hub_url))
            .await
            .map_err(|_| {
                tracing::warn!(url = hub_url, "hub connect timed out");
                BusError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url = hub_url, error = %e, "hub connect failed");
                map_ws_connect_error(e)
            })?;

        let (mut ws_sender, mut ws_reader) = ws_stream.split();

        let hello = hub::encode(&HubMessage::Hello {
            user_name: user_name.to_string(),
        })?;
        ws_sender
            .send(Message::Binary(hello.into()))
            .await
            .map_err(|e| BusError::WebSocket(format!("failed to send hello: {e}")))?;

        let client_id = await_welcome(&mut ws_reader, timeouts.hello, hub_url).await?;
        tracing::info!(client_id = %client_id, url = hub_url, "connected to notification hub");

        let subscriptions = Arc::new(Subscriptions::new());
        let connected = Arc::new(AtomicBool::new(true));
        let reader_handle = tokio::spawn(reader_loop(
            ws_reader,
            Arc::clone(&subscriptions),
            Arc::clone(&connected),
        ));

        Ok(Self {
            client_id,
            hub_url: hub_url.to_string(),
            scope: Scope::Global,
            ws_sender: Arc::new(Mutex::new(ws_sender)),
            subscriptions,
            connected,
            reader_handle,
        })
    }

    /// Sets the scope [`NotificationBus::publish`] targets.
    ///
    /// The bus must also [`join`](Self::join) the scope to receive from it.
    #[must_use]
    pub fn with_default_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Id the hub assigned to this connection.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    /// Starts receiving notifications published to `scope`.
    ///
    /// # Errors
    ///
    /// [`BusError::Closed`] if the connection is down.
    pub async fn join(&self, scope: Scope) -> Result<(), BusError> {
        self.send(&HubMessage::Join { scope }).await
    }

    /// Stops receiving notifications published to `scope`.
    ///
    /// # Errors
    ///
    /// [`BusError::Closed`] if the connection is down.
    pub async fn leave(&self, scope: Scope) -> Result<(), BusError> {
        self.send(&HubMessage::Leave { scope }).await
    }

    /// Publishes to an explicit scope.
    ///
    /// # Errors
    ///
    /// [`BusError::Closed`] if the connection is down.
    pub async fn publish_to(
        &self,
        scope: Scope,
        notification: &Notification,
    ) -> Result<(), BusError> {
        self.send(&HubMessage::Publish {
            scope,
            notification: notification.clone(),
        })
        .await
    }

    async fn send(&self, msg: &HubMessage) -> Result<(), BusError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(BusError::Closed);
        }
        let bytes = hub::encode(msg)?;
        let mut sender = self.ws_sender.lock().await;
        sender.send(Message::Binary(bytes.into())).await.map_err(|e| {
            tracing::warn!(error = %e, "hub send failed");
            self.connected.store(false, Ordering::Relaxed);
            BusError::Closed
        })
    }
}

impl NotificationBus for HubBus {
    fn subscribe(&self, kind: EventKind, handler: Handler) -> SubscriptionId {
        self.subscriptions.add(kind, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.remove(id);
    }

    async fn publish(&self, notification: &Notification) -> Result<(), BusError> {
        self.publish_to(self.scope.clone(), notification).await
    }

    async fn close(&self) {
        if !self.connected.swap(false, Ordering::Relaxed) {
            return;
        }
        let mut sender = self.ws_sender.lock().await;
        if let Err(e) = sender.send(Message::Close(None)).await {
            tracing::debug!(error = %e, "close frame not sent");
        }
        drop(sender);
        self.reader_handle.abort();
        self.subscriptions.clear();
        tracing::info!(client_id = %self.client_id, "hub connection closed");
    }

    fn is_open(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for HubBus {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

/// Waits for the hub's answer to `Hello`.
async fn await_welcome(
    ws_reader: &mut WsReader,
    timeout: Duration,
    hub_url: &str,
) -> Result<String, BusError> {
    let reply = tokio::time::timeout(timeout, ws_reader.next())
        .await
        .map_err(|_| {
            tracing::warn!(url = hub_url, "hub hello timed out");
            BusError::Timeout
        })?;
    match reply {
        Some(Ok(Message::Binary(data))) => match hub::decode(&data)? {
            HubMessage::Welcome { client_id } => Ok(client_id),
            HubMessage::Error { reason } => {
                tracing::warn!(reason = %reason, "hub rejected hello");
                Err(BusError::Rejected(reason))
            }
            other => {
                tracing::warn!(?other, "unexpected hub reply to hello");
                Err(BusError::Rejected("unexpected reply to hello".to_string()))
            }
        },
        Some(Ok(Message::Close(_))) | None => Err(BusError::Closed),
        Some(Ok(_)) => Err(BusError::Rejected(
            "unexpected non-binary frame during hello".to_string(),
        )),
        Some(Err(e)) => Err(BusError::WebSocket(e.to_string())),
    }
}

/// Reads frames until the connection ends, dispatching deliveries.
///
/// Malformed frames are logged and skipped.
async fn reader_loop(
    mut ws_reader: WsReader,
    subscriptions: Arc<Subscriptions>,
    connected: Arc<AtomicBool>,
) {
    while let Some(frame) = ws_reader.next().await {
        match frame {
            Ok(Message::Binary(data)) => match hub::decode(&data) {
                Ok(HubMessage::Deliver {
                    from,
                    scope,
                    notification,
                }) => {
                    let handled = subscriptions.dispatch(&notification);
                    tracing::debug!(
                        from = %from,
                        scope = %scope,
                        kind = %notification.kind,
                        handled,
                        "notification delivered"
                    );
                }
                Ok(HubMessage::Error { reason }) => {
                    tracing::warn!(reason = %reason, "hub reported an error");
                }
                Ok(other) => {
                    tracing::debug!(?other, "unexpected hub message");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "malformed hub frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("hub closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "hub read error");
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
}

fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> BusError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err)
            if matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::AddrNotAvailable
            ) =>
        {
            BusError::Unreachable(io_err.to_string())
        }
        WsError::Http(response) => BusError::Rejected(format!(
            "hub HTTP error: status {}",
            response.status()
        )),
        other => BusError::WebSocket(other.to_string()),
    }
}
