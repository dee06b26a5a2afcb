//! WebSocket channel to the control service.
//!
//! Request/acknowledgment correlation by envelope id, push delivery in
//! arrival order, keepalive pings, and an `agent_hello` handshake with a
//! protocol version check.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use caravel_protocol::constants::{
    MessageType, ProtocolCompatibility, WS_MAX_MESSAGE_SIZE, WS_REQUEST_TIMEOUT,
    check_protocol_compatibility,
};
use caravel_protocol::envelope::Message;
use caravel_protocol::messages::{AgentHelloRequest, HelloAck};

use crate::pumps::{Pending, ping_pump, read_pump, write_pump};

/// Errors from the control channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("control service error {code}: {message}")]
    Control { code: i32, message: String },
}

/// A live session with the control service.
///
/// Returned by [`ControlChannel::connect`] together with the receiver of
/// push messages. The channel stays usable until [`close`](Self::close) is
/// called or the transport dies; after that every call fails with
/// [`ChannelError::Closed`].
pub struct ControlChannel {
    write_tx: mpsc::Sender<tungstenite::Message>,
    pending: Pending,
    cancel: CancellationToken,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    _ping_handle: tokio::task::JoinHandle<()>,
}

impl ControlChannel {
    /// Connects, performs the `agent_hello` handshake, and spawns the
    /// connection pumps.
    ///
    /// `tls` selects TLS (`wss://`) when present; plaintext is only meant
    /// for loopback tests. Pushes received at any point after the
    /// handshake arrive on the returned receiver in wire order.
    pub async fn connect(
        url: &str,
        hello: &AgentHelloRequest,
        tls: Option<Arc<rustls::ClientConfig>>,
    ) -> Result<(Self, mpsc::Receiver<Message>), ChannelError> {
        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);

        let connector = match tls {
            Some(config) => Some(tokio_tungstenite::Connector::Rustls(config)),
            None => Some(tokio_tungstenite::Connector::Plain),
        };

        let (ws_stream, _) = tokio_tungstenite::connect_async_tls_with_config(
            url,
            Some(ws_config),
            false,
            connector,
        )
        .await?;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(256);
        let (push_tx, push_rx) = mpsc::channel::<Message>(64);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        let write_handle = tokio::spawn(write_pump(write, write_rx, cancel.clone()));
        let read_handle = tokio::spawn(read_pump(
            read,
            pending.clone(),
            push_tx,
            write_tx.clone(),
            cancel.clone(),
        ));
        let ping_handle = tokio::spawn(ping_pump(write_tx.clone(), cancel.clone()));

        let channel = Self {
            write_tx,
            pending,
            cancel,
            _read_handle: read_handle,
            _write_handle: write_handle,
            _ping_handle: ping_handle,
        };

        if let Err(e) = channel.handshake(hello).await {
            channel.close().await;
            return Err(e);
        }
        Ok((channel, push_rx))
    }

    async fn handshake(&self, hello: &AgentHelloRequest) -> Result<(), ChannelError> {
        let reply = self.call(MessageType::AgentHello, Some(hello)).await?;
        let ack: HelloAck = reply
            .parse_payload()?
            .ok_or_else(|| ChannelError::Handshake("empty hello acknowledgment".into()))?;

        match check_protocol_compatibility(ack.protocol_version) {
            ProtocolCompatibility::Compatible => {
                debug!(
                    peer_version = ack.protocol_version,
                    "control service handshake complete"
                );
                Ok(())
            }
            ProtocolCompatibility::Incompatible { reason, .. } => {
                Err(ChannelError::Handshake(reason))
            }
        }
    }

    /// Sends a request and waits for its acknowledgment. An `error`
    /// reply is surfaced as [`ChannelError::Control`].
    pub async fn call<T: Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Message, ChannelError> {
        if self.cancel.is_cancelled() {
            return Err(ChannelError::Closed);
        }

        let msg = Message::request(msg_type, payload)?;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(msg.id.clone(), tx);

        let text = serde_json::to_string(&msg)?;
        if self
            .write_tx
            .send(tungstenite::Message::Text(text.into()))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&msg.id);
            return Err(ChannelError::Closed);
        }

        let reply = match tokio::time::timeout(WS_REQUEST_TIMEOUT, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(ChannelError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&msg.id);
                return Err(ChannelError::Timeout);
            }
        };

        if reply.msg_type == MessageType::Error {
            let err = reply.error.unwrap_or(caravel_protocol::envelope::WireError {
                code: 500,
                message: "unspecified control service error".into(),
            });
            return Err(ChannelError::Control {
                code: err.code,
                message: err.message,
            });
        }
        Ok(reply)
    }

    /// Requests teardown. The write pump sends a close frame on its way
    /// out; [`closed`](Self::closed) resolves once the pumps stop.
    pub async fn close(&self) {
        self.cancel.cancel();
    }

    /// Resolves when the channel is no longer usable, whichever side
    /// initiated the teardown.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
