//! Connection pumps: write, read dispatch, and keepalive.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use caravel_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_PONG_WAIT};
use caravel_protocol::envelope::Message;

/// Requests awaiting their acknowledgment, keyed by envelope id.
pub(crate) type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>;

/// Drains the outbound queue into the WebSocket sink. Sends a close frame
/// when the channel is shut down.
pub(crate) async fn write_pump<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(tungstenite::Message::Close(None)).await;
                break;
            }
            msg = rx.recv() => match msg {
                Some(msg) => {
                    if let Err(e) = sink.send(msg).await {
                        warn!("write failed: {e}");
                        cancel.cancel();
                        break;
                    }
                }
                None => break,
            }
        }
    }
}

/// Reads messages from the WebSocket and dispatches them: acknowledgments
/// are routed to their pending request, everything else is a push and goes
/// to the session loop in arrival order.
///
/// A silence deadline detects dead connections: if nothing arrives within
/// [`WS_PONG_WAIT`] (keepalive pongs included), the pump exits and the
/// channel reports itself closed.
pub(crate) async fn read_pump<S>(
    mut read: S,
    pending: Pending,
    push_tx: mpsc::Sender<Message>,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let silence_deadline = tokio::time::sleep(WS_PONG_WAIT);
    tokio::pin!(silence_deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut silence_deadline => {
                warn!("control connection silent past pong deadline, closing");
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        silence_deadline
                            .as_mut()
                            .reset(tokio::time::Instant::now() + WS_PONG_WAIT);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                dispatch_text(text.as_str(), &pending, &push_tx).await;
                            }
                            tungstenite::Message::Ping(data) => {
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => {
                                trace!("pong");
                            }
                            tungstenite::Message::Close(_) => {
                                debug!("control service sent close frame");
                                break;
                            }
                            _ => {} // Binary frames are not part of the protocol.
                        }
                    }
                    Some(Err(e)) => {
                        warn!("read failed: {e}");
                        break;
                    }
                    None => {
                        debug!("control connection stream ended");
                        break;
                    }
                }
            }
        }
    }

    cancel.cancel();
    // Fail any request still waiting for its acknowledgment.
    pending.lock().await.clear();
}

/// Routes one text frame: to its pending request by id, or to the push
/// queue.
async fn dispatch_text(text: &str, pending: &Pending, push_tx: &mpsc::Sender<Message>) {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        warn!("message too large ({} bytes), dropping", text.len());
        return;
    }

    let msg: Message = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("undecodable message: {e}");
            return;
        }
    };

    trace!(msg_type = ?msg.msg_type, id = %msg.id, "received");

    let mut map = pending.lock().await;
    if let Some(tx) = map.remove(&msg.id) {
        let _ = tx.send(msg);
        return;
    }
    drop(map);

    if push_tx.send(msg).await.is_err() {
        debug!("push receiver gone, dropping message");
    }
}

/// Sends periodic pings so silence on an idle connection still produces
/// traffic for the read pump's deadline.
pub(crate) async fn ping_pump(
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(WS_PING_PERIOD);
    interval.tick().await; // Skip the immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let ping = tungstenite::Message::Ping(vec![].into());
                if write_tx.send(ping).await.is_err() {
                    break;
                }
            }
        }
    }
}
