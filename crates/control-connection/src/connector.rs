//! Reconnect loop feeding a [`ConvergenceAgent`].
//!
//! The connector owns the lifecycle of [`ControlChannel`] sessions:
//! connect, hand the channel to the agent, drain pushes in order, report
//! disconnects, and retry with exponential backoff until stopped.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use caravel_protocol::constants::MessageType;
use caravel_protocol::messages::ClusterStatusUpdate;
use caravel_protocol::types::{Deployment, DeploymentState};

use crate::channel::ControlChannel;
use crate::types::ConnectorConfig;

/// A boxed future returned by [`ConvergenceAgent`] callbacks.
pub type AgentFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Callback surface the control session drives.
///
/// Callbacks are awaited one at a time, so an implementation observes
/// `connected` / `cluster_updated` / `disconnected` in exactly the order
/// the transport produced them.
pub trait ConvergenceAgent: Send + Sync + 'static {
    /// A session has been established; `channel` is ready for commands.
    fn connected(&self, channel: Arc<ControlChannel>) -> AgentFuture<'_>;

    /// The current session is gone. Not delivered for sessions torn down
    /// by [`Connector::stop`]; an orderly shutdown owns its own
    /// disconnect.
    fn disconnected(&self) -> AgentFuture<'_>;

    /// The control service pushed a fresh cluster view.
    fn cluster_updated(&self, configuration: Deployment, state: DeploymentState)
    -> AgentFuture<'_>;
}

/// Keeps a control-service session alive, reconnecting with backoff.
pub struct Connector {
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Connector {
    /// Starts the reconnect loop. The loop runs until [`stop`](Self::stop).
    pub fn start(config: ConnectorConfig, agent: Arc<dyn ConvergenceAgent>) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(config, agent, cancel.clone()));
        Self {
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Halts further reconnect attempts and detaches from any live
    /// session without closing it; closing the channel during an orderly
    /// shutdown is the caller's responsibility.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}

async fn run(config: ConnectorConfig, agent: Arc<dyn ConvergenceAgent>, cancel: CancellationToken) {
    let url = config.url();
    let hello = config.hello();
    let mut attempt: u32 = 0;

    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = ControlChannel::connect(&url, &hello, config.tls.clone()) => result,
        };

        match connected {
            Ok((channel, mut pushes)) => {
                attempt = 0;
                let channel = Arc::new(channel);
                info!(url = %url, "connected to control service");
                agent.connected(channel.clone()).await;

                loop {
                    tokio::select! {
                        // Orderly shutdown: leave the session to its owner.
                        _ = cancel.cancelled() => return,

                        _ = channel.closed() => break,

                        push = pushes.recv() => match push {
                            Some(msg) if msg.msg_type == MessageType::ClusterStatus => {
                                match msg.parse_payload::<ClusterStatusUpdate>() {
                                    Ok(Some(update)) => {
                                        agent
                                            .cluster_updated(update.configuration, update.state)
                                            .await;
                                    }
                                    Ok(None) => warn!("cluster status push without payload"),
                                    Err(e) => warn!(error = %e, "undecodable cluster status push"),
                                }
                            }
                            Some(msg) => {
                                debug!(msg_type = ?msg.msg_type, "ignoring unexpected push");
                            }
                            None => break,
                        }
                    }
                }

                info!(url = %url, "disconnected from control service");
                agent.disconnected().await;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "connection attempt failed");
            }
        }

        attempt = attempt.saturating_add(1);
        let delay = config.reconnect.delay_for_attempt(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnect backoff");
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
