//! Agent loop service.
//!
//! Owns the reconnecting control connection and the two state machines,
//! and is the [`ConvergenceAgent`] the control session calls back into.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use caravel_control_connection::{
    AgentFuture, ChannelError, Connector, ConnectorConfig, ControlChannel, ConvergenceAgent,
};
use caravel_protocol::constants::MessageType;
use caravel_protocol::messages::NodeStateCommand;
use caravel_protocol::types::{Deployment, DeploymentState};

use crate::client::{ClientFuture, Command, ControlClient, ControlError};
use crate::cluster_status::{ClusterStatusFsm, ClusterStatusInput};
use crate::convergence_loop::{ITERATION_DELAY, spawn_convergence_loop};
use crate::deployer::Deployer;

/// Adapts a live control channel to the loop's client capability.
struct ChannelClient {
    channel: Arc<ControlChannel>,
}

impl ControlClient for ChannelClient {
    fn call(&self, command: Command) -> ClientFuture<'_, Result<(), ControlError>> {
        Box::pin(async move {
            match command {
                Command::NodeState { state_changes } => {
                    let payload = NodeStateCommand { state_changes };
                    self.channel
                        .call(MessageType::NodeState, Some(&payload))
                        .await
                        .map(|_| ())
                        .map_err(|e| match e {
                            ChannelError::Control { code, message } => {
                                ControlError::Rejected { code, message }
                            }
                            other => ControlError::Transport(other.to_string()),
                        })
                }
            }
        })
    }

    fn close(&self) -> ClientFuture<'_, ()> {
        Box::pin(async move { self.channel.close().await })
    }
}

struct Running {
    connector: Connector,
    cluster_status: ClusterStatusFsm,
    loop_handle: JoinHandle<()>,
}

/// Per-node agent service: one reconnecting control connection feeding
/// the cluster status FSM, which in turn gates the convergence loop.
///
/// Hosts no global state; a process can run any number of these.
pub struct AgentLoopService {
    config: ConnectorConfig,
    deployer: Arc<dyn Deployer>,
    iteration_delay: Duration,
    running: Mutex<Option<Running>>,
}

impl AgentLoopService {
    pub fn new(config: ConnectorConfig, deployer: Arc<dyn Deployer>) -> Arc<Self> {
        Self::with_iteration_delay(config, deployer, ITERATION_DELAY)
    }

    /// Same as [`new`](Self::new) with a custom pause between
    /// convergence iterations.
    pub fn with_iteration_delay(
        config: ConnectorConfig,
        deployer: Arc<dyn Deployer>,
        iteration_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            deployer,
            iteration_delay,
            running: Mutex::new(None),
        })
    }

    /// Builds both state machines and starts the reconnecting control
    /// client. Idempotent while running.
    pub async fn start(self: &Arc<Self>) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return;
        }

        let (convergence_tx, loop_handle) =
            spawn_convergence_loop(self.deployer.clone(), self.iteration_delay);
        let cluster_status = ClusterStatusFsm::new(convergence_tx);
        let agent: Arc<dyn ConvergenceAgent> = self.clone();
        let connector = Connector::start(self.config.clone(), agent);

        *running = Some(Running {
            connector,
            cluster_status,
            loop_handle,
        });
        info!(host = %self.config.host, port = self.config.port, "agent loop service started");
    }

    /// Halts reconnection, shuts the FSMs down, and resolves once the
    /// in-flight convergence iteration (if any) has completed.
    pub async fn stop(&self) {
        // Take the running state out before awaiting anything: the
        // connector task may be blocked inside one of our callbacks,
        // which need the lock to proceed.
        let taken = self.running.lock().await.take();
        let Some(mut running) = taken else {
            return;
        };

        running.connector.stop().await;
        running
            .cluster_status
            .receive(ClusterStatusInput::Shutdown)
            .await;
        // Dropping the FSM releases the loop's input channel; the loop
        // finishes its in-flight iteration and exits.
        drop(running.cluster_status);
        let _ = running.loop_handle.await;
        info!("agent loop service stopped");
    }

    async fn receive(&self, input: ClusterStatusInput) {
        let mut running = self.running.lock().await;
        match running.as_mut() {
            Some(running) => running.cluster_status.receive(input).await,
            None => {
                // A connection that raced an orderly stop has no owner.
                if let ClusterStatusInput::Connected(client) = input {
                    client.close().await;
                }
            }
        }
    }
}

impl ConvergenceAgent for AgentLoopService {
    fn connected(&self, channel: Arc<ControlChannel>) -> AgentFuture<'_> {
        Box::pin(async move {
            let client: Arc<dyn ControlClient> = Arc::new(ChannelClient { channel });
            self.receive(ClusterStatusInput::Connected(client)).await;
        })
    }

    fn disconnected(&self) -> AgentFuture<'_> {
        Box::pin(async move {
            self.receive(ClusterStatusInput::Disconnected).await;
        })
    }

    fn cluster_updated(
        &self,
        configuration: Deployment,
        state: DeploymentState,
    ) -> AgentFuture<'_> {
        Box::pin(async move {
            self.receive(ClusterStatusInput::StatusUpdate {
                configuration,
                state,
            })
            .await;
        })
    }
}
