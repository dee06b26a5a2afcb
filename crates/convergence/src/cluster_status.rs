//! Cluster status FSM.
//!
//! Gates the convergence loop on "connected to the control service *and*
//! at least one status update received": convergence must never run
//! against an absent desired configuration, and a reconnect without a
//! fresh status must not re-trigger it with stale data. On shutdown this
//! FSM owns closing the control client; the transport's disconnect
//! callback that then fires is absorbed by the terminal state.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use caravel_protocol::types::{Deployment, DeploymentState};

use crate::client::ControlClient;
use crate::convergence_loop::{ClientStatusUpdate, ConvergenceInput};

/// Inputs accepted by the cluster status FSM.
pub enum ClusterStatusInput {
    /// The transport handshake completed; `client` is live.
    Connected(Arc<dyn ControlClient>),
    /// The control service pushed a fresh cluster view.
    StatusUpdate {
        configuration: Deployment,
        state: DeploymentState,
    },
    /// The transport is gone.
    Disconnected,
    /// Orderly stop requested.
    Shutdown,
}

impl ClusterStatusInput {
    fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "CONNECTED",
            Self::StatusUpdate { .. } => "STATUS_UPDATE",
            Self::Disconnected => "DISCONNECTED",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

enum State {
    Disconnected,
    ConnectedNoUpdate(Arc<dyn ControlClient>),
    ConnectedWithUpdate(Arc<dyn ControlClient>),
    Shutdown,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::ConnectedNoUpdate(_) => "CONNECTED_NO_UPDATE",
            Self::ConnectedWithUpdate(_) => "CONNECTED_WITH_UPDATE",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

/// Tracks the control-plane connection and feeds the convergence loop.
pub struct ClusterStatusFsm {
    state: State,
    convergence: mpsc::UnboundedSender<ConvergenceInput>,
}

impl ClusterStatusFsm {
    pub fn new(convergence: mpsc::UnboundedSender<ConvergenceInput>) -> Self {
        Self {
            state: State::Disconnected,
            convergence,
        }
    }

    pub async fn receive(&mut self, input: ClusterStatusInput) {
        let from = self.state.name();
        let input_name = input.name();

        let state = std::mem::replace(&mut self.state, State::Disconnected);
        self.state = match (state, input) {
            (State::Disconnected, ClusterStatusInput::Connected(client)) => {
                State::ConnectedNoUpdate(client)
            }
            (State::Disconnected, ClusterStatusInput::Shutdown) => State::Shutdown,
            (state @ State::Disconnected, _) => state,

            (
                State::ConnectedNoUpdate(client),
                ClusterStatusInput::StatusUpdate {
                    configuration,
                    state,
                },
            ) => {
                self.emit(ConvergenceInput::StatusUpdate(ClientStatusUpdate {
                    client: client.clone(),
                    configuration,
                    state,
                }));
                State::ConnectedWithUpdate(client)
            }
            (State::ConnectedNoUpdate(_), ClusterStatusInput::Disconnected) => State::Disconnected,
            (State::ConnectedNoUpdate(client), ClusterStatusInput::Shutdown) => {
                client.close().await;
                State::Shutdown
            }
            (state @ State::ConnectedNoUpdate(_), ClusterStatusInput::Connected(_)) => state,

            (
                State::ConnectedWithUpdate(client),
                ClusterStatusInput::StatusUpdate {
                    configuration,
                    state,
                },
            ) => {
                self.emit(ConvergenceInput::StatusUpdate(ClientStatusUpdate {
                    client: client.clone(),
                    configuration,
                    state,
                }));
                State::ConnectedWithUpdate(client)
            }
            (State::ConnectedWithUpdate(_), ClusterStatusInput::Disconnected) => {
                self.emit(ConvergenceInput::Stop);
                State::Disconnected
            }
            (State::ConnectedWithUpdate(client), ClusterStatusInput::Shutdown) => {
                client.close().await;
                self.emit(ConvergenceInput::Stop);
                State::Shutdown
            }
            (state @ State::ConnectedWithUpdate(_), ClusterStatusInput::Connected(_)) => state,

            (State::Shutdown, _) => State::Shutdown,
        };

        debug!(
            fsm = "cluster_status",
            from,
            input = input_name,
            to = self.state.name(),
            "FSM_TRANSITION"
        );
    }

    fn emit(&self, input: ConvergenceInput) {
        if self.convergence.send(input).is_err() {
            // Normal during shutdown: the loop has already exited.
            trace!("convergence loop gone, dropping output");
        }
    }
}
