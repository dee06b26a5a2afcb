//! Scripted fakes for exercising the FSMs.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use caravel_protocol::types::{Application, Deployment, DeploymentState, NodeState};

use crate::client::{ClientFuture, Command, ControlClient, ControlError};
use crate::deployer::{Action, DeployError, DeployFuture, Deployer};

/// One scripted discovery result.
pub(crate) enum Discovery {
    Ready(NodeState),
    Failing(&'static str),
    /// Never resolves; parks the loop in the discovery step.
    Pending,
}

/// Deployer whose discoveries and actions follow a script. When the
/// discovery script runs out, further discoveries hang, which pins the
/// loop in a known place.
pub(crate) struct ScriptedDeployer {
    discoveries: Mutex<VecDeque<Discovery>>,
    actions: Mutex<VecDeque<ScriptedAction>>,
    calculate_inputs: Mutex<Vec<(NodeState, Deployment, DeploymentState)>>,
    pub(crate) discover_calls: AtomicUsize,
}

impl ScriptedDeployer {
    pub(crate) fn new(discoveries: Vec<Discovery>, actions: Vec<ScriptedAction>) -> Arc<Self> {
        Arc::new(Self {
            discoveries: Mutex::new(discoveries.into()),
            actions: Mutex::new(actions.into()),
            calculate_inputs: Mutex::new(Vec::new()),
            discover_calls: AtomicUsize::new(0),
        })
    }

    /// Every `(local, desired, cluster)` triple calculation was given.
    pub(crate) fn calculate_inputs(&self) -> Vec<(NodeState, Deployment, DeploymentState)> {
        self.calculate_inputs.lock().unwrap().clone()
    }
}

impl Deployer for ScriptedDeployer {
    fn discover_state(&self) -> DeployFuture<'_, Result<NodeState, DeployError>> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.discoveries.lock().unwrap().pop_front();
        Box::pin(async move {
            match next {
                Some(Discovery::Ready(state)) => Ok(state),
                Some(Discovery::Failing(message)) => Err(DeployError::message(message)),
                Some(Discovery::Pending) | None => std::future::pending().await,
            }
        })
    }

    fn calculate_changes(
        &self,
        local: &NodeState,
        desired: &Deployment,
        cluster: &DeploymentState,
    ) -> Box<dyn Action> {
        self.calculate_inputs
            .lock()
            .unwrap()
            .push((local.clone(), desired.clone(), cluster.clone()));
        let action = self
            .actions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(ScriptedAction::succeeding);
        Box::new(action)
    }
}

enum Outcome {
    Succeed,
    Fail(&'static str),
    Blocked(oneshot::Receiver<()>),
}

/// Action whose outcome is scripted; records whether it ran.
pub(crate) struct ScriptedAction {
    outcome: Outcome,
    ran: Arc<AtomicBool>,
}

impl ScriptedAction {
    pub(crate) fn succeeding() -> Self {
        Self {
            outcome: Outcome::Succeed,
            ran: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn failing(message: &'static str) -> Self {
        Self {
            outcome: Outcome::Fail(message),
            ran: Arc::new(AtomicBool::new(false)),
        }
    }

    /// An action that blocks until the returned sender fires.
    pub(crate) fn blocked() -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                outcome: Outcome::Blocked(rx),
                ran: Arc::new(AtomicBool::new(false)),
            },
            tx,
        )
    }

    pub(crate) fn ran_flag(&self) -> Arc<AtomicBool> {
        self.ran.clone()
    }
}

impl fmt::Debug for ScriptedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.outcome {
            Outcome::Succeed => "succeed",
            Outcome::Fail(_) => "fail",
            Outcome::Blocked(_) => "blocked",
        };
        write!(f, "ScriptedAction({kind})")
    }
}

impl Action for ScriptedAction {
    fn run(
        self: Box<Self>,
        _deployer: Arc<dyn Deployer>,
    ) -> DeployFuture<'static, Result<(), DeployError>> {
        Box::pin(async move {
            self.ran.store(true, Ordering::SeqCst);
            match self.outcome {
                Outcome::Succeed => Ok(()),
                Outcome::Fail(message) => Err(DeployError::message(message)),
                Outcome::Blocked(rx) => {
                    let _ = rx.await;
                    Ok(())
                }
            }
        })
    }
}

/// One scripted acknowledgment.
pub(crate) enum Ack {
    Ok,
    Fail(&'static str),
    /// Never acknowledges; parks the report step.
    Withheld,
}

/// Control client recording every command; acknowledgments follow a
/// script, defaulting to success once it runs out.
pub(crate) struct ScriptedClient {
    acks: Mutex<VecDeque<Ack>>,
    calls: Mutex<Vec<Command>>,
    pub(crate) closed: AtomicBool,
}

impl ScriptedClient {
    pub(crate) fn new(acks: Vec<Ack>) -> Arc<Self> {
        Arc::new(Self {
            acks: Mutex::new(acks.into()),
            calls: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// The node states sent so far, in order.
    pub(crate) fn sent_states(&self) -> Vec<NodeState> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .flat_map(|Command::NodeState { state_changes }| state_changes.clone())
            .collect()
    }
}

impl ControlClient for ScriptedClient {
    fn call(&self, command: Command) -> ClientFuture<'_, Result<(), ControlError>> {
        self.calls.lock().unwrap().push(command);
        let ack = self.acks.lock().unwrap().pop_front().unwrap_or(Ack::Ok);
        Box::pin(async move {
            match ack {
                Ack::Ok => Ok(()),
                Ack::Fail(message) => Err(ControlError::Transport(message.into())),
                Ack::Withheld => std::future::pending().await,
            }
        })
    }

    fn close(&self) -> ClientFuture<'_, ()> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
        })
    }
}

/// A node state with one application, distinct enough that substitution
/// into an empty cluster view is visible.
pub(crate) fn node(hostname: &str) -> NodeState {
    NodeState::new(hostname).with_applications([Application::new("site", "nginx:1.27")])
}

/// Lets spawned tasks run through their ready futures.
pub(crate) async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
