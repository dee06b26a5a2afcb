//! The convergence loop.
//!
//! One pass (an iteration) is: discover local state, substitute it into
//! the cluster view, calculate a plan, then run the plan and report the
//! discovered state upstream in parallel, and finally pace before the
//! next pass. The loop runs as a single task; its states are the control
//! flow of that task, so every transition is serialized and at most one
//! iteration is ever in flight.
//!
//! Inputs received mid-iteration overwrite the stored snapshot without
//! disturbing the pass that already captured it. A stop only latches at
//! the iteration boundary, and a status update received before that
//! boundary cancels it: a fresh update means a new control-service
//! session exists and convergence must continue against it.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info};

use caravel_protocol::types::{Deployment, DeploymentState, NodeState};

use crate::client::{Command, ControlClient};
use crate::deployer::Deployer;

/// Default pause between convergence iterations.
pub const ITERATION_DELAY: Duration = Duration::from_secs(1);

/// Snapshot consumed by the convergence loop: the control client plus
/// the most recent cluster view it pushed.
#[derive(Clone)]
pub struct ClientStatusUpdate {
    pub client: Arc<dyn ControlClient>,
    pub configuration: Deployment,
    pub state: DeploymentState,
}

/// Inputs accepted by the convergence loop.
pub enum ConvergenceInput {
    /// A fresh cluster view; only the most recent one is retained.
    StatusUpdate(ClientStatusUpdate),
    /// The control-service session is gone; stop at the next iteration
    /// boundary.
    Stop,
}

/// Spawns the convergence loop task.
///
/// The loop exits once every sender of the returned handle is dropped,
/// finishing the in-flight iteration first, which is what makes an
/// orderly shutdown wait for the deployer to release its resources.
pub fn spawn_convergence_loop(
    deployer: Arc<dyn Deployer>,
    iteration_delay: Duration,
) -> (mpsc::UnboundedSender<ConvergenceInput>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = LoopTask {
        deployer,
        iteration_delay,
        rx,
        snapshot: None,
        last_acknowledged: Arc::new(Mutex::new(None)),
    };
    (tx, tokio::spawn(task.run()))
}

struct LoopTask {
    deployer: Arc<dyn Deployer>,
    iteration_delay: Duration,
    rx: mpsc::UnboundedReceiver<ConvergenceInput>,
    /// Most recent status update; iterations capture it at their start.
    snapshot: Option<ClientStatusUpdate>,
    /// Last state for which a report round-trip succeeded. Shared with
    /// the in-flight iteration: the report step records an
    /// acknowledgment the moment it lands, while a mid-iteration client
    /// switch clears the cell. Whichever happens later wins.
    last_acknowledged: Arc<Mutex<Option<NodeState>>>,
}

impl LoopTask {
    async fn run(mut self) {
        loop {
            // STOPPED: wait for a status update; a stray stop is ignored.
            match self.rx.recv().await {
                None => return,
                Some(ConvergenceInput::Stop) => {
                    debug!(
                        fsm = "convergence_loop",
                        from = "STOPPED",
                        input = "STOP",
                        to = "STOPPED",
                        "FSM_TRANSITION"
                    );
                }
                Some(ConvergenceInput::StatusUpdate(update)) => {
                    debug!(
                        fsm = "convergence_loop",
                        from = "STOPPED",
                        input = "STATUS_UPDATE",
                        to = "CONVERGING",
                        "FSM_TRANSITION"
                    );
                    self.store_snapshot(update);
                    if self.converge().await.is_break() {
                        return;
                    }
                }
            }
        }
    }

    /// CONVERGING / CONVERGING_STOPPING: runs iterations until a stop
    /// latches at an iteration boundary. `Break` means the input channel
    /// closed and the whole task should exit.
    async fn converge(&mut self) -> ControlFlow<()> {
        let mut stopping = false;
        let mut closed = false;

        loop {
            let Some(snapshot) = self.snapshot.clone() else {
                return ControlFlow::Break(());
            };

            let iteration = run_iteration(
                self.deployer.clone(),
                snapshot,
                self.last_acknowledged.clone(),
            );
            tokio::pin!(iteration);

            // Drive the iteration while absorbing inputs. The pass keeps
            // the snapshot it captured; updates only affect the next one.
            loop {
                tokio::select! {
                    () = &mut iteration => break,
                    input = self.rx.recv(), if !closed => {
                        self.absorb(input, &mut stopping, &mut closed);
                    }
                }
            }

            if closed {
                // Orderly shutdown: iteration finished, skip the pacing
                // timer and exit.
                return ControlFlow::Break(());
            }

            // Pace the next iteration; inputs keep landing meanwhile. A
            // closed channel cancels the pending timer outright.
            let delay = tokio::time::sleep(self.iteration_delay);
            tokio::pin!(delay);
            loop {
                tokio::select! {
                    _ = &mut delay => break,
                    input = self.rx.recv(), if !closed => {
                        self.absorb(input, &mut stopping, &mut closed);
                        if closed {
                            break;
                        }
                    }
                }
            }

            if closed {
                return ControlFlow::Break(());
            }
            if stopping {
                debug!(
                    fsm = "convergence_loop",
                    from = "CONVERGING_STOPPING",
                    input = "ITERATION_DONE",
                    to = "STOPPED",
                    "FSM_TRANSITION"
                );
                return ControlFlow::Continue(());
            }
            debug!(
                fsm = "convergence_loop",
                from = "CONVERGING",
                input = "ITERATION_DONE",
                to = "CONVERGING",
                "FSM_TRANSITION"
            );
        }
    }

    fn absorb(
        &mut self,
        input: Option<ConvergenceInput>,
        stopping: &mut bool,
        closed: &mut bool,
    ) {
        let from = if *stopping {
            "CONVERGING_STOPPING"
        } else {
            "CONVERGING"
        };
        match input {
            None => *closed = true,
            Some(ConvergenceInput::Stop) => {
                debug!(
                    fsm = "convergence_loop",
                    from,
                    input = "STOP",
                    to = "CONVERGING_STOPPING",
                    "FSM_TRANSITION"
                );
                *stopping = true;
            }
            Some(ConvergenceInput::StatusUpdate(update)) => {
                // A fresh update cancels any latched stop.
                debug!(
                    fsm = "convergence_loop",
                    from,
                    input = "STATUS_UPDATE",
                    to = "CONVERGING",
                    "FSM_TRANSITION"
                );
                *stopping = false;
                self.store_snapshot(update);
            }
        }
    }

    /// Stores the newest snapshot. A different client means a different
    /// control-service session, which may not have our state at all, so
    /// the acknowledged state is cleared to force a fresh report.
    fn store_snapshot(&mut self, update: ClientStatusUpdate) {
        let same_client = self
            .snapshot
            .as_ref()
            .is_some_and(|previous| Arc::ptr_eq(&previous.client, &update.client));
        if !same_client
            && let Ok(mut acknowledged) = self.last_acknowledged.lock()
        {
            *acknowledged = None;
        }
        self.snapshot = Some(update);
    }
}

/// Runs one iteration: discover, substitute, calculate, then report and
/// act in parallel.
async fn run_iteration(
    deployer: Arc<dyn Deployer>,
    snapshot: ClientStatusUpdate,
    last_acknowledged: Arc<Mutex<Option<NodeState>>>,
) {
    let span = tracing::info_span!(
        "CONVERGE",
        cluster_state = ?snapshot.state,
        desired_configuration = ?snapshot.configuration,
    );
    async move {
        let local = match deployer.discover_state().await {
            Ok(local) => local,
            Err(e) => {
                error!(error = %e, "state discovery failed, skipping this iteration");
                return;
            }
        };

        // The control service's view of this node lags reality; fold the
        // fresh snapshot in before calculating.
        let cluster = snapshot.state.update_node(local.clone());
        let action = deployer.calculate_changes(&local, &snapshot.configuration, &cluster);
        info!(calculated_actions = ?action, "CALCULATED_ACTIONS");

        let report = report_state(&snapshot, &local, &last_acknowledged);
        let act = async {
            if let Err(e) = action.run(deployer.clone()).await {
                error!(error = %e, "applying calculated changes failed");
            }
        };
        tokio::join!(report, act);
    }
    .instrument(span)
    .await
}

/// Sends the discovered state unless it matches the last acknowledged
/// one, recording the acknowledgment as soon as it lands.
async fn report_state(
    snapshot: &ClientStatusUpdate,
    local: &NodeState,
    last_acknowledged: &Mutex<Option<NodeState>>,
) {
    if let Ok(acknowledged) = last_acknowledged.lock()
        && acknowledged.as_ref() == Some(local)
    {
        debug!("local state unchanged since last acknowledgment, not re-sending");
        return;
    }

    let span = tracing::info_span!("SEND_TO_CONTROL_SERVICE", local_changes = ?[local]);
    async {
        let command = Command::NodeState {
            state_changes: vec![local.clone()],
        };
        match snapshot.client.call(command).await {
            Ok(()) => {
                if let Ok(mut acknowledged) = last_acknowledged.lock() {
                    *acknowledged = Some(local.clone());
                }
            }
            Err(e) => {
                // Leaving the acknowledged state untouched forces a
                // re-send next iteration, so the control service's view
                // eventually matches reality.
                error!(error = %e, "sending local state to control service failed");
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::{
        Ack, Discovery, ScriptedAction, ScriptedClient, ScriptedDeployer, node, settle,
    };

    fn update(
        client: &Arc<ScriptedClient>,
        configuration: Deployment,
        state: DeploymentState,
    ) -> ConvergenceInput {
        ConvergenceInput::StatusUpdate(ClientStatusUpdate {
            client: client.clone(),
            configuration,
            state,
        })
    }

    #[tokio::test]
    async fn status_update_starts_discovery() {
        let deployer = ScriptedDeployer::new(vec![Discovery::Pending], vec![]);
        let client = ScriptedClient::new(vec![]);
        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);

        tx.send(update(&client, Deployment::default(), DeploymentState::default()))
            .unwrap();
        settle().await;

        assert_eq!(deployer.discover_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_while_stopped_is_ignored() {
        let local = node("192.0.2.123");
        let deployer =
            ScriptedDeployer::new(vec![Discovery::Ready(local.clone())], vec![]);
        let client = ScriptedClient::new(vec![Ack::Ok]);
        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);

        tx.send(ConvergenceInput::Stop).unwrap();
        tx.send(update(&client, Deployment::default(), DeploymentState::default()))
            .unwrap();
        settle().await;

        assert_eq!(client.sent_states(), vec![local]);
    }

    #[tokio::test]
    async fn discovered_state_is_reported_and_action_run() {
        let local = node("192.0.2.123");
        let (action, _release) = ScriptedAction::blocked();
        let ran = action.ran_flag();
        let deployer =
            ScriptedDeployer::new(vec![Discovery::Ready(local.clone())], vec![action]);
        let client = ScriptedClient::new(vec![Ack::Ok]);
        let configuration = Deployment::from_nodes([local.clone()]);
        // The control service still believes the node is empty.
        let received = DeploymentState::from_nodes([NodeState::new("192.0.2.123")]);

        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);
        tx.send(update(&client, configuration.clone(), received.clone()))
            .unwrap();
        settle().await;

        assert_eq!(client.sent_states(), vec![local.clone()]);
        assert!(ran.load(Ordering::SeqCst));
        // Calculation saw the freshly discovered state substituted into
        // the cluster view.
        assert_eq!(
            deployer.calculate_inputs(),
            vec![(local.clone(), configuration, received.update_node(local))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn iteration_waits_for_the_pacing_delay() {
        let local = node("192.0.2.123");
        let deployer = ScriptedDeployer::new(
            vec![Discovery::Ready(local.clone()), Discovery::Pending],
            vec![],
        );
        let client = ScriptedClient::new(vec![Ack::Ok]);
        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);

        tx.send(update(&client, Deployment::default(), DeploymentState::default()))
            .unwrap();
        settle().await;

        // First iteration is done, but the next discovery must not start
        // until the delay elapses.
        assert_eq!(deployer.discover_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;
        assert_eq!(deployer.discover_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_state_is_sent_once() {
        let local = node("192.0.2.123");
        let deployer = ScriptedDeployer::new(
            vec![
                Discovery::Ready(local.clone()),
                Discovery::Ready(local.clone()),
                Discovery::Pending,
            ],
            vec![],
        );
        let client = ScriptedClient::new(vec![Ack::Ok]);
        let configuration = Deployment::from_nodes([local.clone()]);
        let received = DeploymentState::from_nodes([local.clone()]);

        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);
        tx.send(update(&client, configuration.clone(), received.clone()))
            .unwrap();
        settle().await;
        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;

        // Both iterations calculated, but the unchanged state was only
        // sent once.
        let expected_input = (
            local.clone(),
            configuration,
            received.update_node(local.clone()),
        );
        assert_eq!(
            deployer.calculate_inputs(),
            vec![expected_input.clone(), expected_input]
        );
        assert_eq!(client.sent_states(), vec![local]);
    }

    #[tokio::test(start_paused = true)]
    async fn changed_state_is_sent_again() {
        let local = node("192.0.2.123");
        let changed = local
            .clone()
            .with_applications([caravel_protocol::types::Application::new("app", "nginx")]);
        let deployer = ScriptedDeployer::new(
            vec![
                Discovery::Ready(local.clone()),
                Discovery::Ready(changed.clone()),
                Discovery::Pending,
            ],
            vec![],
        );
        let client = ScriptedClient::new(vec![Ack::Ok, Ack::Ok]);
        let configuration = Deployment::from_nodes([local.clone()]);
        let received = DeploymentState::from_nodes([local.clone()]);

        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);
        tx.send(update(&client, configuration.clone(), received.clone()))
            .unwrap();
        settle().await;
        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;

        assert_eq!(
            deployer.calculate_inputs(),
            vec![
                (
                    local.clone(),
                    configuration.clone(),
                    received.update_node(local.clone())
                ),
                (
                    changed.clone(),
                    configuration,
                    received.update_node(changed.clone())
                ),
            ]
        );
        assert_eq!(client.sent_states(), vec![local, changed]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_forces_a_resend() {
        let local = node("192.0.2.123");
        let deployer = ScriptedDeployer::new(
            vec![
                Discovery::Ready(local.clone()),
                Discovery::Ready(local.clone()),
                Discovery::Pending,
            ],
            vec![],
        );
        let client = ScriptedClient::new(vec![Ack::Fail("simulated request problem"), Ack::Ok]);

        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);
        tx.send(update(&client, Deployment::default(), DeploymentState::default()))
            .unwrap();
        settle().await;
        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;

        // The state did not change, but the failed send left it
        // unacknowledged, so it went out twice.
        assert_eq!(client.sent_states(), vec![local.clone(), local]);
    }

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_change_is_resent_even_after_reverting() {
        let local = node("192.0.2.123");
        let changed = local
            .clone()
            .with_applications([caravel_protocol::types::Application::new("app", "nginx")]);
        let deployer = ScriptedDeployer::new(
            vec![
                Discovery::Ready(local.clone()),
                Discovery::Ready(changed.clone()),
                Discovery::Ready(local.clone()),
                Discovery::Pending,
            ],
            vec![],
        );
        // The changed state reaches the control service but its
        // acknowledgment is lost; when the node reverts, the original
        // state must be sent again or the control service would keep the
        // changed one forever.
        let client = ScriptedClient::new(vec![Ack::Ok, Ack::Fail("lost acknowledgment"), Ack::Ok]);

        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);
        tx.send(update(&client, Deployment::default(), DeploymentState::default()))
            .unwrap();
        settle().await;
        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;
        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;

        assert_eq!(client.sent_states(), vec![local.clone(), changed, local]);
    }

    #[tokio::test(start_paused = true)]
    async fn withheld_acknowledgment_gates_the_next_send() {
        let local = node("192.0.2.123");
        let deployer = ScriptedDeployer::new(
            vec![
                Discovery::Ready(local.clone()),
                Discovery::Ready(local.clone()),
            ],
            vec![],
        );
        let client = ScriptedClient::new(vec![Ack::Withheld]);

        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);
        tx.send(update(&client, Deployment::default(), DeploymentState::default()))
            .unwrap();
        settle().await;
        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;

        // The iteration is still waiting on its acknowledgment, so the
        // pacing delay alone must not produce a second send.
        assert_eq!(client.sent_states(), vec![local]);
    }

    #[tokio::test(start_paused = true)]
    async fn action_failure_still_schedules_the_next_iteration() {
        let local = node("192.0.2.123");
        let deployer = ScriptedDeployer::new(
            vec![Discovery::Ready(local.clone()), Discovery::Pending],
            vec![ScriptedAction::failing("failed action")],
        );
        let client = ScriptedClient::new(vec![Ack::Ok]);

        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);
        tx.send(update(&client, Deployment::default(), DeploymentState::default()))
            .unwrap();
        settle().await;
        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;

        assert_eq!(deployer.discover_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_failure_still_schedules_the_next_iteration() {
        let local = node("192.0.1.2");
        let deployer = ScriptedDeployer::new(
            vec![
                Discovery::Failing("discovery blew up"),
                Discovery::Ready(local.clone()),
                Discovery::Pending,
            ],
            vec![],
        );
        let client = ScriptedClient::new(vec![Ack::Ok]);

        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);
        tx.send(update(&client, Deployment::default(), DeploymentState::default()))
            .unwrap();
        settle().await;
        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;

        // The failed pass calculated nothing, and the following one
        // recovered and reported.
        assert_eq!(deployer.calculate_inputs().len(), 1);
        assert_eq!(client.sent_states(), vec![local]);
    }

    #[tokio::test(start_paused = true)]
    async fn status_update_mid_iteration_applies_to_the_next_one() {
        let local = node("192.0.2.123");
        let second_local = node("192.0.2.123");
        let (action, release) = ScriptedAction::blocked();
        let deployer = ScriptedDeployer::new(
            vec![
                Discovery::Ready(local.clone()),
                Discovery::Ready(second_local.clone()),
                Discovery::Pending,
            ],
            vec![action],
        );
        let client = ScriptedClient::new(vec![Ack::Ok]);
        let client2 = ScriptedClient::new(vec![Ack::Ok]);
        let configuration = Deployment::from_nodes([local.clone()]);
        let state = DeploymentState::from_nodes([local.clone()]);
        let configuration2 = Deployment::default();
        let state2 = DeploymentState::default();

        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);
        tx.send(update(&client, configuration.clone(), state.clone()))
            .unwrap();
        settle().await;

        // First iteration is blocked on its action; a new status update
        // arrives meanwhile.
        tx.send(update(&client2, configuration2.clone(), state2.clone()))
            .unwrap();
        settle().await;
        release.send(()).unwrap();
        settle().await;
        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;

        assert_eq!(
            deployer.calculate_inputs(),
            vec![
                (local.clone(), configuration, state.update_node(local.clone())),
                (
                    second_local.clone(),
                    configuration2,
                    state2.update_node(second_local.clone())
                ),
            ]
        );
        assert_eq!(client.sent_states(), vec![local]);
        assert_eq!(client2.sent_states(), vec![second_local]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_latches_at_the_iteration_boundary() {
        let local = node("192.0.2.123");
        let (action, release) = ScriptedAction::blocked();
        let deployer =
            ScriptedDeployer::new(vec![Discovery::Ready(local.clone())], vec![action]);
        let client = ScriptedClient::new(vec![Ack::Ok]);

        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);
        tx.send(update(&client, Deployment::default(), DeploymentState::default()))
            .unwrap();
        settle().await;

        // Stop arrives while the action is still running; the iteration
        // completes, then the loop stops instead of starting another.
        tx.send(ConvergenceInput::Stop).unwrap();
        release.send(()).unwrap();
        settle().await;
        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;
        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;

        assert_eq!(deployer.discover_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.sent_states(), vec![local]);
    }

    #[tokio::test(start_paused = true)]
    async fn status_update_after_stop_resumes_convergence() {
        let local = node("192.0.2.123");
        let second_local = node("192.0.2.123");
        let (action, release) = ScriptedAction::blocked();
        let deployer = ScriptedDeployer::new(
            vec![
                Discovery::Ready(local.clone()),
                Discovery::Ready(second_local.clone()),
                Discovery::Pending,
            ],
            vec![action],
        );
        let client = ScriptedClient::new(vec![Ack::Ok]);
        let client2 = ScriptedClient::new(vec![Ack::Ok]);

        let (tx, _handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);
        tx.send(update(&client, Deployment::default(), DeploymentState::default()))
            .unwrap();
        settle().await;

        // A stop followed by a fresh status update: the stop is cancelled
        // and the next iteration runs against the new client.
        tx.send(ConvergenceInput::Stop).unwrap();
        tx.send(update(&client2, Deployment::default(), DeploymentState::default()))
            .unwrap();
        release.send(()).unwrap();
        settle().await;
        tokio::time::advance(ITERATION_DELAY).await;
        settle().await;

        assert_eq!(client.sent_states(), vec![local]);
        assert_eq!(client2.sent_states(), vec![second_local]);
    }

    #[tokio::test]
    async fn closing_the_channel_waits_for_the_inflight_iteration() {
        let local = node("192.0.2.123");
        let (action, release) = ScriptedAction::blocked();
        let ran = action.ran_flag();
        let deployer =
            ScriptedDeployer::new(vec![Discovery::Ready(local.clone())], vec![action]);
        let client = ScriptedClient::new(vec![Ack::Ok]);

        let (tx, handle) = spawn_convergence_loop(deployer.clone(), ITERATION_DELAY);
        tx.send(update(&client, Deployment::default(), DeploymentState::default()))
            .unwrap();
        settle().await;

        // Dropping the only sender asks the loop to exit, but the
        // in-flight iteration must complete first.
        drop(tx);
        settle().await;
        assert!(!handle.is_finished());

        release.send(()).unwrap();
        handle.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
