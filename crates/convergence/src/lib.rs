//! Convergence core of the Caravel agent.
//!
//! Two cooperating state machines drive each agent: the cluster status
//! FSM tracks the control-plane connection and gates convergence on the
//! first received status update; the convergence loop discovers local
//! state, calculates and applies changes, and reports back upstream, one
//! iteration at a time. [`AgentLoopService`] wires both to a reconnecting
//! control connection.

pub mod client;
pub mod cluster_status;
pub mod convergence_loop;
pub mod deployer;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ClientFuture, Command, ControlClient, ControlError};
pub use cluster_status::{ClusterStatusFsm, ClusterStatusInput};
pub use convergence_loop::{ClientStatusUpdate, ConvergenceInput, ITERATION_DELAY};
pub use deployer::{Action, DeployError, DeployFuture, Deployer};
pub use service::AgentLoopService;
