//! Node-local deployment capability.
//!
//! The convergence loop is generic over how a node discovers its state
//! and applies changes; implementations live next to the storage and
//! container backends, not here.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use caravel_protocol::types::{Deployment, DeploymentState, NodeState};

/// A boxed future returned by deployer capability methods.
pub type DeployFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Failure from discovery or action execution.
///
/// Always recoverable: the loop logs it and keeps iterating.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct DeployError(#[from] Box<dyn std::error::Error + Send + Sync + 'static>);

impl DeployError {
    pub fn message(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }
}

/// An opaque, runnable plan produced by [`Deployer::calculate_changes`].
///
/// `Debug` is required so the calculated plan can be logged before it
/// runs.
pub trait Action: Debug + Send {
    /// Applies the plan against the node.
    fn run(self: Box<Self>, deployer: Arc<dyn Deployer>) -> DeployFuture<'static, Result<(), DeployError>>;
}

/// Discovers local node state and turns cluster views into runnable
/// plans.
pub trait Deployer: Send + Sync + 'static {
    /// Takes a fresh snapshot of this node.
    fn discover_state(&self) -> DeployFuture<'_, Result<NodeState, DeployError>>;

    /// Computes the plan that moves this node from `local` toward its
    /// entry in `desired`, given the cluster-wide `cluster` view. Pure;
    /// anything that can fail belongs in the returned action's `run`.
    fn calculate_changes(
        &self,
        local: &NodeState,
        desired: &Deployment,
        cluster: &DeploymentState,
    ) -> Box<dyn Action>;
}
