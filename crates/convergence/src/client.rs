//! Control-service client capability.

use std::future::Future;
use std::pin::Pin;

use caravel_protocol::types::NodeState;

/// A boxed future returned by client capability methods.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Commands the convergence core issues upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Report freshly discovered node states.
    NodeState { state_changes: Vec<NodeState> },
}

/// Failure of a command round-trip. Any error means the command was not
/// acknowledged; the loop will re-send the state next iteration.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("control service rejected the command ({code}): {message}")]
    Rejected { code: i32, message: String },
}

/// Handle to the control service held by the convergence loop.
///
/// A successful `call` is the acknowledgment the loop's change detection
/// keys on.
pub trait ControlClient: Send + Sync {
    fn call(&self, command: Command) -> ClientFuture<'_, Result<(), ControlError>>;

    /// Tears down the underlying session. Invoked by the cluster status
    /// FSM on shutdown.
    fn close(&self) -> ClientFuture<'_, ()>;
}
