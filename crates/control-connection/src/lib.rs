//! Reconnecting control-plane connection for Caravel agents.
//!
//! Provides the TLS WebSocket channel to the control service (request/ack
//! correlation, keepalive, push dispatch) and the [`Connector`] that keeps
//! it alive with exponential backoff, feeding connection lifecycle and
//! cluster status events into a [`ConvergenceAgent`].

pub mod channel;
pub mod connector;
pub(crate) mod pumps;
pub mod types;

pub use channel::{ChannelError, ControlChannel};
pub use connector::{AgentFuture, Connector, ConvergenceAgent};
pub use types::{AgentIdentity, ConnectorConfig, ReconnectConfig};
