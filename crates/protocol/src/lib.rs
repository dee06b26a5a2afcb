//! Wire protocol types for Caravel agent-control communication.
//!
//! Defines the node/cluster data model, the JSON message envelope, and the
//! command payloads exchanged between per-node agents and the control
//! service. This crate does no I/O.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

pub use constants::{MessageType, PROTOCOL_VERSION, ProtocolCompatibility};
pub use envelope::{Message, WireError};
pub use messages::{AgentHelloRequest, ClusterStatusUpdate, HelloAck, NodeStateCommand};
pub use types::{Application, Dataset, Deployment, DeploymentState, ImageName, Manifestation, NodeState};
