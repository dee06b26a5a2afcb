//! Payloads carried inside the message envelope.

use serde::{Deserialize, Serialize};

use crate::types::{Deployment, DeploymentState, NodeState};

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Sent by an agent immediately after the transport connects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHelloRequest {
    pub hostname: String,
    pub version: String,
    pub protocol_version: u32,
}

/// Acknowledgment of [`AgentHelloRequest`], carrying the control
/// service's protocol version for the compatibility check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloAck {
    pub protocol_version: u32,
}

// ---------------------------------------------------------------------------
// Control-to-agent pushes
// ---------------------------------------------------------------------------

/// Pushed by the control service whenever its view of the cluster changes:
/// the desired configuration plus the last-reported state of every node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatusUpdate {
    pub configuration: Deployment,
    pub state: DeploymentState,
}

// ---------------------------------------------------------------------------
// Agent-to-control commands
// ---------------------------------------------------------------------------

/// Reports freshly discovered local state. A successful acknowledgment
/// means the control service has recorded the states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStateCommand {
    pub state_changes: Vec<NodeState>,
}
