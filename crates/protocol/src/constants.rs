//! Protocol constants and version negotiation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Current agent-control protocol version.
///
/// Bumped on any incompatible change to the envelope or payload shapes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Oldest control-service protocol version this agent can talk to.
pub const MIN_PROTOCOL_VERSION: u32 = 1;

/// Maximum accepted WebSocket message size (16 MiB).
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// How long a request waits for its acknowledgment before giving up.
pub const WS_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between keepalive pings.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(20);

/// How long the read side tolerates silence before declaring the
/// connection dead. Must exceed [`WS_PING_PERIOD`].
pub const WS_PONG_WAIT: Duration = Duration::from_secs(50);

/// Message types carried in the envelope `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Agent-to-control handshake, sent once per connection.
    AgentHello,
    /// Control-to-agent push carrying desired configuration and
    /// observed cluster state.
    ClusterStatus,
    /// Agent-to-control report of freshly discovered local state.
    NodeState,
    /// Generic acknowledgment of a request.
    Ack,
    /// Error response.
    Error,
}

/// Result of comparing a peer's protocol version with ours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolCompatibility {
    Compatible,
    Incompatible { peer_version: u32, reason: String },
}

/// Checks whether a session with the given peer version can proceed.
pub fn check_protocol_compatibility(peer_version: u32) -> ProtocolCompatibility {
    if peer_version < MIN_PROTOCOL_VERSION {
        ProtocolCompatibility::Incompatible {
            peer_version,
            reason: format!(
                "control service protocol v{peer_version} is older than \
                 minimum supported v{MIN_PROTOCOL_VERSION}"
            ),
        }
    } else if peer_version > PROTOCOL_VERSION {
        ProtocolCompatibility::Incompatible {
            peer_version,
            reason: format!(
                "control service protocol v{peer_version} is newer than \
                 supported v{PROTOCOL_VERSION}"
            ),
        }
    } else {
        ProtocolCompatibility::Compatible
    }
}
