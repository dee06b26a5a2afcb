//! Configuration types for the control-plane connection.

use std::sync::Arc;
use std::time::Duration;

use caravel_protocol::constants::PROTOCOL_VERSION;
use caravel_protocol::messages::AgentHelloRequest;

/// Identity an agent presents in the connection handshake.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub hostname: String,
    pub version: String,
}

/// Where and how to reach the control service.
#[derive(Clone)]
pub struct ConnectorConfig {
    pub host: String,
    pub port: u16,
    /// TLS client configuration. `None` means a plaintext connection,
    /// which is only acceptable on loopback (tests).
    pub tls: Option<Arc<rustls::ClientConfig>>,
    pub identity: AgentIdentity,
    pub reconnect: ReconnectConfig,
}

impl ConnectorConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        tls: Option<Arc<rustls::ClientConfig>>,
        identity: AgentIdentity,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
            identity,
            reconnect: ReconnectConfig::default(),
        }
    }

    /// WebSocket URL of the control service's agent endpoint.
    pub fn url(&self) -> String {
        let scheme = if self.tls.is_some() { "wss" } else { "ws" };
        format!("{scheme}://{}:{}/v1/agent", self.host, self.port)
    }

    pub(crate) fn hello(&self) -> AgentHelloRequest {
        AgentHelloRequest {
            hostname: self.identity.hostname.clone(),
            version: self.identity.version.clone(),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

/// Exponential backoff configuration for reconnection attempts.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Cap on the delay between attempts.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Delay for a given attempt number (1-based), with ±25% jitter so a
    /// control-service restart doesn't get the whole fleet back at once.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let base = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = base.min(self.max_delay.as_secs_f64());
        let jitter = capped * 0.25;
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64)
            * 2.0
            - 1.0;
        Duration::from_secs_f64((capped + jitter * offset).max(0.01))
    }
}
