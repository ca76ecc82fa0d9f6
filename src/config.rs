//! Coordinator configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default listen port
pub const DEFAULT_PORT: u16 = 5100;

/// Default number of concurrent clients
pub const DEFAULT_CAPACITY: usize = 50;

/// Default ceiling on the coordinator's idle wait
pub const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(50);

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind the listener to
    pub host: IpAddr,
    /// Port to listen on (0 picks a free port)
    pub port: u16,
    /// Maximum number of concurrent clients
    pub capacity: usize,
    /// Longest pause between loop iterations when nothing is ready
    pub idle_wait: Duration,
    /// Buffer size of each worker → coordinator control channel
    pub control_buffer: usize,
    /// Records drained from one slot per iteration
    pub drain_batch: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            capacity: DEFAULT_CAPACITY,
            idle_wait: DEFAULT_IDLE_WAIT,
            control_buffer: 32,
            drain_batch: 32,
        }
    }
}

impl RelayConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Loopback listener on an ephemeral port, for tests and local runs
    pub fn local(capacity: usize) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            capacity,
            idle_wait: Duration::from_millis(10),
            ..Self::default()
        }
    }
}
