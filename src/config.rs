//! Timeouts and endpoints used by the transport, the listener and discovery.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::framing::FrameDecoder;

/// Deadlines applied to device connections.
///
/// Durations are (de)serialized as milliseconds:
///
/// ```
/// use yeelight_rs::TransportConfig;
///
/// let config: TransportConfig = serde_json::from_str(r#"{"read_timeout": 500}"#).unwrap();
/// assert_eq!(config.read_timeout.as_millis(), 500);
/// assert_eq!(config.connect_timeout.as_secs(), 3);
/// ```
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Bound on establishing a TCP connection.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub connect_timeout: Duration,
    /// Bound on writing one command frame.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub write_timeout: Duration,
    /// Bound on waiting for the response to a command.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub read_timeout: Duration,
    /// When set, a listener that receives nothing for this long ends its stream.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub listen_idle_timeout: Option<Duration>,
    /// Longest message accepted from a device, in bytes. Longer lines are
    /// dropped as malformed.
    pub max_frame_size: usize,
}

impl TransportConfig {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);
    pub const DEFAULT_MAX_FRAME_SIZE: usize = FrameDecoder::DEFAULT_MAX_FRAME_SIZE;

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_listen_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.listen_idle_timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            write_timeout: Self::DEFAULT_WRITE_TIMEOUT,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
            listen_idle_timeout: None,
            max_frame_size: Self::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Where and how long to search for devices.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Destination of the search message, normally the SSDP multicast group.
    pub target: SocketAddr,
    /// Local address the probing socket binds to.
    pub bind: String,
    /// How long to wait for the first reply.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,
}

impl DiscoveryConfig {
    pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
    pub const MULTICAST_PORT: u16 = 1982;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target: SocketAddr::V4(SocketAddrV4::new(
                Self::MULTICAST_GROUP,
                Self::MULTICAST_PORT,
            )),
            bind: "0.0.0.0:0".to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}
