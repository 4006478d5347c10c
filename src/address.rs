//! Device addresses.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::errors::Error;

/// Host and port of a controllable device.
///
/// Parsing accepts `host:port`, a bare host, a bare IPv4/IPv6 address or a
/// bracketed IPv6 address. The port defaults to [`DeviceAddress::DEFAULT_PORT`].
///
/// ```
/// use yeelight_rs::DeviceAddress;
///
/// let addr: DeviceAddress = "192.168.1.50".parse().unwrap();
/// assert_eq!(addr.to_string(), "192.168.1.50:55443");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    host: String,
    port: u16,
}

impl DeviceAddress {
    pub const DEFAULT_PORT: u16 = 55443;

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        DeviceAddress {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for DeviceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress(s.to_string()));
        }

        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr.into());
        }
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(DeviceAddress::new(ip.to_string(), Self::DEFAULT_PORT));
        }
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            let ip: IpAddr = inner
                .parse()
                .map_err(|_| Error::InvalidAddress(s.to_string()))?;
            return Ok(DeviceAddress::new(ip.to_string(), Self::DEFAULT_PORT));
        }

        match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::InvalidAddress(s.to_string()))?;
                if host.is_empty() {
                    return Err(Error::InvalidAddress(s.to_string()));
                }
                Ok(DeviceAddress::new(host, port))
            }
            None => Ok(DeviceAddress::new(s, Self::DEFAULT_PORT)),
        }
    }
}

impl From<SocketAddr> for DeviceAddress {
    fn from(addr: SocketAddr) -> Self {
        DeviceAddress::new(addr.ip().to_string(), addr.port())
    }
}

impl From<IpAddr> for DeviceAddress {
    fn from(ip: IpAddr) -> Self {
        DeviceAddress::new(ip.to_string(), Self::DEFAULT_PORT)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
