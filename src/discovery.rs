//! Device discovery via SSDP-style UDP multicast.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use log::{debug, trace};

use crate::address::DeviceAddress;
use crate::config::DiscoveryConfig;
use crate::errors::Error;
use crate::light::Light;
use crate::method::Method;
use crate::runtime::{self, AsyncUdpSocket, UdpSocket};

type Result<T> = std::result::Result<T, Error>;

/// The search request every device listens for on the multicast group.
pub const SEARCH_MESSAGE: &str =
    "M-SEARCH * HTTP/1.1\r\n HOST:239.255.255.250:1982\r\n MAN:\"ssdp:discover\"\r\n ST:wifi_bulb\r\n";

/// A device that answered a discovery probe.
///
/// Besides the address, the reply headers describe the device (`id`, `model`,
/// `fw_ver`, `support`, `power`, `bright`, `name`, ...). Header names are
/// matched case-insensitively.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Address taken from the `LOCATION` header.
    pub address: DeviceAddress,
    /// Host that sent the reply.
    pub responder: SocketAddr,
    headers: BTreeMap<String, String>,
}

impl DiscoveredDevice {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.header("id")
    }

    pub fn model(&self) -> Option<&str> {
        self.header("model")
    }

    pub fn firmware_version(&self) -> Option<&str> {
        self.header("fw_ver")
    }

    /// Name set by the user, if any (devices report an empty string otherwise).
    pub fn name(&self) -> Option<&str> {
        self.header("name").filter(|n| !n.is_empty())
    }

    /// Methods the device advertises in its `support` header.
    pub fn support(&self) -> Vec<Method> {
        self.header("support")
            .map(|s| s.split_whitespace().map(Method::from).collect())
            .unwrap_or_default()
    }

    pub fn supports(&self, method: &Method) -> bool {
        self.header("support")
            .is_some_and(|s| s.split_whitespace().any(|m| m == method.as_str()))
    }

    /// Convert this device into a [`Light`] instance.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let device = discover().await?;
    /// let light = device.into_light(Some("Desk"));
    /// light.toggle().await?;
    /// ```
    pub fn into_light(self, name: Option<&str>) -> Light {
        Light::new(self.address, name)
    }
}

/// Find a device on the local network.
///
/// Sends [`SEARCH_MESSAGE`] to `239.255.255.250:1982` and returns the first
/// device that answers within three seconds.
///
/// # Examples
///
/// ```ignore
/// use yeelight_rs::discover;
///
/// let device = discover().await?;
/// println!("found {} ({:?})", device.address, device.model());
/// ```
pub async fn discover() -> Result<DiscoveredDevice> {
    discover_with(&DiscoveryConfig::default()).await
}

/// Like [`discover`], with a custom target, bind address and deadline.
///
/// Only the first reply is considered. A reply without a usable `LOCATION`
/// header fails with [`Error::MalformedDiscoveryReply`].
pub async fn discover_with(config: &DiscoveryConfig) -> Result<DiscoveredDevice> {
    let target = config.target.to_string();
    let socket = UdpSocket::bind(&config.bind)
        .await
        .map_err(|e| Error::socket(&target, "bind", e))?;

    socket
        .send_to(SEARCH_MESSAGE.as_bytes(), &target)
        .await
        .map_err(|e| Error::socket(&target, "send_to", e))?;
    debug!("sent discovery probe to {target}");

    let mut buffer = [0u8; 2048];
    let (size, from) = runtime::timeout(config.timeout, socket.recv_from(&mut buffer))
        .await
        .map_err(|_| Error::NoDeviceFound {
            target: target.clone(),
        })?
        .map_err(|e| Error::socket(&target, "recv_from", e))?;

    trace!("discovery reply from {from}: {:?}", String::from_utf8_lossy(&buffer[..size]));
    parse_reply(&buffer[..size], from)
}

/// Parse an HTTP-response-shaped discovery reply.
pub(crate) fn parse_reply(reply: &[u8], from: SocketAddr) -> Result<DiscoveredDevice> {
    let text = std::str::from_utf8(reply).map_err(|e| Error::malformed_reply(from, e))?;
    let mut lines = text.split('\n').map(|l| l.trim_end_matches('\r'));

    let status = lines.next().unwrap_or_default();
    if !status.starts_with("HTTP/") {
        return Err(Error::malformed_reply(
            from,
            format!("unexpected status line {status:?}"),
        ));
    }

    let headers: BTreeMap<String, String> = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let location = headers
        .get("location")
        .ok_or_else(|| Error::malformed_reply(from, "no LOCATION header"))?;
    let host_port = location
        .split_once("://")
        .map_or(location.as_str(), |(_, rest)| rest)
        .trim_end_matches('/');
    let address = host_port
        .parse::<DeviceAddress>()
        .map_err(|e| Error::malformed_reply(from, e))?;

    Ok(DiscoveredDevice {
        address,
        responder: from,
        headers,
    })
}
