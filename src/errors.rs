use std::io;
use std::net::SocketAddr;

use crate::address::DeviceAddress;

/// All error types that can occur when talking to Yeelight devices.
///
/// Every variant raised while talking to a device carries the address it was
/// talking to, so callers can log or react without extra bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to serialize a command to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// The TCP connection to the device could not be established.
    #[error("[{address}] could not connect: {err}")]
    ConnectFailed { address: DeviceAddress, err: io::Error },

    /// A connect, write or read deadline elapsed.
    #[error("[{address}] {action} timed out")]
    Timeout { address: String, action: String },

    /// A socket operation failed after the connection was established.
    #[error("[{address}] socket {action} error: {err:?}")]
    Socket {
        address: String,
        action: String,
        err: io::Error,
    },

    /// The bytes read from the device are not a valid response.
    #[error("[{address}] malformed response: {reason}")]
    MalformedResponse {
        address: DeviceAddress,
        reason: String,
    },

    /// The device answered with an error object.
    #[error("[{address}] device rejected command (code {code}): {message}")]
    DeviceRejected {
        address: DeviceAddress,
        code: i64,
        message: String,
    },

    /// Discovery finished without any reply.
    #[error("[{target}] no device found")]
    NoDeviceFound { target: String },

    /// A discovery reply did not carry a usable `LOCATION` header.
    #[error("malformed discovery reply from {from}: {reason}")]
    MalformedDiscoveryReply { from: SocketAddr, reason: String },

    /// The given string cannot be used as a device address.
    #[error("invalid device address {0:?}")]
    InvalidAddress(String),
}

impl Error {
    /// Create a new socket error
    pub fn socket(address: impl ToString, action: &str, err: io::Error) -> Self {
        Error::Socket {
            address: address.to_string(),
            action: action.to_string(),
            err,
        }
    }

    /// Create a new timeout error
    pub fn timeout(address: impl ToString, action: &str) -> Self {
        Error::Timeout {
            address: address.to_string(),
            action: action.to_string(),
        }
    }

    pub fn connect_failed(address: &DeviceAddress, err: io::Error) -> Self {
        Error::ConnectFailed {
            address: address.clone(),
            err,
        }
    }

    pub fn malformed(address: &DeviceAddress, reason: impl ToString) -> Self {
        Error::MalformedResponse {
            address: address.clone(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed_reply(from: SocketAddr, reason: impl ToString) -> Self {
        Error::MalformedDiscoveryReply {
            from,
            reason: reason.to_string(),
        }
    }

    /// Whether a deadline elapsed. Callers that want to retry usually key on this.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Whether the failure happened below the protocol level (connect, I/O, deadline).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::ConnectFailed { .. } | Error::Timeout { .. } | Error::Socket { .. }
        )
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
