//! Wire messages exchanged with a device.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::method::Method;

/// A single request sent to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Chosen by the sender and echoed back in the matching [`Response`].
    pub id: u64,
    pub method: Method,
    /// Method-specific arguments; order is significant and never changed.
    pub params: Vec<Value>,
}

impl Command {
    pub fn new(id: u64, method: Method, params: Vec<Value>) -> Self {
        Command { id, method, params }
    }
}

/// The error object a device returns when it refuses a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceError {
    pub code: i64,
    pub message: String,
}

/// The reply to one [`Command`].
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<DeviceError>,
}

/// An unsolicited state-change event pushed by a device.
///
/// Devices report property values as strings; scalars of any other JSON type
/// are converted to their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub method: Method,
    #[serde(deserialize_with = "stringly_params")]
    pub params: BTreeMap<String, String>,
}

impl Notification {
    /// Value of a changed property, e.g. `"power"` or `"bright"`.
    pub fn get(&self, property: &str) -> Option<&str> {
        self.params.get(property).map(String::as_str)
    }
}

fn stringly_params<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect())
}
