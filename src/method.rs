//! Protocol method names.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The method string sent to (or received from) a device.
///
/// Known methods are available as associated constants; anything else can be
/// built from a string, so new firmware methods need no library change.
///
/// ```
/// use yeelight_rs::Method;
///
/// assert_eq!(Method::SET_POWER.as_str(), "set_power");
/// assert_eq!(Method::from("set_music"), Method::from(String::from("set_music")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Method(Cow<'static, str>);

impl Method {
    pub const SET_COLOR_TEMPERATURE_ABX: Method = Method::known("set_ct_abx");
    pub const SET_RGB: Method = Method::known("set_rgb");
    pub const SET_HSV: Method = Method::known("set_hsv");
    pub const SET_BRIGHTNESS: Method = Method::known("set_bright");
    pub const SET_POWER: Method = Method::known("set_power");
    pub const TOGGLE: Method = Method::known("toggle");
    pub const GET_PROP: Method = Method::known("get_prop");
    pub const ADJUST_BRIGHTNESS: Method = Method::known("adjust_bright");
    pub const ADJUST_COLOR_TEMPERATURE: Method = Method::known("adjust_ct");
    pub const SET_DEFAULT: Method = Method::known("set_default");
    pub const SET_NAME: Method = Method::known("set_name");
    pub const START_COLOR_FLOW: Method = Method::known("start_cf");
    pub const STOP_COLOR_FLOW: Method = Method::known("stop_cf");
    pub const SET_SCENE: Method = Method::known("set_scene");

    /// Method of the unsolicited property-change notification.
    pub const PROPS: Method = Method::known("props");

    const fn known(name: &'static str) -> Self {
        Method(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Method {
    fn from(name: &str) -> Self {
        Method(Cow::Owned(name.to_string()))
    }
}

impl From<String> for Method {
    fn from(name: String) -> Self {
        Method(Cow::Owned(name))
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_equals_owned() {
        assert_eq!(Method::SET_BRIGHTNESS, Method::from("set_bright"));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&Method::ADJUST_COLOR_TEMPERATURE).unwrap();
        assert_eq!(json, "\"adjust_ct\"");

        let method: Method = serde_json::from_str("\"bg_set_rgb\"").unwrap();
        assert_eq!(method.as_str(), "bg_set_rgb");
    }
}
