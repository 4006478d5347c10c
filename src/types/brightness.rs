//! Brightness control.

use serde::{Deserialize, Serialize};

/// Brightness level from 1 to 100 percent.
///
/// Out-of-range values are clamped rather than rejected, since the device
/// refuses anything outside the range anyway.
///
/// ```
/// use yeelight_rs::Brightness;
///
/// assert_eq!(Brightness::clamped(0).value(), 1);
/// assert_eq!(Brightness::clamped(55).value(), 55);
/// assert_eq!(Brightness::clamped(250).value(), 100);
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "i32", into = "i32")]
pub struct Brightness {
    pub(crate) value: u8,
}

impl Brightness {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;

    pub fn clamped(value: i32) -> Self {
        Brightness {
            value: value.clamp(Self::MIN.into(), Self::MAX.into()) as u8,
        }
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}

impl From<i32> for Brightness {
    fn from(value: i32) -> Self {
        Self::clamped(value)
    }
}

impl From<Brightness> for i32 {
    fn from(brightness: Brightness) -> Self {
        brightness.value.into()
    }
}

impl Default for Brightness {
    fn default() -> Self {
        Brightness { value: Self::MAX }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_clamps() {
        let brightness: Brightness = serde_json::from_str("250").unwrap();
        assert_eq!(brightness.value(), 100);
        let brightness: Brightness = serde_json::from_str("-3").unwrap();
        assert_eq!(brightness.value(), 1);
        assert_eq!(serde_json::to_string(&Brightness::clamped(40)).unwrap(), "40");
    }
}
