//! Color temperature control.

use serde::{Deserialize, Serialize};

/// Color temperature in Kelvin, clamped to the 1700K-6500K range devices accept.
///
/// Lower values produce warmer (more yellow/orange) light, while higher
/// values produce cooler (more blue) light.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "i32", into = "i32")]
pub struct Kelvin {
    pub(crate) kelvin: u16,
}

impl Kelvin {
    pub const MIN: u16 = 1700;
    pub const MAX: u16 = 6500;

    /// Create a Kelvin value, clamping into range.
    ///
    /// # Examples
    ///
    /// ```
    /// use yeelight_rs::Kelvin;
    ///
    /// assert_eq!(Kelvin::clamped(1000).kelvin(), 1700);
    /// assert_eq!(Kelvin::clamped(2700).kelvin(), 2700);
    /// assert_eq!(Kelvin::clamped(9000).kelvin(), 6500);
    /// ```
    pub fn clamped(kelvin: i32) -> Self {
        Kelvin {
            kelvin: kelvin.clamp(Self::MIN.into(), Self::MAX.into()) as u16,
        }
    }

    pub fn kelvin(&self) -> u16 {
        self.kelvin
    }
}

impl From<i32> for Kelvin {
    fn from(kelvin: i32) -> Self {
        Self::clamped(kelvin)
    }
}

impl From<Kelvin> for i32 {
    fn from(kelvin: Kelvin) -> Self {
        kelvin.kelvin.into()
    }
}
