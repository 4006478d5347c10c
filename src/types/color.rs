//! RGB colors.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// An RGB color with red, green, and blue components (0-255 each).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub(crate) red: u8,
    pub(crate) green: u8,
    pub(crate) blue: u8,
}

impl Color {
    /// Create a color with the given RGB values.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }

    /// The single integer `set_rgb` expects: `red << 16 | green << 8 | blue`.
    ///
    /// ```
    /// use yeelight_rs::Color;
    ///
    /// assert_eq!(Color::rgb(255, 0, 0).packed(), 0xFF0000);
    /// assert_eq!(Color::rgb(0x12, 0x34, 0x56).packed(), 0x123456);
    /// ```
    pub fn packed(&self) -> u32 {
        (u32::from(self.red) << 16) | (u32::from(self.green) << 8) | u32::from(self.blue)
    }
}

impl FromStr for Color {
    type Err = String;

    /// Parse from comma-separated string (e.g., "255,128,0").
    fn from_str(s: &str) -> Result<Self, String> {
        let parts = s
            .split(',')
            .map(|c| c.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid color component: {e}"))?;
        match parts[..] {
            [red, green, blue] => Ok(Self::rgb(red, green, blue)),
            _ => Err("Expected format: r,g,b".into()),
        }
    }
}
