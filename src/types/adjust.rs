//! Relative adjustments: `adjust_bright` and `adjust_ct`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Signed percentage change, clamped to -100..=100.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "i32", into = "i32")]
pub struct Percentage {
    pub(crate) value: i8,
}

impl Percentage {
    pub const MIN: i8 = -100;
    pub const MAX: i8 = 100;

    pub fn clamped(value: i32) -> Self {
        Percentage {
            value: value.clamp(Self::MIN.into(), Self::MAX.into()) as i8,
        }
    }

    pub fn value(&self) -> i8 {
        self.value
    }
}

impl From<i32> for Percentage {
    fn from(value: i32) -> Self {
        Self::clamped(value)
    }
}

impl From<Percentage> for i32 {
    fn from(percentage: Percentage) -> Self {
        percentage.value.into()
    }
}

/// How long a device takes to apply an adjustment; at least 30 ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustDuration(Duration);

impl AdjustDuration {
    pub const MIN: Duration = Duration::from_millis(30);

    pub fn clamped(duration: Duration) -> Self {
        AdjustDuration(duration.max(Self::MIN))
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::clamped(Duration::from_millis(millis))
    }

    pub fn as_millis(&self) -> u64 {
        u64::try_from(self.0.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for AdjustDuration {
    fn default() -> Self {
        AdjustDuration(Self::MIN)
    }
}
