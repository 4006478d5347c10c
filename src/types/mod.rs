//! Value types for light control parameters.

mod adjust;
mod brightness;
mod color;
mod kelvin;
mod power;

pub use adjust::{AdjustDuration, Percentage};
pub use brightness::Brightness;
pub use color::Color;
pub use kelvin::Kelvin;
pub use power::PowerMode;
