//! # yeelight_rs
//!
//! An async Rust client for Yeelight smart lights, speaking their LAN protocol:
//! line-delimited JSON commands and responses over TCP, pushed state-change
//! notifications, and SSDP-style multicast discovery.
//!
//! This crate provides a **runtime-agnostic** async API; pick the runtime with a
//! feature flag.
//!
//! ## Quick Start
//!
//! ```ignore
//! use yeelight_rs::{Brightness, Color, discover};
//!
//! async fn control_light() -> Result<(), Box<dyn std::error::Error>> {
//!     // Find the first light that answers on the local network
//!     let light = discover().await?.into_light(Some("Desk"));
//!
//!     light.on().await?;
//!     light.set_rgb(Color::rgb(0, 0, 255)).await?;
//!     light.set_brightness(Brightness::clamped(40)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Layers
//!
//! - [`Transport`]: one command per TCP connection, one command in flight at a
//!   time, every connect/write/read bounded by a deadline
//!   ([`TransportConfig`]). Protocol failures come back as typed [`Error`]s.
//! - [`Transport::listen`]: a background task streaming [`Notification`]s
//!   until a cancellation future completes ([`Notifications`]).
//! - [`discover`] / [`discover_with`]: multicast probe returning the first
//!   [`DiscoveredDevice`].
//! - [`Light`]: typed operations (power, brightness, color temperature, RGB,
//!   toggle, relative adjustments) built on [`Transport::send`].
//!
//! Nothing is retried; a failed command or a broken listener never prevents
//! later calls from opening fresh connections.
//!
//! ## Communication
//!
//! Commands and notifications use TCP port 55443; discovery uses the multicast
//! group `239.255.255.250:1982`. "LAN Control" must be enabled on the device.
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime

mod address;
mod config;
mod connection;
mod discovery;
mod errors;
pub mod framing;
mod history;
mod light;
mod message;
mod method;
pub mod push;
pub mod runtime;
mod transport;
mod types;

// Re-export public API
pub use address::DeviceAddress;
pub use config::{DiscoveryConfig, TransportConfig};
pub use discovery::{DiscoveredDevice, SEARCH_MESSAGE, discover, discover_with};
pub use errors::Error;
pub use history::{HistoryEntry, HistorySummary, MessageHistory, MessageType};
pub use light::Light;
pub use message::{Command, DeviceError, Notification, Response};
pub use method::Method;
pub use push::{ListenerExit, Notifications};
pub use transport::Transport;
pub use types::{AdjustDuration, Brightness, Color, Kelvin, Percentage, PowerMode};
