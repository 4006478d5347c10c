//! Discover a Yeelight on the network and toggle it.
//!
//! This example demonstrates:
//! - Discovery of a light on the local network
//! - Reading its power state and flipping it
//!
//! Run with: cargo run --example discover_and_toggle

use yeelight_rs::discover;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Discovering a light on the network...");

    let device = discover().await?;
    println!(
        "Found {} (model {}) at {}",
        device.id().unwrap_or("unknown id"),
        device.model().unwrap_or("unknown"),
        device.address
    );

    let light = device.into_light(None);
    let was_on = light.is_power_on().await?;
    light.toggle().await?;
    println!("Light was {}, toggled.", if was_on { "on" } else { "off" });

    Ok(())
}
