//! CLI application for controlling Yeelight lights.
//!
//! Run with: cargo run --example yeelight_cli -- --help

use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::Value;
use yeelight_rs::{
    AdjustDuration, Brightness, Color, DeviceAddress, DiscoveryConfig, Kelvin, Light, Percentage,
    discover_with,
};

#[derive(Parser)]
#[command(name = "yeelight-cli")]
#[command(about = "Control Yeelight smart lights from the command line", long_about = None)]
struct Cli {
    /// Address of the light, `host[:port]` (not required for discover command)
    #[arg(short, long, global = true)]
    address: Option<DeviceAddress>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find a light on the network
    Discover {
        /// Discovery timeout in seconds (default: 3)
        #[arg(short, long, default_value = "3")]
        timeout: u64,
    },

    /// Show power, brightness and color temperature
    Status,

    /// Turn the light on
    On,

    /// Turn the light off
    Off,

    /// Toggle the light on/off
    Toggle,

    /// Set RGB color, e.g. `255,128,0`
    Rgb { color: Color },

    /// Set brightness (1-100)
    Brightness { level: i32 },

    /// Set color temperature in Kelvin (1700-6500)
    Temperature { kelvin: i32 },

    /// Change brightness by a percentage (-100..100)
    AdjustBright {
        #[arg(allow_negative_numbers = true)]
        percentage: i32,
        /// Duration in milliseconds
        #[arg(short, long, default_value = "500")]
        duration: u64,
    },

    /// Change color temperature by a percentage (-100..100)
    AdjustCt {
        #[arg(allow_negative_numbers = true)]
        percentage: i32,
        /// Duration in milliseconds
        #[arg(short, long, default_value = "500")]
        duration: u64,
    },

    /// Send an arbitrary method; params are JSON values
    Raw {
        method: String,
        #[arg(allow_hyphen_values = true)]
        params: Vec<String>,
    },

    /// Print notifications from the light
    Listen {
        /// Stop after this many seconds
        #[arg(short, long, default_value = "60")]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Discover { timeout } = cli.command {
        println!("Discovering lights on the network (timeout: {timeout}s)...");
        let config = DiscoveryConfig::default().with_timeout(Duration::from_secs(timeout));
        match discover_with(&config).await {
            Ok(device) => {
                println!("Found light at {}", device.address);
                println!("  id:      {}", device.id().unwrap_or("-"));
                println!("  model:   {}", device.model().unwrap_or("-"));
                println!("  name:    {}", device.name().unwrap_or("-"));
                println!("  support: {}", device.header("support").unwrap_or("-"));
            }
            Err(e) => eprintln!("Error during discovery: {e}"),
        }
        return Ok(());
    }

    // All other commands require an address
    let address = cli
        .address
        .ok_or("address is required for this command. Use --address <HOST[:PORT]>")?;
    let light = Light::new(address.clone(), None);

    let outcome = match cli.command {
        Commands::Discover { .. } => unreachable!(),

        Commands::Status => {
            let props = light.get_props(&["power", "bright", "ct", "rgb", "name"]).await?;
            println!("Light {address}:");
            for (name, value) in props {
                println!("  {name:>6}: {value}");
            }
            Ok(())
        }

        Commands::On => light.on().await,
        Commands::Off => light.off().await,
        Commands::Toggle => light.toggle().await,
        Commands::Rgb { color } => light.set_rgb(color).await,
        Commands::Brightness { level } => light.set_brightness(Brightness::clamped(level)).await,
        Commands::Temperature { kelvin } => {
            light.set_color_temperature(Kelvin::clamped(kelvin)).await
        }
        Commands::AdjustBright {
            percentage,
            duration,
        } => {
            light
                .adjust_brightness(
                    Percentage::clamped(percentage),
                    AdjustDuration::from_millis(duration),
                )
                .await
        }
        Commands::AdjustCt {
            percentage,
            duration,
        } => {
            light
                .adjust_color_temperature(
                    Percentage::clamped(percentage),
                    AdjustDuration::from_millis(duration),
                )
                .await
        }

        Commands::Raw { method, params } => {
            let params = params
                .iter()
                .map(|p| serde_json::from_str(p).unwrap_or_else(|_| Value::String(p.clone())))
                .collect();
            let result = light.transport().send(method, params).await?;
            println!("{}", serde_json::to_string(&result)?);
            Ok(())
        }

        Commands::Listen { seconds } => {
            println!("Listening for notifications from {address} for {seconds}s...\n");
            let mut notifications = light
                .listen(tokio::time::sleep(Duration::from_secs(seconds)))
                .await?;
            while let Some(notification) = notifications.next().await {
                println!("[{}] {:?}", notification.method, notification.params);
            }
            println!("\nListener stopped: {:?}", notifications.finish().await);
            Ok(())
        }
    };

    match outcome {
        Ok(()) => println!("ok"),
        Err(e) => eprintln!("Error: {e}"),
    }
    Ok(())
}
