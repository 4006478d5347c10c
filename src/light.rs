//! Individual light control.

use std::collections::BTreeMap;
use std::future::Future;

use serde_json::{Value, json};

use crate::address::DeviceAddress;
use crate::config::TransportConfig;
use crate::errors::Error;
use crate::history::MessageHistory;
use crate::method::Method;
use crate::push::Notifications;
use crate::transport::Transport;
use crate::types::{AdjustDuration, Brightness, Color, Kelvin, Percentage, PowerMode};

type Result<T> = std::result::Result<T, Error>;

/// Represents a single Yeelight device.
///
/// Each method translates into one command sent through the underlying
/// [`Transport`]; arguments are clamped to the ranges the device accepts.
///
/// # Example
///
/// ```
/// use yeelight_rs::Light;
///
/// let light = Light::new("192.168.1.50".parse().unwrap(), Some("Bedroom"));
/// assert_eq!(light.address().port(), 55443);
/// assert_eq!(light.name(), Some("Bedroom"));
/// ```
#[derive(Debug)]
pub struct Light {
    transport: Transport,
    name: Option<String>,
}

impl Light {
    pub fn new(address: DeviceAddress, name: Option<&str>) -> Self {
        Self::with_config(address, name, TransportConfig::default())
    }

    pub fn with_config(address: DeviceAddress, name: Option<&str>, config: TransportConfig) -> Self {
        Light {
            transport: Transport::with_config(address, config),
            name: name.map(String::from),
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        self.transport.address()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub async fn history(&self) -> MessageHistory {
        self.transport.history().await
    }

    pub async fn on(&self) -> Result<()> {
        self.set_power(PowerMode::On).await
    }

    pub async fn off(&self) -> Result<()> {
        self.set_power(PowerMode::Off).await
    }

    pub async fn set_power(&self, power: PowerMode) -> Result<()> {
        self.transport
            .send(Method::SET_POWER, vec![json!(power.to_string())])
            .await?;
        Ok(())
    }

    pub async fn toggle(&self) -> Result<()> {
        self.transport.send(Method::TOGGLE, vec![]).await?;
        Ok(())
    }

    pub async fn set_color_temperature(&self, temperature: Kelvin) -> Result<()> {
        self.transport
            .send(Method::SET_COLOR_TEMPERATURE_ABX, vec![json!(temperature.kelvin())])
            .await?;
        Ok(())
    }

    pub async fn set_rgb(&self, color: Color) -> Result<()> {
        self.transport
            .send(Method::SET_RGB, vec![json!(color.packed())])
            .await?;
        Ok(())
    }

    pub async fn set_brightness(&self, brightness: Brightness) -> Result<()> {
        self.transport
            .send(Method::SET_BRIGHTNESS, vec![json!(brightness.value())])
            .await?;
        Ok(())
    }

    /// Change brightness by `percentage` over `duration`.
    pub async fn adjust_brightness(
        &self,
        percentage: Percentage,
        duration: AdjustDuration,
    ) -> Result<()> {
        self.adjust(Method::ADJUST_BRIGHTNESS, percentage, duration)
            .await
    }

    /// Change color temperature by `percentage` over `duration`.
    pub async fn adjust_color_temperature(
        &self,
        percentage: Percentage,
        duration: AdjustDuration,
    ) -> Result<()> {
        self.adjust(Method::ADJUST_COLOR_TEMPERATURE, percentage, duration)
            .await
    }

    pub async fn is_power_on(&self) -> Result<bool> {
        let props = self.get_props(&["power"]).await?;
        Ok(props.get("power").is_some_and(|p| p == "on"))
    }

    /// Query properties by name (`power`, `bright`, `ct`, `rgb`, `name`, ...).
    ///
    /// Values come back positionally; the device answers `""` for properties it
    /// does not know.
    pub async fn get_props(&self, names: &[&str]) -> Result<BTreeMap<String, String>> {
        let params = names.iter().map(|n| json!(n)).collect();
        let result = self.transport.send(Method::GET_PROP, params).await?;
        if result.len() < names.len() {
            return Err(Error::malformed(
                self.address(),
                format!("asked for {} properties, got {}", names.len(), result.len()),
            ));
        }

        Ok(names
            .iter()
            .zip(result)
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (name.to_string(), value)
            })
            .collect())
    }

    /// Stream state changes from this light until `cancel` completes.
    pub async fn listen<C>(&self, cancel: C) -> Result<Notifications>
    where
        C: Future<Output = ()> + Send + 'static,
    {
        self.transport.listen(cancel).await
    }

    async fn adjust(
        &self,
        method: Method,
        percentage: Percentage,
        duration: AdjustDuration,
    ) -> Result<()> {
        self.transport
            .send(
                method,
                vec![json!(percentage.value()), json!(duration.as_millis())],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    use crate::message::Command;

    /// Answers every command with `result` and hands back what it received.
    async fn device(result: Value) -> (Light, tokio::task::JoinHandle<Command>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = DeviceAddress::from(listener.local_addr().unwrap());
        let peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let command: Command = serde_json::from_str(line.trim_end()).unwrap();
            let reply = json!({"id": command.id, "result": result});
            reader
                .get_mut()
                .write_all(format!("{reply}\r\n").as_bytes())
                .await
                .unwrap();
            command
        });
        let config = TransportConfig::default().with_read_timeout(Duration::from_secs(1));
        (Light::with_config(address, None, config), peer)
    }

    #[tokio::test]
    async fn test_set_rgb_sends_packed_value() {
        let (light, peer) = device(json!(["ok"])).await;
        light.set_rgb(Color::rgb(255, 128, 0)).await.unwrap();
        let command = peer.await.unwrap();
        assert_eq!(command.method, Method::SET_RGB);
        assert_eq!(command.params, vec![json!(0xFF8000)]);
    }

    #[tokio::test]
    async fn test_brightness_is_clamped_before_sending() {
        let (light, peer) = device(json!(["ok"])).await;
        light.set_brightness(Brightness::clamped(150)).await.unwrap();
        assert_eq!(peer.await.unwrap().params, vec![json!(100)]);
    }

    #[tokio::test]
    async fn test_adjust_brightness() {
        let (light, peer) = device(json!(["ok"])).await;
        light
            .adjust_brightness(Percentage::clamped(-120), AdjustDuration::from_millis(5))
            .await
            .unwrap();
        let command = peer.await.unwrap();
        assert_eq!(command.method, Method::ADJUST_BRIGHTNESS);
        assert_eq!(command.params, vec![json!(-100), json!(30)]);
    }

    #[tokio::test]
    async fn test_off_sends_power_string() {
        let (light, peer) = device(json!(["ok"])).await;
        light.off().await.unwrap();
        let command = peer.await.unwrap();
        assert_eq!(command.method, Method::SET_POWER);
        assert_eq!(command.params, vec![json!("off")]);
    }

    #[tokio::test]
    async fn test_is_power_on() {
        let (light, peer) = device(json!(["on"])).await;
        assert!(light.is_power_on().await.unwrap());
        let command = peer.await.unwrap();
        assert_eq!(command.method, Method::GET_PROP);
        assert_eq!(command.params, vec![json!("power")]);
    }

    #[tokio::test]
    async fn test_get_props_maps_names_to_values() {
        let (light, _peer) = device(json!(["off", "45", 4000])).await;
        let props = light.get_props(&["power", "bright", "ct"]).await.unwrap();
        assert_eq!(props["power"], "off");
        assert_eq!(props["bright"], "45");
        assert_eq!(props["ct"], "4000");
    }

    #[tokio::test]
    async fn test_get_props_short_result_is_malformed() {
        let (light, _peer) = device(json!(["off"])).await;
        let err = light.get_props(&["power", "bright"]).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }), "{err:?}");
    }
}
