//! Request/response exchange with a single device.

use std::future::Future;
use std::sync::Arc;

use log::{debug, trace};
use serde_json::Value;

use crate::address::DeviceAddress;
use crate::config::TransportConfig;
use crate::connection::{Connection, ReadOutcome};
use crate::errors::Error;
use crate::framing;
use crate::history::{MessageHistory, MessageType};
use crate::message::{Command, Response};
use crate::method::Method;
use crate::push::{self, Notifications};
use crate::runtime::{self, Mutex};

type Result<T> = std::result::Result<T, Error>;

/// Sends commands to one device, one at a time.
///
/// Every [`send`](Self::send) opens a fresh TCP connection, writes one command,
/// reads one response and closes the connection. Concurrent callers are
/// serialized: the internal lock is held from connect until the response has
/// been read.
///
/// ```no_run
/// use serde_json::json;
/// use yeelight_rs::{Method, Transport};
///
/// # async fn run() -> Result<(), yeelight_rs::Error> {
/// let transport = Transport::new("192.168.1.50".parse()?);
/// let result = transport.send(Method::GET_PROP, vec![json!("power")]).await?;
/// println!("power is {}", result[0]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Transport {
    address: DeviceAddress,
    config: TransportConfig,
    /// Next request id. Doubles as the single-flight lock.
    next_id: Mutex<u64>,
    history: Arc<Mutex<MessageHistory>>,
}

impl Transport {
    pub fn new(address: DeviceAddress) -> Self {
        Self::with_config(address, TransportConfig::default())
    }

    pub fn with_config(address: DeviceAddress, config: TransportConfig) -> Self {
        Transport {
            address,
            config,
            next_id: Mutex::new(1),
            history: Arc::new(Mutex::new(MessageHistory::new())),
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub async fn history(&self) -> MessageHistory {
        self.history.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    /// Execute one command and return the `result` values of the response.
    ///
    /// Parameters are written exactly as given. Fails with
    /// [`Error::DeviceRejected`] when the device answers with an error object,
    /// [`Error::MalformedResponse`] when the answer cannot be decoded or echoes
    /// a different id, and a transport error (connect, timeout, socket) otherwise.
    pub async fn send(&self, method: impl Into<Method>, params: Vec<Value>) -> Result<Vec<Value>> {
        let method = method.into();
        let mut next_id = self.next_id.lock().await;
        let id = *next_id;
        *next_id = next_id.wrapping_add(1);

        let command = Command::new(id, method, params);
        let frame = framing::encode_command(&command).map_err(Error::JsonDump)?;
        self.record(MessageType::Send, &command.method, &command).await;

        let outcome = self.exchange(&command, &frame).await;
        drop(next_id);

        if let Err(e) = &outcome {
            debug!("[{}] {} failed: {}", self.address, command.method, e);
            self.history.lock().await.record_error(&e.to_string());
        }
        outcome
    }

    /// Open a notification stream on a dedicated connection.
    ///
    /// The stream ends once `cancel` completes, the device closes the
    /// connection, or the stream is dropped. See [`Notifications`] for the
    /// backpressure policy.
    pub async fn listen<C>(&self, cancel: C) -> Result<Notifications>
    where
        C: Future<Output = ()> + Send + 'static,
    {
        push::listen(
            self.address.clone(),
            &self.config,
            Arc::clone(&self.history),
            cancel,
        )
        .await
    }

    async fn exchange(&self, command: &Command, frame: &[u8]) -> Result<Vec<Value>> {
        let mut connection = Connection::open(&self.address, &self.config).await?;
        let outcome = self.round_trip(&mut connection, frame).await;
        connection.close(&self.address).await;

        let response = outcome?;
        self.record(MessageType::Receive, &command.method, &response)
            .await;
        self.check_response(command, response)
    }

    async fn round_trip(&self, connection: &mut Connection, frame: &[u8]) -> Result<Response> {
        trace!(
            "[{}] -> {}",
            self.address,
            String::from_utf8_lossy(&frame[..frame.len() - framing::TERMINATOR.len()])
        );
        runtime::timeout(self.config.write_timeout, connection.write_frame(frame))
            .await
            .map_err(|_| Error::timeout(&self.address, "write"))?
            .map_err(|e| Error::socket(&self.address, "write", e))?;

        let outcome = runtime::timeout(self.config.read_timeout, connection.read_frame())
            .await
            .map_err(|_| Error::timeout(&self.address, "read"))?
            .map_err(|e| Error::socket(&self.address, "read", e))?;

        match outcome {
            ReadOutcome::Frame(value) => {
                trace!("[{}] <- {}", self.address, value);
                serde_json::from_value(value).map_err(|e| Error::malformed(&self.address, e))
            }
            ReadOutcome::Malformed(e) => Err(Error::malformed(&self.address, e)),
            ReadOutcome::Closed { truncated: true } => Err(Error::malformed(
                &self.address,
                "connection closed in the middle of a response",
            )),
            ReadOutcome::Closed { truncated: false } => Err(Error::socket(
                &self.address,
                "read",
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed before a response arrived",
                ),
            )),
        }
    }

    fn check_response(&self, command: &Command, response: Response) -> Result<Vec<Value>> {
        if response.id != command.id {
            return Err(Error::malformed(
                &self.address,
                format!("response id {} does not match request id {}", response.id, command.id),
            ));
        }
        if let Some(error) = response.error {
            return Err(Error::DeviceRejected {
                address: self.address.clone(),
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| Error::malformed(&self.address, "response has neither result nor error"))
    }

    async fn record<T: serde::Serialize>(&self, msg_type: MessageType, method: &Method, message: &T) {
        let value = serde_json::to_value(message).unwrap_or(Value::Null);
        self.history
            .lock()
            .await
            .record(msg_type, method.as_str(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    async fn local_listener() -> (TcpListener, DeviceAddress) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = DeviceAddress::from(listener.local_addr().unwrap());
        (listener, address)
    }

    /// Read one CRLF-terminated command line from the peer side.
    async fn read_command(reader: &mut BufReader<TcpStream>) -> (String, Command) {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let command = serde_json::from_str(line.trim_end()).unwrap();
        (line, command)
    }

    fn fast_config() -> TransportConfig {
        TransportConfig::default()
            .with_connect_timeout(Duration::from_secs(1))
            .with_read_timeout(Duration::from_millis(300))
    }

    #[tokio::test]
    async fn test_send_returns_result_for_matching_id() {
        let (listener, address) = local_listener().await;
        let peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let (line, command) = read_command(&mut reader).await;
            let reply = json!({"id": command.id, "result": ["ok"]});
            reader
                .get_mut()
                .write_all(format!("{reply}\r\n").as_bytes())
                .await
                .unwrap();
            (line, command)
        });

        let transport = Transport::with_config(address, fast_config());
        let result = transport
            .send(Method::SET_POWER, vec![json!("on")])
            .await
            .unwrap();
        assert_eq!(result, vec![json!("ok")]);

        let (line, command) = peer.await.unwrap();
        assert!(line.ends_with("\r\n"));
        assert_eq!(command.method, Method::SET_POWER);
        assert_eq!(command.params, vec![json!("on")]);

        let summary = transport.history().await.summary();
        assert_eq!(summary.send_count, 1);
        assert_eq!(summary.receive_count, 1);
        assert!(summary.last_error.is_none());
    }

    #[tokio::test]
    async fn test_params_are_passed_through_untouched() {
        let (listener, address) = local_listener().await;
        let peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let (_, command) = read_command(&mut reader).await;
            let reply = json!({"id": command.id, "result": ["ok"]});
            reader
                .get_mut()
                .write_all(format!("{reply}\r\n").as_bytes())
                .await
                .unwrap();
            command.params
        });

        let params = vec![json!(250), json!(-5), json!("sudden"), json!(null)];
        let transport = Transport::with_config(address, fast_config());
        transport
            .send("set_bright", params.clone())
            .await
            .unwrap();
        assert_eq!(peer.await.unwrap(), params);
    }

    #[tokio::test]
    async fn test_device_error_is_surfaced() {
        let (listener, address) = local_listener().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let (_, command) = read_command(&mut reader).await;
            let reply = json!({"id": command.id, "error": {"code": -5000, "message": "general error"}});
            reader
                .get_mut()
                .write_all(format!("{reply}\r\n").as_bytes())
                .await
                .unwrap();
        });

        let transport = Transport::with_config(address, fast_config());
        match transport.send(Method::SET_HSV, vec![json!(255), json!(45)]).await {
            Err(Error::DeviceRejected { code, message, .. }) => {
                assert_eq!(code, -5000);
                assert_eq!(message, "general error");
            }
            other => panic!("expected device rejection, got {other:?}"),
        }
        assert!(transport.history().await.last_error().is_some());
    }

    #[tokio::test]
    async fn test_mismatched_id_is_malformed() {
        let (listener, address) = local_listener().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let (_, command) = read_command(&mut reader).await;
            let reply = json!({"id": command.id + 1, "result": ["ok"]});
            reader
                .get_mut()
                .write_all(format!("{reply}\r\n").as_bytes())
                .await
                .unwrap();
        });

        let transport = Transport::with_config(address, fast_config());
        let err = transport.send(Method::TOGGLE, vec![]).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_garbage_response_is_malformed() {
        let (listener, address) = local_listener().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            read_command(&mut reader).await;
            reader.get_mut().write_all(b"HTTP/1.1 400\r\n").await.unwrap();
        });

        let transport = Transport::with_config(address, fast_config());
        let err = transport.send(Method::TOGGLE, vec![]).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_truncated_response_is_malformed() {
        let (listener, address) = local_listener().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            read_command(&mut reader).await;
            reader.get_mut().write_all(br#"{"id":1,"res"#).await.unwrap();
            // dropping the socket closes the connection mid-message
        });

        let transport = Transport::with_config(address, fast_config());
        let err = transport.send(Method::TOGGLE, vec![]).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_oversized_response_is_malformed() {
        let (listener, address) = local_listener().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let (_, command) = read_command(&mut reader).await;
            let reply = json!({"id": command.id, "result": ["x".repeat(4096)]});
            reader
                .get_mut()
                .write_all(format!("{reply}\r\n").as_bytes())
                .await
                .unwrap();
        });

        let config = fast_config().with_max_frame_size(1024);
        let transport = Transport::with_config(address, config);
        let err = transport.send(Method::GET_PROP, vec![json!("name")]).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_silent_peer_times_out_and_connection_is_closed() {
        let (listener, address) = local_listener().await;
        let peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            read_command(&mut reader).await;
            // Never answer; wait for the client to hang up.
            let mut rest = Vec::new();
            tokio::time::timeout(Duration::from_secs(5), reader.read_to_end(&mut rest))
                .await
                .expect("client never closed the connection")
                .unwrap();
            rest.len()
        });

        let transport = Transport::with_config(address, fast_config());
        let err = transport.send(Method::GET_PROP, vec![json!("power")]).await.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(peer.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        // Bind then drop to get a port nobody listens on.
        let (listener, address) = local_listener().await;
        drop(listener);

        let transport = Transport::with_config(address, fast_config());
        let err = transport.send(Method::TOGGLE, vec![]).await.unwrap_err();
        assert!(err.is_transport(), "{err:?}");
    }

    #[tokio::test]
    async fn test_concurrent_sends_do_not_interleave() {
        let (listener, address) = local_listener().await;
        let open = Arc::new(AtomicUsize::new(0));
        let max_open = Arc::new(AtomicUsize::new(0));
        let frames = Arc::new(std::sync::Mutex::new(Vec::new()));

        let (open_c, max_c, frames_c) = (open.clone(), max_open.clone(), frames.clone());
        tokio::spawn(async move {
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                let (open, max_open, frames) = (open_c.clone(), max_c.clone(), frames_c.clone());
                tokio::spawn(async move {
                    let now = open.fetch_add(1, Ordering::SeqCst) + 1;
                    max_open.fetch_max(now, Ordering::SeqCst);

                    let mut reader = BufReader::new(socket);
                    let (line, command) = read_command(&mut reader).await;
                    frames.lock().unwrap().push(line);
                    tokio::time::sleep(Duration::from_millis(50)).await;

                    open.fetch_sub(1, Ordering::SeqCst);
                    let reply = json!({"id": command.id, "result": [command.method.as_str()]});
                    reader
                        .get_mut()
                        .write_all(format!("{reply}\r\n").as_bytes())
                        .await
                        .unwrap();
                });
            }
        });

        let transport = Arc::new(Transport::with_config(address, fast_config()));
        let (a, b) = tokio::join!(
            transport.send(Method::SET_POWER, vec![json!("on")]),
            transport.send(Method::SET_BRIGHTNESS, vec![json!(80)]),
        );
        assert_eq!(a.unwrap(), vec![json!("set_power")]);
        assert_eq!(b.unwrap(), vec![json!("set_bright")]);

        assert_eq!(max_open.load(Ordering::SeqCst), 1);
        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        let mut ids = Vec::new();
        for frame in frames.iter() {
            assert!(frame.ends_with("\r\n"));
            let command: Command = serde_json::from_str(frame.trim_end()).unwrap();
            ids.push(command.id);
        }
        assert_ne!(ids[0], ids[1]);
    }
}
