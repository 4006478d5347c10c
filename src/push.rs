//! Notification listener: streams the state changes a device pushes.
//!
//! A device reports every property change to all open connections. The
//! listener keeps one connection open on a background task and hands each
//! decoded [`Notification`] to the consumer through [`Notifications`].

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::{mpsc, oneshot};
use futures::future::{self, Either};
use futures::{SinkExt, Stream, StreamExt};
use log::{debug, trace, warn};

use crate::address::DeviceAddress;
use crate::config::TransportConfig;
use crate::connection::{Connection, ReadOutcome};
use crate::errors::Error;
use crate::history::{MessageHistory, MessageType};
use crate::message::Notification;
use crate::runtime::{self, JoinHandle, Mutex};

type Result<T> = std::result::Result<T, Error>;

/// Why a listener stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    /// The cancellation future completed.
    Cancelled,
    /// The device closed the connection.
    ConnectionClosed,
    /// The [`Notifications`] stream was dropped.
    ConsumerDropped,
    /// Nothing arrived within the configured idle timeout.
    IdleTimeout,
    /// Reading from the connection failed.
    Failed(io::ErrorKind),
}

/// Stream of notifications from one device.
///
/// Handoff policy: the channel between the reading task and this stream holds a
/// single notification. While it is full the task stops reading, so a consumer
/// that never polls stalls the listener (the device has no flow control, it
/// keeps sending and the kernel buffers fill). Cancellation is honoured even
/// while the task is blocked on the handoff.
///
/// The stream ends (yields `None`) when the listener stops for any reason;
/// [`finish`](Self::finish) reports which one. Dropping the stream stops the
/// listener and closes its connection.
pub struct Notifications {
    address: DeviceAddress,
    receiver: mpsc::Receiver<Notification>,
    task: JoinHandle<ListenerExit>,
    /// Dropping this tells the task to stop.
    _stop: oneshot::Sender<()>,
}

impl Notifications {
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Wait for the listener to stop and report why.
    ///
    /// Notifications that have not been consumed yet are discarded.
    pub async fn finish(self) -> ListenerExit {
        let Notifications {
            mut receiver,
            task,
            _stop: stop,
            ..
        } = self;
        let drain = receiver.by_ref().for_each(|_| future::ready(()));
        let ((), exit) = future::join(drain, task).await;
        drop(stop);
        exit
    }
}

impl Stream for Notifications {
    type Item = Notification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

/// Connect to `address` and start the background reader.
pub(crate) async fn listen<C>(
    address: DeviceAddress,
    config: &TransportConfig,
    history: Arc<Mutex<MessageHistory>>,
    cancel: C,
) -> Result<Notifications>
where
    C: Future<Output = ()> + Send + 'static,
{
    let connection = Connection::open(&address, config).await?;
    debug!("[{address}] listening for notifications");

    let (sender, receiver) = mpsc::channel(0);
    let (stop_tx, stop_rx) = oneshot::channel();
    let reader = Listener {
        address: address.clone(),
        idle_timeout: config.listen_idle_timeout,
        history,
    };
    let task = runtime::spawn(reader.run(connection, sender, cancel, stop_rx));

    Ok(Notifications {
        address,
        receiver,
        task,
        _stop: stop_tx,
    })
}

struct Listener {
    address: DeviceAddress,
    idle_timeout: Option<std::time::Duration>,
    history: Arc<Mutex<MessageHistory>>,
}

impl Listener {
    async fn run<C>(
        self,
        mut connection: Connection,
        mut sender: mpsc::Sender<Notification>,
        cancel: C,
        stop: oneshot::Receiver<()>,
    ) -> ListenerExit
    where
        C: Future<Output = ()> + Send + 'static,
    {
        // Resolves once the caller cancels or the stream handle goes away.
        let mut halt = Box::pin(async move {
            match future::select(Box::pin(cancel), stop).await {
                Either::Left(_) => ListenerExit::Cancelled,
                Either::Right(_) => ListenerExit::ConsumerDropped,
            }
        });

        let exit = loop {
            let read = {
                let next = self.next_frame(&mut connection);
                futures::pin_mut!(next);
                match future::select(halt.as_mut(), next).await {
                    Either::Left((exit, _)) => Err(exit),
                    Either::Right((outcome, _)) => Ok(outcome),
                }
            };

            let value = match read {
                Err(exit) => break exit,
                Ok(Ok(ReadOutcome::Frame(value))) => value,
                Ok(Ok(ReadOutcome::Malformed(e))) => {
                    debug!("[{}] skipping malformed message: {e}", self.address);
                    continue;
                }
                Ok(Ok(ReadOutcome::Closed { .. })) => break ListenerExit::ConnectionClosed,
                Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => {
                    break ListenerExit::IdleTimeout;
                }
                Ok(Err(e)) => {
                    warn!("[{}] notification stream broke: {e}", self.address);
                    break ListenerExit::Failed(e.kind());
                }
            };

            let notification: Notification = match serde_json::from_value(value.clone()) {
                Ok(notification) => notification,
                Err(e) => {
                    debug!("[{}] skipping non-notification message: {e}", self.address);
                    continue;
                }
            };
            trace!("[{}] <- {}", self.address, value);
            self.history
                .lock()
                .await
                .record(MessageType::Push, notification.method.as_str(), value);

            let delivered = {
                let send = sender.send(notification);
                futures::pin_mut!(send);
                match future::select(halt.as_mut(), send).await {
                    Either::Left((exit, _)) => Err(exit),
                    Either::Right((sent, _)) => Ok(sent),
                }
            };
            match delivered {
                Err(exit) => break exit,
                Ok(Err(_)) => break ListenerExit::ConsumerDropped,
                Ok(Ok(())) => {}
            }
        };

        connection.close(&self.address).await;
        debug!("[{}] listener stopped: {exit:?}", self.address);
        exit
    }

    async fn next_frame(&self, connection: &mut Connection) -> io::Result<ReadOutcome> {
        match self.idle_timeout {
            Some(idle) => runtime::timeout(idle, connection.read_frame())
                .await
                .unwrap_or_else(|_| Err(io::Error::from(io::ErrorKind::TimedOut))),
            None => connection.read_frame().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures::FutureExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::method::Method;
    use crate::transport::Transport;

    const FOUR_CHANGES: &[u8] = b"{\"method\":\"props\",\"params\":{\"power\":\"on\"}}\r\n\
        {\"method\":\"props\",\"params\":{\"bright\":\"10\"}}\r\n\
        {\"method\":\"props\",\"params\":{\"bright\":\"20\"}}\r\n\
        {\"method\":\"props\",\"params\":{\"bright\":\"30\"}}\r\n";

    async fn local_listener() -> (TcpListener, DeviceAddress) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = DeviceAddress::from(listener.local_addr().unwrap());
        (listener, address)
    }

    /// Accept one connection, write `payload`, then wait for the client to hang up.
    fn device_until_closed(
        listener: TcpListener,
        payload: &'static [u8],
    ) -> tokio::task::JoinHandle<usize> {
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(payload).await.unwrap();
            let mut rest = Vec::new();
            // A reset counts as closed too.
            tokio::time::timeout(Duration::from_secs(2), socket.read_to_end(&mut rest))
                .await
                .expect("listener never closed the connection")
                .unwrap_or(0)
        })
    }

    /// Run a listener task directly, with the consumer side handed back.
    async fn spawn_listener(
        address: &DeviceAddress,
    ) -> (
        mpsc::Receiver<Notification>,
        oneshot::Sender<()>,
        tokio::task::JoinHandle<ListenerExit>,
    ) {
        let connection = Connection::open(address, &TransportConfig::default())
            .await
            .unwrap();
        let (sender, receiver) = mpsc::channel(0);
        let (stop_tx, stop_rx) = oneshot::channel();
        let listener = Listener {
            address: address.clone(),
            idle_timeout: None,
            history: Arc::new(Mutex::new(MessageHistory::new())),
        };
        let task = tokio::spawn(listener.run(
            connection,
            sender,
            future::pending::<()>(),
            stop_rx,
        ));
        (receiver, stop_tx, task)
    }

    #[tokio::test]
    async fn test_three_notifications_then_cancel() {
        let (listener, address) = local_listener().await;
        let peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(
                    b"{\"method\":\"props\",\"params\":{\"power\":\"on\"}}\r\n\
                      {\"method\":\"props\",\"params\":{\"bright\":\"42\"}}\r\n",
                )
                .await
                .unwrap();
            // Third message split across writes.
            socket.write_all(b"{\"method\":\"props\",\"par").await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            socket.write_all(b"ams\":{\"ct\":\"4000\"}}\r\n").await.unwrap();

            let mut rest = Vec::new();
            tokio::time::timeout(Duration::from_secs(5), socket.read_to_end(&mut rest))
                .await
                .expect("listener never closed the connection")
                .unwrap()
        });

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let transport = Transport::new(address);
        let mut stream = transport.listen(cancel_rx.map(|_| ())).await.unwrap();

        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        let third = stream.next().await.unwrap();
        assert_eq!(first.method, Method::PROPS);
        assert_eq!(first.get("power"), Some("on"));
        assert_eq!(second.get("bright"), Some("42"));
        assert_eq!(third.get("ct"), Some("4000"));

        cancel_tx.send(()).unwrap();
        assert!(stream.next().await.is_none());
        assert_eq!(stream.finish().await, ListenerExit::Cancelled);
        assert_eq!(peer.await.unwrap(), 0);

        assert_eq!(transport.history().await.summary().push_count, 3);
    }

    #[tokio::test]
    async fn test_malformed_messages_are_skipped() {
        let (listener, address) = local_listener().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(
                    b"garbage line\r\n\
                      {\"id\":3,\"result\":[\"ok\"]}\r\n\
                      {\"method\":\"props\",\"params\":{\"power\":\"off\"}}\r\n",
                )
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let transport = Transport::new(address);
        let mut stream = transport.listen(future::pending::<()>()).await.unwrap();
        let notification = stream.next().await.unwrap();
        assert_eq!(notification.get("power"), Some("off"));
    }

    #[tokio::test]
    async fn test_stream_ends_when_device_closes() {
        let (listener, address) = local_listener().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"method\":\"props\",\"params\":{\"power\":\"on\"}}\r\n")
                .await
                .unwrap();
        });

        let transport = Transport::new(address);
        let mut stream = transport.listen(future::pending::<()>()).await.unwrap();
        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
        assert_eq!(stream.finish().await, ListenerExit::ConnectionClosed);
    }

    #[tokio::test]
    async fn test_idle_timeout_ends_stream() {
        let (listener, address) = local_listener().await;
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let config =
            TransportConfig::default().with_listen_idle_timeout(Some(Duration::from_millis(100)));
        let transport = Transport::with_config(address, config);
        let stream = transport.listen(future::pending::<()>()).await.unwrap();
        assert_eq!(stream.finish().await, ListenerExit::IdleTimeout);
    }

    #[tokio::test]
    async fn test_listen_connect_failure() {
        let (listener, address) = local_listener().await;
        drop(listener);

        let transport = Transport::new(address);
        let err = transport.listen(future::pending::<()>()).await.err().unwrap();
        assert!(err.is_transport(), "{err:?}");
    }

    #[tokio::test]
    async fn test_dropping_stream_closes_connection() {
        let (listener, address) = local_listener().await;
        let peer = device_until_closed(listener, b"");

        let transport = Transport::new(address);
        let stream = transport.listen(future::pending::<()>()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(stream);

        assert_eq!(peer.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_wins_while_handoff_is_blocked() {
        let (listener, address) = local_listener().await;
        let peer = device_until_closed(listener, FOUR_CHANGES);

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let transport = Transport::new(address);
        let stream = transport.listen(cancel_rx.map(|_| ())).await.unwrap();

        // Nobody polls the stream, so the task ends up waiting on the handoff.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let pushed = transport.history().await.summary().push_count;
        assert!((1..4).contains(&pushed), "pushed {pushed}");

        cancel_tx.send(()).unwrap();
        assert_eq!(stream.finish().await, ListenerExit::Cancelled);
        assert_eq!(peer.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_receiver_dropped_during_handoff() {
        let (listener, address) = local_listener().await;
        let peer = device_until_closed(listener, FOUR_CHANGES);

        let (receiver, _stop, task) = spawn_listener(&address).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(receiver);

        assert_eq!(task.await.unwrap(), ListenerExit::ConsumerDropped);
        assert_eq!(peer.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stop_signal_during_handoff() {
        let (listener, address) = local_listener().await;
        let peer = device_until_closed(listener, FOUR_CHANGES);

        let (_receiver, stop, task) = spawn_listener(&address).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(stop);

        assert_eq!(task.await.unwrap(), ListenerExit::ConsumerDropped);
        assert_eq!(peer.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_oversized_notification_is_skipped() {
        let (listener, address) = local_listener().await;
        let _peer = device_until_closed(
            listener,
            b"{\"method\":\"props\",\"params\":{\"name\":\"a name far longer than the configured limit\"}}\r\n\
              {\"method\":\"props\",\"params\":{\"ct\":\"2700\"}}\r\n",
        );

        let config = TransportConfig::default().with_max_frame_size(48);
        let transport = Transport::with_config(address, config);
        let mut stream = transport.listen(future::pending::<()>()).await.unwrap();
        let notification = stream.next().await.unwrap();
        assert_eq!(notification.get("ct"), Some("2700"));
        assert_eq!(notification.get("name"), None);
    }
}
