//! A device TCP connection that reads whole frames.

use std::io;

use log::trace;
use serde_json::Value;

use crate::address::DeviceAddress;
use crate::config::TransportConfig;
use crate::errors::Error;
use crate::framing::{FrameDecoder, FrameError};
use crate::runtime::{self, AsyncTcpStream, TcpStream};

const READ_CHUNK: usize = 1024;

/// What one call to [`Connection::read_frame`] produced.
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    Frame(Value),
    /// A line was not valid JSON or exceeded the size limit; it has been dropped.
    Malformed(FrameError),
    /// The peer closed the connection. `truncated` is set when a partial
    /// message was left in the buffer.
    Closed { truncated: bool },
}

pub(crate) struct Connection {
    stream: TcpStream,
    decoder: FrameDecoder,
    chunk: Box<[u8]>,
}

impl Connection {
    /// Connect within the configured connect timeout.
    pub(crate) async fn open(address: &DeviceAddress, config: &TransportConfig) -> Result<Self, Error> {
        trace!("[{address}] connecting");
        let target = address.to_string();
        let stream = runtime::timeout(config.connect_timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| Error::timeout(address, "connect"))?
            .map_err(|e| Error::connect_failed(address, e))?;

        Ok(Connection {
            stream,
            decoder: FrameDecoder::with_max_frame_size(config.max_frame_size),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
        })
    }

    pub(crate) async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame).await
    }

    /// Read until one complete frame is buffered, the data turns out to be
    /// malformed, or the peer closes.
    ///
    /// Cancel-safe: dropping the future between reads loses no buffered bytes.
    pub(crate) async fn read_frame(&mut self) -> io::Result<ReadOutcome> {
        loop {
            match self.decoder.decode() {
                Ok(Some(value)) => return Ok(ReadOutcome::Frame(value)),
                Err(e) => return Ok(ReadOutcome::Malformed(e)),
                Ok(None) => {}
            }

            let read = self.stream.read(&mut self.chunk).await?;
            if read == 0 {
                return Ok(match self.decoder.finish() {
                    None => ReadOutcome::Closed { truncated: false },
                    Some(Ok(value)) => ReadOutcome::Frame(value),
                    Some(Err(_)) => ReadOutcome::Closed { truncated: true },
                });
            }
            self.decoder.extend(&self.chunk[..read]);
        }
    }

    /// Shut the connection down; the socket itself is released on drop.
    pub(crate) async fn close(mut self, address: &DeviceAddress) {
        if let Err(e) = self.stream.shutdown().await {
            trace!("[{address}] shutdown: {e}");
        }
    }
}
