//! Message framing: one JSON object per message, terminated by CRLF.
//!
//! Nothing here performs I/O. [`encode_command`] produces the exact bytes written
//! to the wire and [`FrameDecoder`] splits an incoming byte stream into JSON
//! values, one per line, tolerating blank lines and surrounding whitespace.

use serde_json::Value;

use crate::message::Command;

/// Terminator appended to every outgoing message.
pub const TERMINATOR: &[u8] = b"\r\n";

/// Serialize a command to a single line followed by [`TERMINATOR`].
pub fn encode_command(command: &Command) -> serde_json::Result<Vec<u8>> {
    let mut frame = serde_json::to_vec(command)?;
    frame.extend_from_slice(TERMINATOR);
    Ok(frame)
}

/// Why a buffered message could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid json: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("message of at least {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
}

/// Incremental decoder for a stream of CRLF-terminated JSON messages.
///
/// Feed it bytes with [`extend`](Self::extend) and pull complete values with
/// [`decode`](Self::decode). Each line holds one message and is parsed once,
/// when its line feed arrives. A line that is not valid JSON is dropped; a
/// line longer than the size limit is dropped up to its line feed.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Bytes at the front of `buffer` already known to contain no line feed.
    scanned: usize,
    /// Set while the rest of an oversized line is being thrown away.
    discarding: bool,
    max_frame_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

    pub fn new() -> Self {
        Self::with_max_frame_size(Self::DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        FrameDecoder {
            buffer: Vec::new(),
            scanned: 0,
            discarding: false,
            max_frame_size,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Whether only whitespace is buffered.
    pub fn is_blank(&self) -> bool {
        self.discarding || self.buffer.iter().all(u8::is_ascii_whitespace)
    }

    /// Decode the next complete value.
    ///
    /// Returns `Ok(None)` when more bytes are needed. After an error the
    /// offending bytes are gone and decoding can continue.
    pub fn decode(&mut self) -> Result<Option<Value>, FrameError> {
        if self.discarding {
            match self.next_line_end() {
                Some(end) => self.consume(end + 1),
                None => {
                    self.consume(self.buffer.len());
                    return Ok(None);
                }
            }
            self.discarding = false;
        }

        let start = self
            .buffer
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(self.buffer.len());
        self.consume(start);
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let Some(end) = self.next_line_end() else {
            if self.buffer.len() > self.max_frame_size {
                let size = self.buffer.len();
                self.consume(size);
                self.discarding = true;
                return Err(FrameError::TooLarge {
                    size,
                    max: self.max_frame_size,
                });
            }
            return Ok(None);
        };

        let parsed: Result<Value, FrameError> = if end > self.max_frame_size {
            Err(FrameError::TooLarge {
                size: end,
                max: self.max_frame_size,
            })
        } else {
            serde_json::from_slice(&self.buffer[..end]).map_err(FrameError::from)
        };
        self.consume(end + 1);
        parsed.map(Some)
    }

    /// Decode whatever is left once the peer has closed.
    ///
    /// Returns `None` when nothing but whitespace remains. The buffer is
    /// empty afterwards.
    pub fn finish(&mut self) -> Option<serde_json::Result<Value>> {
        let blank = self.is_blank();
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        self.discarding = false;
        if blank {
            return None;
        }
        Some(serde_json::from_slice(&rest))
    }

    fn next_line_end(&mut self) -> Option<usize> {
        match self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(offset) => Some(self.scanned + offset),
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    fn consume(&mut self, count: usize) {
        self.buffer.drain(..count);
        self.scanned = self.scanned.saturating_sub(count);
    }
}
