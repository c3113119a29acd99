use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_envelope, Envelope, StreamConfig};
use crate::error::{FrameError, Result};
use crate::message::Message;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete messages from any `Read` stream.
///
/// Whole envelopes are buffered before a message is loaded, so every
/// `deserialize` call a message sees carries a full chunk.
pub struct MessageReader<T> {
    inner: T,
    buf: BytesMut,
    config: StreamConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, StreamConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, config: StreamConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete envelope (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_envelope(&mut self) -> Result<Envelope> {
        loop {
            if let Some(envelope) = decode_envelope(&mut self.buf, self.config.max_message_size)? {
                return Ok(envelope);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the next envelope and load it into `message`.
    ///
    /// The previous content of `message` is cleared first. Fails with
    /// [`FrameError::UnexpectedTag`] if the envelope holds another type.
    pub fn receive<M: Message>(&mut self, message: &mut M) -> Result<()> {
        let envelope = self.read_envelope()?;
        tracing::trace!(tag = %envelope.tag, length = envelope.payload.len(), "received message");
        envelope.load_into(message, self.config.chunk_size)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum message size for subsequent decoding.
    pub fn set_max_message_size(&mut self, max_message_size: usize) {
        self.config.max_message_size = max_message_size;
    }

    /// Current reader configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

#[cfg(unix)]
impl MessageReader<std::os::unix::net::UnixStream> {
    /// Create a reader for a Unix socket and apply the read timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: StreamConfig,
    ) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
