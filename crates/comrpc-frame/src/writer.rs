use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_envelope, encode_message, Envelope, StreamConfig};
use crate::error::{FrameError, Result};
use crate::message::Message;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete messages to any `Write` stream.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    config: StreamConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new message writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, StreamConfig::default())
    }

    /// Create a new message writer with explicit configuration.
    pub fn with_config(inner: T, config: StreamConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Serialize a message chunk by chunk and send it (blocking).
    pub fn send<M: Message>(&mut self, message: &M) -> Result<()> {
        let length = message.length();
        if length > self.config.max_message_size {
            return Err(FrameError::MessageTooLarge {
                size: length,
                max: self.config.max_message_size,
            });
        }

        self.buf.clear();
        encode_message(message, self.config.chunk_size, &mut self.buf)?;
        tracing::trace!(tag = %M::TAG, length, "sending message");
        self.write_buffer()
    }

    /// Send an already-encoded envelope.
    pub fn send_envelope(&mut self, envelope: &Envelope) -> Result<()> {
        if envelope.payload.len() > self.config.max_message_size {
            return Err(FrameError::MessageTooLarge {
                size: envelope.payload.len(),
                max: self.config.max_message_size,
            });
        }

        self.buf.clear();
        encode_envelope(envelope.tag, envelope.payload.as_ref(), &mut self.buf)?;
        self.write_buffer()
    }

    fn write_buffer(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

#[cfg(unix)]
impl MessageWriter<std::os::unix::net::UnixStream> {
    /// Create a writer for a Unix socket and apply the write timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: StreamConfig,
    ) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::decode_envelope;
    use crate::frame::Frame;
    use crate::message::Tag;

    struct Note {
        frame: Frame,
    }

    impl Note {
        fn text(text: &str) -> Self {
            let mut frame = Frame::new();
            frame.set_text(0, text);
            Self { frame }
        }
    }

    impl Message for Note {
        const TAG: Tag = Tag::INVOKE_RESPONSE;

        fn length(&self) -> usize {
            self.frame.size()
        }

        fn serialize(&self, offset: usize, stream: &mut [u8]) -> usize {
            self.frame.serialize(offset, stream)
        }

        fn deserialize(&mut self, offset: usize, stream: &[u8]) -> usize {
            self.frame.deserialize(offset, stream)
        }

        fn clear(&mut self) {
            self.frame.clear();
        }
    }

    #[test]
    fn write_single_message() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(&Note::text("hello")).unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let envelope = decode_envelope(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(envelope.tag, Tag::INVOKE_RESPONSE);
        assert_eq!(&envelope.payload[2..], b"hello");
    }

    #[test]
    fn write_multiple_messages() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(&Note::text("one")).unwrap();
        writer
            .send_envelope(&Envelope::new(Tag::ANNOUNCE_REQUEST, vec![1u8, 2]))
            .unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let first = decode_envelope(&mut wire, usize::MAX).unwrap().unwrap();
        let second = decode_envelope(&mut wire, usize::MAX).unwrap().unwrap();

        assert_eq!(first.tag, Tag::INVOKE_RESPONSE);
        assert_eq!(second.tag, Tag::ANNOUNCE_REQUEST);
        assert_eq!(second.payload.as_ref(), &[1, 2]);
    }

    #[test]
    fn small_chunk_size_produces_same_bytes() {
        let note = Note::text(&"x".repeat(2000));

        let mut default_writer = MessageWriter::new(Cursor::new(Vec::<u8>::new()));
        default_writer.send(&note).unwrap();

        let cfg = StreamConfig {
            chunk_size: 3,
            ..StreamConfig::default()
        };
        let mut small_writer = MessageWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);
        small_writer.send(&note).unwrap();

        assert_eq!(
            default_writer.into_inner().into_inner(),
            small_writer.into_inner().into_inner()
        );
    }

    #[test]
    fn message_too_large_rejected() {
        let cfg = StreamConfig {
            max_message_size: 4,
            ..StreamConfig::default()
        };
        let mut writer = MessageWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send(&Note::text("oversized")).unwrap_err();
        assert!(matches!(err, FrameError::MessageTooLarge { .. }));
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = MessageWriter::new(sink);

        writer.send(&Note::text("x")).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_and_would_block_writes() {
        let mut writer = MessageWriter::new(StallingWriter {
            stalls: vec![ErrorKind::Interrupted, ErrorKind::WouldBlock],
            data: Vec::new(),
        });
        writer.send(&Note::text("retry")).unwrap();

        assert!(!writer.get_ref().data.is_empty());
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = MessageWriter::new(ZeroWriter);
        let err = writer.send(&Note::text("x")).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    #[cfg(unix)]
    fn applies_write_timeout_for_unix_stream() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let cfg = StreamConfig {
            write_timeout: Some(std::time::Duration::from_millis(10)),
            ..StreamConfig::default()
        };

        let writer = MessageWriter::with_config_unix(left, cfg).unwrap();
        assert_eq!(
            writer.get_ref().write_timeout().unwrap(),
            Some(std::time::Duration::from_millis(10))
        );
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StallingWriter {
        stalls: Vec<ErrorKind>,
        data: Vec<u8>,
    }

    impl Write for StallingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.stalls.pop() {
                return Err(std::io::Error::from(kind));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
