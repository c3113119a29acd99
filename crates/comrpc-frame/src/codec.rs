use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::frame::BLOCK_SIZE;
use crate::message::{Direction, Message, Tag};

/// Envelope header: magic (2) + label (1) + direction (1) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "CR" (0x43 0x52).
pub const MAGIC: [u8; 2] = [0x43, 0x52];

/// Default maximum message size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE: usize = 16 * 1024 * 1024;

/// One complete message lifted off the wire, still in encoded form.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Which payload type the bytes hold.
    pub tag: Tag,
    /// The encoded message.
    pub payload: Bytes,
}

impl Envelope {
    /// Create an envelope around already-encoded bytes.
    pub fn new(tag: Tag, payload: impl Into<Bytes>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// Capture a message into an envelope.
    pub fn capture<M: Message>(message: &M) -> Self {
        let mut payload = vec![0u8; message.length()];
        let copied = message.serialize(0, &mut payload);
        payload.truncate(copied);
        Self::new(M::TAG, payload)
    }

    /// The total wire size of this envelope (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Load the payload into `message` using full chunks of at most
    /// `chunk_size` bytes.
    ///
    /// Fails with [`FrameError::UnexpectedTag`] if the envelope does not hold
    /// an `M`.
    pub fn load_into<M: Message>(&self, message: &mut M, chunk_size: usize) -> Result<()> {
        if self.tag != M::TAG {
            return Err(FrameError::UnexpectedTag {
                expected: M::TAG,
                found: self.tag,
            });
        }

        message.clear();
        let chunk_size = chunk_size.max(1);
        let mut offset = 0;
        for chunk in self.payload.chunks(chunk_size) {
            offset += message.deserialize(offset, chunk);
        }
        Ok(())
    }
}

/// Encode a message into an envelope on the wire.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────┬───────────┬──────────┬─────────────────┐
/// │ Magic (2B)   │ Label   │ Direction │ Length   │ Payload          │
/// │ 0x43 0x52    │ (1B)    │ (1B)      │ (4B LE)  │ (Length bytes)   │
/// │ "CR"         │         │           │          │                  │
/// └──────────────┴─────────┴───────────┴──────────┴─────────────────┘
/// ```
///
/// The payload is pulled out of the message with repeated bounded
/// `serialize` calls of `chunk_size` bytes.
pub fn encode_message<M: Message>(message: &M, chunk_size: usize, dst: &mut BytesMut) -> Result<()> {
    let length = message.length();
    put_header(M::TAG, length, dst)?;

    let start = dst.len();
    dst.resize(start + length, 0);

    let chunk_size = chunk_size.max(1);
    let mut offset = 0;
    while offset < length {
        let end = (offset + chunk_size).min(length);
        let copied = message.serialize(offset, &mut dst[start + offset..start + end]);
        if copied == 0 {
            break;
        }
        offset += copied;
    }
    Ok(())
}

/// Encode raw envelope bytes.
pub fn encode_envelope(tag: Tag, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    put_header(tag, payload.len(), dst)?;
    dst.put_slice(payload);
    Ok(())
}

/// Decode an envelope from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete envelope yet.
/// On success, consumes the envelope bytes from the buffer.
pub fn decode_envelope(src: &mut BytesMut, max_message: usize) -> Result<Option<Envelope>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let label = src[2];
    let direction = Direction::from_u8(src[3]).ok_or(FrameError::InvalidDirection(src[3]))?;
    let length = u32::from_le_bytes([src[4], src[5], src[6], src[7]]) as usize;

    if length > max_message {
        return Err(FrameError::MessageTooLarge {
            size: length,
            max: max_message,
        });
    }

    let total = HEADER_SIZE + length;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(length).freeze();

    Ok(Some(Envelope {
        tag: Tag::new(label, direction),
        payload,
    }))
}

fn put_header(tag: Tag, length: usize, dst: &mut BytesMut) -> Result<()> {
    if length > u32::MAX as usize {
        return Err(FrameError::MessageTooLarge {
            size: length,
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + length);
    dst.put_slice(&MAGIC);
    dst.put_u8(tag.label);
    dst.put_u8(tag.direction as u8);
    dst.put_u32_le(length as u32);
    Ok(())
}

/// Configuration for streaming messages over a byte channel.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum encoded message size in bytes. Default: 16 MiB.
    pub max_message_size: usize,
    /// Bytes moved per `serialize`/`deserialize` call. Default: one block.
    pub chunk_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE,
            chunk_size: BLOCK_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::label::{ANNOUNCE, INVOKE};

    struct Blob {
        frame: Frame,
    }

    impl Blob {
        fn with(bytes: &[u8]) -> Self {
            let mut frame = Frame::new();
            frame.set_bytes(0, bytes);
            Self { frame }
        }
    }

    impl Message for Blob {
        const TAG: Tag = Tag::INVOKE_REQUEST;

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
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, comrpc!";

        encode_envelope(Tag::ANNOUNCE_REQUEST, payload, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let envelope = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .unwrap();

        assert_eq!(envelope.tag, Tag::ANNOUNCE_REQUEST);
        assert_eq!(envelope.tag.label, ANNOUNCE);
        assert_eq!(envelope.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x43, 0x52, 0x01][..]);
        let result = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_envelope(Tag::INVOKE_RESPONSE, b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        let result = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE);
        assert!(matches!(result, Err(FrameError::InvalidMagic)));
    }

    #[test]
    fn test_decode_invalid_direction() {
        let mut buf = BytesMut::from(&[0x43, 0x52, 0x01, 0x07, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE);
        assert!(matches!(result, Err(FrameError::InvalidDirection(7))));
    }

    #[test]
    fn test_decode_message_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u8(INVOKE);
        buf.put_u8(0);
        buf.put_u32_le(1024 * 1024 * 32);

        let result = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE);
        assert!(matches!(result, Err(FrameError::MessageTooLarge { .. })));
    }

    #[test]
    fn test_encode_message_matches_capture() {
        let blob = Blob::with(&[9u8; 1300]);

        for chunk_size in [1usize, 7, 512, 4096] {
            let mut buf = BytesMut::new();
            encode_message(&blob, chunk_size, &mut buf).unwrap();

            let envelope = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE)
                .unwrap()
                .unwrap();
            assert_eq!(envelope.tag, Tag::INVOKE_REQUEST);
            assert_eq!(envelope.payload, Envelope::capture(&blob).payload);
        }
    }

    #[test]
    fn test_load_into_rejects_wrong_tag() {
        let envelope = Envelope::new(Tag::ANNOUNCE_RESPONSE, vec![1u8, 2, 3]);
        let mut blob = Blob::with(&[]);
        let result = envelope.load_into(&mut blob, 512);
        assert!(matches!(result, Err(FrameError::UnexpectedTag { .. })));
    }

    #[test]
    fn test_load_into_replaces_previous_content() {
        let envelope = Envelope::new(Tag::INVOKE_REQUEST, vec![5u8; 1000]);
        let mut blob = Blob::with(&[1u8; 2000]);

        envelope.load_into(&mut blob, 64).unwrap();
        assert_eq!(blob.length(), 1000);
        assert_eq!(blob.frame.as_bytes(), &[5u8; 1000][..]);
    }

    #[test]
    fn test_envelope_wire_size() {
        let envelope = Envelope::new(Tag::INVOKE_REQUEST, Bytes::from_static(b"test"));
        assert_eq!(envelope.wire_size(), HEADER_SIZE + 4);
    }
}
