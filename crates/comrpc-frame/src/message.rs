use std::fmt;

use crate::label::{label_name, ANNOUNCE, INVOKE};

/// Which half of a request/response pair a payload is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Request = 0,
    Response = 1,
}

impl Direction {
    /// Decode the wire byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Request),
            1 => Some(Self::Response),
            _ => None,
        }
    }
}

/// Type tag carried in every envelope header.
///
/// The tag alone identifies the payload type, so a receiver never needs
/// out-of-band knowledge to pick the right message to decode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub label: u8,
    pub direction: Direction,
}

impl Tag {
    pub const ANNOUNCE_REQUEST: Tag = Tag::new(ANNOUNCE, Direction::Request);
    pub const ANNOUNCE_RESPONSE: Tag = Tag::new(ANNOUNCE, Direction::Response);
    pub const INVOKE_REQUEST: Tag = Tag::new(INVOKE, Direction::Request);
    pub const INVOKE_RESPONSE: Tag = Tag::new(INVOKE, Direction::Response);

    pub const fn new(label: u8, direction: Direction) -> Self {
        Self { label, direction }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Request => "request",
            Direction::Response => "response",
        };
        write!(f, "{} {}", label_name(self.label), direction)
    }
}

/// A frame-backed payload that can cross a channel in bounded chunks.
pub trait Message {
    /// Envelope tag identifying this payload type.
    const TAG: Tag;

    /// Encoded length in bytes.
    fn length(&self) -> usize;

    /// Copy up to `stream.len()` bytes starting at `offset`. Returns the
    /// number of bytes copied; zero once the message is exhausted.
    fn serialize(&self, offset: usize, stream: &mut [u8]) -> usize;

    /// Load a full chunk at `offset`. Always consumes all of `stream`.
    fn deserialize(&mut self, offset: usize, stream: &[u8]) -> usize;

    /// Drop all content so the message can be loaded again.
    fn clear(&mut self);
}
