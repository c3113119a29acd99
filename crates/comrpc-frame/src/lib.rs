//! Message frames and type-tagged envelopes for comrpc.
//!
//! A [`Frame`] is a growable byte buffer addressed by offset; every message
//! that crosses a process boundary is backed by one. Messages stream in and
//! out of their frames in bounded chunks through the [`Message`] trait.
//!
//! On the wire each message travels inside an envelope:
//! - A 2-byte magic number ("CR") for stream synchronization
//! - A 1-byte label and a 1-byte direction naming the payload type
//! - A 4-byte little-endian payload length

pub mod codec;
pub mod cursor;
pub mod error;
pub mod frame;
pub mod label;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_envelope, encode_envelope, encode_message, Envelope, StreamConfig, DEFAULT_MAX_MESSAGE,
    HEADER_SIZE,
};
pub use cursor::{Reader, Writer};
pub use error::{FrameError, Result};
pub use frame::{Frame, Number, BLOCK_SIZE};
pub use label::{ANNOUNCE, INVOKE};
pub use message::{Direction, Message, Tag};
pub use reader::MessageReader;
pub use writer::MessageWriter;
