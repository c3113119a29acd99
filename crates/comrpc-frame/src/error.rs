use crate::message::Tag;

/// Errors that can occur while moving messages across a channel.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The envelope header contains an invalid magic number.
    #[error("invalid envelope magic (expected 0x4352 \"CR\")")]
    InvalidMagic,

    /// The envelope direction byte is neither request nor response.
    #[error("invalid envelope direction byte {0}")]
    InvalidDirection(u8),

    /// The message exceeds the configured maximum size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A message of one type arrived where another was expected.
    #[error("unexpected message: expected {expected}, found {found}")]
    UnexpectedTag { expected: Tag, found: Tag },

    /// An I/O error occurred while reading or writing messages.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete envelope was received.
    #[error("connection closed (incomplete envelope)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
