use comrpc_message::{Handle, InterfaceId, MethodId};

/// Errors that can occur while serving or using an exchange.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] comrpc_frame::FrameError),

    /// The handle names no live export (never issued, released or revoked).
    #[error("invalid handle {0}")]
    InvalidHandle(Handle),

    /// The peer holds as many references on the handle as can be counted.
    #[error("reference count of handle {0} would overflow")]
    ReferenceOverflow(Handle),

    /// The handle was exported under another interface.
    #[error("handle {handle} exports interface {exported:#x}, not {requested:#x}")]
    InterfaceMismatch {
        handle: Handle,
        exported: InterfaceId,
        requested: InterfaceId,
    },

    /// No stub is registered for the interface.
    #[error("no stub for interface {0:#x}")]
    NoStub(InterfaceId),

    /// The stub does not implement the method.
    #[error("interface {interface_id:#x} has no method {method_id}")]
    MethodNotFound {
        interface_id: InterfaceId,
        method_id: MethodId,
    },

    /// The peer sent something other than what the protocol expects here.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// Peer disconnected.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// Request timed out.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration file could not be read.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExchangeError {
    /// True for errors caused by a single bad request; the connection
    /// itself is still usable.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidHandle(_)
                | Self::ReferenceOverflow(_)
                | Self::InterfaceMismatch { .. }
                | Self::NoStub(_)
                | Self::MethodNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
