//! Cross-process capability objects over framed byte channels.
//!
//! comrpc lets one process hand another counted references to its objects
//! and invoke methods on them through a small, fixed set of messages.
//!
//! # Crate Structure
//!
//! - [`frame`]: block-granular buffers, cursors and the envelope codec
//! - [`message`]: the `Input`/`Output` and `Init`/`Setup` payloads
//! - [`model`]: capability dispatch, reference counting, services and libraries
//! - [`exchange`]: announce and invoke handling (behind the `exchange` feature)

/// Re-export frame types.
pub mod frame {
    pub use comrpc_frame::*;
}

/// Re-export message types.
pub mod message {
    pub use comrpc_message::*;
}

/// Re-export object model types.
pub mod model {
    pub use comrpc_core::*;
}

/// Re-export exchange types (requires `exchange` feature).
#[cfg(feature = "exchange")]
pub mod exchange {
    pub use comrpc_exchange::*;
}
