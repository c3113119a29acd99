//! Invocation and handshake payloads for comrpc.
//!
//! Four fixed layouts travel between processes, each backed by a
//! [`comrpc_frame::Frame`] and carried in a type-tagged envelope:
//!
//! | label | request | response |
//! |---|---|---|
//! | announce | [`Init`] | [`Setup`] |
//! | invoke | [`Input`] | [`Output`] |
//!
//! Multi-byte numbers use native width and order. Object identities are
//! opaque [`Handle`]s, meaningful only to the process that issued them.

pub mod environment;
pub mod handle;
pub mod init;
pub mod input;
pub mod output;
pub mod setup;

pub use environment::{
    child_environment, parent_exchange_id, parse_exchange_id, PARENT_EXCHANGE_ID_VAR,
    UNSET_EXCHANGE_ID,
};
pub use handle::{Handle, InterfaceId, MethodId};
pub use init::{AnnounceKind, Init, CLASS_NAME_SIZE, INIT_SIZE};
pub use input::Input;
pub use output::Output;
pub use setup::Setup;
