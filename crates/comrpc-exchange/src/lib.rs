//! Exchange layer for comrpc: the object tables and request handling that
//! sit between a byte channel and local objects.
//!
//! An [`Exchange`] answers announcements (acquire, request, offer, revoke
//! and named instantiation) and dispatches invocations to registered
//! [`Stub`]s. The [`session`] functions drive one request/response turn over
//! a blocking stream.

pub mod config;
pub mod error;
pub mod exchange;
pub mod export;
pub mod import;
pub mod session;
pub mod stub;

#[cfg(test)]
mod testing;

pub use config::ExchangeConfig;
pub use error::{ExchangeError, Result};
pub use exchange::{
    AnnounceOutcome, Exchange, METHOD_ADD_REF, METHOD_QUERY_INTERFACE, METHOD_RELEASE,
};
pub use export::ExportTable;
pub use import::{ImportTable, RemoteInterface};
pub use session::{
    announce, invoke, remote_add_ref, remote_query_interface, remote_release, serve, serve_next,
    Served,
};
pub use stub::{Call, Stub, StubRegistry, TypedStub};
