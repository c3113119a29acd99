//! Object model behind comrpc: capability dispatch, reference counting and
//! the lifetime of services hosted in libraries.
//!
//! An exported type declares which capabilities it answers in an
//! [`InterfaceMap`]. Queries return counted [`Capability`] references; the
//! object is destroyed when the last one is released. Services built through
//! a [`ServiceAdministrator`] also keep their [`Library`] loaded until the
//! last instance from it is gone.

pub mod administrator;
pub mod capability;
pub mod error;
pub mod library;
pub mod metadata;
pub mod refcount;
pub mod service;
pub mod sink;

pub use administrator::{ServiceAdministrator, ANY_VERSION};
pub use capability::{
    query, Capability, CapabilityRef, Exported, Holder, Interface, InterfaceId, InterfaceMap,
    Unknown, UNKNOWN_ID,
};
pub use error::{CoreError, Result};
pub use library::{Library, Module};
pub use metadata::{registration, version, ServiceMetadata, ServiceRegistration};
pub use refcount::{RefCount, ReleaseStatus};
pub use service::Service;
pub use sink::Sink;
