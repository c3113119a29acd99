use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use comrpc_core::{CapabilityRef, Library, ServiceAdministrator, UNKNOWN_ID};
use comrpc_frame::Message;
use comrpc_message::{
    Handle, Init, Input, InterfaceId, MethodId, Output, Setup, UNSET_EXCHANGE_ID,
};

use crate::config::ExchangeConfig;
use crate::error::{ExchangeError, Result};
use crate::export::ExportTable;
use crate::import::{ImportTable, RemoteInterface};
use crate::stub::{Call, Stub, StubRegistry};

/// Methods every handle answers under [`UNKNOWN_ID`].
pub const METHOD_ADD_REF: MethodId = 0;
pub const METHOD_RELEASE: MethodId = 1;
pub const METHOD_QUERY_INTERFACE: MethodId = 2;

/// What an announcement did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// A peer said hello and was handed the root object.
    Acquired { peer_id: u32, implementation: Handle },
    /// A peer asked for an interface of the root object.
    Requested {
        interface_id: InterfaceId,
        implementation: Handle,
    },
    /// A peer had a named service built.
    Instantiated { implementation: Handle },
    /// A peer pushed one of its interfaces.
    Offered(RemoteInterface),
    /// A peer withdrew an interface.
    Revoked(RemoteInterface),
}

impl AnnounceOutcome {
    /// Handle sent back in the reply, `NULL` for offers and revokes.
    pub fn implementation(&self) -> Handle {
        match self {
            Self::Acquired { implementation, .. }
            | Self::Requested { implementation, .. }
            | Self::Instantiated { implementation } => *implementation,
            Self::Offered(_) | Self::Revoked(_) => Handle::NULL,
        }
    }
}

/// One side of a comrpc connection: answers announcements and dispatches
/// invocations to local objects.
///
/// An exchange owns the capabilities it has exported. Peers address them by
/// [`Handle`]; nothing a peer sends is ever dereferenced.
pub struct Exchange {
    id: u32,
    config: ExchangeConfig,
    administrator: ServiceAdministrator,
    library: Library,
    root: Option<CapabilityRef>,
    stubs: StubRegistry,
    exports: ExportTable,
    imports: ImportTable,
    peers: Mutex<BTreeSet<u32>>,
    sequence: AtomicU32,
}

impl Exchange {
    pub fn new(id: u32, administrator: ServiceAdministrator) -> Self {
        Self {
            id,
            config: ExchangeConfig::default(),
            administrator,
            library: Library::builtin("comrpc"),
            root: None,
            stubs: StubRegistry::new(),
            exports: ExportTable::new(),
            imports: ImportTable::new(),
            peers: Mutex::new(BTreeSet::new()),
            sequence: AtomicU32::new(0),
        }
    }

    pub fn with_config(mut self, config: ExchangeConfig) -> Self {
        self.config = config;
        self
    }

    /// Object handed to peers that acquire or request.
    pub fn with_root(mut self, root: CapabilityRef) -> Self {
        self.root = Some(root);
        self
    }

    /// Library that named instantiations are bound to.
    pub fn with_library(mut self, library: Library) -> Self {
        self.library = library;
        self
    }

    pub fn with_stub(mut self, stub: impl Stub + 'static) -> Self {
        self.stubs.register(stub);
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn administrator(&self) -> &ServiceAdministrator {
        &self.administrator
    }

    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    pub fn imports(&self) -> &ImportTable {
        &self.imports
    }

    /// Peers that have acquired, in id order.
    pub fn peers(&self) -> Vec<u32> {
        self.lock_peers().iter().copied().collect()
    }

    /// Answer an announcement.
    ///
    /// Named instantiation is checked before the control discriminant. An
    /// unrecognised discriminant is handled as an acquire. Offers and revokes
    /// leave `setup` empty; everything else fills it with the resolved handle,
    /// the next sequence number and this exchange's settings.
    pub fn announce(&self, init: &Init, setup: &mut Setup) -> AnnounceOutcome {
        setup.clear();

        if init.is_instantiate() {
            let class_name = init.class_name();
            let implementation = self
                .administrator
                .instantiate(
                    &self.library,
                    &class_name,
                    init.version_id(),
                    init.interface_id(),
                )
                .map(|capability| self.exports.export(capability))
                .unwrap_or(Handle::NULL);
            tracing::debug!(
                peer = init.id(),
                class = %class_name,
                %implementation,
                "instantiate"
            );
            self.reply(setup, implementation);
            return AnnounceOutcome::Instantiated { implementation };
        }

        if init.is_offer() {
            let remote = remote_interface(init);
            tracing::debug!(peer = remote.peer_id, handle = %remote.handle, "offer");
            self.imports.offer(remote);
            return AnnounceOutcome::Offered(remote);
        }

        if init.is_revoke() {
            let remote = remote_interface(init);
            if self
                .imports
                .revoke(remote.peer_id, remote.interface_id, remote.handle)
                .is_none()
            {
                tracing::warn!(
                    peer = remote.peer_id,
                    handle = %remote.handle,
                    "revoke for an interface that was never offered"
                );
            }
            return AnnounceOutcome::Revoked(remote);
        }

        if init.is_requested() {
            let interface_id = init.interface_id();
            let implementation = self.request(init.exchange_id(), interface_id);
            tracing::debug!(
                peer = init.id(),
                interface_id = format_args!("{interface_id:#x}"),
                %implementation,
                "request"
            );
            self.reply(setup, implementation);
            return AnnounceOutcome::Requested {
                interface_id,
                implementation,
            };
        }

        if init.kind().is_none() {
            tracing::warn!(
                peer = init.id(),
                discriminant = ?init.raw_kind(),
                "unknown announce discriminant, handling as acquire"
            );
        }
        let peer_id = init.id();
        self.lock_peers().insert(peer_id);
        let implementation = self
            .root
            .as_ref()
            .map(|root| self.exports.export(root.clone()))
            .unwrap_or(Handle::NULL);
        tracing::debug!(peer = peer_id, %implementation, "acquire");
        self.reply(setup, implementation);
        AnnounceOutcome::Acquired {
            peer_id,
            implementation,
        }
    }

    /// Dispatch an invocation to the exported capability it addresses.
    ///
    /// `output` is cleared first. On error it holds no partial results.
    pub fn invoke(&self, input: &Input, output: &mut Output) -> Result<()> {
        output.clear();
        let result = self.dispatch(input, output);
        if result.is_err() {
            output.clear();
        }
        result
    }

    /// Export `capability` and build the offer announcing it.
    pub fn offer(&self, my_id: u32, capability: CapabilityRef) -> Init {
        let interface_id = capability.interface_id();
        let implementation = self.exports.export(capability);
        let mut init = Init::new();
        init.set_offer(my_id, interface_id, implementation);
        init
    }

    /// Withdraw an export and build the revoke announcing it.
    ///
    /// Later invocations on `implementation` fail with
    /// [`ExchangeError::InvalidHandle`].
    pub fn revoke(&self, my_id: u32, implementation: Handle) -> Result<Init> {
        let capability = self
            .exports
            .revoke(implementation)
            .ok_or(ExchangeError::InvalidHandle(implementation))?;
        let mut init = Init::new();
        init.set_revoke(my_id, capability.interface_id(), implementation);
        Ok(init)
    }

    fn request(&self, exchange_id: u32, interface_id: InterfaceId) -> Handle {
        if exchange_id != UNSET_EXCHANGE_ID && exchange_id != self.id {
            tracing::debug!(
                exchange_id,
                local = self.id,
                "request addressed to another exchange"
            );
            return Handle::NULL;
        }
        let Some(root) = &self.root else {
            return Handle::NULL;
        };
        root.unknown()
            .query_interface(interface_id)
            .map(|capability| self.exports.export(capability))
            .unwrap_or(Handle::NULL)
    }

    fn dispatch(&self, input: &Input, output: &mut Output) -> Result<()> {
        let implementation = input.implementation();
        let interface_id = input.interface_id();
        if interface_id == UNKNOWN_ID {
            return self.dispatch_unknown(input, output);
        }

        let target = self
            .exports
            .resolve(implementation)
            .ok_or(ExchangeError::InvalidHandle(implementation))?;
        if target.interface_id() != interface_id {
            return Err(ExchangeError::InterfaceMismatch {
                handle: implementation,
                exported: target.interface_id(),
                requested: interface_id,
            });
        }
        let stub = self
            .stubs
            .get(interface_id)
            .ok_or(ExchangeError::NoStub(interface_id))?;

        let mut call = Call::new(&target, input, output, &self.exports);
        stub.invoke(&mut call)?;
        call.finish();
        Ok(())
    }

    fn dispatch_unknown(&self, input: &Input, output: &mut Output) -> Result<()> {
        let implementation = input.implementation();
        let invalid = || ExchangeError::InvalidHandle(implementation);

        match input.method_id() {
            METHOD_ADD_REF => {
                let count = self.exports.add_ref(implementation)?;
                output.writer().write_u32(count);
            }
            METHOD_RELEASE => {
                let status = self.exports.release(implementation).ok_or_else(invalid)?;
                output.writer().write_u32(status.code());
            }
            METHOD_QUERY_INTERFACE => {
                let target = self.exports.resolve(implementation).ok_or_else(invalid)?;
                let interface_id = input.reader().read_u32();
                let mut call = Call::new(&target, input, output, &self.exports);
                let handle = match target.unknown().query_interface(interface_id) {
                    Some(capability) => call.export(capability),
                    None => Handle::NULL,
                };
                call.results().write_number(handle);
                call.finish();
            }
            method_id => {
                return Err(ExchangeError::MethodNotFound {
                    interface_id: UNKNOWN_ID,
                    method_id,
                })
            }
        }
        Ok(())
    }

    fn reply(&self, setup: &mut Setup, implementation: Handle) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        setup.set(
            implementation,
            sequence,
            &self.config.proxy_stub_path,
            &self.config.trace_categories,
        );
    }

    fn lock_peers(&self) -> MutexGuard<'_, BTreeSet<u32>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.id)
            .field("exports", &self.exports.len())
            .field("imports", &self.imports.len())
            .field("stubs", &self.stubs)
            .finish()
    }
}

fn remote_interface(init: &Init) -> RemoteInterface {
    RemoteInterface {
        peer_id: init.id(),
        exchange_id: init.exchange_id(),
        interface_id: init.interface_id(),
        handle: init.implementation(),
    }
}
