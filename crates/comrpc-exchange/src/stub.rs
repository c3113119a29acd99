use std::collections::HashMap;
use std::sync::Arc;

use comrpc_core::{CapabilityRef, Interface};
use comrpc_frame::{Reader, Writer};
use comrpc_message::{Handle, Input, InterfaceId, MethodId, Output};

use crate::error::{ExchangeError, Result};
use crate::export::ExportTable;

/// Server-side dispatcher for one interface.
///
/// A stub unpacks arguments from the [`Call`], invokes the target and packs
/// the results back.
pub trait Stub: Send + Sync {
    fn interface_id(&self) -> InterfaceId;

    fn invoke(&self, call: &mut Call<'_>) -> Result<()>;
}

/// One invocation as seen by a [`Stub`].
pub struct Call<'a> {
    target: &'a CapabilityRef,
    input: &'a Input,
    output: &'a mut Output,
    exports: &'a ExportTable,
    returned: Vec<(Handle, InterfaceId)>,
}

impl<'a> Call<'a> {
    pub(crate) fn new(
        target: &'a CapabilityRef,
        input: &'a Input,
        output: &'a mut Output,
        exports: &'a ExportTable,
    ) -> Self {
        Self {
            target,
            input,
            output,
            exports,
            returned: Vec::new(),
        }
    }

    /// The capability the call is addressed to.
    pub fn target(&self) -> &'a CapabilityRef {
        self.target
    }

    pub fn implementation(&self) -> Handle {
        self.input.implementation()
    }

    pub fn method_id(&self) -> MethodId {
        self.input.method_id()
    }

    /// Argument reader, positioned past the invocation header.
    pub fn arguments(&self) -> Reader<'a> {
        self.input.reader()
    }

    /// Result writer, positioned after whatever was already written.
    pub fn results(&mut self) -> Writer<'_> {
        self.output.appender()
    }

    /// Export a capability returned by the call and get the handle to write
    /// into the results.
    ///
    /// The `(handle, interface)` pair is appended behind the results once
    /// the stub returns.
    pub fn export(&mut self, capability: CapabilityRef) -> Handle {
        let interface_id = capability.interface_id();
        let handle = self.exports.export(capability);
        self.returned.push((handle, interface_id));
        handle
    }

    pub(crate) fn finish(self) {
        for (handle, interface_id) in self.returned {
            self.output.add_implementation(handle, interface_id);
        }
    }
}

/// A [`Stub`] for `I` built from a plain dispatch function.
///
/// ```ignore
/// let stub = TypedStub::<dyn Calculator>::new(|calculator, call| match call.method_id() {
///     0 => {
///         let mut args = call.arguments();
///         let sum = calculator.add(args.read_u32(), args.read_u32());
///         call.results().write_u32(sum);
///         Ok(())
///     }
///     method_id => Err(ExchangeError::MethodNotFound {
///         interface_id: <dyn Calculator as Interface>::ID,
///         method_id,
///     }),
/// });
/// ```
pub struct TypedStub<I: Interface + ?Sized> {
    dispatch: fn(&I, &mut Call<'_>) -> Result<()>,
}

impl<I: Interface + ?Sized> TypedStub<I> {
    pub fn new(dispatch: fn(&I, &mut Call<'_>) -> Result<()>) -> Self {
        Self { dispatch }
    }
}

impl<I: Interface + ?Sized> Stub for TypedStub<I> {
    fn interface_id(&self) -> InterfaceId {
        I::ID
    }

    fn invoke(&self, call: &mut Call<'_>) -> Result<()> {
        let target = call.target();
        let capability =
            target
                .downcast_ref::<I>()
                .ok_or_else(|| ExchangeError::InterfaceMismatch {
                    handle: call.implementation(),
                    exported: target.interface_id(),
                    requested: I::ID,
                })?;
        (self.dispatch)(capability, call)
    }
}

/// Stubs by interface id.
#[derive(Default, Clone)]
pub struct StubRegistry {
    stubs: HashMap<InterfaceId, Arc<dyn Stub>>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `stub`, replacing any stub for the same interface.
    pub fn register(&mut self, stub: impl Stub + 'static) {
        let interface_id = stub.interface_id();
        if self.stubs.insert(interface_id, Arc::new(stub)).is_some() {
            tracing::debug!(
                interface_id = format_args!("{interface_id:#x}"),
                "replaced stub"
            );
        }
    }

    pub fn get(&self, interface_id: InterfaceId) -> Option<&Arc<dyn Stub>> {
        self.stubs.get(&interface_id)
    }

    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }
}

impl std::fmt::Debug for StubRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.stubs.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("StubRegistry").field("interfaces", &ids).finish()
    }
}
