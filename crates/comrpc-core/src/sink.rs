use std::ops::Deref;
use std::sync::Arc;

use crate::capability::{itself, Capability, CapabilityRef, Exported, Holder, InterfaceId, Unknown};
use crate::refcount::ReleaseStatus;

struct SinkObject<T> {
    object: T,
}

impl<T: Exported> Unknown for SinkObject<T> {
    fn query_interface(self: Arc<Self>, id: InterfaceId) -> Option<CapabilityRef> {
        T::interfaces().query(self, id)
    }

    fn release(self: Arc<Self>) -> ReleaseStatus {
        match Arc::into_inner(self) {
            Some(_) => ReleaseStatus::Destroyed,
            None => ReleaseStatus::Alive,
        }
    }
}

impl<T: Exported> Holder<T> for SinkObject<T> {
    fn target(&self) -> &T {
        &self.object
    }

    fn into_unknown(self: Arc<Self>) -> Arc<dyn Unknown> {
        self
    }
}

/// Local counted wrapper that lets a plain object hand out references to
/// itself without a library or an administrator.
///
/// The sink is expected to outlive the references it hands out. Dropping it
/// early logs a warning; the holders keep the object alive until they let go.
pub struct Sink<T: Exported> {
    inner: Arc<SinkObject<T>>,
}

impl<T: Exported> Sink<T> {
    pub fn new(object: T) -> Self {
        Self {
            inner: Arc::new(SinkObject { object }),
        }
    }

    pub fn query(&self, id: InterfaceId) -> Option<CapabilityRef> {
        Unknown::query_interface(Arc::clone(&self.inner), id)
    }

    /// A counted reference to the object as its concrete type.
    pub fn capability(&self) -> Capability<T> {
        Capability::project(self.holder(), itself::<T>)
    }

    pub fn unknown(&self) -> Arc<dyn Unknown> {
        Arc::clone(&self.inner).into_unknown()
    }

    pub fn holder(&self) -> Arc<dyn Holder<T>> {
        Arc::clone(&self.inner) as Arc<dyn Holder<T>>
    }

    /// References handed out and not yet released.
    pub fn references(&self) -> usize {
        Arc::strong_count(&self.inner) - 1
    }
}

impl<T: Exported> Deref for Sink<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.object
    }
}

impl<T: Exported> Drop for Sink<T> {
    fn drop(&mut self) {
        let references = self.references();
        if references != 0 {
            tracing::warn!(
                object = std::any::type_name::<T>(),
                references,
                "sink destroyed while still referenced"
            );
        }
    }
}
