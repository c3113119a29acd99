use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::refcount::ReleaseStatus;

/// Numeric identifier of a capability.
pub type InterfaceId = u32;

/// The capability every exported object answers: "are you alive".
pub const UNKNOWN_ID: InterfaceId = 0;

/// A capability type, implemented for `dyn Trait` with that trait's id.
///
/// ```ignore
/// pub trait Calculator: Send + Sync {
///     fn add(&self, a: u32, b: u32) -> u32;
/// }
///
/// impl Interface for dyn Calculator {
///     const ID: InterfaceId = 0x0000_0101;
/// }
///
/// impl Exported for Engine {
///     fn interfaces() -> &'static InterfaceMap<Self> {
///         static MAP: LazyLock<InterfaceMap<Engine>> =
///             LazyLock::new(|| InterfaceMap::<Engine>::new().entry::<dyn Calculator>(|e| e));
///         &MAP
///     }
/// }
/// ```
pub trait Interface: 'static {
    const ID: InterfaceId;
}

/// Base capability of every exported object.
pub trait Unknown: Send + Sync + 'static {
    /// Resolve `id` against this object.
    ///
    /// Returns a counted reference on success, `None` if unsupported.
    fn query_interface(self: Arc<Self>, id: InterfaceId) -> Option<CapabilityRef>;

    /// Drop this reference and report whether it was the last one.
    fn release(self: Arc<Self>) -> ReleaseStatus;
}

impl Interface for dyn Unknown {
    const ID: InterfaceId = UNKNOWN_ID;
}

/// A counted owner of a `T` that capabilities project out of.
pub trait Holder<T>: Unknown {
    fn target(&self) -> &T;

    fn into_unknown(self: Arc<Self>) -> Arc<dyn Unknown>;
}

/// A concrete type that can be exported through capabilities.
///
/// The map is declared once per type, usually in a `static LazyLock`.
pub trait Exported: Send + Sync + Sized + 'static {
    fn interfaces() -> &'static InterfaceMap<Self>;
}

/// Identity projection for capabilities of an object's concrete type.
pub(crate) fn itself<T>(target: &T) -> &T {
    target
}

trait View<I: ?Sized>: Send + Sync {
    fn get(&self) -> &I;
    fn duplicate(&self) -> Box<dyn View<I>>;
    fn unknown(&self) -> Arc<dyn Unknown>;
    fn strong_count(&self) -> usize;
    fn release(self: Box<Self>) -> ReleaseStatus;
}

struct Projected<T: 'static, I: ?Sized + 'static> {
    owner: Arc<dyn Holder<T>>,
    project: fn(&T) -> &I,
}

impl<T: 'static, I: ?Sized + 'static> View<I> for Projected<T, I> {
    fn get(&self) -> &I {
        (self.project)(self.owner.target())
    }

    fn duplicate(&self) -> Box<dyn View<I>> {
        Box::new(Projected {
            owner: Arc::clone(&self.owner),
            project: self.project,
        })
    }

    fn unknown(&self) -> Arc<dyn Unknown> {
        Arc::clone(&self.owner).into_unknown()
    }

    fn strong_count(&self) -> usize {
        Arc::strong_count(&self.owner)
    }

    fn release(self: Box<Self>) -> ReleaseStatus {
        Unknown::release(self.owner)
    }
}

struct UnknownView {
    owner: Arc<dyn Unknown>,
}

impl View<dyn Unknown> for UnknownView {
    fn get(&self) -> &dyn Unknown {
        &*self.owner
    }

    fn duplicate(&self) -> Box<dyn View<dyn Unknown>> {
        Box::new(UnknownView {
            owner: Arc::clone(&self.owner),
        })
    }

    fn unknown(&self) -> Arc<dyn Unknown> {
        Arc::clone(&self.owner)
    }

    fn strong_count(&self) -> usize {
        Arc::strong_count(&self.owner)
    }

    fn release(self: Box<Self>) -> ReleaseStatus {
        Unknown::release(self.owner)
    }
}

/// A counted, typed reference to one capability of an exported object.
///
/// Cloning takes a reference, dropping gives it back. Use
/// [`Capability::release`] when the caller needs to know whether the object
/// went away.
pub struct Capability<I: ?Sized + 'static> {
    view: Box<dyn View<I>>,
}

impl<I: ?Sized + 'static> Capability<I> {
    /// Project `I` out of a counted owner.
    pub fn project<T: 'static>(owner: Arc<dyn Holder<T>>, project: fn(&T) -> &I) -> Self {
        Self {
            view: Box::new(Projected { owner, project }),
        }
    }

    /// Number of live references to the underlying object.
    pub fn ref_count(&self) -> usize {
        self.view.strong_count()
    }

    /// The object's base capability, as a new reference.
    pub fn unknown(&self) -> Arc<dyn Unknown> {
        self.view.unknown()
    }

    /// Drop this reference.
    ///
    /// Exactly one release among all references to an object observes
    /// [`ReleaseStatus::Destroyed`].
    pub fn release(self) -> ReleaseStatus {
        self.view.release()
    }
}

impl Capability<dyn Unknown> {
    pub fn from_unknown(owner: Arc<dyn Unknown>) -> Self {
        Self {
            view: Box::new(UnknownView { owner }),
        }
    }
}

impl<I: ?Sized + 'static> Deref for Capability<I> {
    type Target = I;

    fn deref(&self) -> &I {
        self.view.get()
    }
}

impl<I: ?Sized + 'static> Clone for Capability<I> {
    fn clone(&self) -> Self {
        Self {
            view: self.view.duplicate(),
        }
    }
}

impl<I: ?Sized + 'static> fmt::Debug for Capability<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("interface", &std::any::type_name::<I>())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

trait Erased: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn duplicate(&self) -> Box<dyn Erased>;
    fn unknown(&self) -> Arc<dyn Unknown>;
    fn ref_count(&self) -> usize;
    fn release(self: Box<Self>) -> ReleaseStatus;
}

impl<I: ?Sized + 'static> Erased for Capability<I> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn duplicate(&self) -> Box<dyn Erased> {
        Box::new(self.clone())
    }

    fn unknown(&self) -> Arc<dyn Unknown> {
        Capability::unknown(self)
    }

    fn ref_count(&self) -> usize {
        Capability::ref_count(self)
    }

    fn release(self: Box<Self>) -> ReleaseStatus {
        Capability::release(*self)
    }
}

/// A capability whose type is known only by its interface id.
///
/// This is what queries return; [`CapabilityRef::downcast`] recovers the
/// typed reference.
pub struct CapabilityRef {
    interface_id: InterfaceId,
    inner: Box<dyn Erased>,
}

impl CapabilityRef {
    pub fn new<I: Interface + ?Sized>(capability: Capability<I>) -> Self {
        Self {
            interface_id: I::ID,
            inner: Box::new(capability),
        }
    }

    pub fn interface_id(&self) -> InterfaceId {
        self.interface_id
    }

    pub fn downcast_ref<I: Interface + ?Sized>(&self) -> Option<&Capability<I>> {
        self.inner.as_any().downcast_ref::<Capability<I>>()
    }

    /// Recover the typed reference. A mismatched type drops the reference.
    pub fn downcast<I: Interface + ?Sized>(self) -> Option<Capability<I>> {
        self.inner
            .into_any()
            .downcast::<Capability<I>>()
            .ok()
            .map(|capability| *capability)
    }

    pub fn unknown(&self) -> Arc<dyn Unknown> {
        self.inner.unknown()
    }

    pub fn ref_count(&self) -> usize {
        self.inner.ref_count()
    }

    pub fn release(self) -> ReleaseStatus {
        self.inner.release()
    }
}

impl Clone for CapabilityRef {
    fn clone(&self) -> Self {
        Self {
            interface_id: self.interface_id,
            inner: self.inner.duplicate(),
        }
    }
}

impl fmt::Debug for CapabilityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRef")
            .field("interface_id", &format_args!("{:#x}", self.interface_id))
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Query `unknown` for `I`.
pub fn query<I: Interface + ?Sized>(unknown: Arc<dyn Unknown>) -> Option<Capability<I>> {
    unknown.query_interface(I::ID)?.downcast::<I>()
}

type Resolver<T> = Box<dyn Fn(&Arc<dyn Holder<T>>) -> Option<CapabilityRef> + Send + Sync>;

struct MapEntry<T: 'static> {
    interface_id: InterfaceId,
    resolve: Resolver<T>,
}

/// Declared capability list of an exported type.
///
/// The first entry declaring the requested id decides the answer, even when
/// it resolves to nothing. The [`InterfaceMap::next`] map is only consulted
/// for ids no entry here declares. [`UNKNOWN_ID`] is always answered before
/// any entry is looked at.
pub struct InterfaceMap<T: 'static> {
    entries: Vec<MapEntry<T>>,
    next: Option<fn() -> &'static InterfaceMap<T>>,
}

impl<T: 'static> Default for InterfaceMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> InterfaceMap<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next: None,
        }
    }

    /// Answer `I` with a view of the object itself or one of its fields.
    pub fn entry<I: Interface + ?Sized>(mut self, project: fn(&T) -> &I) -> Self {
        self.entries.push(MapEntry {
            interface_id: I::ID,
            resolve: Box::new(move |owner: &Arc<dyn Holder<T>>| {
                Some(CapabilityRef::new(Capability::project(
                    Arc::clone(owner),
                    project,
                )))
            }),
        });
        self
    }

    /// Forward `id` to an aggregated sub-object, whose own query decides
    /// the result and its counting.
    pub fn aggregate(
        mut self,
        interface_id: InterfaceId,
        inner: fn(&T) -> Option<Arc<dyn Unknown>>,
    ) -> Self {
        self.entries.push(MapEntry {
            interface_id,
            resolve: Box::new(move |owner: &Arc<dyn Holder<T>>| {
                inner(owner.target())?.query_interface(interface_id)
            }),
        });
        self
    }

    /// Like [`InterfaceMap::entry`], but only while `available` holds.
    pub fn relay<I: Interface + ?Sized>(
        mut self,
        project: fn(&T) -> &I,
        available: fn(&T) -> bool,
    ) -> Self {
        self.entries.push(MapEntry {
            interface_id: I::ID,
            resolve: Box::new(move |owner: &Arc<dyn Holder<T>>| {
                if !available(owner.target()) {
                    return None;
                }
                Some(CapabilityRef::new(Capability::project(
                    Arc::clone(owner),
                    project,
                )))
            }),
        });
        self
    }

    /// Fall back to another map for ids not declared here.
    pub fn next(mut self, base: fn() -> &'static InterfaceMap<T>) -> Self {
        self.next = Some(base);
        self
    }

    /// Declared interface ids, in lookup order, fallbacks included.
    pub fn interfaces(&self) -> Vec<InterfaceId> {
        let mut ids: Vec<InterfaceId> = self.entries.iter().map(|e| e.interface_id).collect();
        if let Some(next) = self.next {
            ids.extend(next().interfaces());
        }
        ids
    }

    /// Resolve `id` against `owner`.
    pub fn query(&self, owner: Arc<dyn Holder<T>>, id: InterfaceId) -> Option<CapabilityRef> {
        if id == UNKNOWN_ID {
            return Some(CapabilityRef::new(Capability::from_unknown(
                owner.into_unknown(),
            )));
        }
        self.lookup(&owner, id)
    }

    fn lookup(&self, owner: &Arc<dyn Holder<T>>, id: InterfaceId) -> Option<CapabilityRef> {
        match self.entries.iter().find(|entry| entry.interface_id == id) {
            Some(entry) => (entry.resolve)(owner),
            None => self.next.and_then(|next| next().lookup(owner, id)),
        }
    }
}

impl<T: 'static> fmt::Debug for InterfaceMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceMap")
            .field("interfaces", &self.interfaces())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::LazyLock;

    use super::*;
    use crate::sink::Sink;

    trait Adder: Send + Sync {
        fn add(&self, a: u32, b: u32) -> u32;
    }

    impl Interface for dyn Adder {
        const ID: InterfaceId = 0x10;
    }

    trait Named: Send + Sync {
        fn name(&self) -> String;
    }

    impl Interface for dyn Named {
        const ID: InterfaceId = 0x11;
    }

    trait Switch: Send + Sync {
        fn on(&self) -> bool;
    }

    impl Interface for dyn Switch {
        const ID: InterfaceId = 0x12;
    }

    struct Label(&'static str);

    impl Named for Label {
        fn name(&self) -> String {
            self.0.to_string()
        }
    }

    impl Exported for Label {
        fn interfaces() -> &'static InterfaceMap<Self> {
            static MAP: LazyLock<InterfaceMap<Label>> =
                LazyLock::new(|| InterfaceMap::<Label>::new().entry::<dyn Named>(|label| label));
            &MAP
        }
    }

    struct Calculator {
        first_name: Label,
        second_name: Label,
        enabled: AtomicBool,
        helper: Sink<Label>,
    }

    impl Adder for Calculator {
        fn add(&self, a: u32, b: u32) -> u32 {
            a + b
        }
    }

    impl Switch for Calculator {
        fn on(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
    }

    fn base_map() -> &'static InterfaceMap<Calculator> {
        static MAP: LazyLock<InterfaceMap<Calculator>> = LazyLock::new(|| {
            InterfaceMap::<Calculator>::new()
                .entry::<dyn Named>(|calc| &calc.second_name)
                .aggregate(<dyn Named as Interface>::ID, |calc| Some(calc.helper.unknown()))
                .relay::<dyn Switch>(|calc| calc, |_| true)
        });
        &MAP
    }

    impl Exported for Calculator {
        fn interfaces() -> &'static InterfaceMap<Self> {
            static MAP: LazyLock<InterfaceMap<Calculator>> = LazyLock::new(|| {
                InterfaceMap::<Calculator>::new()
                    .entry::<dyn Adder>(|calc| calc)
                    .entry::<dyn Named>(|calc| &calc.first_name)
                    .relay::<dyn Switch>(|calc| calc, |calc| calc.on())
                    .next(base_map)
            });
            &MAP
        }
    }

    fn calculator(enabled: bool) -> Sink<Calculator> {
        Sink::new(Calculator {
            first_name: Label("first"),
            second_name: Label("second"),
            enabled: AtomicBool::new(enabled),
            helper: Sink::new(Label("helper")),
        })
    }

    #[test]
    fn entry_projects_and_counts() {
        let sink = calculator(true);
        let adder = sink.query(<dyn Adder as Interface>::ID).unwrap();
        assert_eq!(adder.interface_id(), 0x10);
        assert_eq!(sink.references(), 1);

        let adder = adder.downcast::<dyn Adder>().unwrap();
        assert_eq!(adder.add(2, 3), 5);

        let copy = adder.clone();
        assert_eq!(sink.references(), 2);
        assert_eq!(copy.release(), ReleaseStatus::Alive);
        assert_eq!(adder.release(), ReleaseStatus::Alive);
        assert_eq!(sink.references(), 0);
    }

    #[test]
    fn first_declared_entry_wins() {
        let sink = calculator(true);
        let named = query::<dyn Named>(sink.unknown()).unwrap();
        assert_eq!(named.name(), "first");
    }

    #[test]
    fn unknown_is_always_answered() {
        let sink = calculator(false);
        let unknown = sink.query(UNKNOWN_ID).unwrap();
        assert_eq!(unknown.interface_id(), UNKNOWN_ID);
        assert!(unknown.downcast_ref::<dyn Unknown>().is_some());
    }

    #[test]
    fn unsupported_id_is_none_without_reference_leak() {
        let sink = calculator(true);
        assert!(sink.query(0xFFFF).is_none());
        assert_eq!(sink.references(), 0);
    }

    #[test]
    fn unavailable_relay_answers_none() {
        let disabled = calculator(false);
        assert!(query::<dyn Switch>(disabled.unknown()).is_none());
        assert_eq!(disabled.references(), 0);

        let enabled = calculator(true);
        let switch = query::<dyn Switch>(enabled.unknown()).unwrap();
        assert!(switch.on());
    }

    #[test]
    fn null_aggregate_stops_lookup() {
        static MAP: LazyLock<InterfaceMap<Calculator>> = LazyLock::new(|| {
            InterfaceMap::<Calculator>::new()
                .aggregate(<dyn Named as Interface>::ID, |_| None)
                .entry::<dyn Named>(|calc| &calc.first_name)
        });

        let sink = calculator(true);
        let owner: Arc<dyn Holder<Calculator>> = sink.holder();
        assert!(MAP.query(owner, <dyn Named as Interface>::ID).is_none());
        assert_eq!(sink.references(), 0);
    }

    #[test]
    fn base_map_answers_ids_not_declared_locally() {
        static MAP: LazyLock<InterfaceMap<Calculator>> = LazyLock::new(|| {
            InterfaceMap::<Calculator>::new()
                .entry::<dyn Adder>(|calc| calc)
                .next(base_map)
        });

        let sink = calculator(false);
        let owner: Arc<dyn Holder<Calculator>> = sink.holder();
        let switch = MAP.query(owner, <dyn Switch as Interface>::ID).unwrap();
        assert!(!switch.downcast::<dyn Switch>().unwrap().on());
    }

    #[test]
    fn aggregate_counts_on_sub_object() {
        static MAP: LazyLock<InterfaceMap<Calculator>> = LazyLock::new(|| {
            InterfaceMap::<Calculator>::new()
                .aggregate(<dyn Named as Interface>::ID, |calc| Some(calc.helper.unknown()))
        });

        let sink = calculator(true);
        let owner: Arc<dyn Holder<Calculator>> = sink.holder();
        let named = MAP.query(owner, <dyn Named as Interface>::ID).unwrap();
        assert_eq!(sink.helper.references(), 1);
        assert_eq!(sink.references(), 0);

        let named = named.downcast::<dyn Named>().unwrap();
        assert_eq!(named.name(), "helper");
    }

    #[test]
    fn interfaces_lists_declared_order_with_fallback() {
        assert_eq!(
            Calculator::interfaces().interfaces(),
            vec![0x10, 0x11, 0x12, 0x11, 0x11, 0x12]
        );
    }

    #[test]
    fn downcast_to_wrong_type_fails() {
        let sink = calculator(true);
        let adder = sink.query(<dyn Adder as Interface>::ID).unwrap();
        assert!(adder.downcast_ref::<dyn Named>().is_none());
        assert!(adder.downcast::<dyn Named>().is_none());
        assert_eq!(sink.references(), 0);
    }
}
