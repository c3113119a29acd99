//! Shared fixtures for exchange tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::LazyLock;

use comrpc_core::{
    Capability, Exported, Interface, InterfaceId, InterfaceMap, Service, ServiceAdministrator,
};
use comrpc_message::Handle;

use crate::error::ExchangeError;
use crate::stub::TypedStub;

pub(crate) trait Calculator: Send + Sync {
    fn add(&self, a: u32, b: u32) -> u32;
}

impl Interface for dyn Calculator {
    const ID: InterfaceId = 0x0101;
}

pub(crate) trait Counter: Send + Sync {
    fn increment(&self) -> u32;
}

impl Interface for dyn Counter {
    const ID: InterfaceId = 0x0102;
}

pub(crate) trait Absent: Send + Sync {}

impl Interface for dyn Absent {
    const ID: InterfaceId = 0x0103;
}

#[derive(Default)]
pub(crate) struct Engine {
    total: AtomicU32,
}

impl Interface for Engine {
    const ID: InterfaceId = 0x0100;
}

impl Calculator for Engine {
    fn add(&self, a: u32, b: u32) -> u32 {
        a + b
    }
}

impl Counter for Engine {
    fn increment(&self) -> u32 {
        self.total.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Exported for Engine {
    fn interfaces() -> &'static InterfaceMap<Self> {
        static MAP: LazyLock<InterfaceMap<Engine>> = LazyLock::new(|| {
            InterfaceMap::<Engine>::new()
                .entry::<dyn Calculator>(|engine| engine)
                .entry::<dyn Counter>(|engine| engine)
        });
        &MAP
    }
}

pub(crate) fn engine(admin: &ServiceAdministrator) -> Capability<Engine> {
    Service::instance(admin, Engine::default())
}

/// Method 0 adds two numbers, method 1 hands out the counter capability.
pub(crate) fn calculator_stub() -> TypedStub<dyn Calculator> {
    TypedStub::new(|calculator, call| match call.method_id() {
        0 => {
            let mut args = call.arguments();
            let a = args.read_u32();
            let b = args.read_u32();
            call.results().write_u32(calculator.add(a, b));
            Ok(())
        }
        1 => {
            let counter = call
                .target()
                .unknown()
                .query_interface(<dyn Counter as Interface>::ID);
            let handle = match counter {
                Some(counter) => call.export(counter),
                None => Handle::NULL,
            };
            call.results().write_number(handle);
            Ok(())
        }
        method_id => Err(ExchangeError::MethodNotFound {
            interface_id: <dyn Calculator as Interface>::ID,
            method_id,
        }),
    })
}

/// Method 0 increments and returns the count.
pub(crate) fn counter_stub() -> TypedStub<dyn Counter> {
    TypedStub::new(|counter, call| match call.method_id() {
        0 => {
            call.results().write_u32(counter.increment());
            Ok(())
        }
        method_id => Err(ExchangeError::MethodNotFound {
            interface_id: <dyn Counter as Interface>::ID,
            method_id,
        }),
    })
}
