use std::sync::atomic::{AtomicU32, Ordering};

/// Outcome of dropping one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseStatus {
    /// Other references remain; the object is still alive.
    Alive,
    /// That was the last reference; the object has been destroyed.
    Destroyed,
}

impl ReleaseStatus {
    /// Wire code: 0 alive, 1 destroyed.
    pub fn code(self) -> u32 {
        match self {
            Self::Alive => 0,
            Self::Destroyed => 1,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Alive),
            1 => Some(Self::Destroyed),
            _ => None,
        }
    }

    pub fn is_destroyed(self) -> bool {
        self == Self::Destroyed
    }
}

/// Atomic reference counter.
///
/// Releasing below zero is a programming error and panics.
#[derive(Debug, Default)]
pub struct RefCount(AtomicU32);

impl RefCount {
    pub fn new(initial: u32) -> Self {
        Self(AtomicU32::new(initial))
    }

    /// Take a reference. Returns the new count.
    pub fn add_ref(&self) -> u32 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drop a reference.
    pub fn release(&self) -> ReleaseStatus {
        match self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1))
        {
            Ok(1) => ReleaseStatus::Destroyed,
            Ok(_) => ReleaseStatus::Alive,
            Err(_) => panic!("reference count released below zero"),
        }
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}
