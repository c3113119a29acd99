use std::fmt;

use comrpc_frame::Number;

/// Numeric identifier of a capability.
pub type InterfaceId = u32;

/// Method index within an interface.
pub type MethodId = u8;

/// Opaque, pointer-width token naming an object exported by the peer.
///
/// A handle only means something inside the process that issued it. The
/// receiving side compares and echoes it back, nothing more.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(usize);

impl Handle {
    /// The null handle: "no object".
    pub const NULL: Handle = Handle(0);

    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<usize> for Handle {
    fn from(raw: usize) -> Self {
        Self(raw)
    }
}

impl Number for Handle {
    const WIDTH: usize = <usize as Number>::WIDTH;

    fn write_to(self, dst: &mut [u8]) {
        self.0.write_to(dst);
    }

    fn read_from(src: &[u8]) -> Self {
        Self(usize::read_from(src))
    }
}
