use comrpc_frame::{Frame, Message, Tag};

use crate::handle::Handle;

const IMPLEMENTATION_OFFSET: usize = 0;
const SEQUENCE_OFFSET: usize = std::mem::size_of::<usize>();
const TEXT_OFFSET: usize = SEQUENCE_OFFSET + 4;

/// Announce response: per-connection metadata and the resolved object.
///
/// ```text
/// [ptr-width: implementation][4: sequence number]
/// [2+len: proxy stub path][2+len: trace categories]
/// ```
#[derive(Debug, Default)]
pub struct Setup {
    frame: Frame,
}

impl Setup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &mut self,
        implementation: Handle,
        sequence_number: u32,
        proxy_stub_path: &str,
        trace_categories: &str,
    ) {
        self.frame.clear();
        self.frame.set_number(IMPLEMENTATION_OFFSET, implementation);
        self.frame.set_number(SEQUENCE_OFFSET, sequence_number);
        let length = self.frame.set_text(TEXT_OFFSET, proxy_stub_path);
        self.frame.set_text(TEXT_OFFSET + length, trace_categories);
    }

    /// True once a reply has been written; an empty setup is a bare ack.
    pub fn is_set(&self) -> bool {
        !self.frame.is_empty()
    }

    pub fn sequence_number(&self) -> u32 {
        self.frame.get_number(SEQUENCE_OFFSET).unwrap_or_default()
    }

    pub fn proxy_stub_path(&self) -> String {
        self.frame.get_text(TEXT_OFFSET).0
    }

    pub fn trace_categories(&self) -> String {
        let (_, consumed) = self.frame.get_text(TEXT_OFFSET);
        self.frame.get_text(TEXT_OFFSET + consumed).0
    }

    pub fn implementation(&self) -> Handle {
        self.frame
            .get_number(IMPLEMENTATION_OFFSET)
            .unwrap_or(Handle::NULL)
    }

    /// Bind the root object after the reply was built.
    pub fn set_implementation(&mut self, implementation: Handle) {
        self.frame.set_number(IMPLEMENTATION_OFFSET, implementation);
    }
}

impl Message for Setup {
    const TAG: Tag = Tag::ANNOUNCE_RESPONSE;

    fn length(&self) -> usize {
        self.frame.size()
    }

    fn serialize(&self, offset: usize, stream: &mut [u8]) -> usize {
        self.frame.serialize(offset, stream)
    }

    fn deserialize(&mut self, offset: usize, stream: &[u8]) -> usize {
        self.frame.deserialize(offset, stream)
    }

    fn clear(&mut self) {
        self.frame.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_roundtrip() {
        let mut setup = Setup::new();
        assert!(!setup.is_set());

        setup.set(Handle::new(0x40), 3, "/usr/lib/comrpc", "Information,Error");

        assert!(setup.is_set());
        assert_eq!(setup.implementation(), Handle::new(0x40));
        assert_eq!(setup.sequence_number(), 3);
        assert_eq!(setup.proxy_stub_path(), "/usr/lib/comrpc");
        assert_eq!(setup.trace_categories(), "Information,Error");
    }

    #[test]
    fn late_binding_keeps_texts() {
        let mut setup = Setup::new();
        setup.set(Handle::NULL, 1, "/opt/stubs", "debug");
        setup.set_implementation(Handle::new(0x99));

        assert_eq!(setup.implementation(), Handle::new(0x99));
        assert_eq!(setup.proxy_stub_path(), "/opt/stubs");
        assert_eq!(setup.trace_categories(), "debug");
    }

    #[test]
    fn empty_texts_and_empty_setup() {
        let mut setup = Setup::new();
        assert_eq!(setup.sequence_number(), 0);
        assert_eq!(setup.proxy_stub_path(), "");

        setup.set(Handle::new(1), 2, "", "");
        assert_eq!(setup.proxy_stub_path(), "");
        assert_eq!(setup.trace_categories(), "");
        assert_eq!(setup.length(), TEXT_OFFSET + 4);
    }

    #[test]
    fn set_replaces_longer_previous_reply() {
        let mut setup = Setup::new();
        setup.set(Handle::new(1), 1, "/a/very/long/path/to/stubs", "all");
        setup.set(Handle::new(2), 2, "/b", "");

        assert_eq!(setup.proxy_stub_path(), "/b");
        assert_eq!(setup.trace_categories(), "");
        assert_eq!(setup.length(), TEXT_OFFSET + 2 + 2 + 2);
    }
}
