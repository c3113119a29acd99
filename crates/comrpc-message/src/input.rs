use comrpc_frame::{Frame, Message, Reader, Tag, Writer};

use crate::handle::{Handle, InterfaceId, MethodId};

const IMPLEMENTATION_OFFSET: usize = 0;
const INTERFACE_OFFSET: usize = IMPLEMENTATION_OFFSET + std::mem::size_of::<usize>();
const METHOD_OFFSET: usize = INTERFACE_OFFSET + 4;

/// Bytes occupied by the fixed invocation header.
pub const HEADER_SIZE: usize = METHOD_OFFSET + 1;

/// Method invocation request: target, interface, method and arguments.
///
/// ```text
/// [ptr-width: implementation][4: interface id][1: method id][arguments...]
/// ```
#[derive(Debug, Default)]
pub struct Input {
    frame: Frame,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the invocation header.
    ///
    /// Arguments already written are left in place.
    pub fn set(&mut self, implementation: Handle, interface_id: InterfaceId, method_id: MethodId) {
        self.frame.set_number(IMPLEMENTATION_OFFSET, implementation);
        self.frame.set_number(INTERFACE_OFFSET, interface_id);
        self.frame.set_number(METHOD_OFFSET, method_id);
    }

    pub fn implementation(&self) -> Handle {
        self.frame
            .get_number(IMPLEMENTATION_OFFSET)
            .unwrap_or(Handle::NULL)
    }

    pub fn interface_id(&self) -> InterfaceId {
        self.frame.get_number(INTERFACE_OFFSET).unwrap_or_default()
    }

    pub fn method_id(&self) -> MethodId {
        self.frame.get_number(METHOD_OFFSET).unwrap_or_default()
    }

    /// Argument writer positioned just past the header.
    pub fn writer(&mut self) -> Writer<'_> {
        Writer::new(&mut self.frame, HEADER_SIZE)
    }

    /// Argument reader positioned just past the header.
    pub fn reader(&self) -> Reader<'_> {
        Reader::new(&self.frame, HEADER_SIZE)
    }

    /// Raw bytes of the whole request.
    pub fn as_bytes(&self) -> &[u8] {
        self.frame.as_bytes()
    }
}

impl Message for Input {
    const TAG: Tag = Tag::INVOKE_REQUEST;

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
