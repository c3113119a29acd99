use comrpc_frame::{Frame, Message, Reader, Tag, Writer};

use crate::handle::{Handle, InterfaceId};

const PAIR_SIZE: usize = std::mem::size_of::<usize>() + 4;

/// Method invocation response.
///
/// Result bytes start at offset 0. Interfaces handed back by the call are
/// appended after the results as `(implementation, interface id)` pairs.
#[derive(Debug, Default)]
pub struct Output {
    frame: Frame,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result writer starting at offset 0.
    pub fn writer(&mut self) -> Writer<'_> {
        Writer::new(&mut self.frame, 0)
    }

    /// Writer positioned at the current end of the response.
    pub fn appender(&mut self) -> Writer<'_> {
        let end = self.frame.size();
        Writer::new(&mut self.frame, end)
    }

    /// Result reader starting at offset 0.
    pub fn reader(&self) -> Reader<'_> {
        Reader::new(&self.frame, 0)
    }

    /// Append an exported interface at the end of the response.
    pub fn add_implementation(&mut self, implementation: Handle, interface_id: InterfaceId) {
        let mut writer = self.appender();
        writer.write_number(implementation);
        writer.write_u32(interface_id);
    }

    /// Decode the pairs that follow `result_len` bytes of results.
    ///
    /// A trailing fragment shorter than one pair is ignored.
    pub fn implementations(&self, result_len: usize) -> Vec<(Handle, InterfaceId)> {
        let mut pairs = Vec::new();
        let mut reader = Reader::new(&self.frame, result_len);
        while reader.remaining() >= PAIR_SIZE {
            let handle = reader.read_number::<Handle>();
            let interface_id = reader.read_u32();
            pairs.push((handle, interface_id));
        }
        pairs
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.frame.as_bytes()
    }
}

impl Message for Output {
    const TAG: Tag = Tag::INVOKE_RESPONSE;

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
