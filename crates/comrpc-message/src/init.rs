use comrpc_frame::{Frame, Message, Tag};

use crate::environment::{parent_exchange_id, UNSET_EXCHANGE_ID};
use crate::handle::{Handle, InterfaceId};

const ID_OFFSET: usize = 0;
const IMPLEMENTATION_OFFSET: usize = ID_OFFSET + 4;
const INTERFACE_OFFSET: usize = IMPLEMENTATION_OFFSET + std::mem::size_of::<usize>();
const EXCHANGE_OFFSET: usize = INTERFACE_OFFSET + 4;
const VERSION_OFFSET: usize = EXCHANGE_OFFSET + 4;
const CLASS_OFFSET: usize = VERSION_OFFSET + 4;

/// Width of the class name field, terminator included.
pub const CLASS_NAME_SIZE: usize = 64;

/// Encoded size of every announce request.
pub const INIT_SIZE: usize = CLASS_OFFSET + CLASS_NAME_SIZE;

/// Control discriminant stored in the second class-name byte when the
/// first one is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AnnounceKind {
    Acquire = 0,
    Offer = 1,
    Revoke = 2,
    Request = 3,
}

impl AnnounceKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Acquire),
            1 => Some(Self::Offer),
            2 => Some(Self::Revoke),
            3 => Some(Self::Request),
            _ => None,
        }
    }
}

/// Announce request: acquire, offer, revoke, request or named instantiation.
///
/// ```text
/// [4: id][ptr-width: implementation][4: interface id][4: exchange id]
/// [4: version id][64: class name, or 0x00 + control kind]
/// ```
///
/// Each setter overwrites every field, so one instance carries exactly one
/// announcement at a time.
#[derive(Debug)]
pub struct Init {
    frame: Frame,
}

impl Default for Init {
    fn default() -> Self {
        Self::new()
    }
}

impl Init {
    pub fn new() -> Self {
        let mut init = Self {
            frame: Frame::new(),
        };
        init.reset();
        init
    }

    fn reset(&mut self) {
        self.frame.clear();
        self.write(0, Handle::NULL, UNSET_EXCHANGE_ID, UNSET_EXCHANGE_ID, 0);
        self.frame.set_bytes(CLASS_OFFSET, &[0u8; CLASS_NAME_SIZE]);
    }

    fn write(
        &mut self,
        id: u32,
        implementation: Handle,
        interface_id: InterfaceId,
        exchange_id: u32,
        version_id: u32,
    ) {
        self.frame.set_number(ID_OFFSET, id);
        self.frame.set_number(IMPLEMENTATION_OFFSET, implementation);
        self.frame.set_number(INTERFACE_OFFSET, interface_id);
        self.frame.set_number(EXCHANGE_OFFSET, exchange_id);
        self.frame.set_number(VERSION_OFFSET, version_id);
    }

    fn write_kind(&mut self, kind: AnnounceKind) {
        let mut class = [0u8; CLASS_NAME_SIZE];
        class[1] = kind as u8;
        self.frame.set_bytes(CLASS_OFFSET, &class);
    }

    /// Bootstrap hello announcing `my_id` under the inherited parent exchange.
    pub fn set_acquire(&mut self, my_id: u32) {
        self.write(
            my_id,
            Handle::NULL,
            UNSET_EXCHANGE_ID,
            parent_exchange_id(),
            u32::MAX,
        );
        self.write_kind(AnnounceKind::Acquire);
    }

    /// Ask the peer to resolve `interface_id` within `exchange_id`.
    pub fn set_request(
        &mut self,
        my_id: u32,
        interface_id: InterfaceId,
        implementation: Handle,
        exchange_id: u32,
    ) {
        self.write(my_id, implementation, interface_id, exchange_id, 0);
        self.write_kind(AnnounceKind::Request);
    }

    /// Push an interface to the peer over a live connection.
    pub fn set_offer(&mut self, my_id: u32, interface_id: InterfaceId, implementation: Handle) {
        self.write(my_id, implementation, interface_id, parent_exchange_id(), 0);
        self.write_kind(AnnounceKind::Offer);
    }

    /// Withdraw a previously offered or acquired interface.
    pub fn set_revoke(&mut self, my_id: u32, interface_id: InterfaceId, implementation: Handle) {
        self.write(my_id, implementation, interface_id, parent_exchange_id(), 0);
        self.write_kind(AnnounceKind::Revoke);
    }

    /// Ask the peer to construct `class_name` at `version_id`.
    ///
    /// Names longer than 63 bytes are cut so the field stays terminated. An
    /// empty name cannot be told apart from an acquire.
    pub fn set_instantiate(
        &mut self,
        my_id: u32,
        class_name: &str,
        interface_id: InterfaceId,
        version_id: u32,
    ) {
        self.write(
            my_id,
            Handle::NULL,
            interface_id,
            parent_exchange_id(),
            version_id,
        );
        let mut class = [0u8; CLASS_NAME_SIZE];
        let name = class_name.as_bytes();
        let length = name.len().min(CLASS_NAME_SIZE - 1);
        class[..length].copy_from_slice(&name[..length]);
        self.frame.set_bytes(CLASS_OFFSET, &class);
    }

    fn class_field(&self) -> &[u8] {
        self.frame
            .get_bytes(CLASS_OFFSET, CLASS_NAME_SIZE)
            .unwrap_or(&[])
    }

    fn control_byte(&self) -> Option<u8> {
        match self.class_field() {
            [0, kind, ..] => Some(*kind),
            _ => None,
        }
    }

    /// The recognised control discriminant, or `None` for a named
    /// instantiation or an unknown byte.
    pub fn kind(&self) -> Option<AnnounceKind> {
        self.control_byte().and_then(AnnounceKind::from_u8)
    }

    /// Raw control byte, for diagnostics.
    pub fn raw_kind(&self) -> Option<u8> {
        self.control_byte()
    }

    pub fn is_offer(&self) -> bool {
        self.control_byte() == Some(AnnounceKind::Offer as u8)
    }

    pub fn is_revoke(&self) -> bool {
        self.control_byte() == Some(AnnounceKind::Revoke as u8)
    }

    pub fn is_requested(&self) -> bool {
        self.control_byte() == Some(AnnounceKind::Request as u8)
    }

    /// True when this is none of offer, revoke or request.
    ///
    /// Unknown control bytes and named instantiations land here too; check
    /// [`Init::is_instantiate`] first.
    pub fn is_acquire(&self) -> bool {
        !self.is_offer() && !self.is_revoke() && !self.is_requested()
    }

    pub fn is_instantiate(&self) -> bool {
        matches!(self.class_field().first(), Some(byte) if *byte != 0)
    }

    pub fn id(&self) -> u32 {
        self.frame.get_number(ID_OFFSET).unwrap_or_default()
    }

    pub fn implementation(&self) -> Handle {
        self.frame
            .get_number(IMPLEMENTATION_OFFSET)
            .unwrap_or(Handle::NULL)
    }

    pub fn interface_id(&self) -> InterfaceId {
        self.frame
            .get_number(INTERFACE_OFFSET)
            .unwrap_or(UNSET_EXCHANGE_ID)
    }

    pub fn exchange_id(&self) -> u32 {
        self.frame
            .get_number(EXCHANGE_OFFSET)
            .unwrap_or(UNSET_EXCHANGE_ID)
    }

    pub fn version_id(&self) -> u32 {
        self.frame.get_number(VERSION_OFFSET).unwrap_or_default()
    }

    /// Class name up to the first NUL; empty for control announcements.
    pub fn class_name(&self) -> String {
        let field = self.class_field();
        let end = field.iter().position(|byte| *byte == 0).unwrap_or(field.len());
        String::from_utf8_lossy(&field[..end]).into_owned()
    }
}

impl Message for Init {
    const TAG: Tag = Tag::ANNOUNCE_REQUEST;

    fn length(&self) -> usize {
        self.frame.size()
    }

    fn serialize(&self, offset: usize, stream: &mut [u8]) -> usize {
        self.frame.serialize(offset, stream)
    }

    fn deserialize(&mut self, offset: usize, stream: &[u8]) -> usize {
        self.frame.deserialize(offset, stream)
    }

    /// Return to the freshly constructed state.
    fn clear(&mut self) {
        self.reset();
    }
}
