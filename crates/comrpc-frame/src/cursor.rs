use crate::frame::{Frame, Number};

/// Sequential writer over a [`Frame`], starting at a fixed offset.
///
/// Messages hand out writers positioned past their own header so argument
/// marshaling can never disturb header fields.
#[derive(Debug)]
pub struct Writer<'a> {
    frame: &'a mut Frame,
    offset: usize,
}

impl<'a> Writer<'a> {
    /// Create a writer that starts at `offset`.
    pub fn new(frame: &'a mut Frame, offset: usize) -> Self {
        Self { frame, offset }
    }

    /// Current write position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn write_number<T: Number>(&mut self, value: T) {
        self.offset += self.frame.set_number(self.offset, value);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_number(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_number(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_number(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_number(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_number(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_number(u8::from(value));
    }

    /// Write length-prefixed text.
    pub fn write_text(&mut self, text: &str) {
        self.offset += self.frame.set_text(self.offset, text);
    }

    /// Write a length-prefixed byte buffer.
    pub fn write_buffer(&mut self, bytes: &[u8]) {
        self.offset += self.frame.set_buffer(self.offset, bytes);
    }
}

/// Sequential reader over a [`Frame`], starting at a fixed offset.
///
/// Reads past the end of the frame yield default values and do not advance.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    frame: &'a Frame,
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader that starts at `offset`.
    pub fn new(frame: &'a Frame, offset: usize) -> Self {
        Self { frame, offset }
    }

    /// Current read position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left between the cursor and the end of the frame.
    pub fn remaining(&self) -> usize {
        self.frame.size().saturating_sub(self.offset)
    }

    pub fn has_data(&self) -> bool {
        self.remaining() > 0
    }

    pub fn read_number<T: Number>(&mut self) -> T {
        match self.frame.get_number::<T>(self.offset) {
            Some(value) => {
                self.offset += T::WIDTH;
                value
            }
            None => T::default(),
        }
    }

    pub fn read_u8(&mut self) -> u8 {
        self.read_number()
    }

    pub fn read_u16(&mut self) -> u16 {
        self.read_number()
    }

    pub fn read_u32(&mut self) -> u32 {
        self.read_number()
    }

    pub fn read_u64(&mut self) -> u64 {
        self.read_number()
    }

    pub fn read_i32(&mut self) -> i32 {
        self.read_number()
    }

    pub fn read_bool(&mut self) -> bool {
        self.read_number::<u8>() != 0
    }

    /// Read length-prefixed text.
    pub fn read_text(&mut self) -> String {
        let (text, consumed) = self.frame.get_text(self.offset);
        self.offset += consumed;
        text
    }

    /// Read a length-prefixed byte buffer.
    pub fn read_buffer(&mut self) -> Vec<u8> {
        match self.frame.get_buffer(self.offset) {
            Some((bytes, consumed)) => {
                let owned = bytes.to_vec();
                self.offset += consumed;
                owned
            }
            None => Vec::new(),
        }
    }
}
