use bytes::BytesMut;

/// Growth granularity of a frame's backing storage.
pub const BLOCK_SIZE: usize = 512;

/// Width of the length prefix written in front of text and buffer fields.
pub const TEXT_PREFIX_SIZE: usize = 2;

/// A fixed-width value that can live at an offset inside a [`Frame`].
///
/// Values are stored in native byte order. Both ends of an exchange run on
/// the same host, so the order is agreed on without negotiation.
pub trait Number: Copy + Default {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Encode into `dst`, which is exactly `WIDTH` bytes long.
    fn write_to(self, dst: &mut [u8]);

    /// Decode from `src`, which is exactly `WIDTH` bytes long.
    fn read_from(src: &[u8]) -> Self;
}

macro_rules! impl_number {
    ($($ty:ty),*) => {
        $(
            impl Number for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn write_to(self, dst: &mut [u8]) {
                    dst.copy_from_slice(&self.to_ne_bytes());
                }

                fn read_from(src: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(src);
                    <$ty>::from_ne_bytes(raw)
                }
            }
        )*
    };
}

impl_number!(u8, u16, u32, u64, i32, usize);

/// Append-only binary buffer addressed by offset.
///
/// The size only grows (writes past the end extend it, gaps are zero-filled)
/// until [`Frame::clear`] resets it. Clearing keeps the allocation so a frame
/// can be reused for the next message.
#[derive(Debug, Default)]
pub struct Frame {
    data: BytesMut,
}

impl Frame {
    /// Create an empty frame.
    pub fn new() -> Self {
        Self {
            data: BytesMut::new(),
        }
    }

    /// Number of valid bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the frame holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes currently allocated for this frame.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// The valid bytes of the frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Reset the size to zero, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Write a fixed-width value at `offset`. Returns the bytes written.
    pub fn set_number<T: Number>(&mut self, offset: usize, value: T) -> usize {
        let end = offset + T::WIDTH;
        self.grow(end);
        value.write_to(&mut self.data[offset..end]);
        T::WIDTH
    }

    /// Read a fixed-width value at `offset`.
    ///
    /// Returns `None` when the value would extend past the current size; the
    /// frame is never grown by a read.
    pub fn get_number<T: Number>(&self, offset: usize) -> Option<T> {
        self.get_bytes(offset, T::WIDTH).map(T::read_from)
    }

    /// Write raw bytes at `offset`. Returns the bytes written.
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> usize {
        let end = offset + bytes.len();
        self.grow(end);
        self.data[offset..end].copy_from_slice(bytes);
        bytes.len()
    }

    /// Borrow `length` bytes at `offset`, or `None` on a short read.
    pub fn get_bytes(&self, offset: usize, length: usize) -> Option<&[u8]> {
        let end = offset.checked_add(length)?;
        self.data.get(offset..end)
    }

    /// Write a length-prefixed byte field. Returns prefix plus payload size.
    ///
    /// Payloads longer than `u16::MAX` are cut to fit the prefix.
    pub fn set_buffer(&mut self, offset: usize, bytes: &[u8]) -> usize {
        let length = bytes.len().min(usize::from(u16::MAX));
        let written = self.set_number(offset, length as u16);
        written + self.set_bytes(offset + written, &bytes[..length])
    }

    /// Read a length-prefixed byte field. Returns the bytes and how many
    /// frame bytes the field occupied, or `None` on a short read.
    pub fn get_buffer(&self, offset: usize) -> Option<(&[u8], usize)> {
        let length = usize::from(self.get_number::<u16>(offset)?);
        let bytes = self.get_bytes(offset + TEXT_PREFIX_SIZE, length)?;
        Some((bytes, TEXT_PREFIX_SIZE + length))
    }

    /// Write length-prefixed text. Returns the bytes written so callers can
    /// chain layouts.
    ///
    /// Text longer than `u16::MAX` bytes is cut at the last character
    /// boundary that fits, so the stored prefix is always valid UTF-8.
    pub fn set_text(&mut self, offset: usize, text: &str) -> usize {
        let mut length = text.len().min(usize::from(u16::MAX));
        while !text.is_char_boundary(length) {
            length -= 1;
        }
        if length < text.len() {
            tracing::warn!(length = text.len(), kept = length, "text field truncated");
        }
        self.set_buffer(offset, &text.as_bytes()[..length])
    }

    /// Read length-prefixed text. Returns the text and the bytes consumed;
    /// a short read yields an empty string and zero.
    pub fn get_text(&self, offset: usize) -> (String, usize) {
        match self.get_buffer(offset) {
            Some((bytes, consumed)) => (String::from_utf8_lossy(bytes).into_owned(), consumed),
            None => (String::new(), 0),
        }
    }

    /// Copy up to `stream.len()` bytes starting at `offset` into `stream`.
    ///
    /// Returns the number of bytes copied, which is `min(size - offset,
    /// stream.len())`. Repeated calls with advancing offsets stream the frame
    /// in bounded chunks.
    pub fn serialize(&self, offset: usize, stream: &mut [u8]) -> usize {
        let available = self.size().saturating_sub(offset);
        let copied = available.min(stream.len());
        if copied > 0 {
            stream[..copied].copy_from_slice(&self.data[offset..offset + copied]);
        }
        copied
    }

    /// Copy all of `stream` into the frame at `offset`.
    ///
    /// The frame grows to cover `offset + stream.len()` regardless of its
    /// prior size and any gap in front of `offset` reads as zeroes. The whole
    /// chunk is always consumed; there is no partial-chunk path.
    pub fn deserialize(&mut self, offset: usize, stream: &[u8]) -> usize {
        self.set_bytes(offset, stream)
    }

    fn grow(&mut self, size: usize) {
        if size <= self.data.len() {
            return;
        }
        if size > self.data.capacity() {
            let blocks = size.div_ceil(BLOCK_SIZE);
            self.data.reserve(blocks * BLOCK_SIZE - self.data.len());
        }
        self.data.resize(size, 0);
    }
}
