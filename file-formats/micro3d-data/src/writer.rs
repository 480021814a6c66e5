//! Little-endian byte and LSB-first bit-field writer
//!
//! The inverse of [`crate::reader::BitReader`]. Used to build asset buffers
//! in tests and by tooling that emits micro3d data.

/// Growable output buffer with a pending bit accumulator
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    buffer: Vec<u8>,
    pending: u32,
    pending_bits: u32,
}

impl BitWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far, excluding unflushed bits
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.pending_bits == 0
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn write_i8(&mut self, value: i8) -> &mut Self {
        self.write_u8(value as u8)
    }

    pub fn write_u16_le(&mut self, value: u16) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_i16_le(&mut self, value: i16) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u32_le(&mut self, value: u32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_i32_le(&mut self, value: i32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    /// Append the low `size` bits of `value`
    ///
    /// Negative numbers may be passed through `as u32`; only the low bits land
    /// in the stream.
    pub fn write_bits(&mut self, value: u32, size: u32) -> &mut Self {
        debug_assert!(size <= 25, "bit field too wide: {size}");
        if size == 0 {
            return self;
        }
        let masked = value & (u32::MAX >> (32 - size));
        self.pending |= masked << self.pending_bits;
        self.pending_bits += size;
        while self.pending_bits >= 8 {
            self.buffer.push((self.pending & 0xFF) as u8);
            self.pending >>= 8;
            self.pending_bits -= 8;
        }
        self
    }

    /// Pad the pending bits with zeros up to the next byte boundary
    pub fn flush_bits(&mut self) -> &mut Self {
        if self.pending_bits > 0 {
            self.buffer.push((self.pending & 0xFF) as u8);
        }
        self.pending = 0;
        self.pending_bits = 0;
        self
    }

    /// Finish writing and return the buffer
    pub fn into_inner(mut self) -> Vec<u8> {
        self.flush_bits();
        self.buffer
    }
}
