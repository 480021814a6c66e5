//! Sequential byte and bit-field reading over an in-memory buffer
//!
//! All multi-byte values in the micro3d formats are little-endian. Bit fields
//! are packed LSB-first: bytes are shifted into a 32-bit cache above the bits
//! that are still pending, and fields are taken from the bottom of the cache.
//!
//! Byte reads and bit reads share one cursor. Byte reads ignore the bit cache,
//! so decoders call [`BitReader::clear_bit_cache`] when a bit-packed section
//! ends and byte-aligned data follows.

use crate::error::{DataError, Result};

/// Widest bit field [`BitReader::read_ubits`] accepts
pub const MAX_BIT_WIDTH: u32 = 25;

/// Trait for reading little-endian values from a byte source
pub trait ByteReader {
    /// Read a single unsigned 8-bit integer
    fn read_u8(&mut self) -> Result<u8>;

    /// Read a single signed 8-bit integer
    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read an unsigned 16-bit integer in little-endian format
    fn read_u16_le(&mut self) -> Result<u16>;

    /// Read a signed 16-bit integer in little-endian format
    fn read_i16_le(&mut self) -> Result<i16> {
        Ok(self.read_u16_le()? as i16)
    }

    /// Read an unsigned 32-bit integer in little-endian format
    fn read_u32_le(&mut self) -> Result<u32>;

    /// Read a signed 32-bit integer in little-endian format
    fn read_i32_le(&mut self) -> Result<i32> {
        Ok(self.read_u32_le()? as i32)
    }

    /// Advance the cursor by `n` bytes
    fn skip(&mut self, n: usize) -> Result<()>;
}

/// Cursor over a byte slice with a small bit cache for sub-byte fields
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
    cache: u32,
    cached: u32,
}

impl<'a> BitReader<'a> {
    /// Create a new reader at the beginning of the data
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            cache: 0,
            cached: 0,
        }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Number of bits buffered in the cache
    pub fn cached_bits(&self) -> u32 {
        self.cached
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.position + N;
        if end > self.data.len() {
            return Err(DataError::UnexpectedEof {
                offset: self.position,
                needed: end - self.data.len(),
            });
        }
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[self.position..end]);
        self.position = end;
        Ok(bytes)
    }

    /// Read an unsigned field of `size` bits
    ///
    /// A width of zero yields zero without touching the stream.
    pub fn read_ubits(&mut self, size: u32) -> Result<u32> {
        if size > MAX_BIT_WIDTH {
            return Err(DataError::InvalidBitWidth(size));
        }
        while size > self.cached {
            let byte = u32::from(self.read_u8()?);
            self.cache |= byte << self.cached;
            self.cached += 8;
        }
        let mask = if size == 0 { 0 } else { u32::MAX >> (32 - size) };
        let value = self.cache & mask;
        self.cache >>= size;
        self.cached -= size;
        Ok(value)
    }

    /// Read a two's-complement field of `size` bits, sign-extended to 32 bits
    pub fn read_bits(&mut self, size: u32) -> Result<i32> {
        let value = self.read_ubits(size)?;
        if size == 0 {
            return Ok(0);
        }
        let shift = 32 - size;
        Ok(((value << shift) as i32) >> shift)
    }

    /// Drop any buffered bits so the next bit read starts on a fresh byte
    pub fn clear_bit_cache(&mut self) {
        self.cache = 0;
        self.cached = 0;
    }
}

impl ByteReader for BitReader<'_> {
    fn read_u8(&mut self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(DataError::UnexpectedEof {
                offset: self.position,
                needed: 1,
            });
        }
        let value = self.data[self.position];
        self.position += 1;
        Ok(value)
    }

    fn read_u16_le(&mut self) -> Result<u16> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    fn read_u32_le(&mut self) -> Result<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        let end = self.position + n;
        if end > self.data.len() {
            return Err(DataError::UnexpectedEof {
                offset: self.position,
                needed: end - self.data.len(),
            });
        }
        self.position = end;
        Ok(())
    }
}

/// Helper function to read an array of little-endian `i16` values
pub fn read_i16_array(reader: &mut impl ByteReader, count: usize) -> Result<Vec<i16>> {
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(reader.read_i16_le()?);
    }
    Ok(values)
}
