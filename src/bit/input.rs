use super::{check_width, low_mask, BitBuffer, MAX_BYTE_BITS, MAX_INT_BITS};
use crate::{BitError, Result};

/// Sequential reader of bit fields
///
/// Keeps a byte index and a cursor within that byte. Fields are read in the
/// same least-significant-first order [`BitOutputStream`](super::BitOutputStream) writes them.
#[derive(Debug, Clone)]
pub struct BitInputStream<'a> {
    data: &'a [u8],
    byte_idx: usize,
    bit_idx: usize,
    /// Absolute bit position past the last readable bit
    end: usize,
}

impl<'a> BitInputStream<'a> {
    /// Reads every bit of `data`
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_idx: 0,
            bit_idx: 0,
            end: data.len() * 8,
        }
    }

    /// Reads `bit_length` bits of `data` starting at `bit_offset`
    pub fn with_range(data: &'a [u8], bit_offset: usize, bit_length: usize) -> Result<Self> {
        let capacity = data.len() * 8;
        if bit_offset.checked_add(bit_length).map_or(true, |end| end > capacity) {
            return Err(BitError::OutOfBounds {
                offset: bit_offset,
                length: bit_length,
                capacity,
            }
            .into());
        }
        Ok(Self {
            data,
            byte_idx: bit_offset / 8,
            bit_idx: bit_offset % 8,
            end: bit_offset + bit_length,
        })
    }

    pub(crate) fn from_buffer<S: AsRef<[u8]>>(buffer: &'a BitBuffer<S>) -> Self {
        let offset = buffer.bit_offset();
        Self {
            data: buffer.backing_bytes(),
            byte_idx: offset / 8,
            bit_idx: offset % 8,
            end: offset + buffer.bit_length(),
        }
    }

    #[inline]
    fn position(&self) -> usize {
        self.byte_idx * 8 + self.bit_idx
    }

    /// Number of bits left to read
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.end - self.position()
    }

    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    fn check_remaining(&self, requested: usize) -> Result<()> {
        let remaining = self.remaining();
        if requested > remaining {
            return Err(BitError::EndOfStream {
                requested,
                remaining,
            }
            .into());
        }
        Ok(())
    }

    #[inline]
    fn advance(&mut self, bits: usize) {
        let pos = self.bit_idx + bits;
        self.byte_idx += pos / 8;
        self.bit_idx = pos % 8;
    }

    /// Reads up to 8 bits
    ///
    /// # Errors
    ///
    /// * [`BitError::TooManyBits`] if `length > 8`
    /// * [`BitError::EndOfStream`] if fewer than `length` bits remain
    pub fn read_byte(&mut self, length: usize) -> Result<u8> {
        check_width(length, MAX_BYTE_BITS)?;
        self.check_remaining(length)?;
        if length == 0 {
            return Ok(0);
        }
        let mut window = u16::from(self.data[self.byte_idx]);
        if self.bit_idx + length > 8 {
            window |= u16::from(self.data[self.byte_idx + 1]) << 8;
        }
        let value = ((window >> self.bit_idx) & low_mask(length)) as u8;
        self.advance(length);
        Ok(value)
    }

    /// Reads up to 32 bits, least significant byte first
    pub fn read_int(&mut self, length: usize) -> Result<u32> {
        check_width(length, MAX_INT_BITS)?;
        self.check_remaining(length)?;
        let mut value = 0u32;
        let mut read = 0;
        while read < length {
            let len = (length - read).min(8);
            value |= u32::from(self.read_byte(len)?) << read;
            read += len;
        }
        Ok(value)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_byte(1)? == 1)
    }

    /// Skips `length` bits
    pub fn skip(&mut self, length: usize) -> Result<()> {
        self.check_remaining(length)?;
        self.advance(length);
        Ok(())
    }
}
