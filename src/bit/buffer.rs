use std::cmp::Ordering;
use std::fmt;

use super::{bytes_for_bits, check_width, low_mask, BitInputStream, MAX_BYTE_BITS, MAX_INT_BITS};
use crate::{BitError, Result};

/// A fixed-length sequence of bits over a byte store
///
/// The buffer is a window of `bit_length` bits starting `bit_offset` bits into the
/// backing store `S`. Owned buffers use `Vec<u8>`, sub-views borrow the parent's
/// storage as `&[u8]` or `&mut [u8]`, so a view can never outlive or alias a
/// conflicting mutation of its parent.
///
/// Every access is bounds-checked against the window: reading or writing past
/// `bit_length` is an [`BitError::OutOfBounds`] error.
///
/// # Examples
///
/// ```
/// use varindex::BitBuffer;
///
/// let mut buffer = BitBuffer::new(20);
/// buffer.set_int_partial(0xABC, 4, 12).unwrap();
/// assert_eq!(buffer.get_int_partial(4, 12).unwrap(), 0xABC);
///
/// let view = buffer.get_bit_buffer(4, 12).unwrap();
/// assert_eq!(view.to_int().unwrap(), 0xABC);
/// ```
#[derive(Clone)]
pub struct BitBuffer<S = Vec<u8>> {
    data: S,
    bit_offset: usize,
    bit_length: usize,
}

impl BitBuffer<Vec<u8>> {
    /// Creates a zero-filled buffer of `bit_length` bits
    #[must_use]
    pub fn new(bit_length: usize) -> Self {
        Self {
            data: vec![0; bytes_for_bits(bit_length)],
            bit_offset: 0,
            bit_length,
        }
    }

    /// Wraps a byte vector, using all of its bits
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let bit_length = bytes.len() * 8;
        Self {
            data: bytes,
            bit_offset: 0,
            bit_length,
        }
    }

    /// Consumes the buffer and returns the backing bytes
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl<S: AsRef<[u8]>> BitBuffer<S> {
    /// Creates a window of `bit_length` bits starting `bit_offset` bits into `data`
    ///
    /// # Errors
    ///
    /// Returns [`BitError::OutOfBounds`] if the window does not fit in `data`.
    pub fn with_range(data: S, bit_offset: usize, bit_length: usize) -> Result<Self> {
        let capacity = data.as_ref().len() * 8;
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
            bit_offset,
            bit_length,
        })
    }

    /// Number of bits in the window
    #[must_use]
    pub fn bit_length(&self) -> usize {
        self.bit_length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bit_length == 0
    }

    /// Offset of the window within the backing store
    #[must_use]
    pub fn bit_offset(&self) -> usize {
        self.bit_offset
    }

    /// The raw backing store, including bits outside the window
    #[must_use]
    pub fn backing_bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn check_range(&self, offset: usize, length: usize) -> Result<()> {
        if offset.checked_add(length).map_or(true, |end| end > self.bit_length) {
            return Err(BitError::OutOfBounds {
                offset,
                length,
                capacity: self.bit_length,
            }
            .into());
        }
        Ok(())
    }

    /// Reads `len <= 8` bits at the absolute bit position `bit`, without checks
    #[inline]
    fn read_raw(&self, bit: usize, len: usize) -> u8 {
        if len == 0 {
            return 0;
        }
        let bytes = self.data.as_ref();
        let idx = bit / 8;
        let shift = bit % 8;
        let mut window = u16::from(bytes[idx]);
        if shift + len > 8 {
            window |= u16::from(bytes[idx + 1]) << 8;
        }
        ((window >> shift) & low_mask(len)) as u8
    }

    /// Reads up to 8 bits starting at `bit_offset`
    ///
    /// # Errors
    ///
    /// * [`BitError::TooManyBits`] if `bit_length > 8`
    /// * [`BitError::OutOfBounds`] if the field crosses the end of the buffer
    pub fn get_byte_partial(&self, bit_offset: usize, bit_length: usize) -> Result<u8> {
        check_width(bit_length, MAX_BYTE_BITS)?;
        self.check_range(bit_offset, bit_length)?;
        Ok(self.read_raw(self.bit_offset + bit_offset, bit_length))
    }

    /// Reads a full byte starting at `bit_offset`
    pub fn get_byte(&self, bit_offset: usize) -> Result<u8> {
        self.get_byte_partial(bit_offset, 8)
    }

    /// Reads a single bit
    pub fn get_bit(&self, bit_offset: usize) -> Result<bool> {
        Ok(self.get_byte_partial(bit_offset, 1)? == 1)
    }

    /// Reads an unsigned integer of up to 32 bits starting at `bit_offset`
    ///
    /// The field is read as a sequence of byte-sized partial reads, least significant first.
    ///
    /// # Errors
    ///
    /// * [`BitError::TooManyBits`] if `bit_length > 32`
    /// * [`BitError::OutOfBounds`] if the field crosses the end of the buffer
    pub fn get_int_partial(&self, bit_offset: usize, bit_length: usize) -> Result<u32> {
        check_width(bit_length, MAX_INT_BITS)?;
        self.check_range(bit_offset, bit_length)?;
        let start = self.bit_offset + bit_offset;
        let mut value = 0u32;
        let mut read = 0;
        while read < bit_length {
            let len = (bit_length - read).min(8);
            value |= u32::from(self.read_raw(start + read, len)) << read;
            read += len;
        }
        Ok(value)
    }

    /// Reads the whole buffer as an integer (requires `bit_length <= 32`)
    pub fn to_int(&self) -> Result<u32> {
        self.get_int_partial(0, self.bit_length)
    }

    /// Returns a read-only view over `bit_length` bits starting at `bit_offset`
    ///
    /// The view borrows this buffer's storage; no bytes are copied.
    pub fn get_bit_buffer(&self, bit_offset: usize, bit_length: usize) -> Result<BitBuffer<&[u8]>> {
        self.check_range(bit_offset, bit_length)?;
        Ok(BitBuffer {
            data: self.data.as_ref(),
            bit_offset: self.bit_offset + bit_offset,
            bit_length,
        })
    }

    /// Returns a read-only view over the whole window
    #[must_use]
    pub fn as_view(&self) -> BitBuffer<&[u8]> {
        BitBuffer {
            data: self.data.as_ref(),
            bit_offset: self.bit_offset,
            bit_length: self.bit_length,
        }
    }

    /// Copies the window into a new byte-aligned vector
    ///
    /// Unused high bits of the last byte are zero.
    #[must_use]
    pub fn to_byte_array(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(bytes_for_bits(self.bit_length));
        let mut pos = 0;
        while pos < self.bit_length {
            let len = (self.bit_length - pos).min(8);
            bytes.push(self.read_raw(self.bit_offset + pos, len));
            pos += len;
        }
        bytes
    }

    /// Copies the window into a new owned buffer
    #[must_use]
    pub fn to_owned_buffer(&self) -> BitBuffer {
        BitBuffer {
            data: self.to_byte_array(),
            bit_offset: 0,
            bit_length: self.bit_length,
        }
    }

    /// Opens a stream positioned at the first bit of the window
    #[must_use]
    pub fn stream(&self) -> BitInputStream<'_> {
        BitInputStream::from_buffer(self)
    }

    /// Compares the bits of two windows
    ///
    /// Shared bits are compared byte by byte, with a final partial byte. When all
    /// shared bits match the shorter buffer is the smaller one.
    pub fn compare<T: AsRef<[u8]>>(&self, other: &BitBuffer<T>) -> Ordering {
        let shared = self.bit_length.min(other.bit_length);
        let mut pos = 0;
        while pos < shared {
            let len = (shared - pos).min(8);
            let a = self.read_raw(self.bit_offset + pos, len);
            let b = other.read_raw(other.bit_offset + pos, len);
            match a.cmp(&b) {
                Ordering::Equal => pos += len,
                ord => return ord,
            }
        }
        self.bit_length.cmp(&other.bit_length)
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> BitBuffer<S> {
    /// Writes `len <= 8` bits at the absolute bit position `bit`, without checks
    ///
    /// A field crossing a byte boundary is split into a low part in the first byte
    /// and a high part in the next.
    #[inline]
    fn write_raw(&mut self, value: u8, bit: usize, len: usize) {
        if len == 0 {
            return;
        }
        let bytes = self.data.as_mut();
        let idx = bit / 8;
        let shift = bit % 8;
        let mask = low_mask(len) << shift;
        let field = (u16::from(value) << shift) & mask;

        let lo = (mask & 0xFF) as u8;
        bytes[idx] = (bytes[idx] & !lo) | (field & 0xFF) as u8;
        if shift + len > 8 {
            let hi = (mask >> 8) as u8;
            bytes[idx + 1] = (bytes[idx + 1] & !hi) | (field >> 8) as u8;
        }
    }

    /// Writes the `bit_length <= 8` low bits of `value` starting at `bit_offset`
    ///
    /// Higher bits of `value` are ignored. Bits outside the field are preserved.
    ///
    /// # Errors
    ///
    /// * [`BitError::TooManyBits`] if `bit_length > 8`
    /// * [`BitError::OutOfBounds`] if the field crosses the end of the buffer
    pub fn set_byte_partial(&mut self, value: u8, bit_offset: usize, bit_length: usize) -> Result<()> {
        check_width(bit_length, MAX_BYTE_BITS)?;
        self.check_range(bit_offset, bit_length)?;
        self.write_raw(value, self.bit_offset + bit_offset, bit_length);
        Ok(())
    }

    /// Writes a full byte starting at `bit_offset`
    pub fn set_byte(&mut self, value: u8, bit_offset: usize) -> Result<()> {
        self.set_byte_partial(value, bit_offset, 8)
    }

    /// Sets or clears a single bit
    pub fn set_bit(&mut self, value: bool, bit_offset: usize) -> Result<()> {
        self.set_byte_partial(u8::from(value), bit_offset, 1)
    }

    /// Writes the `bit_length <= 32` low bits of `value` starting at `bit_offset`
    ///
    /// # Errors
    ///
    /// * [`BitError::TooManyBits`] if `bit_length > 32`
    /// * [`BitError::OutOfBounds`] if the field crosses the end of the buffer
    pub fn set_int_partial(&mut self, value: u32, bit_offset: usize, bit_length: usize) -> Result<()> {
        check_width(bit_length, MAX_INT_BITS)?;
        self.check_range(bit_offset, bit_length)?;
        let start = self.bit_offset + bit_offset;
        let mut written = 0;
        while written < bit_length {
            let len = (bit_length - written).min(8);
            self.write_raw((value >> written) as u8, start + written, len);
            written += len;
        }
        Ok(())
    }

    /// Copies every bit of `other` into this buffer starting at `bit_offset`
    pub fn set_bit_buffer<T: AsRef<[u8]>>(&mut self, other: &BitBuffer<T>, bit_offset: usize) -> Result<()> {
        self.check_range(bit_offset, other.bit_length)?;
        let start = self.bit_offset + bit_offset;
        let mut pos = 0;
        while pos < other.bit_length {
            let len = (other.bit_length - pos).min(8);
            let byte = other.read_raw(other.bit_offset + pos, len);
            self.write_raw(byte, start + pos, len);
            pos += len;
        }
        Ok(())
    }

    /// Returns a mutable view over `bit_length` bits starting at `bit_offset`
    ///
    /// Writes through the view land in this buffer's storage.
    pub fn get_bit_buffer_mut(&mut self, bit_offset: usize, bit_length: usize) -> Result<BitBuffer<&mut [u8]>> {
        self.check_range(bit_offset, bit_length)?;
        Ok(BitBuffer {
            bit_offset: self.bit_offset + bit_offset,
            data: self.data.as_mut(),
            bit_length,
        })
    }

    /// Zeroes every bit of the window
    ///
    /// Bits of the backing store outside the window are left untouched.
    pub fn clear(&mut self) {
        if self.bit_offset % 8 == 0 && self.bit_length % 8 == 0 {
            let start = self.bit_offset / 8;
            let end = start + self.bit_length / 8;
            self.data.as_mut()[start..end].fill(0);
            return;
        }
        let mut pos = 0;
        while pos < self.bit_length {
            let len = (self.bit_length - pos).min(8);
            self.write_raw(0, self.bit_offset + pos, len);
            pos += len;
        }
    }
}

impl<S: AsRef<[u8]>, T: AsRef<[u8]>> PartialEq<BitBuffer<T>> for BitBuffer<S> {
    fn eq(&self, other: &BitBuffer<T>) -> bool {
        self.bit_length == other.bit_length && self.compare(other) == Ordering::Equal
    }
}

impl<S: AsRef<[u8]>> Eq for BitBuffer<S> {}

impl<S: AsRef<[u8]>, T: AsRef<[u8]>> PartialOrd<BitBuffer<T>> for BitBuffer<S> {
    fn partial_cmp(&self, other: &BitBuffer<T>) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl<S: AsRef<[u8]>> Ord for BitBuffer<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

/// Prints bits in buffer order (bit 0 first), one space between bytes
impl<S: AsRef<[u8]>> fmt::Display for BitBuffer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pos in 0..self.bit_length {
            if pos > 0 && pos % 8 == 0 {
                f.write_str(" ")?;
            }
            let bit = self.read_raw(self.bit_offset + pos, 1);
            f.write_str(if bit == 1 { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl<S: AsRef<[u8]>> fmt::Debug for BitBuffer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitBuffer")
            .field("bit_length", &self.bit_length)
            .field("bits", &format_args!("{self}"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use super::*;
    use crate::Error;

    const RNG_SEED: u64 = 42;

    #[test]
    fn test_int_partial_roundtrip_all_widths() -> super::Result<()> {
        let mut rng = SmallRng::seed_from_u64(RNG_SEED);
        for len in 1..=32usize {
            for offset in [0, 1, 3, 7, 8, 13, 31, 40] {
                let max = if len == 32 { u32::MAX } else { (1u32 << len) - 1 };
                for value in [0, 1, max, rng.random_range(0..=max)] {
                    let mut buffer = BitBuffer::new(offset + len + 5);
                    buffer.set_int_partial(value, offset, len)?;
                    assert_eq!(buffer.get_int_partial(offset, len)?, value, "len={len} offset={offset}");
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_set_preserves_neighbours() -> super::Result<()> {
        let mut buffer = BitBuffer::from_bytes(vec![0xFF; 4]);
        buffer.set_int_partial(0, 6, 12)?;
        assert_eq!(buffer.get_byte_partial(0, 6)?, 0b11_1111);
        assert_eq!(buffer.get_int_partial(6, 12)?, 0);
        assert_eq!(buffer.get_int_partial(18, 14)?, 0x3FFF);
        Ok(())
    }

    #[test]
    fn test_little_endian_bit_order() -> super::Result<()> {
        let mut buffer = BitBuffer::new(16);
        buffer.set_byte_partial(0b101, 0, 3)?;
        buffer.set_byte_partial(0b11, 7, 2)?;
        // bit 7 lands in byte 0, bit 8 in byte 1
        assert_eq!(buffer.to_byte_array(), vec![0b1000_0101, 0b0000_0001]);
        Ok(())
    }

    #[test]
    fn test_huge_offsets_are_out_of_bounds() {
        let mut buffer = BitBuffer::new(16);
        assert!(matches!(
            buffer.get_byte_partial(usize::MAX, 8),
            Err(Error::BitError(BitError::OutOfBounds { offset: usize::MAX, .. }))
        ));
        assert!(buffer.get_int_partial(usize::MAX - 3, 32).is_err());
        assert!(buffer.set_int_partial(1, usize::MAX, 1).is_err());
        assert!(buffer.get_bit_buffer(1, usize::MAX).is_err());
        assert!(BitBuffer::with_range(vec![0u8; 2], usize::MAX, 1).is_err());
        // nothing was written
        assert_eq!(buffer.to_byte_array(), vec![0, 0]);
    }

    #[test]
    fn test_too_many_bits() {
        let mut buffer = BitBuffer::new(64);
        let err = buffer.get_int_partial(0, 33).unwrap_err();
        assert!(matches!(
            err,
            Error::BitError(BitError::TooManyBits { requested: 33, max: 32 })
        ));
        assert!(buffer.set_byte_partial(0, 0, 9).is_err());
        assert!(buffer.get_byte_partial(0, 9).is_err());
        assert!(buffer.set_int_partial(0, 0, 40).is_err());
    }

    #[test]
    fn test_out_of_bounds() {
        let mut buffer = BitBuffer::new(10);
        assert!(buffer.get_byte_partial(4, 8).is_err());
        assert!(buffer.set_int_partial(1, 9, 2).is_err());
        assert!(buffer.get_bit_buffer(5, 6).is_err());
        assert!(BitBuffer::with_range(vec![0u8; 2], 10, 7).is_err());
        // the failed write left the buffer untouched
        assert_eq!(buffer.to_byte_array(), vec![0, 0]);
    }

    #[test]
    fn test_views_alias_parent() -> super::Result<()> {
        let mut buffer = BitBuffer::new(24);
        {
            let mut view = buffer.get_bit_buffer_mut(5, 10)?;
            view.set_int_partial(0x3FF, 0, 10)?;
            let mut inner = view.get_bit_buffer_mut(2, 4)?;
            inner.clear();
        }
        assert_eq!(buffer.get_int_partial(5, 10)?, 0b11_1100_0011);
        let view = buffer.get_bit_buffer(5, 10)?;
        assert_eq!(view.bit_offset(), 5);
        assert_eq!(view.to_int()?, 0b11_1100_0011);
        assert_eq!(view.to_owned_buffer().to_byte_array(), vec![0b1100_0011, 0b11]);
        Ok(())
    }

    #[test]
    fn test_equality_independent_of_construction() -> super::Result<()> {
        let mut a = BitBuffer::new(13);
        a.set_int_partial(0x1ABC, 0, 13)?;

        let mut b = BitBuffer::new(13);
        b.set_byte(0xBC, 0)?;
        b.set_byte_partial(0x1A, 8, 5)?;

        let backing = {
            let mut c = BitBuffer::new(24);
            c.set_int_partial(0x1ABC, 3, 13)?;
            c.into_inner()
        };
        let c = BitBuffer::with_range(backing.as_slice(), 3, 13)?;

        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.to_string(), c.to_string());
        Ok(())
    }

    #[test]
    fn test_different_length_never_equal() -> super::Result<()> {
        let a = BitBuffer::new(8);
        let b = BitBuffer::new(9);
        assert_ne!(a, b);
        assert!(a < b);

        let mut c = BitBuffer::new(4);
        c.set_byte_partial(0b1000, 0, 4)?;
        let mut d = BitBuffer::new(12);
        d.set_byte_partial(0b0001, 0, 4)?;
        // first differing bits decide before the length does
        assert!(c > d);
        Ok(())
    }

    #[test]
    fn test_set_bit_buffer() -> super::Result<()> {
        let mut src = BitBuffer::new(11);
        src.set_int_partial(0b101_1100_1101, 0, 11)?;
        let mut dst = BitBuffer::new(32);
        dst.set_bit_buffer(&src, 9)?;
        assert_eq!(dst.get_int_partial(9, 11)?, 0b101_1100_1101);
        assert_eq!(dst.get_bit_buffer(9, 11)?, src);
        assert!(dst.set_bit_buffer(&src, 22).is_err());
        Ok(())
    }

    #[test]
    fn test_clear_and_display() -> super::Result<()> {
        let mut buffer = BitBuffer::from_bytes(vec![0b0000_0011, 0b1]);
        assert_eq!(buffer.to_string(), "11000000 10000000");
        buffer.clear();
        assert!(buffer.to_byte_array().iter().all(|&b| b == 0));
        assert!(!buffer.is_empty());
        Ok(())
    }
}
