use super::{check_width, low_mask, BitBuffer, MAX_BYTE_BITS, MAX_INT_BITS};
use crate::Result;

/// Appends bit fields to a growable byte sink
///
/// Completed bytes are pushed to the sink as soon as they fill up. The trailing
/// partial byte lives in a one-byte carry until the stream is read out with
/// [`to_byte_array`](Self::to_byte_array) or [`to_bit_buffer`](Self::to_bit_buffer).
#[derive(Debug, Clone, Default)]
pub struct BitOutputStream {
    /// Completed bytes
    sink: Vec<u8>,
    /// Pending bits, low `carry_bits` bits are valid
    carry: u8,
    carry_bits: usize,
}

impl BitOutputStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stream with room for `bytes` completed bytes
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            sink: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    /// Total number of bits written
    #[must_use]
    pub fn bit_length(&self) -> usize {
        self.sink.len() * 8 + self.carry_bits
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bit_length() == 0
    }

    /// Appends the `length <= 8` low bits of `value`
    pub fn write_byte(&mut self, value: u8, length: usize) -> Result<()> {
        check_width(length, MAX_BYTE_BITS)?;
        if length == 0 {
            return Ok(());
        }
        let field = u16::from(value) & low_mask(length);
        let pending = u16::from(self.carry) | (field << self.carry_bits);
        let total = self.carry_bits + length;
        if total >= 8 {
            self.sink.push((pending & 0xFF) as u8);
            self.carry = (pending >> 8) as u8;
            self.carry_bits = total - 8;
        } else {
            self.carry = pending as u8;
            self.carry_bits = total;
        }
        Ok(())
    }

    /// Appends the `length <= 32` low bits of `value`
    pub fn write(&mut self, value: u32, length: usize) -> Result<()> {
        check_width(length, MAX_INT_BITS)?;
        let mut written = 0;
        while written < length {
            let len = (length - written).min(8);
            self.write_byte((value >> written) as u8, len)?;
            written += len;
        }
        Ok(())
    }

    pub fn write_bit(&mut self, value: bool) -> Result<()> {
        self.write_byte(u8::from(value), 1)
    }

    /// Appends every bit of `buffer`
    pub fn write_buffer<S: AsRef<[u8]>>(&mut self, buffer: &BitBuffer<S>) -> Result<()> {
        let mut pos = 0;
        while pos < buffer.bit_length() {
            let len = (buffer.bit_length() - pos).min(8);
            self.write_byte(buffer.get_byte_partial(pos, len)?, len)?;
            pos += len;
        }
        Ok(())
    }

    /// Copies the written bits, padding the last byte with zeros
    #[must_use]
    pub fn to_byte_array(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.sink.len() + 1);
        bytes.extend_from_slice(&self.sink);
        if self.carry_bits > 0 {
            bytes.push(self.carry);
        }
        bytes
    }

    /// Copies the written bits into a buffer of exactly [`bit_length`](Self::bit_length) bits
    pub fn to_bit_buffer(&self) -> Result<BitBuffer> {
        let bit_length = self.bit_length();
        BitBuffer::with_range(self.to_byte_array(), 0, bit_length)
    }

    /// Drops every written bit, keeping the allocation
    pub fn reset(&mut self) {
        self.sink.clear();
        self.carry = 0;
        self.carry_bits = 0;
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use super::*;
    use crate::BitInputStream;

    #[test]
    fn test_write_read_mixed_widths() -> super::Result<()> {
        let mut rng = SmallRng::seed_from_u64(7);
        let fields: Vec<(u32, usize)> = (0..500)
            .map(|_| {
                let len = rng.random_range(0..=32usize);
                let value = if len == 32 {
                    rng.random::<u32>()
                } else {
                    rng.random_range(0..(1u32 << len))
                };
                (value, len)
            })
            .collect();

        let mut stream = BitOutputStream::new();
        for &(value, len) in &fields {
            stream.write(value, len)?;
        }
        let total: usize = fields.iter().map(|(_, len)| len).sum();
        assert_eq!(stream.bit_length(), total);

        let bytes = stream.to_byte_array();
        assert_eq!(bytes.len(), total.div_ceil(8));
        let mut input = BitInputStream::with_range(&bytes, 0, total)?;
        for &(value, len) in &fields {
            assert_eq!(input.read_int(len)?, value);
        }
        assert!(!input.has_remaining());
        Ok(())
    }

    #[test]
    fn test_carry_flushed_on_read_out() -> super::Result<()> {
        let mut stream = BitOutputStream::new();
        stream.write_byte(0b101, 3)?;
        assert_eq!(stream.to_byte_array(), vec![0b101]);
        stream.write_byte(0b11111, 5)?;
        stream.write_bit(true)?;
        assert_eq!(stream.to_byte_array(), vec![0b1111_1101, 0b1]);

        let buffer = stream.to_bit_buffer()?;
        assert_eq!(buffer.bit_length(), 9);
        assert!(buffer.get_bit(8)?);
        Ok(())
    }

    #[test]
    fn test_high_bits_masked() -> super::Result<()> {
        let mut stream = BitOutputStream::new();
        stream.write_byte(0xFF, 2)?;
        stream.write_byte(0x00, 2)?;
        assert_eq!(stream.to_byte_array(), vec![0b0011]);
        assert!(stream.write_byte(0, 9).is_err());
        assert!(stream.write(0, 33).is_err());
        Ok(())
    }

    #[test]
    fn test_write_buffer_and_reset() -> super::Result<()> {
        let mut buffer = BitBuffer::new(12);
        buffer.set_int_partial(0xA5C, 0, 12)?;
        let mut stream = BitOutputStream::new();
        stream.write_bit(true)?;
        stream.write_buffer(&buffer)?;
        let out = stream.to_bit_buffer()?;
        assert_eq!(out.get_bit_buffer(1, 12)?, buffer);

        stream.reset();
        assert!(stream.is_empty());
        assert!(stream.to_byte_array().is_empty());
        Ok(())
    }
}
