//! # Bit-addressable buffers
//!
//! Low-level primitives used by every index column in this crate.
//!
//! All three types share the same bit order: bit `i` of a buffer lives in byte `i / 8`
//! at position `i % 8`, counting from the least significant bit. A value written over
//! `n` bits stores its least significant bit first.
//!
//! ```text
//! byte 0            byte 1
//! 7 6 5 4 3 2 1 0   7 6 5 4 3 2 1 0
//! . . . . c c b a   . . . . . . . c      a = 1 bit at 0, b = 1 bit at 1, c = 3 bits at 2..5
//! ```
//!
//! * [`BitBuffer`] is a fixed-length bit window over a byte slice, with zero-copy sub-views.
//! * [`BitOutputStream`] appends bit fields to a growable byte sink.
//! * [`BitInputStream`] reads bit fields back in order.
//!
//! Requests for more than [`MAX_INT_BITS`] bits (integer operations) or [`MAX_BYTE_BITS`]
//! bits (byte operations) are rejected with [`BitError::TooManyBits`](crate::BitError).

mod buffer;
mod input;
mod output;

pub use buffer::BitBuffer;
pub use input::BitInputStream;
pub use output::BitOutputStream;

use crate::{BitError, Result};

/// Widest field accepted by byte-level operations
pub const MAX_BYTE_BITS: usize = 8;

/// Widest field accepted by integer-level operations
pub const MAX_INT_BITS: usize = 32;

/// Number of bytes required to hold `bit_length` bits
#[inline]
#[must_use]
pub fn bytes_for_bits(bit_length: usize) -> usize {
    bit_length.div_ceil(8)
}

#[inline]
fn check_width(requested: usize, max: usize) -> Result<()> {
    if requested > max {
        return Err(BitError::TooManyBits { requested, max }.into());
    }
    Ok(())
}

/// Mask with the `len` low bits set (`len <= 8`)
#[inline]
fn low_mask(len: usize) -> u16 {
    (1u16 << len) - 1
}
