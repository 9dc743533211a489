//! Bit cursors over byte buffers.
//!
//! Bits are addressed in MSB-first order: bit 0 is the high bit of the first byte,
//! and values wider than a byte are packed most-significant bit first across byte
//! boundaries. Positions are bit offsets from the start of the cursor's window.

use crate::errors::BitError;

/// Number of bits per byte.
pub const BYTE_SIZE: usize = 8;

/// Number of bits per BCD digit.
pub const NIBBLE_SIZE: usize = 4;

/// Sequential, seekable reader over a byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Reader over `length` bytes of `data` starting at byte `offset`.
    pub fn with_range(data: &'a [u8], offset: usize, length: usize) -> Result<Self, BitError> {
        let window = offset
            .checked_add(length)
            .and_then(|end| data.get(offset..end))
            .ok_or(BitError::OutOfBounds)?;

        Ok(Self::new(window))
    }

    pub fn position(&self) -> usize {
        self.bit_pos
    }

    /// Moves the cursor to an absolute bit position. Out-of-range positions fail on the next read.
    pub fn set_position(&mut self, bit_pos: usize) {
        self.bit_pos = bit_pos;
    }

    /// Total number of bits in the window.
    pub fn len_bits(&self) -> usize {
        self.data.len() * BYTE_SIZE
    }

    pub fn remaining_bits(&self) -> usize {
        self.len_bits().saturating_sub(self.bit_pos)
    }

    fn read_bit(&mut self) -> Result<u8, BitError> {
        let byte_index = self.bit_pos / BYTE_SIZE;
        let bit_index = self.bit_pos % BYTE_SIZE;

        let byte = *self.data.get(byte_index).ok_or(BitError::OutOfBounds)?;
        let bit = (byte >> (7 - bit_index)) & 1;

        self.bit_pos += 1;

        Ok(bit)
    }

    /// Reads `n` bits (max 64) as an unsigned, right-aligned value.
    pub fn read_bits(&mut self, n: usize) -> Result<u64, BitError> {
        if n > 64 {
            return Err(BitError::TooManyBits);
        }

        if n > self.remaining_bits() {
            return Err(BitError::OutOfBounds);
        }

        let mut value = 0u64;

        for _ in 0..n {
            let bit = self.read_bit()? as u64;
            value = (value << 1) | bit;
        }

        Ok(value)
    }

    /// Reads `n` bits (max 64) and sign-extends from bit `n - 1`.
    pub fn read_signed_bits(&mut self, n: usize) -> Result<i64, BitError> {
        let raw = self.read_bits(n)?;
        Ok(sign_extend(raw, n))
    }

    /// Fills `buf` from the stream. The cursor must be on a byte boundary.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), BitError> {
        if self.bit_pos % BYTE_SIZE != 0 {
            return Err(BitError::Unaligned(self.bit_pos));
        }

        let start = self.bit_pos / BYTE_SIZE;
        let src = start
            .checked_add(buf.len())
            .and_then(|end| self.data.get(start..end))
            .ok_or(BitError::OutOfBounds)?;

        buf.copy_from_slice(src);
        self.bit_pos += buf.len() * BYTE_SIZE;

        Ok(())
    }

    /// Advances the cursor by `n` bits without reading them.
    pub fn skip_bits(&mut self, n: usize) -> Result<(), BitError> {
        if n > self.remaining_bits() {
            return Err(BitError::OutOfBounds);
        }

        self.bit_pos += n;
        Ok(())
    }
}

/// Append-only bit writer backed by a growable buffer.
///
/// A trailing partial byte is zero-filled when the writer is finished.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_pos: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.bit_pos
    }

    fn write_bit(&mut self, bit: u8) {
        let byte_index = self.bit_pos / BYTE_SIZE;
        if byte_index == self.bytes.len() {
            self.bytes.push(0);
        }

        self.set_bit(self.bit_pos, bit);
        self.bit_pos += 1;
    }

    fn set_bit(&mut self, bit_pos: usize, bit: u8) {
        let mask = 1u8 << (7 - bit_pos % BYTE_SIZE);
        let byte = &mut self.bytes[bit_pos / BYTE_SIZE];

        if bit == 0 {
            *byte &= !mask;
        } else {
            *byte |= mask;
        }
    }

    /// Writes the low `n` bits (max 64) of `value`, most significant first.
    pub fn write_bits(&mut self, value: u64, n: usize) -> Result<(), BitError> {
        if n > 64 {
            return Err(BitError::TooManyBits);
        }

        for i in (0..n).rev() {
            self.write_bit(((value >> i) & 1) as u8);
        }

        Ok(())
    }

    /// Appends whole bytes. The cursor must be on a byte boundary.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<(), BitError> {
        if self.bit_pos % BYTE_SIZE != 0 {
            return Err(BitError::Unaligned(self.bit_pos));
        }

        self.bytes.extend_from_slice(buf);
        self.bit_pos += buf.len() * BYTE_SIZE;

        Ok(())
    }

    /// Appends `n` zero bits.
    pub fn pad_bits(&mut self, n: usize) {
        for _ in 0..n {
            self.write_bit(0);
        }
    }

    /// Bytes written so far, including a zero-filled partial byte.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: usize) -> i64 {
    if bits == 0 {
        return 0;
    }

    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}
