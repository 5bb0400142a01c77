//! Bit-level writer and reader for the wire format.
//!
//! Every message is a dense bitstream. Fields are packed at whatever width
//! the schema declares for them (a 4-bit opcode, a 1-bit flag, an 8-bit
//! hero index), so several small fields share one byte. Strings are the
//! exception: they always start on a byte boundary and end with a zero
//! terminator.
//!
//! ## Bit order
//!
//! Values are written least-significant bit first, starting at the lowest
//! free bit of the current byte and spilling into the next byte when the
//! current one is full:
//!
//! ```text
//! write_bits(4, 0b1011); write_bits(6, 0b110110)
//!
//! byte 0: 0 1 1 0 1 0 1 1    (bit 7 … bit 0)
//!         └──┬──┘ └──┬──┘
//!   low 4 bits of    0b1011
//!   0b110110
//! byte 1: 0 0 0 0 0 0 1 1    (high 2 bits of 0b110110)
//! ```
//!
//! The reader mirrors this exactly, so reading the same widths in the same
//! order returns the same values.

use crate::ProtocolError;

/// Upper bound on the size of any message in the catalogue.
///
/// The largest message is a full-room `Sync`; even with 16 participants
/// and long names it stays well below this.
pub const MAX_MESSAGE_SIZE: usize = 2024;

// ---------------------------------------------------------------------------
// BitWriter
// ---------------------------------------------------------------------------

/// Packs fields into a fixed-capacity byte buffer.
///
/// The buffer is allocated once at [`MAX_MESSAGE_SIZE`] (or a custom limit)
/// and never grows past it: a write that would exceed the limit returns
/// [`ProtocolError::CapacityExceeded`] instead of reallocating.
#[derive(Debug)]
pub struct BitWriter {
    buf: Vec<u8>,
    limit: usize,
    /// Bits already used in the last byte of `buf`. 0 means the stream
    /// is on a byte boundary.
    bit_pos: u32,
}

impl BitWriter {
    /// Creates a writer sized for the largest protocol message.
    pub fn new() -> Self {
        Self::with_limit(MAX_MESSAGE_SIZE)
    }

    /// Creates a writer that refuses to grow past `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(limit),
            limit,
            bit_pos: 0,
        }
    }

    /// Appends the low `bits` bits of `value`.
    ///
    /// Higher bits of `value` are ignored; both ends must agree on the
    /// width since the format carries no width information.
    pub fn write_bits(
        &mut self,
        bits: u32,
        value: u32,
    ) -> Result<(), ProtocolError> {
        debug_assert!(bits <= 32, "field wider than 32 bits");
        let mut value = if bits >= 32 {
            value
        } else {
            value & ((1u32 << bits) - 1)
        };
        let mut remaining = bits;

        while remaining > 0 {
            if self.bit_pos == 0 {
                self.push_byte(0)?;
            }
            let take = (8 - self.bit_pos).min(remaining);
            let chunk = (value & ((1u32 << take) - 1)) as u8;
            let last = self.buf.len() - 1;
            self.buf[last] |= chunk << self.bit_pos;

            value >>= take;
            remaining -= take;
            self.bit_pos = (self.bit_pos + take) % 8;
        }
        Ok(())
    }

    /// Appends a single flag bit.
    pub fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        self.write_bits(1, u32::from(value))
    }

    /// Appends a full 8-bit value (not necessarily byte-aligned).
    pub fn write_u8(&mut self, value: u8) -> Result<(), ProtocolError> {
        self.write_bits(8, u32::from(value))
    }

    /// Skips the unused remainder of a partially filled byte.
    pub fn align_to_byte(&mut self) {
        self.bit_pos = 0;
    }

    /// Writes a byte-aligned, zero-terminated UTF-8 string.
    pub fn write_string(&mut self, value: &str) -> Result<(), ProtocolError> {
        let bytes = value.as_bytes();
        if bytes.contains(&0) {
            return Err(ProtocolError::EmbeddedNul);
        }
        self.align_to_byte();
        if self.buf.len() + bytes.len() + 1 > self.limit {
            return Err(ProtocolError::CapacityExceeded { limit: self.limit });
        }
        self.buf.extend_from_slice(bytes);
        self.buf.push(0);
        Ok(())
    }

    /// Number of bytes the finished message would occupy right now.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the written bytes, including a partially filled last byte.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn push_byte(&mut self, byte: u8) -> Result<(), ProtocolError> {
        if self.buf.len() >= self.limit {
            return Err(ProtocolError::CapacityExceeded { limit: self.limit });
        }
        self.buf.push(byte);
        Ok(())
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// BitReader
// ---------------------------------------------------------------------------

/// Unpacks fields from a received message, mirroring [`BitWriter`].
///
/// Reading past the end of the buffer returns
/// [`ProtocolError::Truncated`]; it never panics.
#[derive(Debug)]
pub struct BitReader<'a> {
    buf: &'a [u8],
    /// Index of the byte currently being consumed.
    offset: usize,
    /// Bits already consumed from `buf[offset]`.
    bit_pos: u32,
}

impl<'a> BitReader<'a> {
    /// Creates a reader positioned at the first bit of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            bit_pos: 0,
        }
    }

    /// Reads a `bits`-wide unsigned value.
    pub fn read_bits(&mut self, bits: u32) -> Result<u32, ProtocolError> {
        debug_assert!(bits <= 32, "field wider than 32 bits");
        let mut value = 0u32;
        let mut read = 0u32;

        while read < bits {
            let byte = *self.buf.get(self.offset).ok_or(
                ProtocolError::Truncated {
                    offset: self.offset,
                    needed: (bits - read) as usize,
                },
            )?;
            let take = (8 - self.bit_pos).min(bits - read);
            let chunk = (u32::from(byte) >> self.bit_pos) & ((1u32 << take) - 1);
            value |= chunk << read;

            read += take;
            self.bit_pos += take;
            if self.bit_pos == 8 {
                self.bit_pos = 0;
                self.offset += 1;
            }
        }
        Ok(value)
    }

    /// Reads a single flag bit.
    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Reads an 8-bit value.
    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        // Eight bits always fit in a u8.
        Ok(self.read_bits(8)? as u8)
    }

    /// Reads `count` values of `bits` width each.
    pub fn read_bits_array(
        &mut self,
        bits: u32,
        count: usize,
    ) -> Result<Vec<u32>, ProtocolError> {
        (0..count).map(|_| self.read_bits(bits)).collect()
    }

    /// Discards the unread remainder of the current byte.
    pub fn align_to_byte(&mut self) {
        if self.bit_pos != 0 {
            self.bit_pos = 0;
            self.offset += 1;
        }
    }

    /// Reads a byte-aligned, zero-terminated UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        self.align_to_byte();
        let rest = self.buf.get(self.offset..).unwrap_or_default();
        let len = rest.iter().position(|b| *b == 0).ok_or(
            ProtocolError::Truncated {
                offset: self.offset,
                needed: 8,
            },
        )?;
        let text = std::str::from_utf8(&rest[..len])
            .map_err(|_| ProtocolError::InvalidUtf8)?
            .to_owned();
        self.offset += len + 1;
        Ok(text)
    }

    /// Reads `count` consecutive strings.
    pub fn read_string_array(
        &mut self,
        count: usize,
    ) -> Result<Vec<String>, ProtocolError> {
        (0..count).map(|_| self.read_string()).collect()
    }

    /// Returns `true` once every whole byte has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.buf.len()
    }
}

// =========================================================================
// Tests
// =========================================================================
