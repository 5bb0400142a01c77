//! Error types for the protocol layer.
//!
//! Each crate in Questboard defines its own error enum. A `ProtocolError`
//! always means the bytes themselves were wrong (or could not be produced):
//! the connection that carried them is still usable.

/// Errors that can occur while packing or unpacking a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The first four bits named a reserved opcode, or one that never
    /// flows in the direction being decoded.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    /// The reader ran past the end of the supplied buffer.
    ///
    /// Covers short messages as well as a string with no terminator.
    #[error("message truncated: needed {needed} more bits at byte {offset}")]
    Truncated {
        /// Byte offset where the read started.
        offset: usize,
        /// Bits still missing when the buffer ran out.
        needed: usize,
    },

    /// A string field was not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// The message would not fit in the fixed-size write buffer.
    #[error("message exceeds {limit} bytes")]
    CapacityExceeded {
        /// The buffer limit that was hit.
        limit: usize,
    },

    /// A string to be written contains a zero byte, which would be read
    /// back as the terminator.
    #[error("string contains an embedded zero byte")]
    EmbeddedNul,

    /// A value does not fit the bit width the schema gives it.
    #[error("{field} value {value} does not fit in {bits} bits")]
    ValueOutOfRange {
        /// Name of the schema field.
        field: &'static str,
        /// The offending value.
        value: u64,
        /// Declared width.
        bits: u32,
    },
}
