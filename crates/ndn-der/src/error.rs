use thiserror::Error;

/// Result type alias for DER operations
pub type Result<T> = std::result::Result<T, DerError>;

/// Errors raised while encoding or decoding DER trees
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerError {
    /// A header was requested for a negative payload length
    #[error("negative length")]
    NegativeLength,

    /// The input stream ended before a complete node was read
    #[error("unexpected end of input: needed {needed} bytes, {available} available")]
    UnexpectedEnd {
        /// Bytes required to finish the current read
        needed: usize,
        /// Bytes left in the input
        available: usize,
    },

    /// The tag byte names a type this codec does not implement
    #[error("unimplemented DER type: 0x{0:02x}")]
    UnimplementedType(u8),

    /// The input is structurally malformed
    #[error("decoding error: {0}")]
    Decoding(String),

    /// A value cannot be represented in DER
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A generalized time string or timestamp is out of range
    #[error("invalid time: {0}")]
    InvalidTime(String),
}

impl DerError {
    /// Returns true if the error was caused by truncated input
    #[must_use]
    pub const fn is_truncation(&self) -> bool {
        matches!(self, Self::UnexpectedEnd { .. })
    }

    pub(crate) fn decoding(msg: impl Into<String>) -> Self {
        Self::Decoding(msg.into())
    }

    pub(crate) fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }
}
