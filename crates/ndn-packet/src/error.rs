use thiserror::Error;

/// Result type alias for packet operations
pub type Result<T> = std::result::Result<T, PacketError>;

/// Errors raised by the packet model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// A TLV element is malformed or of an unexpected type
    #[error("TLV error: {0}")]
    Tlv(String),

    /// The input ended in the middle of an element
    #[error("unexpected end of TLV input")]
    UnexpectedEnd,

    /// A name URI could not be parsed
    #[error("invalid name URI: {0}")]
    InvalidUri(String),

    /// A component does not hold a nonNegativeInteger
    #[error("component is not a number")]
    NotANumber,

    /// A required element is absent
    #[error("missing {0}")]
    MissingField(&'static str),

    /// A name does not follow `<identity>/KEY/<key-id>/ID-CERT/<version>`
    #[error("bad certificate name: {0}")]
    BadCertificateName(String),
}

impl PacketError {
    pub(crate) fn tlv(msg: impl Into<String>) -> Self {
        Self::Tlv(msg.into())
    }
}
