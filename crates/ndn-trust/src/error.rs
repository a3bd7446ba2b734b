//! Error types for trust policy loading and validation.

use std::fmt;

use ndn_der::DerError;
use ndn_packet::PacketError;
use thiserror::Error;

/// Result type alias for trust operations
pub type Result<T> = std::result::Result<T, TrustError>;

/// Errors raised while building certificates, policies or validators.
///
/// Validation verdicts are reported through [`ValidationError`] instead.
#[derive(Error, Debug)]
pub enum TrustError {
    /// DER encoding or decoding failed
    #[error("DER error: {0}")]
    Der(#[from] DerError),

    /// Packet encoding or decoding failed
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    /// Certificate content is ill-formed or incomplete
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Policy configuration is invalid
    #[error("config error: {0}")]
    Config(String),

    /// Name regex failed to compile or expand
    #[error("regex error: {0}")]
    Regex(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Base64 decoding failed
    #[error("base64 error: {0}")]
    Base64(String),

    /// TOML document could not be parsed
    #[error("toml error: {0}")]
    Toml(String),

    /// Key material is missing or unusable
    #[error("key error: {0}")]
    Key(String),

    /// A constructor was called with arguments that break its contract
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl TrustError {
    /// Returns true if the error came from a policy document
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Toml(_) | Self::Regex(_))
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn regex(msg: impl Into<String>) -> Self {
        Self::Regex(msg.into())
    }
}

impl From<base64::DecodeError> for TrustError {
    fn from(e: base64::DecodeError) -> Self {
        Self::Base64(e.to_string())
    }
}

impl From<toml::de::Error> for TrustError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e.to_string())
    }
}

/// Structural or freshness failures specific to command Interests.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandInterestError {
    #[error("command Interest name is too short")]
    NameTooShort,
    #[error("cannot parse timestamp")]
    BadTimestamp,
    #[error("cannot parse SignatureInfo")]
    BadSigInfo,
    #[error("KeyLocator is missing")]
    MissingKeyLocator,
    #[error("KeyLocator type is not Name")]
    BadKeyLocatorType,
    #[error("cannot parse certificate name")]
    BadCertName,
    #[error("timestamp is out of grace period")]
    TimestampOutOfGrace,
    #[error("timestamp is less than or equal to last timestamp")]
    TimestampReorder,
}

/// Why a packet was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorCode {
    InvalidSignature,
    NoSignature,
    CannotRetrieveCertificate,
    ExpiredCertificate,
    LoopDetected,
    MalformedCertificate,
    ExceededDepthLimit,
    InvalidKeyLocator,
    PolicyError,
    CommandInterest(CommandInterestError),
}

impl fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSignature => f.write_str("Invalid signature"),
            Self::NoSignature => f.write_str("Missing signature"),
            Self::CannotRetrieveCertificate => f.write_str("Cannot retrieve certificate"),
            Self::ExpiredCertificate => f.write_str("Certificate expired"),
            Self::LoopDetected => f.write_str("Loop detected in certification chain"),
            Self::MalformedCertificate => f.write_str("Malformed certificate"),
            Self::ExceededDepthLimit => f.write_str("Exceeded validation depth limit"),
            Self::InvalidKeyLocator => f.write_str("Key locator violates validation policy"),
            Self::PolicyError => f.write_str("Validation policy error"),
            Self::CommandInterest(e) => write!(f, "Command Interest error ({e})"),
        }
    }
}

/// A rejection: a code to branch on and a human-readable reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{info}")]
pub struct ValidationError {
    pub code: ValidationErrorCode,
    pub info: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(code: ValidationErrorCode, info: impl Into<String>) -> Self {
        Self {
            code,
            info: info.into(),
        }
    }

    /// Returns true if a later attempt might succeed (the certificate could
    /// not be fetched this time).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.code, ValidationErrorCode::CannotRetrieveCertificate)
    }

    /// The command-Interest failure behind this rejection, if any.
    #[must_use]
    pub const fn command_interest_error(&self) -> Option<CommandInterestError> {
        match self.code {
            ValidationErrorCode::CommandInterest(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CommandInterestError> for ValidationError {
    fn from(e: CommandInterestError) -> Self {
        Self::new(ValidationErrorCode::CommandInterest(e), e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_interest_errors_carry_messages() {
        let err = ValidationError::from(CommandInterestError::TimestampReorder);
        assert_eq!(
            err.to_string(),
            "timestamp is less than or equal to last timestamp"
        );
        assert_eq!(
            err.command_interest_error(),
            Some(CommandInterestError::TimestampReorder)
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn retryable_codes() {
        let err = ValidationError::new(
            ValidationErrorCode::CannotRetrieveCertificate,
            "Cannot fetch cert: /a",
        );
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Cannot fetch cert: /a");
    }

    #[test]
    fn config_classification() {
        assert!(TrustError::config("x").is_config());
        assert!(!TrustError::Key("x".into()).is_config());
    }
}
