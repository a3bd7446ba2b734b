//! Signature metadata carried by Data and signed Interests.

use std::fmt;

use crate::error::{PacketError, Result};
use crate::name::Name;
use crate::tlv::{self, TlvReader};

/// Signature algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureType {
    DigestSha256,
    Sha256WithRsa,
    Sha256WithEcdsa,
    Other(u64),
}

impl SignatureType {
    #[must_use]
    pub const fn from_code(code: u64) -> Self {
        match code {
            0 => Self::DigestSha256,
            1 => Self::Sha256WithRsa,
            3 => Self::Sha256WithEcdsa,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn code(self) -> u64 {
        match self {
            Self::DigestSha256 => 0,
            Self::Sha256WithRsa => 1,
            Self::Sha256WithEcdsa => 3,
            Self::Other(code) => code,
        }
    }

    /// Whether verification needs a public key named by a KeyLocator.
    #[must_use]
    pub const fn uses_public_key(self) -> bool {
        matches!(self, Self::Sha256WithRsa | Self::Sha256WithEcdsa)
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DigestSha256 => f.write_str("DigestSha256"),
            Self::Sha256WithRsa => f.write_str("SignatureSha256WithRsa"),
            Self::Sha256WithEcdsa => f.write_str("SignatureSha256WithEcdsa"),
            Self::Other(code) => write!(f, "SignatureType({code})"),
        }
    }
}

/// Which key produced a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyLocator {
    Name(Name),
    KeyDigest(Vec<u8>),
}

impl KeyLocator {
    #[must_use]
    pub const fn name(&self) -> Option<&Name> {
        match self {
            Self::Name(name) => Some(name),
            Self::KeyDigest(_) => None,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        let mut value = Vec::new();
        match self {
            Self::Name(name) => name.encode_into(&mut value),
            Self::KeyDigest(digest) => tlv::write_tlv(&mut value, tlv::KEY_DIGEST, digest),
        }
        tlv::write_tlv(out, tlv::KEY_LOCATOR, &value);
    }

    fn decode_value(value: &[u8]) -> Result<Self> {
        let mut reader = TlvReader::new(value);
        let (tlv_type, inner) = reader.read_tlv()?;
        match tlv_type {
            tlv::NAME => Name::decode_value(inner).map(Self::Name),
            tlv::KEY_DIGEST => Ok(Self::KeyDigest(inner.to_vec())),
            other => Err(PacketError::tlv(format!("unexpected KeyLocator type {other}"))),
        }
    }
}

/// SignatureType plus optional KeyLocator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureInfo {
    pub signature_type: SignatureType,
    pub key_locator: Option<KeyLocator>,
}

impl SignatureInfo {
    #[must_use]
    pub const fn new(signature_type: SignatureType, key_locator: Option<KeyLocator>) -> Self {
        Self {
            signature_type,
            key_locator,
        }
    }

    /// A digest-only signature with no key locator.
    #[must_use]
    pub const fn digest_sha256() -> Self {
        Self::new(SignatureType::DigestSha256, None)
    }

    /// A public-key signature whose key is located by `key_name`.
    #[must_use]
    pub const fn with_key_name(signature_type: SignatureType, key_name: Name) -> Self {
        Self::new(signature_type, Some(KeyLocator::Name(key_name)))
    }

    /// Name inside the KeyLocator, if the locator is a name.
    #[must_use]
    pub fn key_name(&self) -> Option<&Name> {
        self.key_locator.as_ref().and_then(KeyLocator::name)
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        let mut value = Vec::new();
        tlv::write_non_negative_tlv(&mut value, tlv::SIGNATURE_TYPE, self.signature_type.code());
        if let Some(locator) = &self.key_locator {
            locator.encode_into(&mut value);
        }
        tlv::write_tlv(out, tlv::SIGNATURE_INFO, &value);
    }

    /// Encode as a complete SignatureInfo element.
    #[must_use]
    pub fn wire_encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    /// Decode a complete SignatureInfo element.
    ///
    /// # Errors
    ///
    /// Returns a TLV error for malformed input.
    pub fn wire_decode(wire: &[u8]) -> Result<Self> {
        Self::decode_value(tlv::read_single(wire, tlv::SIGNATURE_INFO)?)
    }

    pub(crate) fn decode_value(value: &[u8]) -> Result<Self> {
        let mut reader = TlvReader::new(value);
        let code = tlv::decode_non_negative(reader.expect(tlv::SIGNATURE_TYPE)?)?;
        let key_locator = reader
            .read_optional(tlv::KEY_LOCATOR)?
            .map(KeyLocator::decode_value)
            .transpose()?;
        Ok(Self::new(SignatureType::from_code(code), key_locator))
    }
}

impl Default for SignatureInfo {
    fn default() -> Self {
        Self::digest_sha256()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_type_codes() {
        for code in [0, 1, 3, 42] {
            assert_eq!(SignatureType::from_code(code).code(), code);
        }
        assert_eq!(SignatureType::from_code(42), SignatureType::Other(42));
        assert!(SignatureType::Sha256WithEcdsa.uses_public_key());
        assert!(!SignatureType::DigestSha256.uses_public_key());
    }

    #[test]
    fn info_with_name_locator() {
        let key = Name::parse("/ndn/KEY/ksk-1/ID-CERT").unwrap();
        let info = SignatureInfo::with_key_name(SignatureType::Sha256WithEcdsa, key.clone());
        let decoded = SignatureInfo::wire_decode(&info.wire_encode()).unwrap();
        assert_eq!(decoded, info);
        assert_eq!(decoded.key_name(), Some(&key));
    }

    #[test]
    fn info_with_digest_locator() {
        let info = SignatureInfo::new(
            SignatureType::Sha256WithRsa,
            Some(KeyLocator::KeyDigest(vec![1, 2, 3])),
        );
        let decoded = SignatureInfo::wire_decode(&info.wire_encode()).unwrap();
        assert_eq!(decoded.key_name(), None);
        assert_eq!(decoded, info);
    }

    #[test]
    fn missing_signature_type() {
        let mut wire = Vec::new();
        tlv::write_tlv(&mut wire, tlv::SIGNATURE_INFO, &[]);
        assert_eq!(
            SignatureInfo::wire_decode(&wire),
            Err(PacketError::UnexpectedEnd)
        );
    }
}
