//! Interest packets and the signed-Interest name layout.
//!
//! A signed Interest carries its signature in the last four name components:
//! `<prefix>/<timestamp>/<random>/<SignatureInfo>/<SignatureValue>`.

use std::time::Duration;

use rand::RngCore;

use crate::error::{PacketError, Result};
use crate::name::{Component, Name};
use crate::signature::SignatureInfo;
use crate::tlv::{self, TlvReader};

/// Lifetime used when none is set.
pub const DEFAULT_LIFETIME: Duration = Duration::from_millis(4000);

/// Minimum number of components in a signed Interest name.
pub const MIN_SIGNED_LENGTH: usize = 4;
/// Position of the timestamp component, counted from the end.
pub const POS_TIMESTAMP: isize = -4;
/// Position of the random component, counted from the end.
pub const POS_RANDOM: isize = -3;
/// Position of the SignatureInfo component, counted from the end.
pub const POS_SIG_INFO: isize = -2;
/// Position of the SignatureValue component, counted from the end.
pub const POS_SIG_VALUE: isize = -1;

/// A request for named content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    nonce: [u8; 4],
    pub lifetime: Duration,
}

impl Interest {
    /// An Interest for `name` with a random nonce and the default lifetime.
    #[must_use]
    pub fn new(name: Name) -> Self {
        let mut nonce = [0u8; 4];
        rand::rng().fill_bytes(&mut nonce);
        Self {
            name,
            nonce,
            lifetime: DEFAULT_LIFETIME,
        }
    }

    #[must_use]
    pub const fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    #[must_use]
    pub const fn nonce(&self) -> [u8; 4] {
        self.nonce
    }

    /// Replace the nonce with a different random value.
    pub fn refresh_nonce(&mut self) {
        let old = self.nonce;
        let mut rng = rand::rng();
        while self.nonce == old {
            rng.fill_bytes(&mut self.nonce);
        }
    }

    #[must_use]
    pub fn wire_encode(&self) -> Vec<u8> {
        let mut value = Vec::new();
        self.name.encode_into(&mut value);
        tlv::write_tlv(&mut value, tlv::NONCE, &self.nonce);
        let ms = u64::try_from(self.lifetime.as_millis()).unwrap_or(u64::MAX);
        tlv::write_non_negative_tlv(&mut value, tlv::INTEREST_LIFETIME, ms);

        let mut out = Vec::with_capacity(value.len() + 4);
        tlv::write_tlv(&mut out, tlv::INTEREST, &value);
        out
    }

    /// Decode a complete Interest element.
    ///
    /// # Errors
    ///
    /// Returns a TLV error for malformed input or a nonce that is not 4 bytes.
    pub fn wire_decode(wire: &[u8]) -> Result<Self> {
        let mut reader = TlvReader::new(tlv::read_single(wire, tlv::INTEREST)?);
        let name = Name::decode_value(reader.expect(tlv::NAME)?)?;
        let nonce: [u8; 4] = reader
            .read_optional(tlv::NONCE)?
            .ok_or(PacketError::MissingField("Nonce"))?
            .try_into()
            .map_err(|_| PacketError::tlv("nonce must be 4 bytes"))?;
        let lifetime = reader
            .read_optional(tlv::INTEREST_LIFETIME)?
            .map(tlv::decode_non_negative)
            .transpose()?
            .map_or(DEFAULT_LIFETIME, Duration::from_millis);
        Ok(Self {
            name,
            nonce,
            lifetime,
        })
    }

    fn signed_component(&self, pos: isize) -> Result<&Component> {
        if self.name.len() < MIN_SIGNED_LENGTH {
            return Err(PacketError::MissingField("signature components"));
        }
        self.name
            .get(pos)
            .ok_or(PacketError::MissingField("signature components"))
    }

    /// Timestamp component of a signed Interest, in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is too short or the component is not a
    /// number.
    pub fn signed_timestamp(&self) -> Result<u64> {
        self.signed_component(POS_TIMESTAMP)?.to_number()
    }

    /// SignatureInfo carried in the name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is too short or the component does not
    /// hold a SignatureInfo element.
    pub fn signature_info(&self) -> Result<SignatureInfo> {
        SignatureInfo::wire_decode(self.signed_component(POS_SIG_INFO)?.value())
    }

    /// Signature bits carried in the name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is too short or the component does not
    /// hold a SignatureValue element.
    pub fn signature_value(&self) -> Result<Vec<u8>> {
        tlv::read_single(self.signed_component(POS_SIG_VALUE)?.value(), tlv::SIGNATURE_VALUE)
            .map(<[u8]>::to_vec)
    }

    /// Bytes covered by the signature: the component TLVs of every name
    /// component except the SignatureValue.
    #[must_use]
    pub fn signed_portion(&self) -> Vec<u8> {
        self.name.get_prefix(POS_SIG_VALUE).encode_value()
    }

    /// The name without its SignatureInfo and SignatureValue components.
    #[must_use]
    pub fn name_without_signature(&self) -> Name {
        self.name.get_prefix(POS_SIG_INFO)
    }

    /// The name without any of the four signed-Interest components.
    #[must_use]
    pub fn command_prefix(&self) -> Name {
        self.name.get_prefix(POS_TIMESTAMP)
    }
}

/// A name component wrapping a SignatureInfo element.
#[must_use]
pub fn signature_info_component(info: &SignatureInfo) -> Component {
    Component::new(info.wire_encode())
}

/// A name component wrapping a SignatureValue element.
#[must_use]
pub fn signature_value_component(value: &[u8]) -> Component {
    let mut out = Vec::with_capacity(value.len() + 4);
    tlv::write_tlv(&mut out, tlv::SIGNATURE_VALUE, value);
    Component::new(out)
}
