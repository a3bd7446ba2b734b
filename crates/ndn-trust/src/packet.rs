//! Uniform view over the two kinds of signed packet.

use ndn_packet::{Data, Interest, Name, SignatureInfo};

/// A Data packet or a signed Interest under validation.
#[derive(Debug, Clone, Copy)]
pub enum SignedPacket<'a> {
    Data(&'a Data),
    Interest(&'a Interest),
}

impl<'a> SignedPacket<'a> {
    /// The full packet name.
    #[must_use]
    pub const fn name(&self) -> &'a Name {
        match self {
            Self::Data(data) => &data.name,
            Self::Interest(interest) => &interest.name,
        }
    }

    #[must_use]
    pub const fn is_interest(&self) -> bool {
        matches!(self, Self::Interest(_))
    }

    /// Name that filters are matched against: Interests lose their four
    /// signature components.
    #[must_use]
    pub fn filter_name(&self) -> Name {
        match self {
            Self::Data(data) => data.name.clone(),
            Self::Interest(interest) => interest.command_prefix(),
        }
    }

    /// Name that key-locator checkers relate to the signer: Interests lose
    /// their SignatureInfo and SignatureValue components.
    #[must_use]
    pub fn checker_name(&self) -> Name {
        match self {
            Self::Data(data) => data.name.clone(),
            Self::Interest(interest) => interest.name_without_signature(),
        }
    }

    /// Signature metadata, or `None` if an Interest does not carry a
    /// parseable SignatureInfo.
    #[must_use]
    pub fn signature_info(&self) -> Option<SignatureInfo> {
        match self {
            Self::Data(data) => Some(data.signature_info.clone()),
            Self::Interest(interest) => interest.signature_info().ok(),
        }
    }

    /// Signature bits, or `None` if an Interest carries none.
    #[must_use]
    pub fn signature_value(&self) -> Option<Vec<u8>> {
        match self {
            Self::Data(data) => Some(data.signature_value.clone()),
            Self::Interest(interest) => interest.signature_value().ok(),
        }
    }

    /// Bytes covered by the signature.
    #[must_use]
    pub fn signed_portion(&self) -> Vec<u8> {
        match self {
            Self::Data(data) => data.signed_portion(),
            Self::Interest(interest) => interest.signed_portion(),
        }
    }
}

impl<'a> From<&'a Data> for SignedPacket<'a> {
    fn from(data: &'a Data) -> Self {
        Self::Data(data)
    }
}

impl<'a> From<&'a Interest> for SignedPacket<'a> {
    fn from(interest: &'a Interest) -> Self {
        Self::Interest(interest)
    }
}
