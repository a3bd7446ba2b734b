//! Data packets.

use std::time::Duration;

use crate::error::{PacketError, Result};
use crate::name::Name;
use crate::signature::SignatureInfo;
use crate::tlv::{self, TlvReader};

/// ContentType value of a public-key certificate.
pub const CONTENT_TYPE_KEY: u64 = 2;

/// A named, signed piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Data {
    pub name: Name,
    pub content_type: u64,
    pub freshness_period: Option<Duration>,
    pub content: Vec<u8>,
    pub signature_info: SignatureInfo,
    pub signature_value: Vec<u8>,
}

impl Data {
    #[must_use]
    pub fn new(name: Name) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    #[must_use]
    pub const fn with_content_type(mut self, content_type: u64) -> Self {
        self.content_type = content_type;
        self
    }

    #[must_use]
    pub const fn with_freshness_period(mut self, period: Duration) -> Self {
        self.freshness_period = Some(period);
        self
    }

    fn encode_meta_info(&self, out: &mut Vec<u8>) {
        let mut value = Vec::new();
        if self.content_type != 0 {
            tlv::write_non_negative_tlv(&mut value, tlv::CONTENT_TYPE, self.content_type);
        }
        if let Some(period) = self.freshness_period {
            let ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
            tlv::write_non_negative_tlv(&mut value, tlv::FRESHNESS_PERIOD, ms);
        }
        tlv::write_tlv(out, tlv::META_INFO, &value);
    }

    /// Bytes covered by the signature: Name, MetaInfo, Content and
    /// SignatureInfo elements.
    #[must_use]
    pub fn signed_portion(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.name.encode_into(&mut out);
        self.encode_meta_info(&mut out);
        tlv::write_tlv(&mut out, tlv::CONTENT, &self.content);
        self.signature_info.encode_into(&mut out);
        out
    }

    #[must_use]
    pub fn wire_encode(&self) -> Vec<u8> {
        let mut value = self.signed_portion();
        tlv::write_tlv(&mut value, tlv::SIGNATURE_VALUE, &self.signature_value);
        let mut out = Vec::with_capacity(value.len() + 4);
        tlv::write_tlv(&mut out, tlv::DATA, &value);
        out
    }

    /// Decode a complete Data element.
    ///
    /// # Errors
    ///
    /// Returns a TLV error if a required element is missing or malformed.
    pub fn wire_decode(wire: &[u8]) -> Result<Self> {
        let mut reader = TlvReader::new(tlv::read_single(wire, tlv::DATA)?);

        let name = Name::decode_value(reader.expect(tlv::NAME)?)?;

        let mut content_type = 0;
        let mut freshness_period = None;
        if let Some(meta) = reader.read_optional(tlv::META_INFO)? {
            let mut meta = TlvReader::new(meta);
            if let Some(ct) = meta.read_optional(tlv::CONTENT_TYPE)? {
                content_type = tlv::decode_non_negative(ct)?;
            }
            if let Some(fp) = meta.read_optional(tlv::FRESHNESS_PERIOD)? {
                freshness_period = Some(Duration::from_millis(tlv::decode_non_negative(fp)?));
            }
        }

        let content = reader
            .read_optional(tlv::CONTENT)?
            .map(<[u8]>::to_vec)
            .unwrap_or_default();

        let signature_info = reader
            .read_optional(tlv::SIGNATURE_INFO)?
            .ok_or(PacketError::MissingField("SignatureInfo"))
            .and_then(SignatureInfo::decode_value)?;
        let signature_value = reader
            .read_optional(tlv::SIGNATURE_VALUE)?
            .ok_or(PacketError::MissingField("SignatureValue"))?
            .to_vec();

        Ok(Self {
            name,
            content_type,
            freshness_period,
            content,
            signature_info,
            signature_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SignatureType;

    #[test]
    fn wire_roundtrip() {
        let mut data = Data::new(Name::parse("/ndn/test/data").unwrap())
            .with_content(b"payload".to_vec())
            .with_content_type(CONTENT_TYPE_KEY)
            .with_freshness_period(Duration::from_millis(500));
        data.signature_info = SignatureInfo::with_key_name(
            SignatureType::Sha256WithEcdsa,
            Name::parse("/ndn/KEY/ksk-1/ID-CERT").unwrap(),
        );
        data.signature_value = vec![0xaa; 64];

        let decoded = Data::wire_decode(&data.wire_encode()).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(decoded.signed_portion(), data.signed_portion());
    }

    #[test]
    fn signed_portion_excludes_signature_value() {
        let mut data = Data::new(Name::parse("/a").unwrap());
        let before = data.signed_portion();
        data.signature_value = vec![1, 2, 3];
        assert_eq!(data.signed_portion(), before);
        assert!(data.wire_encode().len() > before.len());
    }

    #[test]
    fn missing_signature_fails() {
        let mut value = Vec::new();
        Name::parse("/a").unwrap().encode_into(&mut value);
        let mut wire = Vec::new();
        tlv::write_tlv(&mut wire, tlv::DATA, &value);
        assert_eq!(
            Data::wire_decode(&wire),
            Err(PacketError::MissingField("SignatureInfo"))
        );
    }
}
