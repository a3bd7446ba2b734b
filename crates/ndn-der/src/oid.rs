//! Object identifier codec.
//!
//! The first two arcs share one packed value (`first * 40 + second`); every
//! value is then written in base-128 with the continuation bit set on all but
//! the final byte.

use std::fmt;
use std::str::FromStr;

use crate::error::{DerError, Result};

/// An object identifier as its list of arcs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(Vec<u64>);

impl Oid {
    /// Build an OID from its arcs.
    #[must_use]
    pub const fn new(arcs: Vec<u64>) -> Self {
        Self(arcs)
    }

    /// The arcs of this OID.
    #[must_use]
    pub fn arcs(&self) -> &[u64] {
        &self.0
    }

    /// Encode the arcs into an OID payload.
    ///
    /// # Errors
    ///
    /// Returns `DerError::Encoding` if the OID is empty, the first arc is not
    /// 0..=2, or the second arc is not 0..=39.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        let first = *self
            .0
            .first()
            .ok_or_else(|| DerError::encoding("no integer in oid"))?;
        if first > 2 {
            return Err(DerError::encoding("first integer of oid is out of range"));
        }
        let mut packed = first * 40;

        if let Some(&second) = self.0.get(1) {
            if second > 39 {
                return Err(DerError::encoding("second integer of oid is out of range"));
            }
            packed += second;
        }

        let mut out = Vec::new();
        encode128(packed, &mut out);
        for &arc in self.0.iter().skip(2) {
            encode128(arc, &mut out);
        }
        Ok(out)
    }

    /// Decode an OID payload.
    ///
    /// # Errors
    ///
    /// Returns `DerError::Decoding` if the payload is empty or ends in the
    /// middle of an arc.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.is_empty() {
            return Err(DerError::decoding("empty oid payload"));
        }

        let mut offset = 0;
        let packed = decode128(payload, &mut offset)?;
        let first = (packed / 40).min(2);
        let mut arcs = vec![first, packed - first * 40];

        while offset < payload.len() {
            arcs.push(decode128(payload, &mut offset)?);
        }
        Ok(Self(arcs))
    }
}

impl From<Vec<u64>> for Oid {
    fn from(arcs: Vec<u64>) -> Self {
        Self(arcs)
    }
}

impl FromStr for Oid {
    type Err = DerError;

    fn from_str(s: &str) -> Result<Self> {
        let arcs = s
            .split('.')
            .map(|part| {
                part.trim()
                    .parse::<u64>()
                    .map_err(|e| DerError::encoding(format!("invalid oid arc `{part}`: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(arcs))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
            first = false;
        }
        Ok(())
    }
}

/// Append `value` in base-128 big-endian form.
#[allow(clippy::cast_possible_truncation)]
pub fn encode128(mut value: u64, out: &mut Vec<u8>) {
    let mut buf = [0u8; 10];
    let mut idx = buf.len() - 1;
    buf[idx] = (value & 0x7f) as u8;
    value >>= 7;

    while value != 0 {
        idx -= 1;
        buf[idx] = ((value & 0x7f) as u8) | 0x80;
        value >>= 7;
    }
    out.extend_from_slice(&buf[idx..]);
}

/// Read one base-128 value starting at `*offset`, advancing it.
///
/// # Errors
///
/// Returns `DerError::Decoding` if the input ends while the continuation bit
/// is still set, or the value overflows 64 bits.
pub fn decode128(payload: &[u8], offset: &mut usize) -> Result<u64> {
    let mut result: u64 = 0;
    loop {
        let byte = *payload
            .get(*offset)
            .ok_or_else(|| DerError::decoding("truncated base-128 integer"))?;
        *offset += 1;

        result = result
            .checked_mul(128)
            .and_then(|r| r.checked_add(u64::from(byte & 0x7f)))
            .ok_or_else(|| DerError::decoding("base-128 integer overflow"))?;

        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }
}

/// Well-known algorithm identifiers used by NDN certificates.
pub mod known {
    /// `rsaEncryption`
    pub const RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
    /// `id-ecPublicKey`
    pub const EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
    /// `prime256v1`
    pub const PRIME256V1: &str = "1.2.840.10045.3.1.7";
    /// `id-at-name`, the default subject description attribute
    pub const ATTRIBUTE_NAME: &str = "2.5.4.41";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode128_small_and_large() {
        let mut out = Vec::new();
        encode128(5, &mut out);
        assert_eq!(out, vec![0x05]);

        out.clear();
        encode128(113_549, &mut out);
        assert_eq!(out, vec![0x86, 0xf7, 0x0d]);

        out.clear();
        encode128(128, &mut out);
        assert_eq!(out, vec![0x81, 0x00]);
    }

    #[test]
    fn rsa_oid_payload() {
        let oid: Oid = known::RSA_ENCRYPTION.parse().unwrap();
        let payload = oid.to_payload().unwrap();
        assert_eq!(
            payload,
            vec![0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01]
        );
        assert_eq!(Oid::from_payload(&payload).unwrap(), oid);
    }

    #[test]
    fn packed_first_byte() {
        for first in 0..=2u64 {
            for second in [0u64, 1, 17, 39] {
                let oid = Oid::new(vec![first, second, 300, 7]);
                let payload = oid.to_payload().unwrap();
                assert_eq!(u64::from(payload[0]), first * 40 + second);
                assert_eq!(Oid::from_payload(&payload).unwrap(), oid);
            }
        }
    }

    #[test]
    fn out_of_range_arcs() {
        assert!(matches!(
            Oid::new(vec![3, 1]).to_payload(),
            Err(DerError::Encoding(_))
        ));
        assert!(matches!(
            Oid::new(vec![1, 40]).to_payload(),
            Err(DerError::Encoding(_))
        ));
        assert!(Oid::new(vec![]).to_payload().is_err());
    }

    #[test]
    fn truncated_arc() {
        assert!(Oid::from_payload(&[0x2a, 0x86]).is_err());
    }

    #[test]
    fn display_and_parse() {
        let oid: Oid = "2.5.4.41".parse().unwrap();
        assert_eq!(oid.to_string(), "2.5.4.41");
        assert!("2.x.4".parse::<Oid>().is_err());
    }
}
