//! NDN-TLV var-number and nonNegativeInteger codec.

use crate::error::{PacketError, Result};

pub const INTEREST: u64 = 5;
pub const DATA: u64 = 6;
pub const NAME: u64 = 7;
pub const NAME_COMPONENT: u64 = 8;
pub const NONCE: u64 = 10;
pub const INTEREST_LIFETIME: u64 = 12;
pub const META_INFO: u64 = 20;
pub const CONTENT: u64 = 21;
pub const SIGNATURE_INFO: u64 = 22;
pub const SIGNATURE_VALUE: u64 = 23;
pub const CONTENT_TYPE: u64 = 24;
pub const FRESHNESS_PERIOD: u64 = 25;
pub const SIGNATURE_TYPE: u64 = 27;
pub const KEY_LOCATOR: u64 = 28;
pub const KEY_DIGEST: u64 = 29;

/// Append a var-number (1, 3, 5 or 9 bytes).
#[allow(clippy::cast_possible_truncation)]
pub fn write_var_number(out: &mut Vec<u8>, n: u64) {
    if n < 253 {
        out.push(n as u8);
    } else if let Ok(n) = u16::try_from(n) {
        out.push(253);
        out.extend_from_slice(&n.to_be_bytes());
    } else if let Ok(n) = u32::try_from(n) {
        out.push(254);
        out.extend_from_slice(&n.to_be_bytes());
    } else {
        out.push(255);
        out.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a nonNegativeInteger in the shortest of 1, 2, 4 or 8 bytes.
#[must_use]
pub fn encode_non_negative(n: u64) -> Vec<u8> {
    let width = match n {
        0..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xffff_ffff => 4,
        _ => 8,
    };
    n.to_be_bytes()[8 - width..].to_vec()
}

/// Decode a 1, 2, 4 or 8 byte nonNegativeInteger.
///
/// # Errors
///
/// Returns `PacketError::NotANumber` for any other length.
pub fn decode_non_negative(bytes: &[u8]) -> Result<u64> {
    match bytes.len() {
        1 | 2 | 4 | 8 => Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))),
        _ => Err(PacketError::NotANumber),
    }
}

/// Append a complete TLV element.
pub fn write_tlv(out: &mut Vec<u8>, tlv_type: u64, value: &[u8]) {
    write_var_number(out, tlv_type);
    write_var_number(out, value.len() as u64);
    out.extend_from_slice(value);
}

/// Append a TLV element holding a nonNegativeInteger.
pub fn write_non_negative_tlv(out: &mut Vec<u8>, tlv_type: u64, n: u64) {
    write_tlv(out, tlv_type, &encode_non_negative(n));
}

/// Cursor over a TLV byte stream.
#[derive(Debug, Clone)]
pub struct TlvReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TlvReader<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(PacketError::UnexpectedEnd)?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read one var-number.
    ///
    /// # Errors
    ///
    /// Returns `PacketError::UnexpectedEnd` on truncated input.
    pub fn read_var_number(&mut self) -> Result<u64> {
        let first = self.take(1)?[0];
        let width = match first {
            253 => 2,
            254 => 4,
            255 => 8,
            n => return Ok(u64::from(n)),
        };
        Ok(self
            .take(width)?
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }

    /// Type of the next element, without consuming it.
    ///
    /// # Errors
    ///
    /// Returns `PacketError::UnexpectedEnd` at end of input.
    pub fn peek_type(&self) -> Result<u64> {
        self.clone().read_var_number()
    }

    /// Read the next element as `(type, value)`.
    ///
    /// # Errors
    ///
    /// Returns `PacketError::UnexpectedEnd` if the element is truncated.
    pub fn read_tlv(&mut self) -> Result<(u64, &'a [u8])> {
        let tlv_type = self.read_var_number()?;
        let len = usize::try_from(self.read_var_number()?)
            .map_err(|_| PacketError::tlv("length does not fit in memory"))?;
        Ok((tlv_type, self.take(len)?))
    }

    /// Read the next element and require it to be of `expected` type.
    ///
    /// # Errors
    ///
    /// Returns `PacketError::Tlv` on a type mismatch.
    pub fn expect(&mut self, expected: u64) -> Result<&'a [u8]> {
        let (tlv_type, value) = self.read_tlv()?;
        if tlv_type != expected {
            return Err(PacketError::tlv(format!(
                "expected TLV type {expected}, found {tlv_type}"
            )));
        }
        Ok(value)
    }

    /// Read the next element if it has type `wanted`.
    ///
    /// # Errors
    ///
    /// Returns `PacketError::UnexpectedEnd` if the element is truncated.
    pub fn read_optional(&mut self, wanted: u64) -> Result<Option<&'a [u8]>> {
        if self.is_empty() || self.peek_type()? != wanted {
            return Ok(None);
        }
        self.expect(wanted).map(Some)
    }
}

/// Parse a buffer that must hold exactly one element of `expected` type.
///
/// # Errors
///
/// Returns `PacketError::Tlv` on a type mismatch or trailing bytes.
pub fn read_single(data: &[u8], expected: u64) -> Result<&[u8]> {
    let mut reader = TlvReader::new(data);
    let value = reader.expect(expected)?;
    if !reader.is_empty() {
        return Err(PacketError::tlv("trailing bytes after element"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_number_widths() {
        for (n, width) in [(0u64, 1usize), (252, 1), (253, 3), (65_535, 3), (65_536, 5), (1 << 32, 9)] {
            let mut out = Vec::new();
            write_var_number(&mut out, n);
            assert_eq!(out.len(), width, "n = {n}");
            assert_eq!(TlvReader::new(&out).read_var_number().unwrap(), n);
        }
    }

    #[test]
    fn non_negative_widths() {
        assert_eq!(encode_non_negative(0), vec![0]);
        assert_eq!(encode_non_negative(256), vec![1, 0]);
        assert_eq!(encode_non_negative(70_000).len(), 4);
        assert_eq!(encode_non_negative(u64::MAX).len(), 8);
        assert_eq!(decode_non_negative(&[1, 0]).unwrap(), 256);
        assert_eq!(decode_non_negative(&[1, 0, 0]), Err(PacketError::NotANumber));
    }

    #[test]
    fn truncated_element() {
        let mut out = Vec::new();
        write_tlv(&mut out, CONTENT, b"hello");
        out.pop();
        assert_eq!(
            TlvReader::new(&out).read_tlv(),
            Err(PacketError::UnexpectedEnd)
        );
    }

    #[test]
    fn optional_elements() {
        let mut out = Vec::new();
        write_non_negative_tlv(&mut out, CONTENT_TYPE, 2);
        let mut reader = TlvReader::new(&out);
        assert_eq!(reader.read_optional(FRESHNESS_PERIOD).unwrap(), None);
        assert_eq!(reader.read_optional(CONTENT_TYPE).unwrap(), Some(&[2u8][..]));
        assert!(reader.is_empty());
        assert_eq!(reader.read_optional(CONTENT_TYPE).unwrap(), None);
    }
}
