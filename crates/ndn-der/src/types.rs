//! Universal tag numbers.

use std::fmt;

/// DER universal tag kinds.
///
/// Only the first group (boolean through generalized time) is understood by
/// [`DerNode::parse`](crate::DerNode::parse); the remaining tags are listed so
/// that error messages and the tree printer can name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DerType {
    Boolean = 1,
    Integer = 2,
    BitString = 3,
    OctetString = 4,
    Null = 5,
    ObjectIdentifier = 6,
    PrintableString = 19,
    GeneralizedTime = 24,
    Sequence = 48,

    Eoc = 0,
    ObjectDescriptor = 7,
    Real = 9,
    Enumerated = 10,
    Utf8String = 12,
    RelativeOid = 13,
    NumericString = 18,
    T61String = 20,
    Ia5String = 22,
    UtcTime = 23,
    Set = 49,
}

impl DerType {
    /// Map a tag byte to its kind, if known.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Eoc,
            1 => Self::Boolean,
            2 => Self::Integer,
            3 => Self::BitString,
            4 => Self::OctetString,
            5 => Self::Null,
            6 => Self::ObjectIdentifier,
            7 => Self::ObjectDescriptor,
            9 => Self::Real,
            10 => Self::Enumerated,
            12 => Self::Utf8String,
            13 => Self::RelativeOid,
            18 => Self::NumericString,
            19 => Self::PrintableString,
            20 => Self::T61String,
            22 => Self::Ia5String,
            23 => Self::UtcTime,
            24 => Self::GeneralizedTime,
            48 => Self::Sequence,
            49 => Self::Set,
            _ => return None,
        })
    }

    /// The tag byte written at the start of the header.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Whether nodes of this kind hold children instead of a payload.
    #[must_use]
    pub const fn is_constructed(self) -> bool {
        matches!(self, Self::Sequence | Self::Set)
    }

    /// Whether [`DerNode::parse`](crate::DerNode::parse) can decode this kind.
    #[must_use]
    pub const fn is_implemented(self) -> bool {
        matches!(
            self,
            Self::Boolean
                | Self::Integer
                | Self::BitString
                | Self::OctetString
                | Self::Null
                | Self::ObjectIdentifier
                | Self::PrintableString
                | Self::GeneralizedTime
                | Self::Sequence
        )
    }
}

impl fmt::Display for DerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "BOOLEAN",
            Self::Integer => "INTEGER",
            Self::BitString => "BIT STRING",
            Self::OctetString => "OCTET STRING",
            Self::Null => "NULL",
            Self::ObjectIdentifier => "OBJECT IDENTIFIER",
            Self::PrintableString => "PrintableString",
            Self::GeneralizedTime => "GeneralizedTime",
            Self::Sequence => "SEQUENCE",
            Self::Eoc => "EOC",
            Self::ObjectDescriptor => "ObjectDescriptor",
            Self::Real => "REAL",
            Self::Enumerated => "ENUMERATED",
            Self::Utf8String => "UTF8String",
            Self::RelativeOid => "RELATIVE-OID",
            Self::NumericString => "NumericString",
            Self::T61String => "T61String",
            Self::Ia5String => "IA5String",
            Self::UtcTime => "UTCTime",
            Self::Set => "SET",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        for tag in 0..=u8::MAX {
            if let Some(kind) = DerType::from_tag(tag) {
                assert_eq!(kind.tag(), tag);
            }
        }
    }

    #[test]
    fn implemented_kinds() {
        assert!(DerType::Sequence.is_implemented());
        assert!(DerType::GeneralizedTime.is_implemented());
        assert!(!DerType::Set.is_implemented());
        assert!(!DerType::UtcTime.is_implemented());
    }
}
