//! Names and name components.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{PacketError, Result};
use crate::tlv::{self, TlvReader};

/// Marker byte that prefixes a version number component.
pub const VERSION_MARKER: u8 = 0xfd;

/// One opaque name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Component(Vec<u8>);

impl Component {
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// A component holding `n` as a nonNegativeInteger.
    #[must_use]
    pub fn from_number(n: u64) -> Self {
        Self(tlv::encode_non_negative(n))
    }

    /// A version component (marker `0xFD` followed by the number).
    #[must_use]
    pub fn from_version(version: u64) -> Self {
        let mut bytes = vec![VERSION_MARKER];
        bytes.extend(tlv::encode_non_negative(version));
        Self(bytes)
    }

    /// Parse one component from its URI form, undoing percent escapes.
    ///
    /// # Errors
    ///
    /// Returns `PacketError::InvalidUri` for `.`/`..` and bad escapes.
    pub fn from_escaped(text: &str) -> Result<Self> {
        let mut bytes = Vec::with_capacity(text.len());
        let raw = text.as_bytes();
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'%' {
                let hex = raw
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| PacketError::InvalidUri(format!("bad escape in `{text}`")))?;
                bytes.push(hex);
                i += 3;
            } else {
                bytes.push(raw[i]);
                i += 1;
            }
        }

        if !bytes.is_empty() && bytes.iter().all(|&b| b == b'.') {
            if bytes.len() < 3 {
                return Err(PacketError::InvalidUri(format!(
                    "component `{text}` is a relative path segment"
                )));
            }
            bytes.truncate(bytes.len() - 3);
        }
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self.0.len(), 1 | 2 | 4 | 8)
    }

    /// Interpret the component as a nonNegativeInteger.
    ///
    /// # Errors
    ///
    /// Returns `PacketError::NotANumber` if the length is not 1, 2, 4 or 8.
    pub fn to_number(&self) -> Result<u64> {
        tlv::decode_non_negative(&self.0)
    }

    #[must_use]
    pub fn is_version(&self) -> bool {
        self.0.first() == Some(&VERSION_MARKER) && matches!(self.0.len() - 1, 1 | 2 | 4 | 8)
    }

    /// Interpret the component as a version.
    ///
    /// # Errors
    ///
    /// Returns `PacketError::NotANumber` if the component is not a version.
    pub fn to_version(&self) -> Result<u64> {
        if !self.is_version() {
            return Err(PacketError::NotANumber);
        }
        tlv::decode_non_negative(&self.0[1..])
    }

    /// URI form: bytes outside `[A-Za-z0-9._~-]` are percent-escaped, and a
    /// component of only periods gains three more.
    #[must_use]
    pub fn to_uri(&self) -> String {
        if self.0.iter().all(|&b| b == b'.') {
            return ".".repeat(self.0.len() + 3);
        }
        let mut out = String::with_capacity(self.0.len());
        for &b in &self.0 {
            if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'~' | b'-') {
                out.push(char::from(b));
            } else {
                out.push('%');
                out.push_str(&hex::encode_upper([b]));
            }
        }
        out
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        tlv::write_tlv(out, tlv::NAME_COMPONENT, &self.0);
    }
}

impl From<&str> for Component {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Component {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

/// An ordered sequence of components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name(Vec<Component>);

impl Name {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a URI such as `/ndn/edu` or `ndn:/ndn/edu`.
    ///
    /// # Errors
    ///
    /// Returns `PacketError::InvalidUri` for malformed components.
    pub fn parse(uri: &str) -> Result<Self> {
        let mut rest = uri.trim();
        if let Some(stripped) = rest.strip_prefix("ndn:") {
            rest = stripped;
        }
        if let Some(authority) = rest.strip_prefix("//") {
            rest = authority.find('/').map_or("", |idx| &authority[idx..]);
        }

        rest.split('/')
            .filter(|segment| !segment.is_empty())
            .map(Component::from_escaped)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Component at `index`; negative indices count from the end.
    #[must_use]
    pub fn get(&self, index: isize) -> Option<&Component> {
        let idx = if index < 0 {
            self.0.len().checked_sub(index.unsigned_abs())?
        } else {
            index.unsigned_abs()
        };
        self.0.get(idx)
    }

    /// The first `n` components; a negative `n` drops `|n|` from the end.
    #[must_use]
    pub fn get_prefix(&self, n: isize) -> Self {
        let len = if n < 0 {
            self.0.len().saturating_sub(n.unsigned_abs())
        } else {
            n.unsigned_abs().min(self.0.len())
        };
        Self(self.0[..len].to_vec())
    }

    /// Up to `count` components starting at `start`.
    #[must_use]
    pub fn get_sub_name(&self, start: usize, count: usize) -> Self {
        let start = start.min(self.0.len());
        let end = start.saturating_add(count).min(self.0.len());
        Self(self.0[start..end].to_vec())
    }

    /// Append a component, builder style.
    #[must_use]
    pub fn append(mut self, component: impl Into<Component>) -> Self {
        self.0.push(component.into());
        self
    }

    pub fn push(&mut self, component: impl Into<Component>) {
        self.0.push(component.into());
    }

    /// Append all components of `other`.
    #[must_use]
    pub fn append_name(mut self, other: &Self) -> Self {
        self.0.extend_from_slice(&other.0);
        self
    }

    /// Whether every component of `self` starts `other` (a name is a prefix
    /// of itself).
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a == b)
    }

    /// URI form, `/` for the empty name.
    #[must_use]
    pub fn to_uri(&self) -> String {
        if self.0.is_empty() {
            return "/".to_owned();
        }
        self.0.iter().fold(String::new(), |mut out, c| {
            out.push('/');
            out.push_str(&c.to_uri());
            out
        })
    }

    /// Concatenated component TLVs (the Name element's value).
    #[must_use]
    pub fn encode_value(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for component in &self.0 {
            component.encode_into(&mut out);
        }
        out
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        tlv::write_tlv(out, tlv::NAME, &self.encode_value());
    }

    #[must_use]
    pub fn wire_encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    /// Decode a complete Name element.
    ///
    /// # Errors
    ///
    /// Returns a TLV error if the input is not a single Name element.
    pub fn wire_decode(wire: &[u8]) -> Result<Self> {
        Self::decode_value(tlv::read_single(wire, tlv::NAME)?)
    }

    pub(crate) fn decode_value(value: &[u8]) -> Result<Self> {
        let mut reader = TlvReader::new(value);
        let mut components = Vec::new();
        while !reader.is_empty() {
            components.push(Component::new(reader.expect(tlv::NAME_COMPONENT)?));
        }
        Ok(Self(components))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(&other.0) {
            match a.cmp(b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Name {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl From<Vec<Component>> for Name {
    fn from(components: Vec<Component>) -> Self {
        Self(components)
    }
}

impl<'a> IntoIterator for &'a Name {
    type Item = &'a Component;
    type IntoIter = std::slice::Iter<'a, Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let name = Name::parse("ndn:/ndn/edu/ucla%20x/").unwrap();
        assert_eq!(name.len(), 3);
        assert_eq!(name.get(2).unwrap().value(), b"ucla x");
        assert_eq!(name.to_string(), "/ndn/edu/ucla%20x");
        assert_eq!(Name::parse("/").unwrap(), Name::new());
        assert_eq!(Name::new().to_uri(), "/");
        assert_eq!(Name::parse("//authority/a").unwrap().to_uri(), "/a");
    }

    #[test]
    fn period_components() {
        let name = Name::parse("/a/.../....").unwrap();
        assert!(name.get(1).unwrap().is_empty());
        assert_eq!(name.get(2).unwrap().value(), b".");
        assert_eq!(name.to_uri(), "/a/.../....");
        assert!(Name::parse("/a/..").is_err());
        assert!(Name::parse("/a/%zz").is_err());
    }

    #[test]
    fn prefixes() {
        let name: Name = "/a/b/c/d".parse().unwrap();
        assert_eq!(name.get_prefix(2).to_uri(), "/a/b");
        assert_eq!(name.get_prefix(-1).to_uri(), "/a/b/c");
        assert_eq!(name.get_prefix(-10), Name::new());
        assert_eq!(name.get_prefix(10), name);
        assert_eq!(name.get(-1).unwrap().value(), b"d");
        assert!(name.get(-5).is_none());
        assert_eq!(name.get_sub_name(1, 2).to_uri(), "/b/c");

        assert!(name.get_prefix(2).is_prefix_of(&name));
        assert!(name.is_prefix_of(&name));
        assert!(!name.is_prefix_of(&name.get_prefix(3)));
        assert!(Name::new().is_prefix_of(&name));
    }

    #[test]
    fn numbers_and_versions() {
        let number = Component::from_number(1_384_802_400_000);
        assert_eq!(number.len(), 8);
        assert_eq!(number.to_number().unwrap(), 1_384_802_400_000);

        let version = Component::from_version(7);
        assert!(version.is_version());
        assert_eq!(version.to_version().unwrap(), 7);
        assert_eq!(version.to_uri(), "%FD%07");
        assert!(!Component::from("abc").is_version());
        assert_eq!(Component::from("abc").to_number(), Err(PacketError::NotANumber));
    }

    #[test]
    fn canonical_order() {
        let mut names: Vec<Name> = ["/a/bb", "/a/c", "/a", "/b", "/a/c/d"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        names.sort();
        let uris: Vec<String> = names.iter().map(Name::to_uri).collect();
        assert_eq!(uris, ["/a", "/a/c", "/a/c/d", "/a/bb", "/b"]);
    }

    #[test]
    fn wire_roundtrip() {
        let name = Name::parse("/ndn/KEY/%00%01").unwrap().append(Component::from_version(3));
        let wire = name.wire_encode();
        assert_eq!(wire[0], 7);
        assert_eq!(Name::wire_decode(&wire).unwrap(), name);
    }
}
