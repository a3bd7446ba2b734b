//! DER node tree, header codec and recursive-descent parser.

use crate::error::{DerError, Result};
use crate::oid::Oid;
use crate::time::{self, Timestamp};
use crate::types::DerType;

/// Longest long-form length accepted by the decoder, in bytes.
const MAX_LENGTH_BYTES: usize = 8;

/// Deepest nesting of constructed nodes the decoder will follow.
pub const MAX_DEPTH: usize = 32;

/// Content of a node: raw payload for primitives, owned children for
/// sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Primitive(Vec<u8>),
    Constructed(Vec<DerNode>),
}

/// One node of a DER tree.
///
/// Sizes and headers are derived from the current contents every time they
/// are asked for, so children can be pushed or replaced freely without any
/// bookkeeping in the parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerNode {
    kind: DerType,
    body: Body,
}

impl DerNode {
    fn primitive(kind: DerType, payload: Vec<u8>) -> Self {
        Self {
            kind,
            body: Body::Primitive(payload),
        }
    }

    /// A BOOLEAN (`0xFF` for true, `0x00` for false).
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::primitive(DerType::Boolean, vec![if value { 0xff } else { 0x00 }])
    }

    /// An INTEGER holding the given big-endian two's complement bytes.
    #[must_use]
    pub fn integer(bytes: impl Into<Vec<u8>>) -> Self {
        Self::primitive(DerType::Integer, bytes.into())
    }

    /// An INTEGER holding `value` in minimal two's complement form.
    #[must_use]
    pub fn integer_from_i64(value: i64) -> Self {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < bytes.len() - 1 {
            let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        Self::integer(&bytes[start..])
    }

    /// A BIT STRING; the payload is the count of unused trailing bits followed
    /// by `bits`.
    #[must_use]
    pub fn bit_string(bits: &[u8], unused_bits: u8) -> Self {
        let mut payload = Vec::with_capacity(bits.len() + 1);
        payload.push(unused_bits);
        payload.extend_from_slice(bits);
        Self::primitive(DerType::BitString, payload)
    }

    /// An OCTET STRING.
    #[must_use]
    pub fn octet_string(bytes: impl Into<Vec<u8>>) -> Self {
        Self::primitive(DerType::OctetString, bytes.into())
    }

    /// A NULL.
    #[must_use]
    pub fn null() -> Self {
        Self::primitive(DerType::Null, Vec::new())
    }

    /// An OBJECT IDENTIFIER.
    ///
    /// # Errors
    ///
    /// Returns `DerError::Encoding` if the arcs cannot be packed.
    pub fn oid(oid: &Oid) -> Result<Self> {
        Ok(Self::primitive(DerType::ObjectIdentifier, oid.to_payload()?))
    }

    /// A PrintableString.
    #[must_use]
    pub fn printable_string(text: &str) -> Self {
        Self::primitive(DerType::PrintableString, text.as_bytes().to_vec())
    }

    /// A GeneralizedTime for a millisecond timestamp.
    ///
    /// # Errors
    ///
    /// Returns `DerError::InvalidTime` if the timestamp cannot be formatted.
    pub fn generalized_time(ms: Timestamp) -> Result<Self> {
        Ok(Self::primitive(
            DerType::GeneralizedTime,
            time::to_der_string(ms)?.into_bytes(),
        ))
    }

    /// A SEQUENCE owning `children`.
    #[must_use]
    pub const fn sequence(children: Vec<Self>) -> Self {
        Self {
            kind: DerType::Sequence,
            body: Body::Constructed(children),
        }
    }

    /// The node's tag kind.
    #[must_use]
    pub const fn kind(&self) -> DerType {
        self.kind
    }

    /// The node's body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Raw payload for primitive nodes.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Primitive(payload) => Some(payload),
            Body::Constructed(_) => None,
        }
    }

    /// Children of a sequence; empty for primitives.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.body {
            Body::Primitive(_) => &[],
            Body::Constructed(children) => children,
        }
    }

    /// Mutable access to a sequence's children.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Self>> {
        match &mut self.body {
            Body::Primitive(_) => None,
            Body::Constructed(children) => Some(children),
        }
    }

    /// Append a child to a sequence.
    ///
    /// # Errors
    ///
    /// Returns `DerError::Encoding` if this node is a primitive.
    pub fn push(&mut self, child: Self) -> Result<()> {
        let kind = self.kind;
        self.children_mut()
            .ok_or_else(|| DerError::encoding(format!("cannot add a child to {kind}")))?
            .push(child);
        Ok(())
    }

    /// Child at `index`, or a decoding error naming `what` was expected there.
    ///
    /// # Errors
    ///
    /// Returns `DerError::Decoding` if the child is missing.
    pub fn child(&self, index: usize, what: &str) -> Result<&Self> {
        self.children()
            .get(index)
            .ok_or_else(|| DerError::decoding(format!("missing {what} at position {index}")))
    }

    /// Length of the payload, or the summed sizes of the children.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match &self.body {
            Body::Primitive(payload) => payload.len(),
            Body::Constructed(children) => children.iter().map(Self::size).sum(),
        }
    }

    /// Header bytes for the current contents.
    ///
    /// # Errors
    ///
    /// Returns `DerError::Encoding` if the payload length does not fit a
    /// header.
    pub fn header(&self) -> Result<Vec<u8>> {
        let len = i64::try_from(self.payload_len())
            .map_err(|_| DerError::encoding("payload too large"))?;
        encode_header(self.kind.tag(), len)
    }

    /// Total encoded size, header included.
    #[must_use]
    pub fn size(&self) -> usize {
        let len = self.payload_len();
        header_len(len) + len
    }

    /// Serialize the tree.
    ///
    /// # Errors
    ///
    /// Returns an error if any header cannot be produced.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.size());
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Serialize the tree onto the end of `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if any header cannot be produced.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.header()?);
        match &self.body {
            Body::Primitive(payload) => out.extend_from_slice(payload),
            Body::Constructed(children) => {
                for child in children {
                    child.encode_into(out)?;
                }
            }
        }
        Ok(())
    }

    /// Decode exactly one node spanning all of `data`.
    ///
    /// # Errors
    ///
    /// Returns a decoding error if the input is malformed, truncated, uses an
    /// unimplemented tag, or has trailing bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = DerReader::new(data);
        let node = Self::parse(&mut reader)?;
        if !reader.is_empty() {
            return Err(DerError::decoding(format!(
                "{} trailing bytes after DER node",
                reader.remaining()
            )));
        }
        Ok(node)
    }

    /// Parse the next node from `reader`, dispatching on the peeked tag.
    ///
    /// # Errors
    ///
    /// Returns `DerError::UnimplementedType` for tags outside the supported
    /// set, and other decoding errors for malformed input or nesting deeper
    /// than [`MAX_DEPTH`].
    pub fn parse(reader: &mut DerReader<'_>) -> Result<Self> {
        Self::parse_nested(reader, 0)
    }

    fn parse_nested(reader: &mut DerReader<'_>, depth: usize) -> Result<Self> {
        let tag = reader.peek()?;
        let kind = DerType::from_tag(tag)
            .filter(|kind| kind.is_implemented())
            .ok_or(DerError::UnimplementedType(tag))?;

        let (_, len) = decode_header(reader)?;
        let body = reader.take(len)?;
        if !kind.is_constructed() {
            return Ok(Self::primitive(kind, body.to_vec()));
        }
        if depth >= MAX_DEPTH {
            return Err(DerError::decoding(format!(
                "{kind} nested deeper than {MAX_DEPTH} levels"
            )));
        }

        // Children are read from the parent's declared span only; running
        // out of bytes there is a framing error, not a short read.
        let mut inner = DerReader::new(body);
        let mut children = Vec::new();
        while !inner.is_empty() {
            let child = Self::parse_nested(&mut inner, depth + 1).map_err(|e| {
                if e.is_truncation() {
                    DerError::decoding(format!(
                        "{kind} child overruns the declared length of {len} bytes"
                    ))
                } else {
                    e
                }
            })?;
            children.push(child);
        }
        Ok(Self::sequence(children))
    }
}

/// Cursor over DER input.
#[derive(Debug, Clone)]
pub struct DerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Look at the next byte without consuming it.
    ///
    /// # Errors
    ///
    /// Returns `DerError::UnexpectedEnd` at end of input.
    pub fn peek(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(DerError::UnexpectedEnd {
                needed: 1,
                available: 0,
            })
    }

    /// Consume one byte.
    ///
    /// # Errors
    ///
    /// Returns `DerError::UnexpectedEnd` at end of input.
    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Consume `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `DerError::UnexpectedEnd` if fewer than `len` bytes remain.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(DerError::UnexpectedEnd {
                needed: len,
                available,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

fn header_len(len: usize) -> usize {
    if len < 127 {
        2
    } else {
        2 + minimal_be_bytes(len as u64).len()
    }
}

fn minimal_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[skip.min(bytes.len() - 1)..].to_vec()
}

/// Build a header for `tag` and a payload of `size` bytes.
///
/// Sizes below 127 use the one-byte short form; larger sizes use the long
/// form with the minimal number of big-endian length bytes.
///
/// # Errors
///
/// Returns `DerError::NegativeLength` if `size` is negative.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode_header(tag: u8, size: i64) -> Result<Vec<u8>> {
    if size < 0 {
        return Err(DerError::NegativeLength);
    }
    let mut header = vec![tag];
    if size < 127 {
        header.push(size as u8);
    } else {
        let len_bytes = minimal_be_bytes(size as u64);
        header.push(0x80 | len_bytes.len() as u8);
        header.extend_from_slice(&len_bytes);
    }
    Ok(header)
}

/// Read a tag byte and a short- or long-form length.
///
/// # Errors
///
/// Returns `DerError::UnexpectedEnd` on truncated input and
/// `DerError::Decoding` for indefinite, oversized or non-minimal lengths.
/// Lengths below 127 must use the short form and long-form lengths must
/// not carry leading zero bytes, matching [`encode_header`].
pub fn decode_header(reader: &mut DerReader<'_>) -> Result<(u8, usize)> {
    let tag = reader.read_u8()?;
    let first = reader.read_u8()?;
    if first & 0x80 == 0 {
        return Ok((tag, usize::from(first)));
    }

    let count = usize::from(first & 0x7f);
    if count == 0 {
        return Err(DerError::decoding("indefinite length is not allowed in DER"));
    }
    if count > MAX_LENGTH_BYTES {
        return Err(DerError::decoding(format!("length uses {count} bytes")));
    }

    let bytes = reader.take(count)?;
    if bytes[0] == 0 {
        return Err(DerError::decoding("long-form length has a leading zero byte"));
    }
    let mut size = 0usize;
    for &byte in bytes {
        size = size
            .checked_mul(256)
            .and_then(|s| s.checked_add(usize::from(byte)))
            .ok_or_else(|| DerError::decoding("length overflow"))?;
    }
    if size < 127 {
        return Err(DerError::decoding(format!(
            "length {size} must use the short form"
        )));
    }
    Ok((tag, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::known;

    fn sample_tree() -> DerNode {
        DerNode::sequence(vec![
            DerNode::sequence(vec![
                DerNode::generalized_time(1_384_802_400_000).unwrap(),
                DerNode::generalized_time(1_416_338_400_000).unwrap(),
            ]),
            DerNode::sequence(vec![DerNode::sequence(vec![
                DerNode::oid(&known::ATTRIBUTE_NAME.parse().unwrap()).unwrap(),
                DerNode::printable_string("/ndn/test"),
            ])]),
            DerNode::sequence(vec![
                DerNode::sequence(vec![
                    DerNode::oid(&known::EC_PUBLIC_KEY.parse().unwrap()).unwrap(),
                    DerNode::null(),
                ]),
                DerNode::bit_string(&[0x04; 65], 0),
            ]),
            DerNode::sequence(vec![DerNode::sequence(vec![
                DerNode::oid(&"1.3.6.1.5.32".parse().unwrap()).unwrap(),
                DerNode::boolean(true),
                DerNode::octet_string(vec![0xab; 300]),
            ])]),
            DerNode::integer_from_i64(-129),
        ])
    }

    #[test]
    fn header_boundaries() {
        assert_eq!(encode_header(4, 0).unwrap(), vec![4, 0]);
        assert_eq!(encode_header(4, 126).unwrap(), vec![4, 126]);
        assert_eq!(encode_header(4, 127).unwrap(), vec![4, 0x81, 127]);
        assert_eq!(encode_header(4, 255).unwrap(), vec![4, 0x81, 0xff]);
        assert_eq!(encode_header(4, 256).unwrap(), vec![4, 0x82, 0x01, 0x00]);
        assert_eq!(
            encode_header(48, 0x01_0000).unwrap(),
            vec![48, 0x83, 0x01, 0x00, 0x00]
        );
        assert_eq!(encode_header(4, -1), Err(DerError::NegativeLength));
    }

    #[test]
    fn header_decode_long_form() {
        let mut reader = DerReader::new(&[0x30, 0x82, 0x01, 0x2c]);
        assert_eq!(decode_header(&mut reader).unwrap(), (0x30, 300));
        assert!(reader.is_empty());

        let mut indefinite = DerReader::new(&[0x30, 0x80]);
        assert!(decode_header(&mut indefinite).is_err());
    }

    #[test]
    fn tree_roundtrip() {
        let tree = sample_tree();
        let bytes = tree.encode().unwrap();
        assert_eq!(bytes.len(), tree.size());

        let decoded = DerNode::decode(&bytes).unwrap();
        assert_eq!(decoded, tree);
        assert_eq!(decoded.header().unwrap(), tree.header().unwrap());
        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn mutation_updates_size() {
        let mut tree = DerNode::sequence(vec![DerNode::null()]);
        assert_eq!(tree.size(), 4);

        tree.push(DerNode::octet_string(vec![0; 200])).unwrap();
        assert_eq!(tree.payload_len(), 2 + 203);
        assert_eq!(tree.header().unwrap(), vec![48, 0x81, 205]);
        assert_eq!(tree.encode().unwrap().len(), tree.size());

        assert!(DerNode::null().push(DerNode::null()).is_err());
    }

    #[test]
    fn minimal_integers() {
        assert_eq!(DerNode::integer_from_i64(0).payload(), Some(&[0x00][..]));
        assert_eq!(DerNode::integer_from_i64(127).payload(), Some(&[0x7f][..]));
        assert_eq!(DerNode::integer_from_i64(128).payload(), Some(&[0x00, 0x80][..]));
        assert_eq!(DerNode::integer_from_i64(-1).payload(), Some(&[0xff][..]));
        assert_eq!(DerNode::integer_from_i64(-129).payload(), Some(&[0xff, 0x7f][..]));
    }

    #[test]
    fn unknown_tag_fails() {
        assert_eq!(
            DerNode::decode(&[0x31, 0x00]),
            Err(DerError::UnimplementedType(0x31))
        );
        assert_eq!(
            DerNode::decode(&[0x1f, 0x00]),
            Err(DerError::UnimplementedType(0x1f))
        );
    }

    #[test]
    fn truncated_input_fails() {
        let bytes = sample_tree().encode().unwrap();
        for cut in [0, 1, 2, bytes.len() / 2, bytes.len() - 1] {
            let err = DerNode::decode(&bytes[..cut]).unwrap_err();
            assert!(err.is_truncation(), "cut at {cut}: {err}");
        }
    }

    #[test]
    fn child_overrunning_parent_fails() {
        // SEQUENCE declares 3 bytes but its child occupies 4.
        let bytes = [0x30, 0x03, 0x04, 0x02, 0xaa, 0xbb];
        assert!(matches!(
            DerNode::decode(&bytes),
            Err(DerError::Decoding(_))
        ));
    }

    #[test]
    fn non_minimal_lengths_fail() {
        for header in [&[0x04, 0x81, 0x05][..], &[0x04, 0x82, 0x00, 0x05], &[0x04, 0x82, 0x00, 0x80]] {
            let mut reader = DerReader::new(header);
            assert!(
                matches!(decode_header(&mut reader), Err(DerError::Decoding(_))),
                "{header:02x?}"
            );
        }

        // The inner SEQUENCE declares 4 bytes; its first NULL spells a zero
        // length in long form and the second NULL would spill past the end.
        let bytes = [0x30, 0x06, 0x30, 0x04, 0x05, 0x81, 0x00, 0x05, 0x00];
        assert!(matches!(DerNode::decode(&bytes), Err(DerError::Decoding(_))));
    }

    #[test]
    fn child_must_end_inside_parent() {
        // The outer SEQUENCE spans 4 bytes, but after its 2-byte header the
        // child SEQUENCE claims 3 more.
        let bytes = [0x30, 0x04, 0x30, 0x03, 0x04, 0x02, 0xaa, 0xbb];
        assert!(matches!(DerNode::decode(&bytes), Err(DerError::Decoding(_))));
    }

    fn nested_sequences(depth: usize) -> Vec<u8> {
        let mut headers = Vec::with_capacity(depth);
        let mut len = 2usize;
        for _ in 0..depth {
            let header = encode_header(0x30, i64::try_from(len).unwrap()).unwrap();
            len += header.len();
            headers.push(header);
        }
        let mut bytes: Vec<u8> = headers.into_iter().rev().flatten().collect();
        bytes.extend_from_slice(&[0x05, 0x00]);
        bytes
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let ok = nested_sequences(MAX_DEPTH);
        assert!(DerNode::decode(&ok).is_ok());

        for depth in [MAX_DEPTH + 1, 2_000, 50_000] {
            let bytes = nested_sequences(depth);
            assert!(
                matches!(DerNode::decode(&bytes), Err(DerError::Decoding(_))),
                "depth {depth}"
            );
        }
    }

    #[test]
    fn trailing_bytes_fail() {
        assert!(DerNode::decode(&[0x05, 0x00, 0x00]).is_err());
    }
}
