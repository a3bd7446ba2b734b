//! Typed extraction of primitive node values.

use crate::error::{DerError, Result};
use crate::node::DerNode;
use crate::oid::Oid;
use crate::time::{self, Timestamp};
use crate::types::DerType;

/// A decoded primitive value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    /// INTEGER, BIT STRING and OCTET STRING payloads, unmodified.
    Bytes(Vec<u8>),
    Text(String),
    Oid(Oid),
    Timestamp(Timestamp),
    Unit,
}

impl DerNode {
    /// Extract the value carried by a primitive node.
    ///
    /// # Errors
    ///
    /// Returns `DerError::Decoding` for sequences and malformed payloads.
    pub fn value(&self) -> Result<Value> {
        let payload = self
            .payload()
            .ok_or_else(|| DerError::decoding(format!("{} has no primitive value", self.kind())))?;

        match self.kind() {
            DerType::Boolean => payload
                .first()
                .map(|&b| Value::Bool(b != 0))
                .ok_or_else(|| DerError::decoding("empty BOOLEAN")),
            DerType::Integer | DerType::BitString | DerType::OctetString => {
                Ok(Value::Bytes(payload.to_vec()))
            }
            DerType::Null => Ok(Value::Unit),
            DerType::ObjectIdentifier => Oid::from_payload(payload).map(Value::Oid),
            DerType::PrintableString => String::from_utf8(payload.to_vec())
                .map(Value::Text)
                .map_err(|e| DerError::decoding(format!("PrintableString: {e}"))),
            DerType::GeneralizedTime => {
                let text = std::str::from_utf8(payload)
                    .map_err(|e| DerError::decoding(format!("GeneralizedTime: {e}")))?;
                time::from_der_string(text).map(Value::Timestamp)
            }
            other => Err(DerError::UnimplementedType(other.tag())),
        }
    }

    /// Value of a BOOLEAN node.
    ///
    /// # Errors
    ///
    /// Returns `DerError::Decoding` if the node is not a BOOLEAN.
    pub fn as_bool(&self) -> Result<bool> {
        match self.value()? {
            Value::Bool(b) => Ok(b),
            _ => Err(self.mismatch("BOOLEAN")),
        }
    }

    /// Value of an OBJECT IDENTIFIER node.
    ///
    /// # Errors
    ///
    /// Returns `DerError::Decoding` if the node is not an OID.
    pub fn as_oid(&self) -> Result<Oid> {
        match self.value()? {
            Value::Oid(oid) => Ok(oid),
            _ => Err(self.mismatch("OBJECT IDENTIFIER")),
        }
    }

    /// Value of a PrintableString node.
    ///
    /// # Errors
    ///
    /// Returns `DerError::Decoding` if the node is not a string.
    pub fn as_text(&self) -> Result<String> {
        match self.value()? {
            Value::Text(text) => Ok(text),
            _ => Err(self.mismatch("PrintableString")),
        }
    }

    /// Value of a GeneralizedTime node.
    ///
    /// # Errors
    ///
    /// Returns `DerError::Decoding` if the node is not a time.
    pub fn as_timestamp(&self) -> Result<Timestamp> {
        match self.value()? {
            Value::Timestamp(ts) => Ok(ts),
            _ => Err(self.mismatch("GeneralizedTime")),
        }
    }

    /// Raw payload of an INTEGER, BIT STRING or OCTET STRING node.
    ///
    /// # Errors
    ///
    /// Returns `DerError::Decoding` for other kinds.
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        match self.value()? {
            Value::Bytes(bytes) => Ok(bytes),
            _ => Err(self.mismatch("byte string")),
        }
    }

    fn mismatch(&self, expected: &str) -> DerError {
        DerError::decoding(format!("expected {expected}, found {}", self.kind()))
    }
}
