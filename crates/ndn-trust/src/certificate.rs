//! Identity certificates.
//!
//! A certificate is a Data packet whose content is a DER sequence:
//!
//! ```text
//! SEQUENCE {
//!   SEQUENCE { GeneralizedTime notBefore, GeneralizedTime notAfter }
//!   SEQUENCE OF SEQUENCE { OID, PrintableString }      -- subject
//!   SubjectPublicKeyInfo
//!   SEQUENCE OF SEQUENCE { OID, BOOLEAN, OCTET STRING } -- optional extensions
//! }
//! ```

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use ndn_der::{oid::known, time, DerNode, DerType, Oid, Timestamp};
use ndn_packet::{naming, Data, Name, CONTENT_TYPE_KEY};

use crate::error::{Result, TrustError};

/// Milliseconds since the Unix epoch, from the system clock.
#[must_use]
pub fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// The name used to look a certificate up: the name without a trailing
/// version component.
#[must_use]
pub fn lookup_name(name: &Name) -> Name {
    match name.get(-1) {
        Some(last) if last.is_version() => name.get_prefix(-1),
        _ => name.clone(),
    }
}

/// Public key algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
    Ec,
}

/// SubjectPublicKeyInfo: algorithm, optional parameters and key bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    algorithm: Oid,
    parameters: Option<Oid>,
    key_bits: Vec<u8>,
}

impl PublicKeyInfo {
    /// An RSA key; `pkcs1` is the DER `RSAPublicKey`.
    #[must_use]
    pub fn rsa(pkcs1: Vec<u8>) -> Self {
        Self {
            algorithm: Oid::new(vec![1, 2, 840, 113_549, 1, 1, 1]),
            parameters: None,
            key_bits: pkcs1,
        }
    }

    /// A P-256 key; `point` is the uncompressed curve point.
    #[must_use]
    pub fn ec_p256(point: Vec<u8>) -> Self {
        Self {
            algorithm: Oid::new(vec![1, 2, 840, 10_045, 2, 1]),
            parameters: Some(Oid::new(vec![1, 2, 840, 10_045, 3, 1, 7])),
            key_bits: point,
        }
    }

    #[must_use]
    pub const fn algorithm(&self) -> &Oid {
        &self.algorithm
    }

    #[must_use]
    pub fn key_bits(&self) -> &[u8] {
        &self.key_bits
    }

    /// Key family, if the algorithm is one we can verify with.
    #[must_use]
    pub fn key_type(&self) -> Option<KeyType> {
        match self.algorithm.to_string().as_str() {
            known::RSA_ENCRYPTION => Some(KeyType::Rsa),
            known::EC_PUBLIC_KEY => Some(KeyType::Ec),
            _ => None,
        }
    }

    /// DER tree of this key.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm OID cannot be encoded.
    pub fn to_der(&self) -> Result<DerNode> {
        let parameters = match &self.parameters {
            Some(oid) => DerNode::oid(oid)?,
            None => DerNode::null(),
        };
        Ok(DerNode::sequence(vec![
            DerNode::sequence(vec![DerNode::oid(&self.algorithm)?, parameters]),
            DerNode::bit_string(&self.key_bits, 0),
        ]))
    }

    /// Rebuild from a SubjectPublicKeyInfo tree.
    ///
    /// # Errors
    ///
    /// Returns a DER error if the tree does not have the expected shape.
    pub fn from_der(node: &DerNode) -> Result<Self> {
        let algorithm_seq = node.child(0, "algorithm identifier")?;
        let algorithm = algorithm_seq.child(0, "algorithm")?.as_oid()?;
        let parameters = match algorithm_seq.children().get(1) {
            Some(p) if p.kind() == DerType::ObjectIdentifier => Some(p.as_oid()?),
            _ => None,
        };

        let bits = node.child(1, "public key bits")?.as_bytes()?;
        let key_bits = bits
            .split_first()
            .map(|(_, rest)| rest.to_vec())
            .ok_or_else(|| TrustError::Certificate("empty public key BIT STRING".into()))?;

        Ok(Self {
            algorithm,
            parameters,
            key_bits,
        })
    }

    /// Encoded SubjectPublicKeyInfo bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the DER tree cannot be encoded.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.to_der()?.encode()?)
    }
}

/// One subject attribute, e.g. `2.5.4.41 = /ndn/edu/ucla`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectDescription {
    pub oid: Oid,
    pub value: String,
}

/// One certificate extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateExtension {
    pub oid: Oid,
    pub critical: bool,
    pub value: Vec<u8>,
}

/// A Data packet binding a name to a public key for a validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    data: Data,
    not_before: Timestamp,
    not_after: Timestamp,
    subject_descriptions: Vec<SubjectDescription>,
    public_key: Option<PublicKeyInfo>,
    extensions: Vec<CertificateExtension>,
}

impl Certificate {
    /// An empty certificate named `name`.
    ///
    /// The validity window starts out as `[+inf, -inf]`, so the certificate
    /// is never valid until both bounds are set.
    #[must_use]
    pub fn new(name: Name) -> Self {
        Self {
            data: Data::new(name).with_content_type(CONTENT_TYPE_KEY),
            not_before: Timestamp::MAX,
            not_after: Timestamp::MIN,
            subject_descriptions: Vec::new(),
            public_key: None,
            extensions: Vec::new(),
        }
    }

    /// Decode the certificate fields carried in `data`'s content.
    ///
    /// # Errors
    ///
    /// Returns a DER or certificate error if the content is ill-formed.
    pub fn from_data(data: Data) -> Result<Self> {
        let mut cert = Self {
            data,
            ..Self::new(Name::new())
        };
        cert.decode()?;
        Ok(cert)
    }

    fn decode(&mut self) -> Result<()> {
        let root = DerNode::decode(&self.data.content)?;
        if root.kind() != DerType::Sequence {
            return Err(TrustError::Certificate(format!(
                "certificate content is a {}, expected SEQUENCE",
                root.kind()
            )));
        }

        let validity = root.child(0, "validity")?;
        self.not_before = validity.child(0, "notBefore")?.as_timestamp()?;
        self.not_after = validity.child(1, "notAfter")?.as_timestamp()?;

        self.subject_descriptions = root
            .child(1, "subject")?
            .children()
            .iter()
            .map(|entry| {
                Ok(SubjectDescription {
                    oid: entry.child(0, "subject OID")?.as_oid()?,
                    value: entry.child(1, "subject value")?.as_text()?,
                })
            })
            .collect::<Result<_>>()?;

        self.public_key = Some(PublicKeyInfo::from_der(root.child(2, "public key")?)?);

        self.extensions = match root.children().get(3) {
            Some(list) => list
                .children()
                .iter()
                .map(|entry| {
                    Ok(CertificateExtension {
                        oid: entry.child(0, "extension OID")?.as_oid()?,
                        critical: entry.child(1, "extension criticality")?.as_bool()?,
                        value: entry.child(2, "extension value")?.as_bytes()?,
                    })
                })
                .collect::<Result<_>>()?,
            None => Vec::new(),
        };
        Ok(())
    }

    /// Write the certificate fields into the packet content.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Certificate` if no public key is set, and a DER
    /// error if the validity bounds cannot be represented.
    pub fn encode(&mut self) -> Result<()> {
        let key = self
            .public_key
            .as_ref()
            .ok_or_else(|| TrustError::Certificate("public key is not set".into()))?;

        let validity = DerNode::sequence(vec![
            DerNode::generalized_time(self.not_before)?,
            DerNode::generalized_time(self.not_after)?,
        ]);
        let subject = DerNode::sequence(
            self.subject_descriptions
                .iter()
                .map(|d| {
                    Ok(DerNode::sequence(vec![
                        DerNode::oid(&d.oid)?,
                        DerNode::printable_string(&d.value),
                    ]))
                })
                .collect::<Result<_>>()?,
        );

        let mut root = DerNode::sequence(vec![validity, subject, key.to_der()?]);
        if !self.extensions.is_empty() {
            let extensions = self
                .extensions
                .iter()
                .map(|e| {
                    Ok(DerNode::sequence(vec![
                        DerNode::oid(&e.oid)?,
                        DerNode::boolean(e.critical),
                        DerNode::octet_string(e.value.clone()),
                    ]))
                })
                .collect::<Result<_>>()?;
            root.push(DerNode::sequence(extensions))?;
        }

        self.data.content = root.encode()?;
        self.data.content_type = CONTENT_TYPE_KEY;
        Ok(())
    }

    #[must_use]
    pub const fn name(&self) -> &Name {
        &self.data.name
    }

    /// Name with the trailing version removed; anchors and caches key on it.
    #[must_use]
    pub fn name_without_version(&self) -> Name {
        lookup_name(&self.data.name)
    }

    /// Name of the public key this certificate certifies.
    ///
    /// # Errors
    ///
    /// Returns a packet error if the name lacks `KEY`/`ID-CERT`.
    pub fn public_key_name(&self) -> Result<Name> {
        Ok(naming::certificate_name_to_public_key_name(&self.data.name)?)
    }

    #[must_use]
    pub const fn data(&self) -> &Data {
        &self.data
    }

    /// Mutable access to the packet, e.g. for signing.
    pub fn data_mut(&mut self) -> &mut Data {
        &mut self.data
    }

    #[must_use]
    pub fn into_data(self) -> Data {
        self.data
    }

    #[must_use]
    pub const fn freshness_period(&self) -> Option<Duration> {
        self.data.freshness_period
    }

    #[must_use]
    pub const fn not_before(&self) -> Timestamp {
        self.not_before
    }

    #[must_use]
    pub const fn not_after(&self) -> Timestamp {
        self.not_after
    }

    pub fn set_validity(&mut self, not_before: Timestamp, not_after: Timestamp) {
        self.not_before = not_before;
        self.not_after = not_after;
    }

    #[must_use]
    pub fn subject_descriptions(&self) -> &[SubjectDescription] {
        &self.subject_descriptions
    }

    pub fn add_subject_description(&mut self, oid: Oid, value: impl Into<String>) {
        self.subject_descriptions.push(SubjectDescription {
            oid,
            value: value.into(),
        });
    }

    #[must_use]
    pub const fn public_key(&self) -> Option<&PublicKeyInfo> {
        self.public_key.as_ref()
    }

    pub fn set_public_key(&mut self, key: PublicKeyInfo) {
        self.public_key = Some(key);
    }

    #[must_use]
    pub fn extensions(&self) -> &[CertificateExtension] {
        &self.extensions
    }

    pub fn add_extension(&mut self, extension: CertificateExtension) {
        self.extensions.push(extension);
    }

    #[must_use]
    pub const fn is_too_early_at(&self, now: Timestamp) -> bool {
        now < self.not_before
    }

    #[must_use]
    pub const fn is_too_late_at(&self, now: Timestamp) -> bool {
        now > self.not_after
    }

    /// Whether the validity window has not started yet.
    #[must_use]
    pub fn is_too_early(&self) -> bool {
        self.is_too_early_at(now_ms())
    }

    /// Whether the validity window has already ended.
    #[must_use]
    pub fn is_too_late(&self) -> bool {
        self.is_too_late_at(now_ms())
    }
}

fn iso_or_raw(ts: Timestamp) -> String {
    time::to_iso_string(ts).unwrap_or_else(|_| ts.to_string())
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Certificate name:")?;
        writeln!(f, "  {}", self.data.name)?;
        writeln!(f, "Validity:")?;
        writeln!(f, "  NotBefore: {}", iso_or_raw(self.not_before))?;
        writeln!(f, "  NotAfter: {}", iso_or_raw(self.not_after))?;
        if !self.subject_descriptions.is_empty() {
            writeln!(f, "Subject Description:")?;
            for d in &self.subject_descriptions {
                writeln!(f, "  {}: {}", d.oid, d.value)?;
            }
        }
        if let Some(key) = &self.public_key {
            writeln!(f, "Public key bits:")?;
            match key.encode() {
                Ok(der) => writeln!(f, "{}", B64.encode(der))?,
                Err(e) => writeln!(f, "<{e}>")?,
            }
        }
        for e in &self.extensions {
            writeln!(f, "Extension: {} critical={} {}", e.oid, e.critical, hex::encode(&e.value))?;
        }
        Ok(())
    }
}
