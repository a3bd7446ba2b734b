//! Signing helpers for building certificates, Data and command Interests.

use ndn_der::Timestamp;
use ndn_packet::{
    signature_info_component, signature_value_component, Component, Data, Interest, Name,
    SignatureInfo, SignatureType,
};
use rand::RngCore;
use ring::digest::{digest, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};

use crate::certificate::{Certificate, PublicKeyInfo};
use crate::command_interest::{Clock, SystemClock};
use crate::error::{Result, TrustError};

/// Produces signatures for packets.
pub enum Signer {
    /// DigestSha256: no key, the signature is the SHA-256 of the packet.
    Digest,
    /// ECDSA P-256; `key_locator` names the signing certificate.
    Ecdsa {
        key_pair: EcdsaKeyPair,
        key_locator: Name,
        rng: SystemRandom,
    },
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Digest => f.write_str("Signer::Digest"),
            Self::Ecdsa { key_locator, .. } => f
                .debug_struct("Signer::Ecdsa")
                .field("key_locator", key_locator)
                .finish_non_exhaustive(),
        }
    }
}

impl Signer {
    /// Generate a fresh P-256 key pair, returning the signer and its public
    /// key.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Key` if key generation fails.
    pub fn generate_ecdsa(key_locator: Name) -> Result<(Self, PublicKeyInfo)> {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .map_err(|_| TrustError::Key("cannot generate P-256 key".into()))?;
        Self::ecdsa_from_pkcs8(pkcs8.as_ref(), key_locator)
    }

    /// Load a P-256 key pair from PKCS#8.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Key` if the document is not a P-256 key.
    pub fn ecdsa_from_pkcs8(pkcs8: &[u8], key_locator: Name) -> Result<(Self, PublicKeyInfo)> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8, &rng)
            .map_err(|e| TrustError::Key(format!("cannot load P-256 key: {e}")))?;
        let public = PublicKeyInfo::ec_p256(key_pair.public_key().as_ref().to_vec());
        Ok((
            Self::Ecdsa {
                key_pair,
                key_locator,
                rng,
            },
            public,
        ))
    }

    /// SignatureInfo this signer writes.
    #[must_use]
    pub fn signature_info(&self) -> SignatureInfo {
        match self {
            Self::Digest => SignatureInfo::digest_sha256(),
            Self::Ecdsa { key_locator, .. } => {
                SignatureInfo::with_key_name(SignatureType::Sha256WithEcdsa, key_locator.clone())
            }
        }
    }

    /// Sign raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Key` if the signing operation fails.
    pub fn sign(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Digest => Ok(digest(&SHA256, bytes).as_ref().to_vec()),
            Self::Ecdsa { key_pair, rng, .. } => key_pair
                .sign(rng, bytes)
                .map(|sig| sig.as_ref().to_vec())
                .map_err(|_| TrustError::Key("ECDSA signing failed".into())),
        }
    }

    /// Set `data`'s SignatureInfo and sign it.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Key` if signing fails.
    pub fn sign_data(&self, data: &mut Data) -> Result<()> {
        data.signature_info = self.signature_info();
        data.signature_value = self.sign(&data.signed_portion())?;
        Ok(())
    }

    /// Encode `cert`'s fields and sign it.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate is incomplete or signing fails.
    pub fn sign_certificate(&self, cert: &mut Certificate) -> Result<()> {
        cert.encode()?;
        self.sign_data(cert.data_mut())
    }

    /// Append SignatureInfo and SignatureValue components to `name` (which
    /// should already end in the timestamp and random components).
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Key` if signing fails.
    pub fn sign_interest(&self, name: Name) -> Result<Interest> {
        let name = name.append(signature_info_component(&self.signature_info()));
        let signature = self.sign(&name.encode_value())?;
        Ok(Interest::new(name.append(signature_value_component(&signature))))
    }
}

/// Builds command Interests with strictly increasing timestamps.
pub struct CommandInterestSigner<C = SystemClock> {
    signer: Signer,
    clock: C,
    last_timestamp: Timestamp,
}

impl CommandInterestSigner<SystemClock> {
    #[must_use]
    pub const fn new(signer: Signer) -> Self {
        Self::with_clock(signer, SystemClock)
    }
}

impl<C: Clock> CommandInterestSigner<C> {
    #[must_use]
    pub const fn with_clock(signer: Signer, clock: C) -> Self {
        Self {
            signer,
            clock,
            last_timestamp: 0,
        }
    }

    /// `<prefix>/<timestamp>/<random>/<SignatureInfo>/<SignatureValue>`
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Key` if signing fails.
    pub fn make_command_interest(&mut self, prefix: &Name) -> Result<Interest> {
        let timestamp = self.clock.now_ms().max(self.last_timestamp + 1);
        self.last_timestamp = timestamp;
        self.make_with_timestamp(prefix, timestamp)
    }

    /// Same layout with a caller-chosen timestamp (no monotonic adjustment).
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Key` if signing fails.
    pub fn make_with_timestamp(&self, prefix: &Name, timestamp: Timestamp) -> Result<Interest> {
        let timestamp = u64::try_from(timestamp)
            .map_err(|_| TrustError::InvalidArgument("negative timestamp".into()))?;
        let name = prefix
            .clone()
            .append(Component::from_number(timestamp))
            .append(Component::from_number(rand::rng().next_u64()));
        self.signer.sign_interest(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_interest::ManualClock;

    #[test]
    fn command_interest_layout() {
        let clock = ManualClock::new(1_000);
        let mut signer = CommandInterestSigner::with_clock(Signer::Digest, clock.clone());
        let prefix = Name::parse("/cmd").unwrap();

        let first = signer.make_command_interest(&prefix).unwrap();
        let second = signer.make_command_interest(&prefix).unwrap();
        assert_eq!(first.name.len(), 5);
        assert_eq!(first.command_prefix(), prefix);
        assert_eq!(first.signed_timestamp().unwrap(), 1_000);
        assert_eq!(second.signed_timestamp().unwrap(), 1_001);

        clock.advance_ms(5_000);
        let third = signer.make_command_interest(&prefix).unwrap();
        assert_eq!(third.signed_timestamp().unwrap(), 6_000);
    }

    #[test]
    fn ecdsa_interest_carries_key_locator() {
        let locator = Name::parse("/user/KEY/ksk-1/ID-CERT").unwrap();
        let (signer, _) = Signer::generate_ecdsa(locator.clone()).unwrap();
        let interest = signer
            .sign_interest(Name::parse("/cmd/1/2").unwrap())
            .unwrap();
        let info = interest.signature_info().unwrap();
        assert_eq!(info.key_name(), Some(&locator));
        assert!(!interest.signature_value().unwrap().is_empty());
    }
}
