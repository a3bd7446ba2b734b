//! Signature verification via `ring`.

use ndn_packet::SignatureType;
use ring::digest::{digest, SHA256};
use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_ASN1, RSA_PKCS1_2048_8192_SHA256};
use tracing::debug;

use crate::certificate::{KeyType, PublicKeyInfo};
use crate::packet::SignedPacket;

/// Check a DigestSha256 signature: the value must be the SHA-256 of the
/// signed portion.
#[must_use]
pub fn verify_digest_sha256(signed_portion: &[u8], signature: &[u8]) -> bool {
    let expected = digest(&SHA256, signed_portion);
    let expected = expected.as_ref();
    expected.len() == signature.len()
        && expected
            .iter()
            .zip(signature)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Check a public-key signature over `signed_portion`.
#[must_use]
pub fn verify_with_key(
    signature_type: SignatureType,
    signed_portion: &[u8],
    signature: &[u8],
    key: &PublicKeyInfo,
) -> bool {
    let algorithm: &'static dyn ring::signature::VerificationAlgorithm =
        match (signature_type, key.key_type()) {
            (SignatureType::Sha256WithRsa, Some(KeyType::Rsa)) => &RSA_PKCS1_2048_8192_SHA256,
            (SignatureType::Sha256WithEcdsa, Some(KeyType::Ec)) => &ECDSA_P256_SHA256_ASN1,
            (sig_type, key_type) => {
                debug!(%sig_type, ?key_type, "signature type does not match key type");
                return false;
            }
        };
    UnparsedPublicKey::new(algorithm, key.key_bits())
        .verify(signed_portion, signature)
        .is_ok()
}

/// Verify `packet`'s signature. Digest signatures need no key; public-key
/// signatures fail when `key` is `None`.
#[must_use]
pub fn verify_packet(packet: SignedPacket<'_>, key: Option<&PublicKeyInfo>) -> bool {
    let (Some(info), Some(value)) = (packet.signature_info(), packet.signature_value()) else {
        return false;
    };
    let signed = packet.signed_portion();
    match info.signature_type {
        SignatureType::DigestSha256 => verify_digest_sha256(&signed, &value),
        sig_type if sig_type.uses_public_key() => {
            key.is_some_and(|key| verify_with_key(sig_type, &signed, &value, key))
        }
        _ => false,
    }
}
