//! Signature checkers and their verdicts.

use std::collections::HashMap;
use std::fmt;

use ndn_packet::{Name, SignatureType};
use tracing::debug;

use crate::certificate::{lookup_name, Certificate};
use crate::error::{Result, TrustError};
use crate::packet::SignedPacket;
use crate::policy::key_locator::KeyLocatorChecker;
use crate::verify;

/// Outcome of a checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Trusted without further work (`+1`).
    Accept,
    /// Untrusted (`-1`), with the reason.
    Reject(String),
    /// Acceptable if the signature verifies against the signer's key (`0`).
    Pending,
}

impl Verdict {
    /// The classic three-valued code: `1`, `-1` or `0`.
    #[must_use]
    pub const fn code(&self) -> i8 {
        match self {
            Self::Accept => 1,
            Self::Reject(_) => -1,
            Self::Pending => 0,
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self::Reject(reason.into())
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => f.write_str("accept"),
            Self::Reject(reason) => write!(f, "reject: {reason}"),
            Self::Pending => f.write_str("pending signature verification"),
        }
    }
}

/// Decides whether a matched packet's signature is acceptable.
#[derive(Debug, Clone)]
pub enum Checker {
    /// Signature type plus a KeyLocator constraint for public-key types.
    Customized {
        sig_type: SignatureType,
        key_locator: Option<KeyLocatorChecker>,
    },
    /// Signer must be an ancestor of the packet name.
    Hierarchical {
        sig_type: SignatureType,
        key_locator: KeyLocatorChecker,
    },
    /// Signer must be one of a fixed set of certificates; verifies the
    /// signature itself.
    FixedSigner {
        sig_type: SignatureType,
        signers: HashMap<Name, Certificate>,
    },
}

impl Checker {
    /// # Errors
    ///
    /// Returns `TrustError::Config` if a public-key signature type has no
    /// KeyLocator constraint, or the type is unsupported.
    pub fn customized(sig_type: SignatureType, key_locator: Option<KeyLocatorChecker>) -> Result<Self> {
        match sig_type {
            SignatureType::DigestSha256 => {}
            t if t.uses_public_key() => {
                if key_locator.is_none() {
                    return Err(TrustError::config(format!(
                        "{t} checker requires a key-locator"
                    )));
                }
            }
            t => return Err(TrustError::config(format!("unsupported sig-type: {t}"))),
        }
        Ok(Self::Customized {
            sig_type,
            key_locator,
        })
    }

    /// # Errors
    ///
    /// Returns `TrustError::Config` for digest or unknown signature types.
    pub fn hierarchical(sig_type: SignatureType) -> Result<Self> {
        if !sig_type.uses_public_key() {
            return Err(TrustError::config(format!(
                "hierarchical checker needs a public-key sig-type, got {sig_type}"
            )));
        }
        Ok(Self::Hierarchical {
            sig_type,
            key_locator: KeyLocatorChecker::hierarchical()?,
        })
    }

    /// # Errors
    ///
    /// Returns `TrustError::Config` for digest signatures or an empty signer
    /// list.
    pub fn fixed_signer(sig_type: SignatureType, signers: Vec<Certificate>) -> Result<Self> {
        if !sig_type.uses_public_key() {
            return Err(TrustError::config(
                "FixedSigner does not allow Sha256 signature type",
            ));
        }
        if signers.is_empty() {
            return Err(TrustError::config("fixed-signer checker needs at least one signer"));
        }
        Ok(Self::FixedSigner {
            sig_type,
            signers: signers
                .into_iter()
                .map(|cert| (cert.name_without_version(), cert))
                .collect(),
        })
    }

    #[must_use]
    pub const fn sig_type(&self) -> SignatureType {
        match self {
            Self::Customized { sig_type, .. }
            | Self::Hierarchical { sig_type, .. }
            | Self::FixedSigner { sig_type, .. } => *sig_type,
        }
    }

    /// Classify `packet`.
    #[must_use]
    pub fn check(&self, packet: SignedPacket<'_>) -> Verdict {
        let Some(info) = packet.signature_info() else {
            return Verdict::reject("cannot parse SignatureInfo");
        };
        if info.signature_type != self.sig_type() {
            return Verdict::reject("Signature type does not match");
        }

        let verdict = match self {
            Self::Customized { key_locator, .. } => Self::check_key_locator(key_locator.as_ref(), packet, &info),
            Self::Hierarchical { key_locator, .. } => Self::check_key_locator(Some(key_locator), packet, &info),
            Self::FixedSigner { signers, .. } => Self::check_fixed_signer(signers, packet, &info),
        };
        debug!(packet = %packet.name(), %verdict, "checker verdict");
        verdict
    }

    fn check_key_locator(
        key_locator: Option<&KeyLocatorChecker>,
        packet: SignedPacket<'_>,
        info: &ndn_packet::SignatureInfo,
    ) -> Verdict {
        match info.signature_type {
            SignatureType::DigestSha256 => Verdict::Pending,
            t if t.uses_public_key() => {
                let (Some(checker), Some(locator)) = (key_locator, info.key_locator.as_ref()) else {
                    return Verdict::reject("KeyLocator is missing");
                };
                match checker.check(&packet.checker_name(), locator) {
                    Ok(()) => Verdict::Pending,
                    Err(reason) => Verdict::Reject(reason),
                }
            }
            t => Verdict::reject(format!("Unsupported signature type: {t}")),
        }
    }

    fn check_fixed_signer(
        signers: &HashMap<Name, Certificate>,
        packet: SignedPacket<'_>,
        info: &ndn_packet::SignatureInfo,
    ) -> Verdict {
        if info.signature_type == SignatureType::DigestSha256 {
            return Verdict::reject("FixedSigner does not allow Sha256 signature type");
        }
        let Some(key_name) = info.key_name() else {
            return Verdict::reject("KeyLocator is missing");
        };
        let Some(signer) = signers.get(&lookup_name(key_name)) else {
            return Verdict::reject(format!("{key_name} is not an allowed signer"));
        };
        if verify::verify_packet(packet, signer.public_key()) {
            Verdict::Accept
        } else {
            Verdict::reject(format!("signature does not verify with {}", signer.name()))
        }
    }
}
