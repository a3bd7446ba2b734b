//! The trust-policy validator.
//!
//! A packet is checked against the first rule whose filters match. If the
//! rule's checker leaves the decision to the signature, the signer's
//! certificate is looked up among the trust anchors and the cache, or
//! fetched and validated recursively (bounded by the step limit), and the
//! packet's signature is verified with its key.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use ndn_packet::{Data, Interest, Name, SignatureType};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::anchors::{refresh_due, TrustAnchorContainer};
use crate::cache::CertificateCacheTtl;
use crate::certificate::{lookup_name, now_ms, Certificate};
use crate::config::{AnchorSource, CompiledPolicy, PolicyConfig, ValidatorOptions};
use crate::error::{Result, ValidationError, ValidationErrorCode};
use crate::fetcher::{CertificateFetcher, Face, NetworkFetcher};
use crate::packet::SignedPacket;
use crate::policy::{PacketKind, Rule, Verdict};
use crate::verify::verify_packet;

#[derive(Debug, Default)]
struct PolicyState {
    data_rules: Vec<Rule>,
    interest_rules: Vec<Rule>,
    trust_any: bool,
}

struct ValidatorInner {
    options: ValidatorOptions,
    policy: RwLock<PolicyState>,
    anchors: Mutex<TrustAnchorContainer>,
    cache: CertificateCacheTtl,
    fetcher: Arc<dyn CertificateFetcher>,
}

/// Validates Data and signed Interests against a trust policy.
///
/// Clones share policy, anchors and certificate cache.
#[derive(Clone)]
pub struct Validator {
    inner: Arc<ValidatorInner>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("options", &self.inner.options)
            .field("policy", &*self.inner.policy.read())
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

fn reject(code: ValidationErrorCode, info: impl Into<String>) -> ValidationError {
    ValidationError::new(code, info)
}

fn verify_with(packet: SignedPacket<'_>, cert: &Certificate) -> std::result::Result<(), ValidationError> {
    if verify_packet(packet, cert.public_key()) {
        debug!(packet = %packet.name(), signer = %cert.name(), "signature verified");
        Ok(())
    } else {
        Err(reject(
            ValidationErrorCode::InvalidSignature,
            "Cannot verify signature",
        ))
    }
}

impl Validator {
    /// A validator with default options and an empty policy.
    #[must_use]
    pub fn new(fetcher: Arc<dyn CertificateFetcher>) -> Self {
        Self::with_options(fetcher, ValidatorOptions::default())
    }

    #[must_use]
    pub fn with_options(fetcher: Arc<dyn CertificateFetcher>, options: ValidatorOptions) -> Self {
        let cache = CertificateCacheTtl::new(options.cache_default_ttl(), options.cache_max_ttl());
        Self {
            inner: Arc::new(ValidatorInner {
                options,
                policy: RwLock::new(PolicyState::default()),
                anchors: Mutex::new(TrustAnchorContainer::new()),
                cache,
                fetcher,
            }),
        }
    }

    /// A validator fetching certificates through `face` with
    /// `options.fetch_retries` retries.
    #[must_use]
    pub fn with_face(face: Arc<dyn Face>, options: ValidatorOptions) -> Self {
        let fetcher = Arc::new(NetworkFetcher::new(face, options.fetch_retries));
        Self::with_options(fetcher, options)
    }

    #[must_use]
    pub fn options(&self) -> &ValidatorOptions {
        &self.inner.options
    }

    /// The verified-certificate cache.
    #[must_use]
    pub fn cache(&self) -> &CertificateCacheTtl {
        &self.inner.cache
    }

    /// Replace the policy with the one in `path`. Relative anchor paths
    /// resolve against the file's directory.
    pub fn load(&self, path: &Path) -> Result<()> {
        let config = PolicyConfig::load(path)?;
        let base_dir = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        self.install(config.compile(&base_dir)?);
        Ok(())
    }

    /// Replace the policy with one given as text.
    pub fn load_str(&self, text: &str, base_dir: &Path) -> Result<()> {
        let config: PolicyConfig = text.parse()?;
        self.install(config.compile(base_dir)?);
        Ok(())
    }

    fn install(&self, compiled: CompiledPolicy) {
        self.reset();
        {
            let mut anchors = self.inner.anchors.lock();
            for source in compiled.anchors {
                match source {
                    AnchorSource::Static(cert) => anchors.insert_static(cert),
                    AnchorSource::Dynamic {
                        path,
                        is_dir,
                        refresh,
                    } => anchors.add_dynamic(path, is_dir, refresh),
                }
            }
        }
        let mut policy = self.inner.policy.write();
        policy.data_rules = compiled.data_rules;
        policy.interest_rules = compiled.interest_rules;
        policy.trust_any = compiled.trust_any;
    }

    pub fn add_rule(&self, rule: Rule) {
        let mut policy = self.inner.policy.write();
        match rule.kind {
            PacketKind::Data => policy.data_rules.push(rule),
            PacketKind::Interest => policy.interest_rules.push(rule),
        }
    }

    pub fn add_trust_anchor(&self, cert: Certificate) {
        self.inner.anchors.lock().insert_static(cert);
    }

    pub fn add_dynamic_trust_anchor(&self, path: PathBuf, is_dir: bool, refresh: Duration) {
        self.inner.anchors.lock().add_dynamic(path, is_dir, refresh);
    }

    /// Accept every packet without checking.
    pub fn set_trust_any(&self, trust_any: bool) {
        self.inner.policy.write().trust_any = trust_any;
    }

    /// Drop rules, anchors and cached certificates.
    pub fn reset(&self) {
        *self.inner.policy.write() = PolicyState::default();
        self.inner.anchors.lock().reset();
        self.inner.cache.reset();
    }

    /// # Errors
    ///
    /// Returns the reason `data` is not trusted.
    #[instrument(skip(self, data), fields(name = %data.name))]
    pub async fn validate_data(&self, data: &Data) -> std::result::Result<(), ValidationError> {
        self.validate_packet(SignedPacket::Data(data), 0, Vec::new()).await
    }

    /// # Errors
    ///
    /// Returns the reason `interest` is not trusted.
    #[instrument(skip(self, interest), fields(name = %interest.name))]
    pub async fn validate_interest(&self, interest: &Interest) -> std::result::Result<(), ValidationError> {
        self.validate_packet(SignedPacket::Interest(interest), 0, Vec::new()).await
    }

    /// Validate in a background task; exactly one of the callbacks runs.
    pub fn validate_data_with<A, F>(&self, data: Data, on_validated: A, on_failed: F) -> JoinHandle<()>
    where
        A: FnOnce(Data) + Send + 'static,
        F: FnOnce(Data, ValidationError) + Send + 'static,
    {
        let validator = self.clone();
        tokio::spawn(async move {
            let outcome = validator.validate_data(&data).await;
            match outcome {
                Ok(()) => on_validated(data),
                Err(e) => on_failed(data, e),
            }
        })
    }

    /// Validate in a background task; exactly one of the callbacks runs.
    pub fn validate_interest_with<A, F>(
        &self,
        interest: Interest,
        on_validated: A,
        on_failed: F,
    ) -> JoinHandle<()>
    where
        A: FnOnce(Interest) + Send + 'static,
        F: FnOnce(Interest, ValidationError) + Send + 'static,
    {
        let validator = self.clone();
        tokio::spawn(async move {
            let outcome = validator.validate_interest(&interest).await;
            match outcome {
                Ok(()) => on_validated(interest),
                Err(e) => on_failed(interest, e),
            }
        })
    }

    /// Rule lookup and checker verdict; `None` means trust-any.
    fn policy_verdict(&self, packet: SignedPacket<'_>) -> Option<Verdict> {
        let policy = self.inner.policy.read();
        if policy.trust_any {
            return None;
        }
        let rules = match PacketKind::of(&packet) {
            PacketKind::Data => &policy.data_rules,
            PacketKind::Interest => &policy.interest_rules,
        };
        let verdict = rules.iter().find(|rule| rule.matches(packet)).map_or_else(
            || Verdict::Reject("No rule matched".into()),
            |rule| {
                debug!(rule = %rule.id, packet = %packet.name(), "rule matched");
                rule.check(packet)
            },
        );
        Some(verdict)
    }

    fn known_certificate(&self, key_name: &Name) -> Option<Arc<Certificate>> {
        if let Some(cert) = self.inner.anchors.lock().find(key_name) {
            debug!(name = %key_name, "trust anchor hit");
            return Some(cert);
        }
        let cached = self.inner.cache.get(key_name);
        if cached.is_some() {
            debug!(name = %key_name, "certificate cache hit");
        }
        cached
    }

    /// `chain` holds the certificates being validated above this packet.
    fn validate_packet<'a>(
        &'a self,
        packet: SignedPacket<'a>,
        steps: usize,
        chain: Vec<Name>,
    ) -> BoxFuture<'a, std::result::Result<(), ValidationError>> {
        async move {
            match self.policy_verdict(packet) {
                None => {
                    debug!(packet = %packet.name(), "trust any, accepted");
                    return Ok(());
                }
                Some(Verdict::Accept) => return Ok(()),
                Some(Verdict::Reject(reason)) => {
                    return Err(reject(ValidationErrorCode::PolicyError, reason))
                }
                Some(Verdict::Pending) => {}
            }

            let info = packet.signature_info().ok_or_else(|| {
                reject(ValidationErrorCode::NoSignature, "cannot parse SignatureInfo")
            })?;

            if info.signature_type == SignatureType::DigestSha256 {
                return if verify_packet(packet, None) {
                    Ok(())
                } else {
                    Err(reject(
                        ValidationErrorCode::InvalidSignature,
                        "Cannot verify signature",
                    ))
                };
            }

            let key_name = info.key_name().cloned().ok_or_else(|| {
                reject(
                    ValidationErrorCode::InvalidKeyLocator,
                    "Missing or unsupported KeyLocator",
                )
            })?;

            refresh_due(&self.inner.anchors).await;
            if let Some(cert) = self.known_certificate(&key_name) {
                return verify_with(packet, &cert);
            }

            if steps >= self.inner.options.step_limit {
                return Err(reject(
                    ValidationErrorCode::ExceededDepthLimit,
                    "Maximum steps of validation reached",
                ));
            }
            let signer = lookup_name(&key_name);
            if chain.contains(&signer) {
                return Err(reject(
                    ValidationErrorCode::LoopDetected,
                    "Loop detected in certification chain",
                ));
            }

            let interest =
                Interest::new(key_name.clone()).with_lifetime(self.inner.options.interest_lifetime());
            let data = self.inner.fetcher.fetch(interest).await?;
            let cert = Certificate::from_data(data).map_err(|e| {
                reject(
                    ValidationErrorCode::MalformedCertificate,
                    format!("Malformed certificate {key_name}: {e}"),
                )
            })?;
            debug!(name = %cert.name(), step = steps + 1, "certificate fetched");

            let mut chain = chain;
            chain.push(signer);
            self.validate_packet(SignedPacket::Data(cert.data()), steps + 1, chain)
                .await?;

            let now = now_ms();
            if cert.is_too_late_at(now) || cert.is_too_early_at(now) {
                return Err(reject(
                    ValidationErrorCode::ExpiredCertificate,
                    format!("Signing certificate {} is no longer valid.", cert.name()),
                ));
            }

            let cert = Arc::new(cert);
            self.inner.cache.insert(Arc::clone(&cert));
            verify_with(packet, &cert)
        }
        .boxed()
    }
}
