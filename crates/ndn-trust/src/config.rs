//! Validator options and the TOML trust-policy document.
//!
//! A policy file holds `[[rule]]` stanzas (filters plus checkers) and
//! `[[trust-anchor]]` stanzas. It is parsed into [`PolicyConfig`] and then
//! compiled into rules and anchor sources; every malformed stanza is a
//! `TrustError::Config` at load time.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ndn_packet::{Name, SignatureType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::anchors::{decode_certificate_base64, load_certificate_file};
use crate::certificate::Certificate;
use crate::error::{Result, TrustError};
use crate::policy::{Checker, Filter, KeyLocatorChecker, PacketKind, Relation, Rule};
use crate::regex::NameRegex;

/// Refresh period of a dynamic anchor when none (or zero) is given.
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(3600);

/// Tunables of the validator state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorOptions {
    /// Maximum certificate fetches per validation.
    #[serde(default = "default_step_limit")]
    pub step_limit: usize,

    /// Extra Interests sent after a Nack or timeout.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    /// Lifetime of certificate Interests (milliseconds).
    #[serde(default = "default_interest_lifetime")]
    pub interest_lifetime_ms: u64,

    /// Cache lifetime of certificates without a freshness period.
    #[serde(default = "default_cache_ttl")]
    pub cache_default_ttl_ms: u64,

    /// Upper bound on any cache lifetime.
    #[serde(default = "default_cache_ttl")]
    pub cache_max_ttl_ms: u64,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            step_limit: default_step_limit(),
            fetch_retries: default_fetch_retries(),
            interest_lifetime_ms: default_interest_lifetime(),
            cache_default_ttl_ms: default_cache_ttl(),
            cache_max_ttl_ms: default_cache_ttl(),
        }
    }
}

impl ValidatorOptions {
    #[must_use]
    pub const fn interest_lifetime(&self) -> Duration {
        Duration::from_millis(self.interest_lifetime_ms)
    }

    #[must_use]
    pub const fn cache_default_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_default_ttl_ms)
    }

    #[must_use]
    pub const fn cache_max_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_max_ttl_ms)
    }
}

/// Replay protection settings for command Interests.
///
/// `max_records` of -1 means unlimited and 0 disables tracking; a zero TTL
/// expires every record immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInterestOptions {
    #[serde(default = "default_grace_period")]
    pub grace_period_ms: i64,

    #[serde(default = "default_max_records")]
    pub max_records: i64,

    #[serde(default = "default_record_ttl")]
    pub record_ttl_ms: i64,
}

impl Default for CommandInterestOptions {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period(),
            max_records: default_max_records(),
            record_ttl_ms: default_record_ttl(),
        }
    }
}

const fn default_step_limit() -> usize {
    10
}

const fn default_fetch_retries() -> u32 {
    3
}

const fn default_interest_lifetime() -> u64 {
    4000
}

const fn default_cache_ttl() -> u64 {
    3_600_000
}

const fn default_grace_period() -> i64 {
    120_000
}

const fn default_max_records() -> i64 {
    1000
}

const fn default_record_ttl() -> i64 {
    3_600_000
}

/// A trust-policy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PolicyConfig {
    #[serde(default)]
    pub rule: Vec<RuleConfig>,

    #[serde(default)]
    pub trust_anchor: Vec<TrustAnchorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RuleConfig {
    pub id: String,

    #[serde(rename = "for")]
    pub kind: PacketKind,

    #[serde(default)]
    pub filter: Vec<FilterConfig>,

    #[serde(default)]
    pub checker: Vec<CheckerConfig>,
}

/// `type = "name"` with either `name` + `relation` or `regex`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FilterConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub relation: Option<String>,
    pub regex: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct CheckerConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub sig_type: Option<String>,
    pub key_locator: Option<KeyLocatorConfig>,
    #[serde(default)]
    pub signer: Vec<SignerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct KeyLocatorConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub relation: Option<String>,
    pub regex: Option<String>,
    pub hyper_relation: Option<HyperRelationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct HyperRelationConfig {
    pub k_regex: String,
    pub k_expand: String,
    pub h_relation: String,
    pub p_regex: String,
    pub p_expand: String,
}

/// `type = "file"` with `file-name`, or `type = "base64"` with
/// `base64-string`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct SignerConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub file_name: Option<PathBuf>,
    pub base64_string: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct TrustAnchorConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub file_name: Option<PathBuf>,
    pub base64_string: Option<String>,
    pub dir: Option<PathBuf>,
    pub refresh: Option<String>,
}

/// Where a trust anchor comes from once the policy is compiled.
#[derive(Debug, Clone)]
pub enum AnchorSource {
    /// Loaded once.
    Static(Certificate),
    /// Reloaded from disk every `refresh`.
    Dynamic {
        path: PathBuf,
        is_dir: bool,
        refresh: Duration,
    },
}

/// A policy ready to be installed into a validator.
#[derive(Debug, Clone, Default)]
pub struct CompiledPolicy {
    pub data_rules: Vec<Rule>,
    pub interest_rules: Vec<Rule>,
    pub anchors: Vec<AnchorSource>,
    pub trust_any: bool,
}

impl PolicyConfig {
    /// Parse a policy file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Build rules and anchor sources; relative paths resolve against
    /// `base_dir`.
    pub fn compile(&self, base_dir: &Path) -> Result<CompiledPolicy> {
        let mut policy = CompiledPolicy::default();

        for rule in &self.rule {
            let compiled = compile_rule(rule, base_dir)?;
            match compiled.kind {
                PacketKind::Data => policy.data_rules.push(compiled),
                PacketKind::Interest => policy.interest_rules.push(compiled),
            }
        }

        for anchor in &self.trust_anchor {
            match compile_anchor(anchor, base_dir)? {
                Some(source) => policy.anchors.push(source),
                None => policy.trust_any = true,
            }
        }

        info!(
            data_rules = policy.data_rules.len(),
            interest_rules = policy.interest_rules.len(),
            anchors = policy.anchors.len(),
            trust_any = policy.trust_any,
            "trust policy compiled"
        );
        Ok(policy)
    }
}

impl FromStr for PolicyConfig {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

fn required<'a, T: ?Sized>(value: Option<&'a T>, what: &str) -> Result<&'a T> {
    value.ok_or_else(|| TrustError::config(format!("Expect <{what}>!")))
}

fn parse_name(uri: &str) -> Result<Name> {
    Name::parse(uri).map_err(|e| TrustError::config(format!("bad name `{uri}`: {e}")))
}

fn parse_sig_type(text: &str) -> Result<SignatureType> {
    match text.to_ascii_lowercase().as_str() {
        "rsa-sha256" => Ok(SignatureType::Sha256WithRsa),
        "ecdsa-sha256" => Ok(SignatureType::Sha256WithEcdsa),
        "sha256" => Ok(SignatureType::DigestSha256),
        other => Err(TrustError::config(format!("unsupported sig-type: {other}"))),
    }
}

/// Parse a refresh period such as `1h`, `30m` or `10s`; zero selects
/// [`DEFAULT_REFRESH`].
pub fn parse_refresh(text: &str) -> Result<Duration> {
    let bad = || TrustError::config(format!("bad refresh period: {text}"));
    let text = text.trim();
    let unit = text.chars().last().ok_or_else(bad)?;
    let amount: u64 = text[..text.len() - unit.len_utf8()].parse().map_err(|_| bad())?;

    let seconds = match unit.to_ascii_lowercase() {
        'h' => amount.checked_mul(3600),
        'm' => amount.checked_mul(60),
        's' => Some(amount),
        _ => None,
    }
    .ok_or_else(bad)?;

    if seconds == 0 {
        Ok(DEFAULT_REFRESH)
    } else {
        Ok(Duration::from_secs(seconds))
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn compile_rule(config: &RuleConfig, base_dir: &Path) -> Result<Rule> {
    let mut rule = Rule::new(config.id.clone(), config.kind);
    for filter in &config.filter {
        rule.filters.push(compile_filter(filter)?);
    }
    if config.checker.is_empty() {
        return Err(TrustError::config(format!(
            "rule `{}`: Expect <rule.checker>!",
            config.id
        )));
    }
    for checker in &config.checker {
        rule.checkers.push(compile_checker(checker, base_dir)?);
    }
    Ok(rule)
}

fn compile_filter(config: &FilterConfig) -> Result<Filter> {
    if !config.kind.eq_ignore_ascii_case("name") {
        return Err(TrustError::config(format!(
            "unsupported filter.type: {}",
            config.kind
        )));
    }
    if let Some(name) = &config.name {
        let relation: Relation = required(config.relation.as_deref(), "filter.relation")?.parse()?;
        return Ok(Filter::Relation {
            name: parse_name(name)?,
            relation,
        });
    }
    let regex = required(config.regex.as_deref(), "filter.name or filter.regex")?;
    Ok(Filter::Regex(NameRegex::new(regex)?))
}

fn compile_checker(config: &CheckerConfig, base_dir: &Path) -> Result<Checker> {
    let sig_type = parse_sig_type(required(config.sig_type.as_deref(), "checker.sig-type")?)?;

    match config.kind.to_ascii_lowercase().as_str() {
        "customized" => {
            let key_locator = config
                .key_locator
                .as_ref()
                .map(compile_key_locator)
                .transpose()?;
            Checker::customized(sig_type, key_locator)
        }
        "hierarchical" => Checker::hierarchical(sig_type),
        "fixed-signer" => {
            let signers = config
                .signer
                .iter()
                .map(|signer| load_signer(signer, base_dir))
                .collect::<Result<Vec<_>>>()?;
            Checker::fixed_signer(sig_type, signers)
        }
        other => Err(TrustError::config(format!("unsupported checker.type: {other}"))),
    }
}

fn compile_key_locator(config: &KeyLocatorConfig) -> Result<KeyLocatorChecker> {
    if !config.kind.eq_ignore_ascii_case("name") {
        return Err(TrustError::config(format!(
            "unsupported key-locator.type: {}",
            config.kind
        )));
    }

    if let Some(name) = &config.name {
        let relation: Relation =
            required(config.relation.as_deref(), "key-locator.relation")?.parse()?;
        return Ok(KeyLocatorChecker::Relation {
            name: parse_name(name)?,
            relation,
        });
    }
    if let Some(regex) = &config.regex {
        return Ok(KeyLocatorChecker::Regex(NameRegex::new(regex)?));
    }
    let hyper = required(
        config.hyper_relation.as_ref(),
        "key-locator.name, key-locator.regex or key-locator.hyper-relation",
    )?;
    Ok(KeyLocatorChecker::HyperRelation {
        key_regex: NameRegex::new(&hyper.k_regex)?,
        key_expand: hyper.k_expand.clone(),
        relation: hyper.h_relation.parse()?,
        packet_regex: NameRegex::new(&hyper.p_regex)?,
        packet_expand: hyper.p_expand.clone(),
    })
}

fn load_signer(config: &SignerConfig, base_dir: &Path) -> Result<Certificate> {
    match config.kind.to_ascii_lowercase().as_str() {
        "file" => {
            let path = resolve(base_dir, required(config.file_name.as_deref(), "signer.file-name")?);
            load_certificate_file(&path)
                .map_err(|e| TrustError::config(format!("cannot read signer {}: {e}", path.display())))
        }
        "base64" => {
            let text = required(config.base64_string.as_deref(), "signer.base64-string")?;
            decode_certificate_base64(text)
                .map_err(|e| TrustError::config(format!("cannot decode signer: {e}")))
        }
        other => Err(TrustError::config(format!("unsupported signer.type: {other}"))),
    }
}

/// `Ok(None)` is the `any` anchor.
fn compile_anchor(config: &TrustAnchorConfig, base_dir: &Path) -> Result<Option<AnchorSource>> {
    let refresh = config.refresh.as_deref().map(parse_refresh).transpose()?;

    match config.kind.to_ascii_lowercase().as_str() {
        "file" => {
            let path = resolve(
                base_dir,
                required(config.file_name.as_deref(), "trust-anchor.file-name")?,
            );
            let cert = load_certificate_file(&path).map_err(|e| {
                TrustError::config(format!("cannot read trust anchor {}: {e}", path.display()))
            })?;
            Ok(Some(match refresh {
                Some(refresh) => AnchorSource::Dynamic {
                    path,
                    is_dir: false,
                    refresh,
                },
                None => AnchorSource::Static(cert),
            }))
        }
        "base64" => {
            let text = required(config.base64_string.as_deref(), "trust-anchor.base64-string")?;
            let cert = decode_certificate_base64(text)
                .map_err(|e| TrustError::config(format!("cannot decode trust anchor: {e}")))?;
            Ok(Some(AnchorSource::Static(cert)))
        }
        "dir" => {
            let path = resolve(base_dir, required(config.dir.as_deref(), "trust-anchor.dir")?);
            if !path.is_dir() {
                return Err(TrustError::config(format!(
                    "trust anchor directory {} does not exist",
                    path.display()
                )));
            }
            Ok(Some(AnchorSource::Dynamic {
                path,
                is_dir: true,
                refresh: refresh.unwrap_or(DEFAULT_REFRESH),
            }))
        }
        "any" => Ok(None),
        other => Err(TrustError::config(format!("unsupported trust-anchor.type: {other}"))),
    }
}
