//! Trust management for NDN packets.
//!
//! This crate provides:
//!
//! - **Certificates**: [`Certificate`] decoding and encoding over `ndn-der`
//! - **Policy**: name filters, signature checkers and [`Rule`]s, loadable
//!   from a TOML document ([`PolicyConfig`])
//! - **Validation**: the [`Validator`] state machine with trust anchors, a
//!   TTL certificate cache and pluggable certificate fetchers
//! - **Command Interests**: replay protection in
//!   [`CommandInterestValidator`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use ndn_packet::Data;
//! use ndn_trust::{OfflineFetcher, Validator};
//!
//! # async fn run(data: Data) -> Result<(), Box<dyn std::error::Error>> {
//! let validator = Validator::new(Arc::new(OfflineFetcher));
//! validator.load(Path::new("/etc/ndn/trust.toml"))?;
//!
//! match validator.validate_data(&data).await {
//!     Ok(()) => println!("{} is trusted", data.name),
//!     Err(e) => println!("rejected: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/ndn-trust/2.0.0")]

mod anchors;
mod cache;
mod certificate;
mod command_interest;
mod config;
mod error;
mod fetcher;
mod packet;
pub mod policy;
pub mod regex;
mod signing;
mod storage;
mod validator;
pub mod verify;

pub use anchors::{
    decode_certificate_base64, encode_certificate_base64, load_certificate_file,
    TrustAnchorContainer,
};
pub use cache::CertificateCacheTtl;
pub use certificate::{
    lookup_name, now_ms, Certificate, CertificateExtension, KeyType, PublicKeyInfo,
    SubjectDescription,
};
pub use command_interest::{
    parse_command_interest, Clock, CommandInfo, CommandInterestValidator, ManualClock,
    ReplayTracker, SystemClock,
};
pub use config::{
    parse_refresh, AnchorSource, CheckerConfig, CommandInterestOptions, CompiledPolicy,
    FilterConfig, HyperRelationConfig, KeyLocatorConfig, PolicyConfig, RuleConfig, SignerConfig,
    TrustAnchorConfig, ValidatorOptions, DEFAULT_REFRESH,
};
pub use error::{
    CommandInterestError, Result, TrustError, ValidationError, ValidationErrorCode,
};
pub use fetcher::{
    CertificateFetcher, Face, FetchOutcome, NetworkFetcher, OfflineFetcher, StorageFetcher,
};
pub use packet::SignedPacket;
pub use crate::policy::{Checker, Filter, KeyLocatorChecker, PacketKind, Relation, Rule, Verdict};
pub use crate::regex::{NameRegex, RegexMatch};
pub use signing::{CommandInterestSigner, Signer};
pub use storage::{IdentityStorage, MemoryIdentityStorage};
pub use validator::Validator;
