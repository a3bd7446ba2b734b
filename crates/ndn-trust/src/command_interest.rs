//! Command Interest replay protection.
//!
//! Every signer key has a record of the last accepted timestamp. The first
//! command from a key must be signed within the grace period of the local
//! clock; later commands must carry strictly larger timestamps.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use ndn_der::Timestamp;
use ndn_packet::{naming, Interest, KeyLocator, Name, MIN_SIGNED_LENGTH};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::CommandInterestOptions;
use crate::error::{CommandInterestError, Result, TrustError, ValidationError};
use crate::validator::Validator;

/// Source of wall-clock milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Timestamp;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Timestamp {
        crate::certificate::now_ms()
    }
}

/// A clock that only moves when told to; clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    #[must_use]
    pub fn new(start_ms: Timestamp) -> Self {
        Self(Arc::new(AtomicI64::new(start_ms)))
    }

    pub fn set_ms(&self, now: Timestamp) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta: Timestamp) {
        self.0.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
struct Record {
    timestamp: u64,
    last_refreshed: Timestamp,
    seq: u64,
}

/// Last-seen timestamps per signer key, bounded by count and age.
///
/// Records are indexed by key name and by refresh order; the oldest record
/// is evicted first.
#[derive(Debug)]
pub struct ReplayTracker {
    options: CommandInterestOptions,
    records: HashMap<Name, Record>,
    order: BTreeMap<u64, Name>,
    next_seq: u64,
}

impl ReplayTracker {
    #[must_use]
    pub fn new(options: CommandInterestOptions) -> Self {
        Self {
            options,
            records: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Last accepted timestamp for `key_name`, if tracked.
    #[must_use]
    pub fn last_timestamp(&self, key_name: &Name) -> Option<u64> {
        self.records.get(key_name).map(|r| r.timestamp)
    }

    fn pop_oldest(&mut self) {
        if let Some((_, name)) = self.order.pop_first() {
            self.records.remove(&name);
        }
    }

    /// Drop records older than the TTL, then the oldest records while over
    /// capacity.
    pub fn cleanup(&mut self, now: Timestamp) {
        let expire_before = now.saturating_sub(self.options.record_ttl_ms);
        while let Some(name) = self.order.first_key_value().map(|(_, name)| name) {
            let expired = self
                .records
                .get(name)
                .map_or(true, |r| r.last_refreshed <= expire_before);
            if !expired {
                break;
            }
            self.pop_oldest();
        }

        if let Ok(max) = usize::try_from(self.options.max_records) {
            while self.records.len() > max {
                self.pop_oldest();
            }
        }
    }

    /// Decide whether `timestamp` is acceptable for `key_name` without
    /// recording it.
    ///
    /// # Errors
    ///
    /// `TimestampReorder` if a record exists and `timestamp` does not exceed
    /// it; `TimestampOutOfGrace` for an untracked key whose timestamp is too
    /// far from `now`.
    pub fn check(
        &mut self,
        key_name: &Name,
        timestamp: u64,
        now: Timestamp,
    ) -> std::result::Result<(), CommandInterestError> {
        self.cleanup(now);

        if let Some(record) = self.records.get(key_name) {
            if timestamp <= record.timestamp {
                debug!(key = %key_name, timestamp, last = record.timestamp, "command timestamp reordered");
                return Err(CommandInterestError::TimestampReorder);
            }
            return Ok(());
        }

        let signed_at = i64::try_from(timestamp).unwrap_or(i64::MAX);
        if now.abs_diff(signed_at) > self.options.grace_period_ms.unsigned_abs() {
            debug!(key = %key_name, timestamp, now, "command timestamp outside grace period");
            return Err(CommandInterestError::TimestampOutOfGrace);
        }
        Ok(())
    }

    /// Record `timestamp` as the latest for `key_name` and make it the most
    /// recently refreshed record.
    pub fn record(&mut self, key_name: &Name, timestamp: u64, now: Timestamp) {
        if let Some(old) = self.records.remove(key_name) {
            self.order.remove(&old.seq);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.insert(
            key_name.clone(),
            Record {
                timestamp,
                last_refreshed: now,
                seq,
            },
        );
        self.order.insert(seq, key_name.clone());
        self.cleanup(now);
    }

    /// [`check`](Self::check) followed by [`record`](Self::record) on
    /// success.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub fn check_timestamp(
        &mut self,
        key_name: &Name,
        timestamp: u64,
        now: Timestamp,
    ) -> std::result::Result<(), CommandInterestError> {
        self.check(key_name, timestamp, now)?;
        self.record(key_name, timestamp, now);
        Ok(())
    }
}

/// Signer key name and timestamp extracted from a command Interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub key_name: Name,
    pub timestamp: u64,
}

/// Extract the signer key and timestamp from a command Interest.
///
/// # Errors
///
/// Returns the structural [`CommandInterestError`] describing the first
/// problem found.
pub fn parse_command_interest(
    interest: &Interest,
) -> std::result::Result<CommandInfo, CommandInterestError> {
    if interest.name.len() < MIN_SIGNED_LENGTH {
        return Err(CommandInterestError::NameTooShort);
    }
    let timestamp = interest
        .signed_timestamp()
        .map_err(|_| CommandInterestError::BadTimestamp)?;
    let info = interest
        .signature_info()
        .map_err(|_| CommandInterestError::BadSigInfo)?;
    let cert_name = match info.key_locator {
        None => return Err(CommandInterestError::MissingKeyLocator),
        Some(KeyLocator::KeyDigest(_)) => return Err(CommandInterestError::BadKeyLocatorType),
        Some(KeyLocator::Name(name)) => name,
    };
    let key_name = naming::certificate_name_to_public_key_name(&cert_name)
        .map_err(|_| CommandInterestError::BadCertName)?;
    Ok(CommandInfo {
        key_name,
        timestamp,
    })
}

/// Validates command Interests: replay checks first, then the inner
/// validator's trust policy.
pub struct CommandInterestValidator<C = SystemClock> {
    inner: Validator,
    tracker: Mutex<ReplayTracker>,
    clock: C,
}

impl CommandInterestValidator<SystemClock> {
    /// # Errors
    ///
    /// Returns `TrustError::InvalidArgument` for options that make no sense
    /// (negative grace period or TTL, capacity below -1).
    pub fn new(inner: Validator, options: CommandInterestOptions) -> Result<Self> {
        Self::with_clock(inner, options, SystemClock)
    }
}

impl<C: Clock> CommandInterestValidator<C> {
    /// # Errors
    ///
    /// See [`CommandInterestValidator::new`].
    pub fn with_clock(inner: Validator, options: CommandInterestOptions, clock: C) -> Result<Self> {
        if options.grace_period_ms < 0 {
            return Err(TrustError::InvalidArgument("grace period must be non-negative".into()));
        }
        if options.record_ttl_ms < 0 {
            return Err(TrustError::InvalidArgument("record TTL must be non-negative".into()));
        }
        if options.max_records < -1 {
            return Err(TrustError::InvalidArgument(
                "max records must be -1 (unlimited) or non-negative".into(),
            ));
        }
        Ok(Self {
            inner,
            tracker: Mutex::new(ReplayTracker::new(options)),
            clock,
        })
    }

    /// The wrapped validator.
    #[must_use]
    pub const fn inner(&self) -> &Validator {
        &self.inner
    }

    /// Number of signer keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.tracker.lock().len()
    }

    /// Validate a command Interest.
    ///
    /// The timestamp is recorded only after the inner validator accepts.
    ///
    /// # Errors
    ///
    /// Returns the structural or freshness failure, or the inner validator's
    /// rejection.
    pub async fn validate(&self, interest: &Interest) -> std::result::Result<(), ValidationError> {
        let info = parse_command_interest(interest)?;

        let now = self.clock.now_ms();
        self.tracker.lock().check(&info.key_name, info.timestamp, now)?;

        self.inner.validate_interest(interest).await?;

        let now = self.clock.now_ms();
        let mut tracker = self.tracker.lock();
        // Another command from the same key may have been accepted meanwhile.
        tracker.check(&info.key_name, info.timestamp, now)?;
        tracker.record(&info.key_name, info.timestamp, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{CommandInterestSigner, Signer};

    const GRACE: i64 = 15_000;

    fn options(max_records: i64, record_ttl_ms: i64) -> CommandInterestOptions {
        CommandInterestOptions {
            grace_period_ms: GRACE,
            max_records,
            record_ttl_ms,
        }
    }

    fn key(uri: &str) -> Name {
        Name::parse(uri).unwrap()
    }

    #[test]
    fn increasing_timestamps_accepted() {
        let mut tracker = ReplayTracker::new(options(1000, 3_600_000));
        let k = key("/user/ksk-1");
        let now = 1_000_000;
        for ts in [1_000_000u64, 1_000_001, 1_000_500, 2_000_000] {
            assert_eq!(tracker.check_timestamp(&k, ts, now), Ok(()));
        }
        assert_eq!(tracker.last_timestamp(&k), Some(2_000_000));
    }

    #[test]
    fn repeated_or_older_timestamp_rejected() {
        let mut tracker = ReplayTracker::new(options(1000, 3_600_000));
        let k = key("/user/ksk-1");
        tracker.check_timestamp(&k, 1_000, 1_000).unwrap();
        assert_eq!(
            tracker.check_timestamp(&k, 1_000, 1_000),
            Err(CommandInterestError::TimestampReorder)
        );
        assert_eq!(
            tracker.check_timestamp(&k, 999, 1_000),
            Err(CommandInterestError::TimestampReorder)
        );
    }

    #[test]
    fn grace_period_applies_to_initial_only() {
        let mut tracker = ReplayTracker::new(options(1000, 3_600_000));
        let k = key("/user/ksk-1");
        let now = 100_000;
        assert_eq!(
            tracker.check_timestamp(&k, 100_000 + 15_001, now),
            Err(CommandInterestError::TimestampOutOfGrace)
        );
        assert_eq!(
            tracker.check_timestamp(&k, 100_000 - 15_001, now),
            Err(CommandInterestError::TimestampOutOfGrace)
        );
        assert!(tracker.is_empty());

        tracker.check_timestamp(&k, 100_000 - 15_000, now).unwrap();
        // Far in the future, but the key is already tracked.
        assert_eq!(tracker.check_timestamp(&k, 10_000_000, now), Ok(()));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut tracker = ReplayTracker::new(options(2, 3_600_000));
        let (a, b, c) = (key("/a"), key("/b"), key("/c"));
        tracker.check_timestamp(&a, 1_000, 1_000).unwrap();
        tracker.check_timestamp(&b, 1_000, 1_000).unwrap();
        // Refreshing `a` makes `b` the oldest.
        tracker.check_timestamp(&a, 1_001, 1_000).unwrap();
        tracker.check_timestamp(&c, 1_000, 1_000).unwrap();

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.last_timestamp(&b), None);
        assert_eq!(tracker.last_timestamp(&a), Some(1_001));
        // `b` is treated as initial again.
        assert_eq!(tracker.check_timestamp(&b, 1_000, 1_000), Ok(()));
    }

    #[test]
    fn ttl_expiry_makes_key_initial_again() {
        let mut tracker = ReplayTracker::new(options(1000, 60_000));
        let k = key("/a");
        tracker.check_timestamp(&k, 1_000, 1_000).unwrap();
        assert_eq!(
            tracker.check_timestamp(&k, 1_000, 30_000),
            Err(CommandInterestError::TimestampReorder)
        );
        // Expired; now the grace period decides.
        assert_eq!(
            tracker.check_timestamp(&k, 1_000, 61_000),
            Err(CommandInterestError::TimestampOutOfGrace)
        );
        assert!(tracker.is_empty());
        assert_eq!(tracker.check_timestamp(&k, 61_000, 61_000), Ok(()));
    }

    #[test]
    fn zero_capacity_disables_tracking() {
        let mut tracker = ReplayTracker::new(options(0, 3_600_000));
        let k = key("/a");
        tracker.check_timestamp(&k, 1_000, 1_000).unwrap();
        assert!(tracker.is_empty());
        assert_eq!(tracker.check_timestamp(&k, 1_000, 1_000), Ok(()));
    }

    #[test]
    fn unlimited_capacity() {
        let mut tracker = ReplayTracker::new(options(-1, 3_600_000));
        for i in 0..50 {
            tracker
                .check_timestamp(&key(&format!("/k{i}")), 1_000, 1_000)
                .unwrap();
        }
        assert_eq!(tracker.len(), 50);
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let mut tracker = ReplayTracker::new(options(1000, 0));
        let k = key("/a");
        tracker.check_timestamp(&k, 1_000, 1_000).unwrap();
        assert!(tracker.is_empty());
        assert_eq!(tracker.check_timestamp(&k, 1_000, 1_000), Ok(()));
    }

    #[test]
    fn structural_errors() {
        let short = Interest::new(key("/a/b/c"));
        assert_eq!(
            parse_command_interest(&short),
            Err(CommandInterestError::NameTooShort)
        );

        let bad_ts = Interest::new(key("/a/abc/r/s/v"));
        assert_eq!(
            parse_command_interest(&bad_ts),
            Err(CommandInterestError::BadTimestamp)
        );

        let bad_info = Interest::new(
            key("/a")
                .append(ndn_packet::Component::from_number(1))
                .append("r")
                .append("s")
                .append("v"),
        );
        assert_eq!(
            parse_command_interest(&bad_info),
            Err(CommandInterestError::BadSigInfo)
        );

        let digest = CommandInterestSigner::with_clock(Signer::Digest, ManualClock::new(5))
            .make_with_timestamp(&key("/cmd"), 5)
            .unwrap();
        assert_eq!(
            parse_command_interest(&digest),
            Err(CommandInterestError::MissingKeyLocator)
        );
    }

    #[test]
    fn key_name_from_locator() {
        let (signer, _) = Signer::generate_ecdsa(key("/user/KEY/ksk-1/ID-CERT")).unwrap();
        let interest = CommandInterestSigner::with_clock(signer, ManualClock::new(0))
            .make_with_timestamp(&key("/cmd"), 42)
            .unwrap();
        let info = parse_command_interest(&interest).unwrap();
        assert_eq!(info.key_name, key("/user/ksk-1"));
        assert_eq!(info.timestamp, 42);

        let (bad_signer, _) = Signer::generate_ecdsa(key("/user/ksk-1")).unwrap();
        let bad = CommandInterestSigner::with_clock(bad_signer, ManualClock::new(0))
            .make_with_timestamp(&key("/cmd"), 42)
            .unwrap();
        assert_eq!(
            parse_command_interest(&bad),
            Err(CommandInterestError::BadCertName)
        );
    }

    #[test]
    fn contract_violations_fail_at_construction() {
        let validator = Validator::new(Arc::new(crate::fetcher::OfflineFetcher));
        let bad = CommandInterestOptions {
            grace_period_ms: -1,
            ..CommandInterestOptions::default()
        };
        assert!(matches!(
            CommandInterestValidator::new(validator.clone(), bad),
            Err(TrustError::InvalidArgument(_))
        ));
        let bad = CommandInterestOptions {
            max_records: -2,
            ..CommandInterestOptions::default()
        };
        assert!(CommandInterestValidator::new(validator, bad).is_err());
    }
}
