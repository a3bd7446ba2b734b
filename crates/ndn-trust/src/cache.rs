//! Verified-certificate cache with per-entry expiry timers.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use ndn_packet::Name;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::certificate::{lookup_name, Certificate};

struct Entry {
    cert: Arc<Certificate>,
    expires_at: Instant,
    timer: Option<JoinHandle<()>>,
}

struct CacheInner {
    entries: Mutex<HashMap<Name, Entry>>,
    default_ttl: Duration,
    max_ttl: Duration,
}

impl CacheInner {
    fn evict(&self, key: &Name, expires_at: Instant) {
        let mut entries = self.entries.lock();
        // A re-insert may have replaced the entry after this timer fired.
        if entries.get(key).is_some_and(|e| e.expires_at == expires_at) {
            entries.remove(key);
            debug!(name = %key, "certificate evicted from cache");
        }
    }
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        for entry in self.entries.get_mut().values() {
            if let Some(timer) = &entry.timer {
                timer.abort();
            }
        }
    }
}

/// Certificates that completed validation, each kept until its freshness
/// period (capped by the maximum TTL) runs out.
///
/// Clones share the same storage.
#[derive(Clone)]
pub struct CertificateCacheTtl {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for CertificateCacheTtl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateCacheTtl")
            .field("entries", &self.inner.entries.lock().len())
            .field("default_ttl", &self.inner.default_ttl)
            .field("max_ttl", &self.inner.max_ttl)
            .finish()
    }
}

impl CertificateCacheTtl {
    #[must_use]
    pub fn new(default_ttl: Duration, max_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                default_ttl,
                max_ttl,
            }),
        }
    }

    fn lifetime(&self, cert: &Certificate) -> Duration {
        match cert.freshness_period() {
            Some(freshness) if !freshness.is_zero() => freshness.min(self.inner.max_ttl),
            _ => self.inner.default_ttl,
        }
    }

    /// Insert or refresh a certificate. Re-inserting cancels the pending
    /// eviction and schedules a new one.
    pub fn insert(&self, cert: Arc<Certificate>) {
        let key = cert.name_without_version();
        let lifetime = self.lifetime(&cert);
        let expires_at = Instant::now() + lifetime;

        // Outside a runtime the entry still expires lazily on lookup.
        let timer = Handle::try_current().ok().map(|handle| {
            let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
            let key = key.clone();
            handle.spawn(async move {
                tokio::time::sleep_until(expires_at).await;
                if let Some(inner) = weak.upgrade() {
                    inner.evict(&key, expires_at);
                }
            })
        });

        debug!(name = %key, lifetime_ms = lifetime.as_millis(), "certificate cached");
        let previous = self.inner.entries.lock().insert(
            key,
            Entry {
                cert,
                expires_at,
                timer,
            },
        );
        if let Some(timer) = previous.and_then(|e| e.timer) {
            timer.abort();
        }
    }

    /// Look up by certificate or KeyLocator name; a trailing version is
    /// ignored.
    pub fn get(&self, name: &Name) -> Option<Arc<Certificate>> {
        let key = lookup_name(name);
        let entries = self.inner.entries.lock();
        entries
            .get(&key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| Arc::clone(&e.cert))
    }

    /// Drop everything and cancel all pending evictions.
    pub fn reset(&self) {
        let drained: Vec<Entry> = self.inner.entries.lock().drain().map(|(_, e)| e).collect();
        for timer in drained.into_iter().filter_map(|e| e.timer) {
            timer.abort();
        }
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .entries
            .lock()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::PublicKeyInfo;

    fn cert(freshness: Option<Duration>) -> Arc<Certificate> {
        let mut cert = Certificate::new(Name::parse("/a/KEY/ksk-1/ID-CERT/%FD%01").unwrap());
        cert.set_public_key(PublicKeyInfo::ec_p256(vec![4; 65]));
        if let Some(period) = freshness {
            cert.data_mut().freshness_period = Some(period);
        }
        Arc::new(cert)
    }

    fn key() -> Name {
        Name::parse("/a/KEY/ksk-1/ID-CERT").unwrap()
    }

    async fn advance_ms(ms: u64) {
        tokio::time::advance(Duration::from_millis(ms)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn freshness_bounds_lifetime() {
        let cache = CertificateCacheTtl::new(Duration::from_secs(1), Duration::from_secs(3600));
        cache.insert(cert(Some(Duration::from_millis(500))));

        advance_ms(300).await;
        assert!(cache.get(&key()).is_some());

        advance_ms(300).await;
        assert!(cache.get(&key()).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_extends_lifetime() {
        let cache = CertificateCacheTtl::new(Duration::from_secs(1), Duration::from_secs(3600));
        cache.insert(cert(None));
        advance_ms(800).await;
        cache.insert(cert(None));

        advance_ms(700).await;
        assert!(cache.get(&key()).is_some());

        advance_ms(400).await;
        assert!(cache.get(&key()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn max_ttl_caps_freshness() {
        let cache = CertificateCacheTtl::new(Duration::from_secs(1), Duration::from_secs(2));
        cache.insert(cert(Some(Duration::from_secs(60))));
        advance_ms(1_900).await;
        assert!(cache.get(&key()).is_some());
        advance_ms(200).await;
        assert!(cache.get(&key()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_everything() {
        let cache = CertificateCacheTtl::new(Duration::from_secs(1), Duration::from_secs(1));
        cache.insert(cert(None));
        assert_eq!(cache.len(), 1);
        cache.reset();
        assert!(cache.get(&key()).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn works_without_runtime() {
        let cache = CertificateCacheTtl::new(Duration::from_secs(60), Duration::from_secs(60));
        cache.insert(cert(None));
        assert!(cache.get(&key()).is_some());
        assert!(cache
            .get(&Name::parse("/a/KEY/ksk-1/ID-CERT/%FD%05").unwrap())
            .is_some());
    }
}
