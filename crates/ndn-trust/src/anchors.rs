//! Trust anchors: certificates trusted without further validation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use ndn_packet::{Data, Name};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::certificate::{lookup_name, Certificate};
use crate::error::Result;

/// Decode a base64 certificate; whitespace and line breaks are ignored.
pub fn decode_certificate_base64(text: &str) -> Result<Certificate> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let wire = B64.decode(compact)?;
    Certificate::from_data(Data::wire_decode(&wire)?)
}

/// Base64 of the certificate's wire encoding.
#[must_use]
pub fn encode_certificate_base64(cert: &Certificate) -> String {
    B64.encode(cert.data().wire_encode())
}

/// Load a certificate file holding either base64 text or the raw wire
/// encoding.
pub fn load_certificate_file(path: &Path) -> Result<Certificate> {
    let bytes = std::fs::read(path)?;
    if let Ok(text) = std::str::from_utf8(&bytes) {
        if let Ok(cert) = decode_certificate_base64(text) {
            return Ok(cert);
        }
    }
    Certificate::from_data(Data::wire_decode(&bytes)?)
}

#[derive(Debug)]
struct DynamicGroup {
    id: u64,
    path: PathBuf,
    is_dir: bool,
    refresh: Duration,
    next_refresh: Instant,
    certs: HashMap<Name, Arc<Certificate>>,
}

/// A dynamic group whose refresh deadline has passed.
#[derive(Debug)]
struct DueGroup {
    id: u64,
    path: PathBuf,
    is_dir: bool,
}

/// Read a certificate file, or every file of a directory. Unreadable or
/// malformed files are skipped.
fn load_group(path: &Path, is_dir: bool) -> HashMap<Name, Arc<Certificate>> {
    let files = if is_dir {
        match std::fs::read_dir(path) {
            Ok(entries) => {
                let mut files = entries
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.is_file())
                    .collect::<Vec<_>>();
                files.sort();
                files
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read trust anchor directory");
                Vec::new()
            }
        }
    } else {
        vec![path.to_path_buf()]
    };

    let mut certs = HashMap::new();
    for file in files {
        match load_certificate_file(&file) {
            Ok(cert) => {
                certs.insert(cert.name_without_version(), Arc::new(cert));
            }
            Err(e) => warn!(path = %file.display(), error = %e, "cannot load trust anchor"),
        }
    }
    certs
}

/// Static anchors plus file and directory groups that are re-read once
/// their refresh deadline has passed.
#[derive(Debug, Default)]
pub struct TrustAnchorContainer {
    static_anchors: HashMap<Name, Arc<Certificate>>,
    dynamic: Vec<DynamicGroup>,
    next_id: u64,
}

impl TrustAnchorContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_static(&mut self, cert: Certificate) {
        debug!(name = %cert.name(), "static trust anchor added");
        self.static_anchors
            .insert(cert.name_without_version(), Arc::new(cert));
    }

    /// Add a file (or every file of a directory) re-read every `refresh`
    /// by the validator's anchor refresh. The first load happens
    /// immediately.
    pub fn add_dynamic(&mut self, path: PathBuf, is_dir: bool, refresh: Duration) {
        let certs = load_group(&path, is_dir);
        debug!(path = %path.display(), count = certs.len(), "dynamic trust anchors loaded");
        self.next_id += 1;
        self.dynamic.push(DynamicGroup {
            id: self.next_id,
            path,
            is_dir,
            refresh,
            next_refresh: Instant::now() + refresh,
            certs,
        });
    }

    /// Find the anchor for a KeyLocator or certificate name; a trailing
    /// version component is ignored.
    pub fn find(&self, name: &Name) -> Option<Arc<Certificate>> {
        let key = lookup_name(name);
        self.static_anchors
            .get(&key)
            .or_else(|| self.dynamic.iter().find_map(|group| group.certs.get(&key)))
            .cloned()
    }

    /// Groups due for a reload. Their deadlines move forward at once so
    /// concurrent callers do not read the same files twice.
    fn take_due(&mut self) -> Vec<DueGroup> {
        let now = Instant::now();
        self.dynamic
            .iter_mut()
            .filter(|group| now >= group.next_refresh)
            .map(|group| {
                group.next_refresh = now + group.refresh;
                DueGroup {
                    id: group.id,
                    path: group.path.clone(),
                    is_dir: group.is_dir,
                }
            })
            .collect()
    }

    /// A group removed by [`reset`](Self::reset) in the meantime is ignored.
    fn install(&mut self, id: u64, certs: HashMap<Name, Arc<Certificate>>) {
        if let Some(group) = self.dynamic.iter_mut().find(|group| group.id == id) {
            debug!(path = %group.path.display(), count = certs.len(), "trust anchors reloaded");
            group.certs = certs;
        }
    }

    pub fn reset(&mut self) {
        self.static_anchors.clear();
        self.dynamic.clear();
    }

    /// Number of anchors currently loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.static_anchors.len() + self.dynamic.iter().map(|g| g.certs.len()).sum::<usize>()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Re-read the dynamic groups whose refresh deadline has passed. File reads
/// run on the blocking pool and the lock is only taken to pick the groups
/// and to install the results.
pub(crate) async fn refresh_due(anchors: &Mutex<TrustAnchorContainer>) {
    let due = anchors.lock().take_due();
    if due.is_empty() {
        return;
    }

    let loaded = tokio::task::spawn_blocking(move || {
        due.into_iter()
            .map(|group| (group.id, load_group(&group.path, group.is_dir)))
            .collect::<Vec<_>>()
    })
    .await;

    match loaded {
        Ok(loaded) => {
            let mut anchors = anchors.lock();
            for (id, certs) in loaded {
                anchors.install(id, certs);
            }
        }
        Err(e) => warn!(error = %e, "trust anchor refresh failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::Signer;

    fn cert(uri: &str) -> Certificate {
        let name = Name::parse(uri).unwrap();
        let (signer, key) = Signer::generate_ecdsa(name.get_prefix(-1)).unwrap();
        let mut cert = Certificate::new(name);
        cert.set_validity(0, 4_000_000_000_000);
        cert.set_public_key(key);
        signer.sign_certificate(&mut cert).unwrap();
        cert
    }

    fn key_name(uri: &str) -> Name {
        Name::parse(uri).unwrap()
    }

    #[test]
    fn base64_and_wire_files() {
        let dir = tempfile::tempdir().unwrap();
        let anchor = cert("/root/KEY/ksk-1/ID-CERT/%FD%01");

        let text_path = dir.path().join("a.cert");
        let encoded = encode_certificate_base64(&anchor);
        // Wrapped the way certificate dumps usually are.
        let wrapped = encoded
            .as_bytes()
            .chunks(64)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&text_path, wrapped).unwrap();
        assert_eq!(load_certificate_file(&text_path).unwrap(), anchor);

        let wire_path = dir.path().join("a.ndncert");
        std::fs::write(&wire_path, anchor.data().wire_encode()).unwrap();
        assert_eq!(load_certificate_file(&wire_path).unwrap(), anchor);

        let junk = dir.path().join("junk");
        std::fs::write(&junk, b"not a certificate").unwrap();
        assert!(load_certificate_file(&junk).is_err());
    }

    #[test]
    fn static_lookup_ignores_version() {
        let mut anchors = TrustAnchorContainer::new();
        anchors.insert_static(cert("/root/KEY/ksk-1/ID-CERT/%FD%01"));
        assert_eq!(anchors.len(), 1);
        assert!(anchors.find(&key_name("/root/KEY/ksk-1/ID-CERT")).is_some());
        assert!(anchors.find(&key_name("/root/KEY/ksk-1/ID-CERT/%FD%07")).is_some());
        assert!(anchors.find(&key_name("/other/KEY/ksk-1/ID-CERT")).is_none());

        anchors.reset();
        assert!(anchors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn directory_refresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.cert"),
            encode_certificate_base64(&cert("/a/KEY/ksk-1/ID-CERT/%FD%01")),
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.cert"), "@@@").unwrap();

        let anchors = Mutex::new(TrustAnchorContainer::new());
        anchors
            .lock()
            .add_dynamic(dir.path().to_path_buf(), true, Duration::from_secs(10));
        assert_eq!(anchors.lock().len(), 1);
        assert!(anchors.lock().find(&key_name("/a/KEY/ksk-1/ID-CERT")).is_some());

        std::fs::write(
            dir.path().join("b.cert"),
            encode_certificate_base64(&cert("/b/KEY/ksk-1/ID-CERT/%FD%01")),
        )
        .unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        refresh_due(&anchors).await;
        assert!(anchors.lock().find(&key_name("/b/KEY/ksk-1/ID-CERT")).is_none());

        tokio::time::advance(Duration::from_secs(6)).await;
        // Lookups never touch the filesystem; only a refresh does.
        assert!(anchors.lock().find(&key_name("/b/KEY/ksk-1/ID-CERT")).is_none());
        refresh_due(&anchors).await;
        assert!(anchors.lock().find(&key_name("/b/KEY/ksk-1/ID-CERT")).is_some());
        assert_eq!(anchors.lock().len(), 2);

        std::fs::remove_file(dir.path().join("a.cert")).unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        refresh_due(&anchors).await;
        assert!(anchors.lock().find(&key_name("/a/KEY/ksk-1/ID-CERT")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_after_reset_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cert");
        std::fs::write(&path, encode_certificate_base64(&cert("/a/KEY/ksk-1/ID-CERT/%FD%01")))
            .unwrap();

        let anchors = Mutex::new(TrustAnchorContainer::new());
        anchors.lock().add_dynamic(path, false, Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;

        let due = anchors.lock().take_due();
        assert_eq!(due.len(), 1);
        assert!(anchors.lock().take_due().is_empty());

        anchors.lock().reset();
        let certs = load_group(&due[0].path, due[0].is_dir);
        anchors.lock().install(due[0].id, certs);
        assert!(anchors.lock().is_empty());
    }
}
