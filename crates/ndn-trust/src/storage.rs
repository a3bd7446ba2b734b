//! Identity storage interface.

use std::collections::HashMap;

use ndn_packet::Name;
use parking_lot::RwLock;

use crate::certificate::{lookup_name, Certificate, PublicKeyInfo};
use crate::error::{Result, TrustError};

/// Read access to locally stored keys and certificates.
pub trait IdentityStorage: Send + Sync {
    /// Whether a public key named `key_name` is stored.
    fn does_key_exist(&self, key_name: &Name) -> bool;

    fn get_key(&self, key_name: &Name) -> Result<PublicKeyInfo>;

    /// Look a certificate up by name; a trailing version is ignored.
    fn get_certificate(&self, cert_name: &Name) -> Result<Certificate>;
}

/// Keys and certificates held in memory.
#[derive(Debug, Default)]
pub struct MemoryIdentityStorage {
    keys: RwLock<HashMap<Name, PublicKeyInfo>>,
    certificates: RwLock<HashMap<Name, Certificate>>,
}

impl MemoryIdentityStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key(&self, key_name: Name, key: PublicKeyInfo) {
        self.keys.write().insert(key_name, key);
    }

    /// Store a certificate and the public key it carries.
    pub fn add_certificate(&self, cert: Certificate) -> Result<()> {
        if let Some(key) = cert.public_key() {
            self.add_key(cert.public_key_name()?, key.clone());
        }
        self.certificates
            .write()
            .insert(cert.name_without_version(), cert);
        Ok(())
    }
}

impl IdentityStorage for MemoryIdentityStorage {
    fn does_key_exist(&self, key_name: &Name) -> bool {
        self.keys.read().contains_key(key_name)
    }

    fn get_key(&self, key_name: &Name) -> Result<PublicKeyInfo> {
        self.keys
            .read()
            .get(key_name)
            .cloned()
            .ok_or_else(|| TrustError::Key(format!("key {key_name} does not exist")))
    }

    fn get_certificate(&self, cert_name: &Name) -> Result<Certificate> {
        self.certificates
            .read()
            .get(&lookup_name(cert_name))
            .cloned()
            .ok_or_else(|| TrustError::Certificate(format!("certificate {cert_name} does not exist")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_certificates_and_keys() {
        let storage = MemoryIdentityStorage::new();
        let key_name = Name::parse("/alice/ksk-1").unwrap();
        assert!(!storage.does_key_exist(&key_name));
        assert!(matches!(storage.get_key(&key_name), Err(TrustError::Key(_))));

        let mut cert = Certificate::new(Name::parse("/alice/KEY/ksk-1/ID-CERT/%FD%01").unwrap());
        let key = PublicKeyInfo::ec_p256(vec![4; 65]);
        cert.set_public_key(key.clone());
        storage.add_certificate(cert.clone()).unwrap();

        assert!(storage.does_key_exist(&key_name));
        assert_eq!(storage.get_key(&key_name).unwrap(), key);
        assert_eq!(
            storage
                .get_certificate(&Name::parse("/alice/KEY/ksk-1/ID-CERT").unwrap())
                .unwrap(),
            cert
        );
        assert!(storage
            .get_certificate(&Name::parse("/bob/KEY/ksk-1/ID-CERT").unwrap())
            .is_err());
    }

    #[test]
    fn rejects_badly_named_certificates() {
        let storage = MemoryIdentityStorage::new();
        let mut cert = Certificate::new(Name::parse("/alice/ksk-1").unwrap());
        cert.set_public_key(PublicKeyInfo::ec_p256(vec![4; 65]));
        assert!(storage.add_certificate(cert).is_err());
    }
}
