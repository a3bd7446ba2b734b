//! Certificate and key naming conventions.
//!
//! Certificates are named `<identity>/KEY/<key-id...>/ID-CERT/<version>`; the
//! public key they certify is `<identity>/<key-id...>`.

use crate::error::{PacketError, Result};
use crate::name::{Component, Name};

pub const KEY: &str = "KEY";
pub const ID_CERT: &str = "ID-CERT";

/// Derive the public-key name from a certificate name.
///
/// # Errors
///
/// Returns `PacketError::BadCertificateName` if the name has no `ID-CERT`
/// component or no `KEY` component before it.
pub fn certificate_name_to_public_key_name(cert_name: &Name) -> Result<Name> {
    let components = cert_name.components();
    let id_cert = Component::from(ID_CERT);
    let key = Component::from(KEY);

    let id_cert_pos = components
        .iter()
        .rposition(|c| *c == id_cert)
        .ok_or_else(|| PacketError::BadCertificateName(cert_name.to_uri()))?;
    let key_pos = components[..id_cert_pos]
        .iter()
        .position(|c| *c == key)
        .ok_or_else(|| PacketError::BadCertificateName(cert_name.to_uri()))?;

    Ok(Name::from(
        components[..key_pos]
            .iter()
            .chain(&components[key_pos + 1..id_cert_pos])
            .cloned()
            .collect::<Vec<_>>(),
    ))
}

/// Build `<identity>/KEY/<key-id>/ID-CERT/<version>`.
#[must_use]
pub fn make_certificate_name(identity: &Name, key_id: &str, version: u64) -> Name {
    identity
        .clone()
        .append(KEY)
        .append(key_id)
        .append(ID_CERT)
        .append(Component::from_version(version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_name_from_certificate_name() {
        let cert = Name::parse("/ndn/edu/KEY/ksk-123/ID-CERT/%FD%01").unwrap();
        assert_eq!(
            certificate_name_to_public_key_name(&cert).unwrap().to_uri(),
            "/ndn/edu/ksk-123"
        );

        let unversioned = Name::parse("/a/KEY/b/c/ID-CERT").unwrap();
        assert_eq!(
            certificate_name_to_public_key_name(&unversioned).unwrap().to_uri(),
            "/a/b/c"
        );
    }

    #[test]
    fn malformed_certificate_names() {
        for uri in ["/a/b/c", "/a/ID-CERT/KEY", "/a/KEY/b"] {
            let name = Name::parse(uri).unwrap();
            assert!(matches!(
                certificate_name_to_public_key_name(&name),
                Err(PacketError::BadCertificateName(_))
            ));
        }
    }

    #[test]
    fn built_names_parse_back() {
        let identity = Name::parse("/ndn/ucla").unwrap();
        let cert = make_certificate_name(&identity, "ksk-1", 5);
        assert_eq!(cert.len(), 6);
        assert_eq!(cert.get(-1).unwrap().to_version().unwrap(), 5);
        assert_eq!(
            certificate_name_to_public_key_name(&cert).unwrap().to_uri(),
            "/ndn/ucla/ksk-1"
        );
    }
}
