//! KeyLocator constraints used by customized and hierarchical checkers.

use ndn_packet::{KeyLocator, Name};

use crate::error::Result;
use crate::policy::filter::Relation;
use crate::regex::NameRegex;

/// Constrains the KeyLocator name a signature may use.
#[derive(Debug, Clone)]
pub enum KeyLocatorChecker {
    /// The configured name must stand in `relation` to the KeyLocator name.
    Relation { name: Name, relation: Relation },
    /// The KeyLocator name must match.
    Regex(NameRegex),
    /// Both names are rewritten through their own regex and template, then
    /// the expanded key name must stand in `relation` to the expanded packet
    /// name.
    HyperRelation {
        key_regex: NameRegex,
        key_expand: String,
        relation: Relation,
        packet_regex: NameRegex,
        packet_expand: String,
    },
}

impl KeyLocatorChecker {
    /// The hierarchical trust model: the signer's identity (with the key id
    /// folded in) must be a prefix of the packet name.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in patterns fail to compile.
    pub fn hierarchical() -> Result<Self> {
        Ok(Self::HyperRelation {
            key_regex: NameRegex::new("^([^<KEY>]*)<KEY>(<>*)<ksk-.*><ID-CERT>$")?,
            key_expand: "\\1\\2".into(),
            relation: Relation::IsPrefixOf,
            packet_regex: NameRegex::new("^(<>*)$")?,
            packet_expand: "\\1".into(),
        })
    }

    /// Check the KeyLocator of a packet named `packet_name`.
    ///
    /// # Errors
    ///
    /// Returns the reason the locator is unacceptable.
    pub fn check(&self, packet_name: &Name, locator: &KeyLocator) -> std::result::Result<(), String> {
        let KeyLocator::Name(key_name) = locator else {
            return Err("KeyLocator is not a name".into());
        };

        match self {
            Self::Relation { name, relation } => {
                if relation.holds(name, key_name) {
                    Ok(())
                } else {
                    Err(format!("KeyLocator {key_name} is not {relation} {name}"))
                }
            }
            Self::Regex(regex) => {
                if regex.matches(key_name) {
                    Ok(())
                } else {
                    Err(format!("KeyLocator {key_name} does not match {regex}"))
                }
            }
            Self::HyperRelation {
                key_regex,
                key_expand,
                relation,
                packet_regex,
                packet_expand,
            } => {
                let key_match = key_regex
                    .match_name(key_name)
                    .ok_or_else(|| format!("KeyLocator {key_name} does not match {key_regex}"))?;
                let packet_match = packet_regex
                    .match_name(packet_name)
                    .ok_or_else(|| format!("packet {packet_name} does not match {packet_regex}"))?;
                let expanded_key = key_match.expand(key_expand).map_err(|e| e.to_string())?;
                let expanded_packet = packet_match.expand(packet_expand).map_err(|e| e.to_string())?;

                if relation.holds(&expanded_key, &expanded_packet) {
                    Ok(())
                } else {
                    Err(format!(
                        "signer {expanded_key} is not {relation} packet {expanded_packet}"
                    ))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::parse(uri).unwrap()
    }

    fn locator(uri: &str) -> KeyLocator {
        KeyLocator::Name(name(uri))
    }

    #[test]
    fn relation_checker() {
        let checker = KeyLocatorChecker::Relation {
            name: name("/ndn/KEY"),
            relation: Relation::IsPrefixOf,
        };
        assert!(checker.check(&name("/x"), &locator("/ndn/KEY/ksk-1/ID-CERT")).is_ok());
        assert!(checker.check(&name("/x"), &locator("/other/KEY/ksk-1/ID-CERT")).is_err());
        assert!(checker.check(&name("/x"), &KeyLocator::KeyDigest(vec![1])).is_err());
    }

    #[test]
    fn regex_checker() {
        let checker = KeyLocatorChecker::Regex(NameRegex::new("^<ndn><KEY><>*<ID-CERT>$").unwrap());
        assert!(checker.check(&name("/x"), &locator("/ndn/KEY/a/ksk-1/ID-CERT")).is_ok());
        assert!(checker.check(&name("/x"), &locator("/ndn/a/KEY/ksk-1/ID-CERT")).is_err());
    }

    #[test]
    fn hierarchical_checker() {
        let checker = KeyLocatorChecker::hierarchical().unwrap();
        let signer = locator("/ndn/ucla/KEY/ksk-1/ID-CERT");
        assert!(checker.check(&name("/ndn/ucla/alice/data"), &signer).is_ok());
        assert!(checker.check(&name("/ndn/ucla"), &signer).is_ok());
        assert!(checker.check(&name("/ndn/mit/data"), &signer).is_err());

        let nested = locator("/ndn/KEY/ucla/ksk-2/ID-CERT");
        assert!(checker.check(&name("/ndn/ucla/data"), &nested).is_ok());
        assert!(checker.check(&name("/ndn/mit/data"), &nested).is_err());

        let dsk = locator("/ndn/ucla/KEY/dsk-1/ID-CERT");
        assert!(checker.check(&name("/ndn/ucla/data"), &dsk).is_err());
    }
}
