//! Name filters and the relations they test.

use std::fmt;
use std::str::FromStr;

use ndn_packet::Name;
use serde::{Deserialize, Serialize};

use crate::error::TrustError;
use crate::packet::SignedPacket;
use crate::regex::NameRegex;

/// How a configured name relates to the name under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relation {
    Equal,
    IsPrefixOf,
    IsStrictPrefixOf,
}

impl Relation {
    /// Whether `name` stands in this relation to `target`.
    #[must_use]
    pub fn holds(self, name: &Name, target: &Name) -> bool {
        match self {
            Self::Equal => name == target,
            Self::IsPrefixOf => name.is_prefix_of(target),
            Self::IsStrictPrefixOf => name.len() < target.len() && name.is_prefix_of(target),
        }
    }
}

impl FromStr for Relation {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "equal" => Ok(Self::Equal),
            "is-prefix-of" => Ok(Self::IsPrefixOf),
            "is-strict-prefix-of" => Ok(Self::IsStrictPrefixOf),
            other => Err(TrustError::config(format!("unsupported relation: {other}"))),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Equal => "equal",
            Self::IsPrefixOf => "is-prefix-of",
            Self::IsStrictPrefixOf => "is-strict-prefix-of",
        })
    }
}

/// Selects the packets a rule applies to.
#[derive(Debug, Clone)]
pub enum Filter {
    Relation { name: Name, relation: Relation },
    Regex(NameRegex),
}

impl Filter {
    #[must_use]
    pub fn matches_name(&self, packet_name: &Name) -> bool {
        match self {
            Self::Relation { name, relation } => relation.holds(name, packet_name),
            Self::Regex(regex) => regex.matches(packet_name),
        }
    }

    /// Match a packet; Interests are matched without their signature
    /// components.
    #[must_use]
    pub fn matches(&self, packet: SignedPacket<'_>) -> bool {
        self.matches_name(&packet.filter_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::parse(uri).unwrap()
    }

    #[test]
    fn relations() {
        let a = name("/a");
        let ab = name("/a/b");
        assert!(Relation::Equal.holds(&a, &a));
        assert!(!Relation::Equal.holds(&a, &ab));
        assert!(Relation::IsPrefixOf.holds(&a, &a));
        assert!(Relation::IsPrefixOf.holds(&a, &ab));
        assert!(!Relation::IsStrictPrefixOf.holds(&a, &a));
        assert!(Relation::IsStrictPrefixOf.holds(&a, &ab));
        assert!(!Relation::IsPrefixOf.holds(&ab, &a));
    }

    #[test]
    fn relation_parsing() {
        assert_eq!("IS-PREFIX-OF".parse::<Relation>().unwrap(), Relation::IsPrefixOf);
        assert!("is-suffix-of".parse::<Relation>().is_err());
        assert_eq!(Relation::IsStrictPrefixOf.to_string(), "is-strict-prefix-of");
    }

    #[test]
    fn interest_filter_ignores_signature_components() {
        let interest = ndn_packet::Interest::new(name("/cmd/reboot/1/2/3/4"));
        let filter = Filter::Relation {
            name: name("/cmd/reboot"),
            relation: Relation::Equal,
        };
        assert!(filter.matches(SignedPacket::Interest(&interest)));

        let regex = Filter::Regex(NameRegex::new("^<cmd><reboot>$").unwrap());
        assert!(regex.matches(SignedPacket::Interest(&interest)));

        let data = ndn_packet::Data::new(name("/cmd/reboot/1/2/3/4"));
        assert!(!filter.matches(SignedPacket::Data(&data)));
    }
}
