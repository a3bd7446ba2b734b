//! Rules pair the filters that select packets with the checker that
//! decides.

use serde::{Deserialize, Serialize};

use crate::packet::SignedPacket;
use crate::policy::checker::{Checker, Verdict};
use crate::policy::filter::Filter;

/// Which packet kind a rule is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketKind {
    Data,
    Interest,
}

impl PacketKind {
    #[must_use]
    pub const fn of(packet: &SignedPacket<'_>) -> Self {
        match packet {
            SignedPacket::Data(_) => Self::Data,
            SignedPacket::Interest(_) => Self::Interest,
        }
    }
}

/// Filters select packets; the checkers then decide.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub kind: PacketKind,
    pub filters: Vec<Filter>,
    pub checkers: Vec<Checker>,
}

impl Rule {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: PacketKind) -> Self {
        Self {
            id: id.into(),
            kind,
            filters: Vec::new(),
            checkers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn with_checker(mut self, checker: Checker) -> Self {
        self.checkers.push(checker);
        self
    }

    /// All filters match (vacuously true without filters).
    #[must_use]
    pub fn matches(&self, packet: SignedPacket<'_>) -> bool {
        PacketKind::of(&packet) == self.kind && self.filters.iter().all(|f| f.matches(packet))
    }

    /// Every checker returns a definitive verdict, so the first one decides;
    /// a rule without checkers rejects.
    #[must_use]
    pub fn check(&self, packet: SignedPacket<'_>) -> Verdict {
        self.checkers.first().map_or_else(
            || Verdict::Reject(format!("rule `{}` has no checker", self.id)),
            |checker| checker.check(packet),
        )
    }
}
