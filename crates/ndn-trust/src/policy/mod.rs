//! Trust rules: filters select packets, checkers classify them.

mod checker;
mod filter;
mod key_locator;
mod rule;

pub use checker::{Checker, Verdict};
pub use filter::{Filter, Relation};
pub use key_locator::KeyLocatorChecker;
pub use rule::{PacketKind, Rule};
