//! Minimal NDN packet model.
//!
//! Provides what trust validation needs from the network layer: names and
//! components, NDN-TLV framing for Data and Interest packets, signature
//! metadata, and the signed-Interest and certificate naming conventions.

mod data;
mod error;
mod interest;
mod name;
pub mod naming;
mod signature;
pub mod tlv;

pub use data::{Data, CONTENT_TYPE_KEY};
pub use error::{PacketError, Result};
pub use interest::{
    signature_info_component, signature_value_component, Interest, DEFAULT_LIFETIME,
    MIN_SIGNED_LENGTH, POS_RANDOM, POS_SIG_INFO, POS_SIG_VALUE, POS_TIMESTAMP,
};
pub use name::{Component, Name, VERSION_MARKER};
pub use signature::{KeyLocator, SignatureInfo, SignatureType};
