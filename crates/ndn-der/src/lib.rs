//! DER encoding toolkit for NDN certificate structures.
//!
//! This crate provides:
//!
//! - **Nodes**: [`DerNode`] trees with a header codec and a recursive-descent
//!   parser over the tag kinds certificates use
//! - **Values**: typed extraction of primitive payloads as a [`Value`]
//! - **Codecs**: object identifiers ([`Oid`]) and generalized time
//! - **Errors**: [`DerError`]
//!
//! # Example
//!
//! ```rust
//! use ndn_der::{DerNode, Value};
//!
//! let tree = DerNode::sequence(vec![
//!     DerNode::boolean(true),
//!     DerNode::printable_string("/ndn/edu"),
//! ]);
//! let bytes = tree.encode()?;
//! let decoded = DerNode::decode(&bytes)?;
//! assert_eq!(decoded.children()[1].value()?, Value::Text("/ndn/edu".into()));
//! # Ok::<(), ndn_der::DerError>(())
//! ```

mod error;
mod node;
pub mod oid;
mod print;
pub mod time;
mod types;
mod value;

pub use error::{DerError, Result};
pub use node::{decode_header, encode_header, Body, DerNode, DerReader, MAX_DEPTH};
pub use oid::Oid;
pub use print::print_tree;
pub use time::Timestamp;
pub use types::DerType;
pub use value::Value;
