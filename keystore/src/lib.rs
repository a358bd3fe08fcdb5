//! Core hierarchical configuration-key abstraction: canonical names,
//! typed+annotated values, reference-counted keys, ordered key-sets, and
//! the byte-stream codec that lets a daemon exchange them with a client.
//!
//! No network code and no process-wide state live here; see the
//! `keystored` crate for the daemon that wraps this library around a
//! local transport.

pub mod backend;
pub mod error;
pub mod key;
pub mod keyset;
pub mod memory;
pub mod metadata;
pub mod name;
pub mod value;
pub mod wire;

pub use backend::Backend;
pub use error::{Error, Result};
pub use key::{Key, KeyBuilder};
pub use keyset::{KeySet, LookupMode};
pub use metadata::Metadata;
pub use name::{Name, ParseOptions, Root};
pub use value::Value;
