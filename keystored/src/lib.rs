//! The daemon side of the hierarchical configuration-key store: message
//! framing (§4.G), the per-connection request loop (§4.H), and the
//! process-level accept loop that ties them to a local socket. Depends on
//! `keystore` for everything below the wire: names, values, keys, and the
//! codec.

pub mod error;
pub mod protocol;
pub mod serve;
pub mod session;

pub use error::{Error, Result};
pub use serve::serve;
