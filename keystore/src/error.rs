use snafu::Snafu;

/// Possible errors from key-store operations.
///
/// These map onto the error taxonomy of the core abstraction: invalid
/// arguments, type confusion between string and binary values, busy
/// (shared) keys, missed lookups, and the I/O/protocol/backend failures
/// that only show up once a daemon is involved.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Invalid argument: {}", msg))]
    InvalidArgument { msg: String },

    #[snafu(display("Buffer too small for '{}': need {}, have {}", what, needed, have))]
    BufferTooSmall {
        what: String,
        needed: usize,
        have: usize,
    },

    #[snafu(display("Key name '{}' is invalid: {}", name, msg))]
    InvalidKeyName { name: String, msg: String },

    #[snafu(display("Expected a {} value but key is {}", wanted, have))]
    TypeMismatch { wanted: String, have: String },

    #[snafu(display("Key is shared (refcount > 0) and cannot be overwritten by copy"))]
    Busy,

    #[snafu(display("No key found for name '{}'", name))]
    NotFound { name: String },

    #[snafu(display("Transport I/O error: {}", source))]
    Io { source: std::io::Error },

    #[snafu(display("Malformed protocol message: {}", msg))]
    Protocol { msg: String },

    #[snafu(display("Backend operation failed: {}", msg))]
    Backend { msg: String },

    #[snafu(display("Procedure {} is reserved but not implemented", procedure))]
    NotImplemented { procedure: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
