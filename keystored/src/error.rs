use snafu::Snafu;

/// Possible errors from the daemon binary and its connection-handling loop.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to bind socket at '{}': {}", path, source))]
    Bind {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to set ownership of '{}': {}", path, source))]
    Chown {
        path: String,
        source: nix::Error,
    },

    #[snafu(display("Failed to set permissions of '{}': {}", path, source))]
    SetPermissions {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to resolve peer credentials: {}", source))]
    PeerCredentials { source: nix::Error },

    #[snafu(display("Key-store operation failed: {}", source))]
    KeyStore { source: keystore::Error },

    #[snafu(display("Bad command-line argument: {}", msg))]
    Usage { msg: String },
}

impl From<keystore::Error> for Error {
    fn from(source: keystore::Error) -> Error {
        Error::KeyStore { source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
