//! Accept loop: bind the local transport socket and hand each connection to
//! [`crate::session::run`] on its own thread, matching spec.md §5's "one
//! process or task per connection" with no shared mutable state between
//! sessions. Modeled on `server::serve`'s socket setup in the teacher
//! (bind, optional group chown, tighten permissions, log readiness) minus
//! the HTTP application it built on top — the wire protocol here is
//! [`crate::protocol`]'s framed messages, not REST.

use std::fs::{set_permissions, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::thread;

use keystore::backend::Backend;
use keystore::memory::MemoryBackend;
use nix::unistd::{chown, Gid};

use crate::error::{self, Result};
use crate::session;

const SOCKET_MODE: u32 = 0o660;

/// Bind `socket_path`, optionally chown it to `socket_gid`, tighten its
/// permissions, then accept connections forever. Each accepted connection
/// gets a fresh [`MemoryBackend`] and runs to completion on its own thread;
/// a connection that errors out is logged and dropped without affecting
/// any other session.
pub fn serve<P: AsRef<Path>>(socket_path: P, socket_gid: Option<Gid>) -> Result<()> {
    let socket_path = socket_path.as_ref();
    if socket_path.exists() {
        std::fs::remove_file(socket_path).map_err(|source| error::Error::Bind {
            path: socket_path.display().to_string(),
            source,
        })?;
    }

    let listener = UnixListener::bind(socket_path).map_err(|source| error::Error::Bind {
        path: socket_path.display().to_string(),
        source,
    })?;

    if let Some(gid) = socket_gid {
        chown(socket_path, None, Some(gid)).map_err(|source| error::Error::Chown {
            path: socket_path.display().to_string(),
            source,
        })?;
    }
    set_permissions(socket_path, Permissions::from_mode(SOCKET_MODE)).map_err(|source| {
        error::Error::SetPermissions {
            path: socket_path.display().to_string(),
            source,
        }
    })?;

    log::info!("listening on {}", socket_path.display());

    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(s) => s,
            Err(e) => {
                log::warn!("failed to accept connection: {}", e);
                continue;
            }
        };
        thread::spawn(move || {
            let mut backend = MemoryBackend::new();
            if let Err(e) = backend.open() {
                log::warn!("backend open failed: {}", e);
                return;
            }
            if let Err(e) = session::run(&mut stream, &mut backend) {
                log::warn!("session ended with error: {}", e);
            }
            let _ = backend.close();
        });
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn binding_to_a_bogus_directory_fails() {
        let result = serve(Path::new("/nonexistent-dir/sock"), None);
        assert!(result.is_err());
    }
}
