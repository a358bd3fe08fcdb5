//! The seam the daemon dispatches through. A conforming backend implements
//! the four live operations; the remaining protocol procedures are
//! reserved for future wiring and must be encodable/decodable without
//! crashing even though no backend here implements them yet.

use crate::error::Result;
use crate::key::Key;
use crate::keyset::KeySet;

/// Opaque per-connection backend context. A real backend (out of scope for
/// this crate; see the crate-level Non-goals) would carry a storage handle
/// here.
pub trait Backend {
    fn open(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    fn get_key(&mut self, name: &Key) -> Result<Key>;
    fn get_children(&mut self, parent: &Key) -> Result<KeySet>;
}

/// Procedure codes reserved by the protocol but not wired to a backend
/// operation. A conforming `Backend` only needs to exist for `OPEN`,
/// `CLOSE`, `GETKEY`, and `GETCHILD`; the daemon loop maps every other
/// procedure directly to [`crate::error::Error::NotImplemented`] without
/// ever calling into the backend.
pub const RESERVED_PROCEDURES: &[&str] = &[
    "STATKEY",
    "SETKEY",
    "SETKEYS",
    "RENAME",
    "REMOVEKEY",
    "MONITORKEY",
    "MONITORKEYS",
];

#[cfg(test)]
mod test {
    use super::*;

    struct NoopBackend;

    impl Backend for NoopBackend {
        fn open(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
        fn get_key(&mut self, name: &Key) -> Result<Key> {
            Ok(name.dup())
        }
        fn get_children(&mut self, _parent: &Key) -> Result<KeySet> {
            Ok(KeySet::new())
        }
    }

    #[test]
    fn trait_object_is_usable() {
        let mut backend: Box<dyn Backend> = Box::new(NoopBackend);
        backend.open().unwrap();
        let k = backend.get_key(&Key::new("user/a")).unwrap();
        assert_eq!(k.name().canonical(), "user/a");
        backend.close().unwrap();
    }
}
