//! An in-memory [`Backend`] for exercising the daemon loop in tests.
//!
//! Plays the same role `MemoryDataStore` plays in a filesystem-backed
//! datastore crate: a stand-in for the real (out-of-scope) storage backend,
//! populated directly by tests rather than by any on-disk format.

use std::collections::HashMap;

use crate::backend::Backend;
use crate::error::{self, Result};
use crate::key::Key;
use crate::keyset::KeySet;
use crate::name::Name;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    keys: HashMap<Name, Key>,
    open: bool,
}

impl MemoryBackend {
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }

    /// Directly populate the backend, bypassing `SETKEY` (not yet wired to
    /// any backend operation — see [`crate::backend::RESERVED_PROCEDURES`]).
    pub fn put(&mut self, key: Key) {
        self.keys.insert(key.name(), key);
    }
}

impl Backend for MemoryBackend {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn get_key(&mut self, name: &Key) -> Result<Key> {
        self.keys
            .get(&name.name())
            .map(|k| k.dup())
            .ok_or_else(|| {
                error::NotFoundSnafu {
                    name: name.name().canonical(),
                }
                .build()
            })
    }

    fn get_children(&mut self, parent: &Key) -> Result<KeySet> {
        let parent_name = parent.name();
        let mut ks = KeySet::new();
        for (name, key) in self.keys.iter() {
            if parent_name.is_direct_below(name) {
                ks.append(key.dup());
            }
        }
        Ok(ks)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn get_key_hits_and_misses() {
        let mut backend = MemoryBackend::new();
        backend.open().unwrap();
        backend.put(Key::new("user/a"));

        let found = backend.get_key(&Key::new("user/a")).unwrap();
        assert_eq!(found.name().canonical(), "user/a");

        assert!(backend.get_key(&Key::new("user/missing")).is_err());
    }

    #[test]
    fn get_children_filters_direct_children_only() {
        let mut backend = MemoryBackend::new();
        backend.put(Key::new("user/a"));
        backend.put(Key::new("user/a/b"));
        backend.put(Key::new("user/a/b/c"));

        let mut children = backend.get_children(&Key::new("user/a")).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children.next().unwrap().name().canonical(), "user/a/b");
    }
}
