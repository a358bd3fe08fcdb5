//! An ordered container that is also a set keyed by canonical name.
//!
//! Ordering is strict lexicographic on canonical name, compared segment by
//! segment (via [`Name`]'s `Ord` impl) rather than byte by byte, so escape
//! sequences never perturb ordering.

use crate::key::Key;
use crate::name::Name;

/// Lookup mode for [`KeySet::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// The canonical name must match exactly.
    Exact,
    /// If no exact match exists, walk up the target name's own ancestor
    /// chain (dropping one segment at a time) and return the nearest
    /// existing entry. Models the "cascading" resolution a caller-supplied
    /// precedence list would otherwise perform explicitly.
    CascadingParentWalk,
}

#[derive(Debug, Default)]
pub struct KeySet {
    keys: Vec<Key>,
    cursor: usize,
}

impl KeySet {
    pub fn new() -> KeySet {
        KeySet::default()
    }

    /// Pre-size the backing vector and append each of `keys` in order,
    /// each append incrementing its refcount.
    pub fn with_keys(cap: usize, keys: impl IntoIterator<Item = Key>) -> KeySet {
        let mut ks = KeySet {
            keys: Vec::with_capacity(cap),
            cursor: 0,
        };
        for k in keys {
            ks.append(k);
        }
        ks
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Insert `key` in canonical-name order. If a key with the same
    /// canonical name already exists and is not the same object, the
    /// existing entry's refcount is decremented (freeing it if it reaches
    /// zero) and `key` replaces it at the same ordered position; `key`'s
    /// refcount is then incremented. Re-appending the exact same aliased
    /// key is a no-op on refcount (matches the original's identity check
    /// on `ksAppendKey`). Returns the new size.
    pub fn append(&mut self, key: Key) -> usize {
        let name = key.name();
        match self.keys.binary_search_by(|k| k.name().cmp(&name)) {
            Ok(idx) => {
                if !self.keys[idx].ptr_eq(&key) {
                    self.keys[idx].dec_ref();
                    self.keys[idx] = key.clone();
                    key.inc_ref();
                }
            }
            Err(idx) => {
                key.inc_ref();
                self.keys.insert(idx, key);
            }
        }
        self.keys.len()
    }

    /// Advance the cursor and return the key under it, or `None` at the
    /// end. Successive calls after exhaustion keep returning `None` until
    /// [`KeySet::rewind`].
    pub fn next(&mut self) -> Option<Key> {
        let k = self.keys.get(self.cursor).cloned();
        if k.is_some() {
            self.cursor += 1;
        }
        k
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Find by canonical name under `mode`.
    pub fn lookup(&self, name: &Name, mode: LookupMode) -> Option<Key> {
        if let Ok(idx) = self.keys.binary_search_by(|k| k.name().cmp(name)) {
            return Some(self.keys[idx].clone());
        }
        if mode == LookupMode::Exact {
            return None;
        }
        let mut candidate = name.clone();
        while let Some(parent) = candidate.parent() {
            if let Ok(idx) = self.keys.binary_search_by(|k| k.name().cmp(&parent)) {
                return Some(self.keys[idx].clone());
            }
            candidate = parent;
        }
        None
    }

    /// Decrement the refcount of every contained key, freeing those that
    /// reach zero (here: simply dropping this container's own `Key`
    /// handle — the alias remains valid and live only as long as some
    /// other alias still holds a refcount). Leaves the container empty.
    pub fn del(&mut self) {
        for key in self.keys.drain(..) {
            key.del();
        }
        self.cursor = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }
}
