//! The Key type: a canonical name, a value, a metadata table, a reference
//! count, and a needs-sync flag, shared by reference across containers.
//!
//! Rust has no implicit aliasing, so the C original's "pointer shared by
//! several containers, mutated through any of them" model is expressed
//! here as `Rc<RefCell<KeyInner>>`: every clone of a `Key` is an alias of
//! the same inner state, exactly like a duplicated C pointer. This is a
//! deliberate departure from the teacher's plain value-semantics `Key` type,
//! required by the spec's own aliasing and copy-on-write rules (§9 design
//! notes call for shared ownership with copy-on-write discipline).
//!
//! One honest limitation: the spec calls refcount operations the sole
//! permitted cross-thread interaction and requires them to be atomic
//! (§5). `Rc` is neither `Send` nor `Sync`, so this type cannot cross
//! threads at all; the refcount field below is a plain, non-atomic
//! counter. A production port of this crate onto the daemon's stated
//! one-thread-per-connection model never needs to share a `Key` across
//! threads, so the restriction costs nothing in practice, but it is a
//! real divergence from the literal concurrency model and is recorded
//! here rather than worked around with `unsafe impl Send`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{self, Result};
use crate::metadata::{self, Metadata};
use crate::name::{Name, ParseOptions};
use crate::value::Value;

const REF_MAX: usize = isize::MAX as usize;

#[derive(Debug)]
struct KeyInner {
    name: Name,
    value: Value,
    metadata: Metadata,
    refcount: usize,
    needs_sync: bool,
}

impl KeyInner {
    fn empty() -> KeyInner {
        KeyInner {
            name: Name::empty(),
            value: Value::default(),
            metadata: Metadata::new(),
            refcount: 0,
            needs_sync: false,
        }
    }
}

/// A shared, mutable key. Cloning a `Key` aliases the same underlying
/// state; use [`Key::dup`] for an independent copy.
#[derive(Debug, Clone)]
pub struct Key(Rc<RefCell<KeyInner>>);

impl Key {
    /// Construct a key from a raw name input, parsed with default
    /// (strict) options. Parse failure is non-fatal: it yields the empty
    /// Name, as `new("invalid", END)` does in the original.
    pub fn new(name: &str) -> Key {
        let mut inner = KeyInner::empty();
        inner.name = Name::parse(name, ParseOptions::default());
        if let Some(owner) = inner.name.owner() {
            let owner = owner.to_string();
            inner.metadata.set_string(metadata::OWNER, &owner);
        }
        Key(Rc::new(RefCell::new(inner)))
    }

    /// The key with the empty Name, matching `new(null)`.
    pub fn empty() -> Key {
        Key(Rc::new(RefCell::new(KeyInner::empty())))
    }

    pub fn name(&self) -> Name {
        self.0.borrow().name.clone()
    }

    pub fn set_name(&self, input: &str) -> i64 {
        let mut inner = self.0.borrow_mut();
        inner.name = Name::parse(input, ParseOptions::default());
        if let Some(owner) = inner.name.owner() {
            let owner = owner.to_string();
            inner.metadata.set_string(metadata::OWNER, &owner);
        }
        inner.name.canonical_size() as i64
    }

    /// Copy the canonical name into `buf`. Returns the copied size, or
    /// `-1` if `buf` is too small or zero-capacity.
    pub fn get_name(&self, buf: &mut [u8]) -> i64 {
        let inner = self.0.borrow();
        let canonical = inner.name.canonical();
        let size = inner.name.canonical_size();
        if buf.is_empty() || buf.len() < size {
            return -1;
        }
        buf[..canonical.len()].copy_from_slice(canonical.as_bytes());
        buf[canonical.len()] = 0;
        size as i64
    }

    pub fn full_name(&self) -> String {
        self.0.borrow().name.full_name()
    }

    pub fn base_name(&self) -> Option<String> {
        self.0.borrow().name.base_name().map(|s| s.to_string())
    }

    pub fn set_base_name(&self, base: &str) -> Result<()> {
        self.0.borrow_mut().name.set_base_name(base)
    }

    pub fn add_base_name(&self, base: &str) {
        self.0.borrow_mut().name.add_base_name(base);
    }

    pub fn is_below(&self, other: &Key) -> bool {
        self.0.borrow().name.is_below(&other.0.borrow().name)
    }

    pub fn is_direct_below(&self, other: &Key) -> bool {
        self.0.borrow().name.is_direct_below(&other.0.borrow().name)
    }

    pub fn is_below_or_same(&self, other: &Key) -> bool {
        self.0.borrow().name.is_below_or_same(&other.0.borrow().name)
    }

    pub fn is_inactive(&self) -> bool {
        self.0.borrow().name.is_inactive()
    }

    pub fn is_string(&self) -> bool {
        self.0.borrow().value.is_string()
    }

    pub fn is_binary(&self) -> bool {
        self.0.borrow().value.is_binary()
    }

    pub fn set_string(&self, s: &str) -> usize {
        self.0.borrow_mut().value.set_string(s)
    }

    pub fn set_binary(&self, bytes: Option<&[u8]>, n: usize) -> Result<usize> {
        self.0.borrow_mut().value.set_binary_checked(bytes, n)
    }

    pub fn get_string(&self) -> Result<String> {
        self.0.borrow().value.as_string().map(|s| s.to_string())
    }

    pub fn get_binary(&self) -> Result<Vec<u8>> {
        self.0.borrow().value.as_binary().map(|b| b.to_vec())
    }

    /// Copy the stored NUL-terminated string into `buf`. Fails with
    /// [`Error::TypeMismatch`](crate::error::Error::TypeMismatch) if the key
    /// is binary; returns `-1` if `buf` is too small or zero-capacity,
    /// matching `getString(k, buf, cap)`'s buffer-and-capacity contract.
    pub fn get_string_buf(&self, buf: &mut [u8]) -> Result<i64> {
        let inner = self.0.borrow();
        let s = inner.value.as_string()?;
        let size = s.len() + 1;
        if buf.is_empty() || buf.len() < size {
            return Ok(-1);
        }
        buf[..s.len()].copy_from_slice(s.as_bytes());
        buf[s.len()] = 0;
        Ok(size as i64)
    }

    /// Copy the stored binary bytes into `buf`. Fails with
    /// [`Error::TypeMismatch`](crate::error::Error::TypeMismatch) if the key
    /// is a string; returns `-1` if `cap` is zero or too small; `0` if the
    /// stored value is null (empty binary), matching `getBinary(k, buf,
    /// cap)`.
    pub fn get_binary_buf(&self, buf: &mut [u8]) -> Result<i64> {
        let inner = self.0.borrow();
        let b = inner.value.as_binary()?;
        if b.is_empty() {
            return Ok(0);
        }
        if buf.is_empty() || buf.len() < b.len() {
            return Ok(-1);
        }
        buf[..b.len()].copy_from_slice(b);
        Ok(b.len() as i64)
    }

    /// Assign `value` directly, bypassing the `setString`/`setBinary`
    /// C-style guards (e.g. the "zero length with non-null buffer" rejection
    /// in [`crate::value::Value::set_binary_checked`]). Used by the wire
    /// codec, which must be able to reconstruct any value a key can hold,
    /// including the freed/empty-binary state, from already-decoded bytes.
    pub fn set_value(&self, value: Value) {
        self.0.borrow_mut().value = value;
    }

    pub fn value(&self) -> Value {
        self.0.borrow().value.clone()
    }

    pub fn value_size(&self) -> usize {
        self.0.borrow().value.size()
    }

    pub fn metadata(&self) -> Metadata {
        self.0.borrow().metadata.clone()
    }

    pub fn set_metadata(&self, name: &str, value: Value) {
        self.0.borrow_mut().metadata.set(name, value);
    }

    /// Increment the refcount, saturating at [`REF_MAX`] (a no-op once
    /// reached, never wrapping).
    pub fn inc_ref(&self) -> usize {
        let mut inner = self.0.borrow_mut();
        if inner.refcount < REF_MAX {
            inner.refcount += 1;
        }
        inner.refcount
    }

    /// Decrement the refcount if greater than zero; never goes negative.
    pub fn dec_ref(&self) -> usize {
        let mut inner = self.0.borrow_mut();
        if inner.refcount > 0 {
            inner.refcount -= 1;
        }
        inner.refcount
    }

    pub fn get_ref(&self) -> usize {
        self.0.borrow().refcount
    }

    pub fn needs_sync(&self) -> bool {
        self.0.borrow().needs_sync
    }

    /// A conditional free: if the refcount is already zero, this alias is
    /// the sole reference and the key is considered released (callers
    /// should drop their handle). Otherwise decrements and returns the new
    /// count without freeing. Held-by-container keys therefore never free
    /// here: only the container's own `KeySet::del` reaches zero.
    pub fn del(&self) -> usize {
        let mut inner = self.0.borrow_mut();
        if inner.refcount == 0 {
            0
        } else {
            inner.refcount -= 1;
            inner.refcount
        }
    }

    /// An independent copy with refcount 0, identical name, value, and
    /// metadata. Never fails.
    pub fn dup(&self) -> Key {
        let src = self.0.borrow();
        Key(Rc::new(RefCell::new(KeyInner {
            name: src.name.clone(),
            value: src.value.clone(),
            metadata: src.metadata.clone(),
            refcount: 0,
            needs_sync: false,
        })))
    }

    /// Replace `self`'s name, value, and metadata with `src`'s, wholesale.
    /// Forbidden (returns [`Error::Busy`](crate::error::Error::Busy)) when
    /// `self` is currently shared (refcount > 0): mutating a shared key in
    /// place would violate every container that holds it.
    ///
    /// `src == None` resets `self` to the empty key, which is always
    /// permitted regardless of sharing (matches `copy(dst, null)`).
    pub fn copy(&self, src: Option<&Key>) -> Result<()> {
        let mut dst = self.0.borrow_mut();
        match src {
            None => {
                dst.name = Name::empty();
                dst.value = Value::default();
                dst.metadata = Metadata::new();
                dst.needs_sync = true;
                Ok(())
            }
            Some(_) if dst.refcount > 0 => error::BusySnafu.fail(),
            Some(src) => {
                let src = src.0.borrow();
                dst.name = src.name.clone();
                dst.value = src.value.clone();
                dst.metadata = src.metadata.clone();
                dst.needs_sync = true;
                Ok(())
            }
        }
    }

    /// Reset name, value, and metadata while preserving refcount and
    /// identity, so every alias observes the cleared state.
    pub fn clear(&self) {
        let mut inner = self.0.borrow_mut();
        inner.name = Name::empty();
        inner.value = Value::default();
        inner.metadata = Metadata::new();
        inner.needs_sync = true;
    }

    /// `true` iff `self` and `other` alias the same underlying key state.
    pub fn ptr_eq(&self, other: &Key) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Replaces the C variadic option list (`KEY_END`, `KEY_BINARY`,
/// `KEY_SIZE`, `KEY_VALUE`, `KEY_OWNER`, `KEY_FUNC`, `KEY_COMMENT`,
/// `KEY_UID`/`KEY_GID`/`KEY_MODE`) with a builder, per spec §9's design
/// note. `.build()` never fails, matching `new("invalid", END)` succeeding
/// with the empty Name.
#[derive(Debug, Default)]
pub struct KeyBuilder {
    name: String,
    binary: Option<Vec<u8>>,
    string: Option<String>,
    owner: Option<String>,
    comment: Option<String>,
    uid: Option<u32>,
    gid: Option<u32>,
    mode: Option<u32>,
}

impl KeyBuilder {
    pub fn new(name: &str) -> KeyBuilder {
        KeyBuilder {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn binary(mut self, bytes: &[u8]) -> Self {
        self.binary = Some(bytes.to_vec());
        self
    }

    /// Stores `f` as an opaque binary blob, matching `KEY_FUNC`'s use of
    /// a function pointer's raw bytes.
    pub fn func(mut self, f: &[u8]) -> Self {
        self.binary(f)
    }

    pub fn string(mut self, value: &str) -> Self {
        self.string = Some(value.to_string());
        self
    }

    pub fn owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn gid(mut self, gid: u32) -> Self {
        self.gid = Some(gid);
        self
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn build(self) -> Key {
        let key = Key::new(&self.name);
        if let Some(bytes) = self.binary {
            let _ = key.set_binary(Some(&bytes), bytes.len());
        } else if let Some(s) = self.string {
            key.set_string(&s);
        }
        if let Some(owner) = self.owner {
            key.set_metadata(metadata::OWNER, Value::String(owner));
        }
        if let Some(comment) = self.comment {
            key.set_metadata(metadata::COMMENT, Value::String(comment));
        }
        if let Some(uid) = self.uid {
            key.set_metadata(metadata::UID, Value::String(uid.to_string()));
        }
        if let Some(gid) = self.gid {
            key.set_metadata(metadata::GID, Value::String(gid.to_string()));
        }
        if let Some(mode) = self.mode {
            key.set_metadata(metadata::MODE, Value::String(mode.to_string()));
        }
        key
    }
}
