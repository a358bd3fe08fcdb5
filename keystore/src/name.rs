//! Hierarchical key-name parsing and canonicalisation.
//!
//! A canonical [`Name`] is a root plus an ordered list of unescaped segments.
//! Parsing runs as a single-pass state machine over the input bytes,
//! handling backslash escaping, `.`/`..` navigation, the `%` empty-segment
//! sentinel, and the optional `root:owner` qualifier, the way the original
//! C implementation's `keySetName` does it.

use std::fmt;

use crate::error::{self, Error, Result};

/// The reserved leading token of a key name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Root {
    System,
    User,
    Spec,
    Proc,
    Dir,
    /// No explicit root; resolved against a caller-supplied precedence list.
    Cascading,
}

impl Root {
    fn as_str(self) -> &'static str {
        match self {
            Root::System => "system",
            Root::User => "user",
            Root::Spec => "spec",
            Root::Proc => "proc",
            Root::Dir => "dir",
            Root::Cascading => "",
        }
    }

    fn parse(token: &str) -> Option<Root> {
        match token {
            "system" => Some(Root::System),
            "user" => Some(Root::User),
            "spec" => Some(Root::Spec),
            "proc" => Some(Root::Proc),
            "dir" => Some(Root::Dir),
            "" => Some(Root::Cascading),
            _ => None,
        }
    }
}

/// Controls leniency of the parser for edge cases the strict grammar
/// rejects outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// When `true`, a name ending in an unclosed escape (`user/x\`) is
    /// accepted by treating the trailing backslash as literal instead of
    /// failing to parse. Default is strict (`false`).
    pub allow_trailing_escape: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            allow_trailing_escape: false,
        }
    }
}

/// A canonicalised hierarchical key name.
///
/// Comparison and ordering are segment-wise, not byte-wise, so escaped
/// separators inside a segment never participate in boundary matching.
/// Per §3, the owner qualifier is carried alongside the canonical name but
/// stripped from it for comparison purposes: equality, ordering, and
/// `is_below` all compare root+segments only, ignoring `owner`, so `Name`
/// implements these by hand instead of deriving them.
#[derive(Debug, Clone, Default)]
pub struct Name {
    root: Option<Root>,
    owner: Option<String>,
    segments: Vec<String>,
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && self.segments == other.segments
    }
}

impl Eq for Name {}

impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.root.hash(state);
        self.segments.hash(state);
    }
}

impl Name {
    /// The empty Name: no root, no segments. This is the value produced
    /// for absent or syntactically invalid input, per spec: invalid input
    /// is non-fatal at this layer.
    pub fn empty() -> Name {
        Name {
            root: None,
            owner: None,
            segments: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.segments.is_empty()
    }

    pub fn root(&self) -> Option<Root> {
        self.root
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Parse `input` into a canonical Name. Unlike most of this crate's
    /// API, this never fails: invalid input yields [`Name::empty`], mirroring
    /// `setName`'s contract that only a genuinely absent input is an error.
    pub fn parse(input: &str, opts: ParseOptions) -> Name {
        match parse_inner(input, opts) {
            Some(name) => name,
            None => Name::empty(),
        }
    }

    /// The canonical name string: root, segments joined by `/`, each
    /// segment escaped as needed. Does not include the owner qualifier.
    pub fn canonical(&self) -> String {
        self.render(false)
    }

    /// The canonical name with the owner qualifier attached to the root,
    /// e.g. `user:alice/key`.
    pub fn full_name(&self) -> String {
        self.render(true)
    }

    /// Size in bytes of [`Name::canonical`] plus one, matching the C
    /// convention of counting the NUL terminator.
    pub fn canonical_size(&self) -> usize {
        self.canonical().len() + 1
    }

    pub fn full_name_size(&self) -> usize {
        self.full_name().len() + 1
    }

    /// The bare root token (`system`, `user`, ...), without any owner
    /// qualifier.
    pub fn root_name(&self) -> String {
        match self.root {
            Some(r) => r.as_str().to_string(),
            None => String::new(),
        }
    }

    /// The root token with the owner qualifier attached, e.g. `user:alice`.
    pub fn full_root_name(&self) -> String {
        match (self.root, &self.owner) {
            (Some(r), Some(owner)) => format!("{}:{}", r.as_str(), owner),
            (Some(r), None) => r.as_str().to_string(),
            (None, _) => String::new(),
        }
    }

    /// The last segment, unescaped, or `None` for a root-only or empty name.
    pub fn base_name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// The name with its last segment removed (one level up). `None` if
    /// there is no segment to remove (root-only or empty name).
    pub fn parent(&self) -> Option<Name> {
        if self.segments.is_empty() {
            return None;
        }
        let mut parent = self.clone();
        parent.segments.pop();
        Some(parent)
    }

    pub fn parent_name(&self) -> Option<String> {
        self.parent().map(|p| p.canonical())
    }

    /// Replace the last segment with `base`, taken as a single literal
    /// segment regardless of its content: any `/`, leading `.`/`%`, or
    /// backslash it contains is escaped only when the name is rendered
    /// (see [`escape_segment`]), so the argument can never be mistaken for
    /// navigation or a sentinel. `base` itself is stored unescaped, the same
    /// representation the parser produces for an ordinary segment.
    ///
    /// Rejected (returns `Err`) when the name is root-only: the root cannot
    /// be removed by setting a base name.
    pub fn set_base_name(&mut self, base: &str) -> Result<()> {
        if self.segments.is_empty() {
            return error::InvalidArgumentSnafu {
                msg: "cannot set base name of a root-only or empty name",
            }
            .fail();
        }
        self.segments.pop();
        self.segments.push(base.to_string());
        Ok(())
    }

    /// Append a new segment after the current base name, stored unescaped
    /// the same way [`Name::set_base_name`] does.
    pub fn add_base_name(&mut self, base: &str) {
        self.segments.push(base.to_string());
    }

    /// `true` iff `other`'s canonical name has `self`'s canonical name as a
    /// strict prefix on segment boundaries (same root required). The owner
    /// qualifier, if any, does not participate: it is stripped from the
    /// canonical name per §3.
    pub fn is_below(&self, other: &Name) -> bool {
        if self.root != other.root {
            return false;
        }
        if self.segments.len() >= other.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| a == b)
    }

    /// `true` iff `other` is exactly one segment below `self`.
    pub fn is_direct_below(&self, other: &Name) -> bool {
        self.is_below(other) && other.segments.len() == self.segments.len() + 1
    }

    /// Reflexive closure of [`Name::is_below`].
    pub fn is_below_or_same(&self, other: &Name) -> bool {
        self == other || self.is_below(other)
    }

    /// `true` iff any unescaped segment begins with `.`.
    pub fn is_inactive(&self) -> bool {
        self.segments.iter().any(|s| s.starts_with('.'))
    }

    fn render(&self, with_owner: bool) -> String {
        let root = match self.root {
            Some(r) => r.as_str(),
            None => return self.segments.join("/"),
        };
        let mut out = String::new();
        if with_owner {
            out.push_str(&self.full_root_name());
        } else {
            out.push_str(root);
        }
        for seg in &self.segments {
            out.push('/');
            out.push_str(&escape_segment(seg));
        }
        out
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    /// Root then segments, per §4.E's "strict lexicographic on canonical
    /// name" — the owner qualifier is not part of the canonical name and
    /// does not participate in ordering.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.root
            .cmp(&other.root)
            .then_with(|| self.segments.cmp(&other.segments))
    }
}

/// Escape a raw segment for inclusion in a rendered name: backslashes are
/// doubled, `/` is escaped, and a segment that would otherwise collide with
/// a reserved sentinel (`.`, `..`, `%`) is escaped at the first character.
fn escape_segment(raw: &str) -> String {
    if raw.is_empty() {
        return "%".to_string();
    }
    if raw == "." || raw == ".." || raw == "%" {
        let mut out = String::with_capacity(raw.len() + 1);
        out.push('\\');
        out.push_str(raw);
        return out;
    }
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' || c == '/' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Parses one escaped segment starting at `chars`, consuming up to (but not
/// including) an unescaped `/`. Returns the unescaped segment text.
fn parse_inner(input: &str, opts: ParseOptions) -> Option<Name> {
    if input.is_empty() {
        return None;
    }

    let mut chars = input.chars().peekable();
    let mut first_token = String::new();
    while let Some(&c) = chars.peek() {
        if c == '/' || c == ':' {
            break;
        }
        first_token.push(c);
        chars.next();
    }

    let mut owner = None;
    if chars.peek() == Some(&':') {
        chars.next();
        let mut owner_token = String::new();
        while let Some(&c) = chars.peek() {
            if c == '/' {
                break;
            }
            owner_token.push(c);
            chars.next();
        }
        if !owner_token.is_empty() {
            owner = Some(owner_token);
        }
    }

    let root = Root::parse(&first_token)?;

    let rest: String = chars.collect();
    let raw_segments = split_escaped(&rest, opts)?;

    // Sentinel (`%`) and navigation (`.`/`..`) classification only applies
    // to a segment that was typed literally, with no backslash escape
    // anywhere in it: an escaped `\%`, `\.`, or `\..` decodes to the same
    // text but must be kept as an ordinary segment, not reinterpreted.
    let mut segments = Vec::with_capacity(raw_segments.len());
    for seg in raw_segments {
        if !seg.escaped {
            match seg.text.as_str() {
                "." => continue,
                ".." => {
                    segments.pop();
                    continue;
                }
                "%" => {
                    segments.push(String::new());
                    continue;
                }
                _ => {}
            }
        }
        segments.push(seg.text);
    }

    Some(Name {
        root: Some(root),
        owner,
        segments,
    })
}

/// One `/`-delimited segment as produced by [`split_escaped`]: its unescaped
/// text, plus whether any backslash escape was consumed while building it.
/// The escape flag is what lets the caller tell an unescaped `%`/`.`/`..`
/// (a sentinel or navigation token) apart from an escaped `\%`/`\.`/`\..`
/// (ordinary text that merely reads the same once unescaped).
struct RawSegment {
    text: String,
    escaped: bool,
}

/// Split a `/`-separated, backslash-escaped path into unescaped segments.
/// Collapses consecutive separators and ignores a single trailing one.
/// Sentinel/navigation classification is deferred to the caller, which
/// needs each segment's `escaped` flag to do it correctly.
fn split_escaped(input: &str, opts: ParseOptions) -> Option<Vec<RawSegment>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut has_current = false;
    let mut escaped = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                has_current = true;
                escaped = true;
                match chars.next() {
                    Some(next) => current.push(next),
                    None => {
                        if opts.allow_trailing_escape {
                            current.push('\\');
                        } else {
                            return None;
                        }
                    }
                }
            }
            '/' => {
                if has_current || !current.is_empty() {
                    segments.push(RawSegment {
                        text: std::mem::take(&mut current),
                        escaped,
                    });
                }
                has_current = false;
                escaped = false;
            }
            _ => {
                has_current = true;
                current.push(c);
            }
        }
    }
    if has_current || !current.is_empty() {
        segments.push(RawSegment {
            text: current,
            escaped,
        });
    }
    Some(segments)
}

#[cfg(test)]
mod test {
    use super::*;

    fn n(input: &str) -> Name {
        Name::parse(input, ParseOptions::default())
    }

    #[test]
    fn collapses_separators_and_trailing_slash() {
        let name = n("system//foo//bar//");
        assert_eq!(name.canonical(), "system/foo/bar");
        assert_eq!(name.base_name(), Some("bar"));
        assert_eq!(name.parent_name().as_deref(), Some("system/foo"));
    }

    #[test]
    fn owner_qualifier_is_split_out() {
        let name = n("user:alice/key");
        assert_eq!(name.canonical(), "user/key");
        assert_eq!(name.owner(), Some("alice"));
        assert_eq!(name.full_name(), "user:alice/key");
        assert_eq!(name.full_name_size(), name.full_name().len() + 1);
        assert_eq!(name.root_name(), "user");
        assert_eq!(name.full_root_name(), "user:alice");
    }

    #[test]
    fn bare_owner_collapses_to_root() {
        assert_eq!(n("user:").canonical(), "user");
        assert_eq!(n("user:x").canonical(), "user");
        assert_eq!(n("user:x").base_name(), None);
    }

    #[test]
    fn dot_dot_navigation_caps_at_root() {
        assert_eq!(n("system/a/b/c/../../..").canonical(), "system");
        assert_eq!(n("system/../../a/b/c").canonical(), "system/a/b/c");
    }

    #[test]
    fn dot_segment_is_elided() {
        assert_eq!(n("system/./foo").canonical(), "system/foo");
    }

    #[test]
    fn hidden_dot_prefixed_name_is_not_navigation() {
        let name = n("system/.foo");
        assert_eq!(name.canonical(), "system/.foo");
        assert!(name.is_inactive());
    }

    #[test]
    fn percent_sentinel_is_empty_segment() {
        let name = n("system/a/%/b");
        assert_eq!(name.segments(), &["a".to_string(), "".to_string(), "b".to_string()]);
    }

    #[test]
    fn unknown_root_yields_empty_name() {
        assert!(n("bogus/foo").is_empty());
        assert!(Name::parse("", ParseOptions::default()).is_empty());
    }

    #[test]
    fn set_base_name_escapes_percent_sentinel() {
        let mut name = n("system/valid");
        name.set_base_name("%").unwrap();
        assert_eq!(name.canonical(), "system/\\%");
        assert_eq!(name.base_name(), Some("%"));
    }

    #[test]
    fn set_base_name_rejects_root_only() {
        let mut name = n("system");
        assert!(name.set_base_name("x").is_err());
    }

    #[test]
    fn add_base_name_escapes_dot() {
        let mut name = n("system/foo");
        name.add_base_name(".");
        assert_eq!(name.canonical(), "system/foo/\\.");
    }

    #[test]
    fn escaped_percent_round_trips_as_literal_not_sentinel() {
        // Re-parsing the canonical form of `set_base_name(k, "%")` must
        // recover the literal "%" segment, not the empty-segment sentinel.
        let mut name = n("system/valid");
        name.set_base_name("%").unwrap();
        let canonical = name.canonical();
        assert_eq!(canonical, "system/\\%");

        let reparsed = n(&canonical);
        assert_eq!(reparsed.base_name(), Some("%"));
        assert_eq!(reparsed.segments(), &["%".to_string()]);
        assert_eq!(reparsed, name);
    }

    #[test]
    fn unescaped_percent_is_still_the_empty_sentinel() {
        let name = n("system/%");
        assert_eq!(name.segments(), &["".to_string()]);
    }

    #[test]
    fn escaped_dot_round_trips_as_literal_not_navigation() {
        let mut name = n("system/foo");
        name.add_base_name(".");
        let canonical = name.canonical();
        assert_eq!(canonical, "system/foo/\\.");

        let reparsed = n(&canonical);
        assert_eq!(reparsed.segments(), &["foo".to_string(), ".".to_string()]);
        assert_eq!(reparsed, name);
    }

    #[test]
    fn escaped_dot_dot_round_trips_as_literal_not_navigation() {
        let name = n("system/foo/\\..");
        assert_eq!(name.segments(), &["foo".to_string(), "..".to_string()]);
        assert_eq!(name.canonical(), "system/foo/\\..");
    }

    #[test]
    fn unescaped_dots_still_navigate() {
        assert_eq!(n("system/foo/.").canonical(), "system/foo");
        assert_eq!(n("system/foo/..").canonical(), "system");
    }

    #[test]
    fn owner_is_excluded_from_equality_and_ordering() {
        let alice = n("user:alice/x");
        let bob = n("user:bob/x");
        assert_eq!(alice, bob);
        assert_eq!(alice.cmp(&bob), std::cmp::Ordering::Equal);

        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut h1 = DefaultHasher::new();
        alice.hash(&mut h1);
        let mut h2 = DefaultHasher::new();
        bob.hash(&mut h2);
        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn is_below_ignores_owner_qualifier() {
        let parent = n("user/a");
        let child = n("user:alice/a/b");
        assert!(parent.is_below(&child));
    }

    #[test]
    fn is_below_respects_segment_boundaries() {
        let a = n("system/valid");
        let b = n("system/valide");
        assert!(!a.is_below(&b));

        let parent = n("system/export");
        let child = n("system/export/backup");
        assert!(parent.is_below(&child));
        assert!(!n("system/export-backup").is_below(&parent));
        assert!(parent.is_direct_below(&child));
    }

    #[test]
    fn is_below_or_same_is_reflexive() {
        let a = n("system/foo");
        assert!(a.is_below_or_same(&a.clone()));
        assert!(!a.is_below(&a));
    }

    #[test]
    fn trailing_escape_rejected_in_strict_mode() {
        let name = parse_inner("user/x\\", ParseOptions::default());
        assert!(name.is_none());
    }

    #[test]
    fn trailing_escape_allowed_in_compat_mode() {
        let opts = ParseOptions {
            allow_trailing_escape: true,
        };
        let name = Name::parse("user/x\\", opts);
        assert_eq!(name.canonical(), "user/x\\\\");
    }

    #[test]
    fn escaped_separator_survives_round_trip() {
        let name = n("system/a\\/b/c");
        assert_eq!(name.segments(), &["a/b".to_string(), "c".to_string()]);
        assert_eq!(name.canonical(), "system/a\\/b/c");
    }

    #[test]
    fn idempotent_on_its_own_output() {
        let first = n("system//foo//bar//");
        let second = Name::parse(&first.canonical(), ParseOptions::default());
        assert_eq!(first, second);
    }
}
