//! Property-name structure helpers and the name index.
//!
//! Property names form a dot-delimited hierarchy with optional numeric
//! indexes (`servers[0].host`) and profile prefixes (`%dev.port`). No fixed
//! schema exists: the index is a union of whatever every source enumerates,
//! and map-style keys are discovered from it by prefix.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};

/// Split a `%profile.rest` name into its profile and the remaining name.
pub fn profile_of(name: &str) -> Option<(&str, &str)> {
    let stripped = name.strip_prefix('%')?;
    let dot = stripped.find('.')?;
    Some((&stripped[..dot], &stripped[dot + 1..]))
}

/// Whether a name ends in an `[n]` index.
pub fn is_indexed(name: &str) -> bool {
    trailing_index(name).is_some()
}

/// The trailing index of an indexed name, if any.
pub fn trailing_index(name: &str) -> Option<usize> {
    let open = name.rfind('[')?;
    let digits = name.get(open + 1..name.len().checked_sub(1)?)?;
    if name.ends_with(']') && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// Strip every `[n]` index from a name: `a[0].b[1]` becomes `a.b`.
pub fn unindexed(name: &str) -> Cow<'_, str> {
    if !name.contains('[') {
        return Cow::Borrowed(name);
    }
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(open) = rest.find('[') {
        let tail = &rest[open + 1..];
        match tail.find(']') {
            Some(close) if !tail[..close].is_empty() && tail[..close].bytes().all(|b| b.is_ascii_digit()) => {
                out.push_str(&rest[..open]);
                rest = &tail[close + 1..];
            }
            _ => {
                out.push_str(&rest[..open + 1]);
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// The part of `name` below `prefix`, if `name` lives in that namespace.
///
/// Returns `Some("")` when the name equals the prefix, and the remainder
/// after the separating dot when the name is nested under it.
pub fn key_after_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(name);
    }
    let rest = name.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('.').or_else(|| rest.starts_with('[').then_some(rest))
    }
}

/// First path segment of a relative name, up to a dot or index bracket.
pub fn next_segment(rest: &str) -> &str {
    let end = rest
        .find(['.', '['])
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Union of property names across all sources, with active-profile variants
/// normalized to their base names.
///
/// Supports the schema binder's map discovery and optional-group probing
/// without requiring any declared shape.
pub struct PropertyNameIndex {
    names: BTreeSet<String>,
}

impl PropertyNameIndex {
    /// Build the index from raw source names and the active profile list.
    ///
    /// A `%profile.key` variant for an active profile contributes `key`;
    /// variants for inactive profiles are kept as-is.
    pub fn new(raw: impl IntoIterator<Item = String>, profiles: &[String]) -> Self {
        let mut names = BTreeSet::new();
        for name in raw {
            match profile_of(&name) {
                Some((profile, rest)) if profiles.iter().any(|p| p == profile) => {
                    names.insert(rest.to_string());
                }
                _ => {
                    names.insert(name);
                }
            }
        }
        Self { names }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Whether any name lives strictly below `prefix`.
    pub fn has_children(&self, prefix: &str) -> bool {
        self.names
            .iter()
            .any(|name| matches!(key_after_prefix(name, prefix), Some(rest) if !rest.is_empty()))
    }

    /// Names forming an indexed collection at `prefix` (`prefix[0]`,
    /// `prefix[1]`, ...), ordered by their trailing index.
    pub fn indexed_names(&self, prefix: &str) -> Vec<String> {
        let mut found: Vec<(usize, &String)> = self
            .names
            .iter()
            .filter(|name| is_indexed(name) && unindexed(name) == prefix)
            .filter_map(|name| trailing_index(name).map(|index| (index, name)))
            .collect();
        found.sort_by_key(|(index, _)| *index);
        found.into_iter().map(|(_, name)| name.clone()).collect()
    }

    /// Map keys discovered directly below `prefix`, deduplicated in
    /// first-discovery order.
    pub fn map_keys(&self, prefix: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for name in &self.names {
            let Some(rest) = key_after_prefix(name, prefix) else {
                continue;
            };
            let segment = next_segment(rest);
            if segment.is_empty() {
                continue;
            }
            if seen.insert(segment.to_string()) {
                keys.push(segment.to_string());
            }
        }
        keys
    }
}
