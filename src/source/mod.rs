//! Configuration sources and the ordinal-ranked source registry.
//!
//! A source is an immutable named map of property keys to raw strings. Sources
//! are produced by collaborators (file loaders, env readers, remote fetchers),
//! registered once at build time, and only ever replaced wholesale on refresh.

mod cache;
mod registry;
mod tree;

pub use cache::CachingSource;
pub use registry::SourceRegistry;
pub use tree::{json_source, yaml_source};

use crate::error::ConfigResult;
use std::collections::{BTreeSet, HashMap};

/// Reserved key a source may carry to self-report its own ordinal.
pub const CONFIG_ORDINAL: &str = "config_ordinal";

/// Ordinal used when a source does not declare one.
pub const DEFAULT_ORDINAL: i32 = 100;

/// Ordinal of the schema-defaults source. Always loses to real sources.
pub(crate) const DEFAULTS_ORDINAL: i32 = i32::MIN;

/// Name of the source holding registered default values.
pub(crate) const DEFAULTS_SOURCE_NAME: &str = "default-values";

/// A ranked key/value configuration source.
///
/// Lookup results distinguish a missing key (`Ok(None)`) from a key that is
/// present but explicitly unset (`Ok(Some(None))`); the latter still wins a
/// registry lookup and stops the search.
pub trait ConfigSource: Send + Sync {
    /// Source name, unique within one registry.
    fn name(&self) -> &str;

    /// Priority of this source; higher wins.
    fn ordinal(&self) -> i32 {
        DEFAULT_ORDINAL
    }

    /// Look up one key.
    fn lookup(&self, name: &str) -> ConfigResult<Option<Option<String>>>;

    /// Enumerate every property name this source knows about.
    fn property_names(&self) -> ConfigResult<BTreeSet<String>>;

    /// Snapshot of the full key/value map, in enumeration order.
    fn properties(&self) -> ConfigResult<Vec<(String, Option<String>)>> {
        let mut out = Vec::new();
        for name in self.property_names()? {
            if let Some(value) = self.lookup(&name)? {
                out.push((name, value));
            }
        }
        Ok(out)
    }
}

/// In-memory source backed by a plain map.
///
/// The workhorse source: collaborators that parse files or read environments
/// produce one of these per tier. An explicit ordinal takes precedence over a
/// self-reported `config_ordinal` entry.
#[derive(Debug, Clone)]
pub struct MapSource {
    name: String,
    ordinal: Option<i32>,
    entries: HashMap<String, Option<String>>,
}

impl MapSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ordinal: None,
            entries: HashMap::new(),
        }
    }

    /// Build a source from string pairs.
    pub fn from_pairs<K, V>(name: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut source = Self::new(name);
        for (key, value) in pairs {
            source.entries.insert(key.into(), Some(value.into()));
        }
        source
    }

    /// Fix the ordinal explicitly, overriding any `config_ordinal` entry.
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    /// Add one key/value entry.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), Some(value.into()));
        self
    }

    /// Add a key that is present but explicitly unset.
    pub fn set_null(mut self, key: impl Into<String>) -> Self {
        self.entries.insert(key.into(), None);
        self
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), Some(value.into()));
    }

    pub(crate) fn insert_entry(&mut self, key: String, value: Option<String>) {
        self.entries.insert(key, value);
    }
}

impl ConfigSource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn ordinal(&self) -> i32 {
        if let Some(ordinal) = self.ordinal {
            return ordinal;
        }
        self.entries
            .get(CONFIG_ORDINAL)
            .and_then(|v| v.as_deref())
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_ORDINAL)
    }

    fn lookup(&self, name: &str) -> ConfigResult<Option<Option<String>>> {
        Ok(self.entries.get(name).cloned())
    }

    fn property_names(&self) -> ConfigResult<BTreeSet<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}
