//! Time-boxed caching wrapper for I/O-backed sources.

use super::ConfigSource;
use crate::error::ConfigResult;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::warn;

struct CacheEntry {
    // Outer Option: found / missing. Inner: value / explicitly unset.
    value: Option<Option<String>>,
    fetched_at: Instant,
}

/// Wraps a source whose lookups do I/O, caching each key for a validity
/// window.
///
/// On a refresh failure a stale cached value is preferred over propagating
/// the failure, unless there was never a successful fetch for that key.
/// Safe for concurrent invocation; entries update atomically under the lock.
pub struct CachingSource {
    inner: Arc<dyn ConfigSource>,
    validity: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CachingSource {
    pub fn new(inner: Arc<dyn ConfigSource>, validity: Duration) -> Self {
        Self {
            inner,
            validity,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl ConfigSource for CachingSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn ordinal(&self) -> i32 {
        self.inner.ordinal()
    }

    fn lookup(&self, name: &str) -> ConfigResult<Option<Option<String>>> {
        {
            let entries = self.entries.read().expect("cache lock poisoned");
            if let Some(entry) = entries.get(name) {
                if entry.fetched_at.elapsed() < self.validity {
                    return Ok(entry.value.clone());
                }
            }
        }

        match self.inner.lookup(name) {
            Ok(value) => {
                let mut entries = self.entries.write().expect("cache lock poisoned");
                entries.insert(
                    name.to_string(),
                    CacheEntry {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(value)
            }
            Err(err) => {
                let entries = self.entries.read().expect("cache lock poisoned");
                if let Some(entry) = entries.get(name) {
                    warn!(
                        source = self.inner.name(),
                        key = name,
                        error = %err,
                        "refresh failed, serving stale cached value"
                    );
                    Ok(entry.value.clone())
                } else {
                    Err(err)
                }
            }
        }
    }

    fn property_names(&self) -> ConfigResult<BTreeSet<String>> {
        self.inner.property_names()
    }
}
