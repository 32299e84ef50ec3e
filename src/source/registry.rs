//! Ordinal-sorted source list with failure isolation.

use super::ConfigSource;
use crate::value::ConfigValue;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Immutable snapshot of every registered source, sorted by ordinal
/// descending with registration order breaking ties.
///
/// A refresh never mutates a registry in place; [`SourceRegistry::with_replaced`]
/// produces a new snapshot that the owning configuration installs atomically.
pub struct SourceRegistry {
    sources: Vec<Arc<dyn ConfigSource>>,
    names: OnceLock<BTreeSet<String>>,
}

impl SourceRegistry {
    /// Build a registry from sources in registration order.
    pub fn new(mut sources: Vec<Arc<dyn ConfigSource>>) -> Self {
        // Stable sort: same-ordinal sources keep their registration order.
        sources.sort_by_key(|source| Reverse(source.ordinal()));
        Self {
            sources,
            names: OnceLock::new(),
        }
    }

    /// Sources in resolution order (highest ordinal first).
    pub fn sources(&self) -> &[Arc<dyn ConfigSource>] {
        &self.sources
    }

    /// Find a source by name.
    pub fn source(&self, name: &str) -> Option<&Arc<dyn ConfigSource>> {
        self.sources.iter().find(|source| source.name() == name)
    }

    /// Return the first source (in sorted order) that contains `name`.
    ///
    /// A present-but-null entry counts as found and stops the search. A source
    /// that fails is treated as empty for this access and logged, so one
    /// unreachable source cannot take down resolution of unrelated keys.
    pub fn lookup(&self, name: &str) -> Option<ConfigValue> {
        for source in &self.sources {
            match source.lookup(name) {
                Ok(Some(value)) => {
                    return Some(ConfigValue::from_source(
                        name,
                        value,
                        source.name(),
                        source.ordinal(),
                    ));
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(source = source.name(), error = %err, "source lookup failed, treating as empty");
                }
            }
        }
        None
    }

    /// Lazily computed union of property names across all sources.
    pub fn property_names(&self) -> &BTreeSet<String> {
        self.names.get_or_init(|| {
            let mut union = BTreeSet::new();
            for source in &self.sources {
                match source.property_names() {
                    Ok(names) => union.extend(names),
                    Err(err) => {
                        warn!(source = source.name(), error = %err, "source enumeration failed, treating as empty");
                    }
                }
            }
            union
        })
    }

    /// New registry snapshot with the same-named source replaced wholesale.
    ///
    /// An unknown name registers the replacement as a new source.
    pub fn with_replaced(&self, replacement: Arc<dyn ConfigSource>) -> Self {
        let mut sources: Vec<Arc<dyn ConfigSource>> = Vec::with_capacity(self.sources.len() + 1);
        let mut replaced = false;
        for source in &self.sources {
            if source.name() == replacement.name() {
                sources.push(Arc::clone(&replacement));
                replaced = true;
            } else {
                sources.push(Arc::clone(source));
            }
        }
        if !replaced {
            sources.push(replacement);
        }
        Self::new(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, ConfigResult};
    use crate::source::MapSource;

    struct BrokenSource;

    impl ConfigSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        fn ordinal(&self) -> i32 {
            900
        }

        fn lookup(&self, _name: &str) -> ConfigResult<Option<Option<String>>> {
            Err(ConfigError::Source {
                source_name: "broken".into(),
                operation: "lookup",
                reason: "connection refused".into(),
            })
        }

        fn property_names(&self) -> ConfigResult<std::collections::BTreeSet<String>> {
            Err(ConfigError::Source {
                source_name: "broken".into(),
                operation: "enumerate",
                reason: "connection refused".into(),
            })
        }
    }

    fn registry(sources: Vec<Arc<dyn ConfigSource>>) -> SourceRegistry {
        SourceRegistry::new(sources)
    }

    #[test]
    fn test_higher_ordinal_wins() {
        let reg = registry(vec![
            Arc::new(MapSource::new("low").with_ordinal(100).set("x", "1")),
            Arc::new(MapSource::new("high").with_ordinal(200).set("x", "2")),
        ]);

        let value = reg.lookup("x").unwrap();
        assert_eq!(value.value.as_deref(), Some("2"));
        assert_eq!(value.source_name.as_deref(), Some("high"));
    }

    #[test]
    fn test_registration_order_breaks_ordinal_ties() {
        let reg = registry(vec![
            Arc::new(MapSource::new("first").with_ordinal(100).set("x", "a")),
            Arc::new(MapSource::new("second").with_ordinal(100).set("x", "b")),
        ]);

        let value = reg.lookup("x").unwrap();
        assert_eq!(value.source_name.as_deref(), Some("first"));
    }

    #[test]
    fn test_null_value_stops_the_search() {
        let reg = registry(vec![
            Arc::new(MapSource::new("high").with_ordinal(200).set_null("x")),
            Arc::new(MapSource::new("low").with_ordinal(100).set("x", "shadowed")),
        ]);

        let value = reg.lookup("x").unwrap();
        assert!(value.value.is_none());
        assert_eq!(value.source_name.as_deref(), Some("high"));
    }

    #[test]
    fn test_broken_source_is_skipped() {
        let reg = registry(vec![
            Arc::new(BrokenSource),
            Arc::new(MapSource::new("ok").with_ordinal(100).set("x", "1")),
        ]);

        let value = reg.lookup("x").unwrap();
        assert_eq!(value.value.as_deref(), Some("1"));
    }

    #[test]
    fn test_name_union_skips_broken_source() {
        let reg = registry(vec![
            Arc::new(BrokenSource),
            Arc::new(MapSource::new("a").set("one", "1")),
            Arc::new(MapSource::new("b").set("two", "2")),
        ]);

        let names = reg.property_names();
        assert!(names.contains("one"));
        assert!(names.contains("two"));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_with_replaced_installs_new_snapshot() {
        let reg = registry(vec![Arc::new(
            MapSource::new("app").with_ordinal(100).set("x", "old"),
        )]);

        let refreshed =
            reg.with_replaced(Arc::new(MapSource::new("app").with_ordinal(100).set("x", "new")));

        assert_eq!(reg.lookup("x").unwrap().value.as_deref(), Some("old"));
        assert_eq!(refreshed.lookup("x").unwrap().value.as_deref(), Some("new"));
    }
}
