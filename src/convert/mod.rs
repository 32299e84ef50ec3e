//! Typed conversion of resolved strings.
//!
//! Conversion is layered: an explicitly registered converter for the exact
//! target type wins, highest declared priority first with registration order
//! breaking ties; otherwise an implicit converter is synthesized from the
//! type's `FromStr` implementation. Collection and optional targets are
//! handled by decorators over a delimiter-split raw string.

use crate::error::{ConfigError, ConfigResult};
use std::any::{Any, TypeId, type_name};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;

/// Priority assigned to registrations that do not declare one.
pub const DEFAULT_CONVERTER_PRIORITY: i32 = 100;

/// Converts a raw configuration string into a `T`.
///
/// A conversion error is distinct from "not found": a present-but-garbled
/// value is always surfaced, never silently defaulted.
pub trait Converter<T>: Send + Sync {
    fn convert(&self, raw: &str) -> ConfigResult<T>;
}

impl<T, F> Converter<T> for F
where
    F: Fn(&str) -> ConfigResult<T> + Send + Sync,
{
    fn convert(&self, raw: &str) -> ConfigResult<T> {
        self(raw)
    }
}

// Arc<dyn Converter<T>> boxed behind Any so one map can hold every target
// type; `find` downcasts back through the holder.
struct Holder<T>(Arc<dyn Converter<T>>);

struct Registered {
    priority: i32,
    seq: usize,
    holder: Arc<dyn Any + Send + Sync>,
}

/// Priority-ranked registry of explicit converters.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: HashMap<TypeId, Vec<Registered>>,
    seq: usize,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an explicit converter for `T` with the given priority.
    pub fn register<T: 'static>(&mut self, priority: i32, converter: Arc<dyn Converter<T>>) {
        let seq = self.seq;
        self.seq += 1;
        self.converters
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Registered {
                priority,
                seq,
                holder: Arc::new(Holder(converter)),
            });
    }

    /// Register a conversion function at the default priority.
    pub fn register_fn<T, F>(&mut self, convert: F)
    where
        T: 'static,
        F: Fn(&str) -> ConfigResult<T> + Send + Sync + 'static,
    {
        self.register(DEFAULT_CONVERTER_PRIORITY, Arc::new(convert));
    }

    /// The winning explicit converter for `T`, if any was registered.
    pub fn find<T: 'static>(&self) -> Option<Arc<dyn Converter<T>>> {
        let list = self.converters.get(&TypeId::of::<T>())?;
        let best = list
            .iter()
            .min_by_key(|registered| (std::cmp::Reverse(registered.priority), registered.seq))?;
        let holder = Arc::clone(&best.holder)
            .downcast::<Holder<T>>()
            .expect("registry entry matches its TypeId");
        Some(Arc::clone(&holder.0))
    }

    /// Convert via the explicit converter for `T`, or the implicit `FromStr`
    /// converter when none was registered.
    pub fn convert<T>(&self, raw: &str) -> ConfigResult<T>
    where
        T: FromStr + 'static,
        T::Err: Display,
    {
        match self.find::<T>() {
            Some(converter) => converter.convert(raw),
            None => implicit(raw),
        }
    }

    /// Convert to `None` on an empty raw string, `Some` otherwise.
    pub fn convert_optional<T>(&self, raw: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr + 'static,
        T::Err: Display,
    {
        if raw.is_empty() {
            Ok(None)
        } else {
            self.convert(raw).map(Some)
        }
    }

    /// Split on unescaped commas and convert each element.
    pub fn convert_list<T>(&self, raw: &str) -> ConfigResult<Vec<T>>
    where
        T: FromStr + 'static,
        T::Err: Display,
    {
        split_list(raw)
            .iter()
            .map(|element| self.convert(element))
            .collect()
    }

    /// Like [`Self::convert_list`], deduplicated into a set.
    pub fn convert_set<T>(&self, raw: &str) -> ConfigResult<HashSet<T>>
    where
        T: FromStr + Eq + Hash + 'static,
        T::Err: Display,
    {
        split_list(raw)
            .iter()
            .map(|element| self.convert(element))
            .collect()
    }
}

/// Implicit converter synthesized from `FromStr`.
///
/// An empty string never parses: optional targets go through
/// [`ConverterRegistry::convert_optional`] instead.
pub fn implicit<T>(raw: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    if raw.is_empty() {
        return Err(ConfigError::conversion(raw, type_name::<T>(), "empty value"));
    }
    raw.parse()
        .map_err(|err: T::Err| ConfigError::conversion(raw, type_name::<T>(), err.to_string()))
}

/// Split a raw collection value on unescaped commas.
///
/// `\,` is a literal comma inside one element; other backslashes pass
/// through untouched. Empty segments are dropped.
pub fn split_list(raw: &str) -> Vec<String> {
    let mut elements = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(',') => current.push(','),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            ',' => {
                if !current.is_empty() {
                    elements.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        elements.push(current);
    }
    elements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_from_str() {
        let registry = ConverterRegistry::new();
        assert_eq!(registry.convert::<i64>("42").unwrap(), 42);
        assert_eq!(registry.convert::<bool>("true").unwrap(), true);
        assert_eq!(registry.convert::<f64>("1.5").unwrap(), 1.5);
    }

    #[test]
    fn test_empty_string_fails_plain_conversion() {
        let registry = ConverterRegistry::new();
        let err = registry.convert::<i64>("").unwrap_err();
        assert!(matches!(err, ConfigError::Conversion { .. }));
    }

    #[test]
    fn test_empty_string_is_none_for_optional() {
        let registry = ConverterRegistry::new();
        assert_eq!(registry.convert_optional::<i64>("").unwrap(), None);
        assert_eq!(registry.convert_optional::<i64>("7").unwrap(), Some(7));
    }

    #[test]
    fn test_garbled_value_is_conversion_error() {
        let registry = ConverterRegistry::new();
        assert!(registry.convert::<i64>("twelve").is_err());
    }

    #[test]
    fn test_explicit_converter_wins_over_implicit() {
        let mut registry = ConverterRegistry::new();
        registry.register_fn::<i64, _>(|raw| Ok(raw.len() as i64));
        assert_eq!(registry.convert::<i64>("42").unwrap(), 2);
    }

    #[test]
    fn test_highest_priority_wins_ties_by_registration() {
        let mut registry = ConverterRegistry::new();
        registry.register::<i64>(100, Arc::new(|_: &str| Ok(1i64)));
        registry.register::<i64>(300, Arc::new(|_: &str| Ok(2i64)));
        registry.register::<i64>(300, Arc::new(|_: &str| Ok(3i64)));
        registry.register::<i64>(200, Arc::new(|_: &str| Ok(4i64)));

        // 300 beats the rest; the earlier 300 registration wins the tie.
        assert_eq!(registry.convert::<i64>("x").unwrap(), 2);
    }

    #[test]
    fn test_split_list_escaping() {
        assert_eq!(
            split_list("item1,item2,item3\\,stillItem3"),
            vec!["item1", "item2", "item3,stillItem3"]
        );
    }

    #[test]
    fn test_split_list_drops_empty_segments() {
        assert_eq!(split_list("a,,b,"), vec!["a", "b"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_split_keeps_unrelated_backslashes() {
        assert_eq!(split_list("C:\\dir,other"), vec!["C:\\dir", "other"]);
    }

    #[test]
    fn test_convert_list() {
        let registry = ConverterRegistry::new();
        assert_eq!(
            registry.convert_list::<i64>("1,2,3").unwrap(),
            vec![1, 2, 3]
        );
        assert!(registry.convert_list::<i64>("1,x").is_err());
    }

    #[test]
    fn test_convert_set_dedups() {
        let registry = ConverterRegistry::new();
        let set = registry.convert_set::<i64>("1,2,1").unwrap();
        assert_eq!(set.len(), 2);
    }
}
