//! Resolved configuration values with source attribution and lineage.

use serde::Serialize;

/// A single resolved value, produced fresh per lookup.
///
/// Carries the resolved string (after profile selection, expression expansion
/// and secret decoding), the raw pre-expansion string, where it came from, and
/// the transformation steps that were applied on the way out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigValue {
    /// Property name as the caller asked for it (profile prefixes stripped).
    pub name: String,
    /// Fully transformed value. `None` models "present but explicitly unset".
    pub value: Option<String>,
    /// Value as it appeared in the winning source, before any transformation.
    pub raw_value: Option<String>,
    /// Name of the source that won the lookup, if any source was involved.
    pub source_name: Option<String>,
    /// Ordinal of the winning source.
    pub source_ordinal: i32,
    /// Transformation steps applied, in order.
    pub lineage: Vec<String>,
    /// Secret handler requested via `${handler::payload}`, consumed by the
    /// secret stage before the value reaches the caller.
    #[serde(skip)]
    pub(crate) secret_handler: Option<String>,
}

impl ConfigValue {
    /// Create an empty value for `name`, unattributed to any source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            raw_value: None,
            source_name: None,
            source_ordinal: 0,
            lineage: Vec::new(),
            secret_handler: None,
        }
    }

    /// Create a value as the terminal chain stage wraps a source hit.
    pub fn from_source(
        name: impl Into<String>,
        value: Option<String>,
        source_name: impl Into<String>,
        source_ordinal: i32,
    ) -> Self {
        Self {
            name: name.into(),
            raw_value: value.clone(),
            value,
            source_name: Some(source_name.into()),
            source_ordinal,
            lineage: Vec::new(),
            secret_handler: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_source(mut self, source_name: impl Into<String>, source_ordinal: i32) -> Self {
        self.source_name = Some(source_name.into());
        self.source_ordinal = source_ordinal;
        self
    }

    /// Record one transformation step in the lineage.
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.lineage.push(step.into());
        self
    }

    pub(crate) fn with_secret_handler(mut self, handler: impl Into<String>) -> Self {
        self.secret_handler = Some(handler.into());
        self
    }

    /// Consume the value, returning the resolved string if any.
    pub fn into_value(self) -> Option<String> {
        self.value
    }
}
