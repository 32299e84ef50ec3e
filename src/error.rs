//! Error taxonomy for configuration resolution.
//!
//! Plain lookups fail fast with a single error; schema binds fail once per
//! pass with a [`ValidationError`] carrying every recorded [`Problem`].

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type used throughout the crate.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// One recorded validation failure during a schema bind pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    message: String,
}

impl Problem {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Aggregate of every problem found in one schema bind pass.
///
/// A bind is all-or-nothing: one or more problems means no bound object is
/// exposed, and the error enumerates every problem, not just the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    problems: Vec<Problem>,
}

impl ValidationError {
    pub fn new(problems: Vec<Problem>) -> Self {
        Self { problems }
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn problem_count(&self) -> usize {
        self.problems.len()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "configuration validation failed with {} problem(s):",
            self.problems.len()
        )?;
        for problem in &self.problems {
            writeln!(f, "  - {problem}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Errors surfaced by configuration resolution and binding.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required lookup matched no source, profile variant, or default.
    #[error("property {0} not found")]
    NotFound(String),

    /// The property exists but carries an explicit null value.
    #[error("property {0} is defined but has no value")]
    EmptyValue(String),

    /// A raw string could not be parsed into the requested type.
    #[error("cannot convert {raw:?} to {target}: {reason}")]
    Conversion {
        raw: String,
        target: &'static str,
        reason: String,
    },

    /// An unresolved `${key}` reference in strict mode.
    #[error("could not expand ${{{key}}} while resolving {name}")]
    UnresolvedExpression { key: String, name: String },

    /// A `${...}` reference chain re-entered a key already being resolved.
    #[error("recursive expression expansion detected for {name}: {cycle}")]
    ExpansionCycle { name: String, cycle: String },

    /// Expression nesting exceeded the maximum depth.
    #[error("expression expansion of {name} exceeded the maximum depth of {max_depth}")]
    ExpansionDepth { name: String, max_depth: usize },

    /// A `${handler::payload}` form named a handler nobody registered.
    #[error("no secret handler registered with name {0}")]
    UnknownSecretHandler(String),

    /// A secret handler rejected its payload.
    #[error("secret handler {handler} failed to decode payload: {reason}")]
    SecretDecode { handler: String, reason: String },

    /// Aggregate schema bind failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No schema was registered under the requested prefix.
    #[error("no schema registered for prefix {0}")]
    UnknownSchema(String),

    /// A source collaborator failed. Recovered locally during resolution;
    /// surfaced directly only by operations on the failing source itself.
    // The field cannot be called `source`: thiserror reserves that name for
    // an underlying error cause.
    #[error("source {source_name} failed during {operation}: {reason}")]
    Source {
        source_name: String,
        operation: &'static str,
        reason: String,
    },
}

impl ConfigError {
    /// Convenience constructor for conversion failures.
    pub fn conversion(
        raw: impl Into<String>,
        target: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            raw: raw.into(),
            target,
            reason: reason.into(),
        }
    }
}
