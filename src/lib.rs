//! Layered configuration resolution.
//!
//! Sources supply raw key/value pairs and are ranked by ordinal; every lookup
//! runs through an interceptor pipeline handling profile overrides, `${...}`
//! expression expansion, secret decoding and fallback defaults. Converters
//! turn resolved strings into typed values, and schemas bind whole property
//! namespaces at once with aggregate validation.

pub mod config;
pub mod convert;
pub mod error;
pub mod expr;
pub mod global;
pub mod interceptor;
pub mod names;
pub mod schema;
pub mod source;
pub mod value;

pub use config::{Config, ConfigBuilder};
pub use error::{ConfigError, ConfigResult, Problem, ValidationError};
pub use value::ConfigValue;
