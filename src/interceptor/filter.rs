//! Namespace veto stage.

use super::{ChainContext, Interceptor};
use crate::error::ConfigResult;
use crate::value::ConfigValue;

/// Vetoes every lookup under the configured prefixes.
///
/// This is how a self-configuring source keeps the pipeline from recursing
/// into its own namespace: the source is bootstrapped from a separate,
/// smaller pipeline, and the main chain is blinded to those keys.
pub struct IgnorePrefixInterceptor {
    prefixes: Vec<String>,
}

impl IgnorePrefixInterceptor {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }
}

impl Interceptor for IgnorePrefixInterceptor {
    fn intercept(&self, ctx: ChainContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>> {
        if self.prefixes.iter().any(|prefix| name.starts_with(prefix.as_str())) {
            return Ok(None);
        }
        ctx.proceed(name)
    }
}
