//! Static fallback-default stage.

use super::{ChainContext, Interceptor};
use crate::error::ConfigResult;
use crate::value::ConfigValue;
use std::collections::HashMap;

/// Name reported as the source of fallback-supplied values.
const FALLBACK_SOURCE: &str = "fallback-defaults";

/// Outermost stage supplying statically registered defaults when no source,
/// profile, or expression path produced a value.
///
/// Fallback values are literal; defaults that need expression expansion or
/// name enumeration belong in the default-values source instead.
pub struct FallbackInterceptor {
    defaults: HashMap<String, String>,
}

impl FallbackInterceptor {
    pub fn new(defaults: HashMap<String, String>) -> Self {
        Self { defaults }
    }
}

impl Interceptor for FallbackInterceptor {
    fn intercept(&self, ctx: ChainContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>> {
        if let Some(value) = ctx.proceed(name)? {
            return Ok(Some(value));
        }
        Ok(self.defaults.get(name).map(|default| {
            ConfigValue::new(name)
                .with_value(default.clone())
                .with_source(FALLBACK_SOURCE, crate::source::DEFAULTS_ORDINAL)
                .with_step("fallback default")
        }))
    }
}
