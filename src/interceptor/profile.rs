//! Profile override stage.

use super::{ChainContext, Interceptor};
use crate::error::ConfigResult;
use crate::names;
use crate::value::ConfigValue;
use tracing::debug;

/// Rewrites lookups to try `%profile.name` before `name` itself.
///
/// Active profiles are ordered lowest priority first; later profiles win
/// ties. A profiled variant only wins when its source ordinal ties with or
/// exceeds the unprefixed winner's ordinal, so a higher-ordinal plain value
/// still overrides a lower-ordinal profiled one.
pub struct ProfileInterceptor {
    profiles: Vec<String>,
}

impl ProfileInterceptor {
    pub fn new(profiles: Vec<String>) -> Self {
        Self { profiles }
    }

    /// Strip an active-profile prefix so callers can use either form.
    fn normalize<'a>(&self, name: &'a str) -> &'a str {
        if let Some((profile, rest)) = names::profile_of(name) {
            if self.profiles.iter().any(|p| p == profile) {
                return rest;
            }
        }
        name
    }
}

impl Interceptor for ProfileInterceptor {
    fn intercept(&self, ctx: ChainContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>> {
        let normalized = self.normalize(name);

        for profile in self.profiles.iter().rev() {
            let profiled = format!("%{profile}.{normalized}");
            if let Some(value) = ctx.proceed(&profiled)? {
                if let Some(plain) = ctx.proceed(normalized)? {
                    if plain.source_ordinal > value.source_ordinal {
                        return Ok(Some(plain));
                    }
                }
                debug!(name = normalized, profile, "profiled variant won");
                return Ok(Some(
                    value
                        .with_name(normalized)
                        .with_step(format!("profile {profile}")),
                ));
            }
        }

        ctx.proceed(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::Chain;
    use crate::source::{MapSource, SourceRegistry};
    use std::sync::Arc;

    fn chain(profiles: &[&str]) -> Chain {
        Chain::new(vec![(
            super::super::priority::PROFILE,
            Arc::new(ProfileInterceptor::new(
                profiles.iter().map(|p| p.to_string()).collect(),
            )) as Arc<dyn Interceptor>,
        )])
    }

    #[test]
    fn test_profiled_variant_wins_in_same_source() {
        let reg = SourceRegistry::new(vec![Arc::new(
            MapSource::new("app")
                .set("key", "default")
                .set("%dev.key", "devval"),
        )]);

        let value = chain(&["dev"]).resolve(&reg, "key").unwrap().unwrap();
        assert_eq!(value.value.as_deref(), Some("devval"));
        assert_eq!(value.name, "key");
    }

    #[test]
    fn test_no_active_profile_uses_plain_value() {
        let reg = SourceRegistry::new(vec![Arc::new(
            MapSource::new("app")
                .set("key", "default")
                .set("%dev.key", "devval"),
        )]);

        let value = chain(&[]).resolve(&reg, "key").unwrap().unwrap();
        assert_eq!(value.value.as_deref(), Some("default"));
    }

    #[test]
    fn test_higher_ordinal_plain_value_beats_profiled() {
        let reg = SourceRegistry::new(vec![
            Arc::new(MapSource::new("low").with_ordinal(100).set("%dev.key", "devval")),
            Arc::new(MapSource::new("high").with_ordinal(300).set("key", "plain")),
        ]);

        let value = chain(&["dev"]).resolve(&reg, "key").unwrap().unwrap();
        assert_eq!(value.value.as_deref(), Some("plain"));
    }

    #[test]
    fn test_equal_ordinal_prefers_profiled() {
        let reg = SourceRegistry::new(vec![
            Arc::new(MapSource::new("a").with_ordinal(100).set("key", "plain")),
            Arc::new(MapSource::new("b").with_ordinal(100).set("%dev.key", "devval")),
        ]);

        let value = chain(&["dev"]).resolve(&reg, "key").unwrap().unwrap();
        assert_eq!(value.value.as_deref(), Some("devval"));
    }

    #[test]
    fn test_later_profile_wins() {
        let reg = SourceRegistry::new(vec![Arc::new(
            MapSource::new("app")
                .set("%dev.key", "devval")
                .set("%prod.key", "prodval"),
        )]);

        let value = chain(&["dev", "prod"]).resolve(&reg, "key").unwrap().unwrap();
        assert_eq!(value.value.as_deref(), Some("prodval"));
    }

    #[test]
    fn test_profiled_name_normalizes_for_caller() {
        let reg = SourceRegistry::new(vec![Arc::new(
            MapSource::new("app").set("%dev.key", "devval"),
        )]);

        let value = chain(&["dev"]).resolve(&reg, "%dev.key").unwrap().unwrap();
        assert_eq!(value.name, "key");
        assert_eq!(value.value.as_deref(), Some("devval"));
    }
}
