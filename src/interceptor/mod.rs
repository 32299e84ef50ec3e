//! The interceptor chain wrapping the source registry.
//!
//! Lookups run through an ordered pipeline of stages; each stage can pass a
//! request through, rewrite the name or the value, or veto the lookup
//! entirely by returning "not found" without proceeding. The chain ends at a
//! terminal stage that queries the source registry.
//!
//! Stages are sorted ascending by a priority number fixed at registration: a
//! lower priority runs earlier, closer to the caller. The standard pipeline
//! is fallback → secret → expression → profile → sources.

mod expression;
mod fallback;
mod filter;
mod profile;
mod secret;

pub use expression::ExpressionInterceptor;
pub(crate) use expression::expand as expand_expression;
pub use fallback::FallbackInterceptor;
pub use filter::IgnorePrefixInterceptor;
pub use profile::ProfileInterceptor;
pub use secret::{AES_GCM_HANDLER, AesGcmSecretHandler, SecretHandler, SecretInterceptor};

use crate::error::ConfigResult;
use crate::source::SourceRegistry;
use crate::value::ConfigValue;
use std::sync::Arc;

/// Priorities of the standard stages.
pub mod priority {
    pub const FALLBACK: i32 = 100;
    pub const SECRET: i32 = 200;
    pub const EXPRESSION: i32 = 300;
    pub const PROFILE: i32 = 800;
}

/// One value-transforming stage of the resolution pipeline.
pub trait Interceptor: Send + Sync {
    /// Handle a lookup for `name`.
    ///
    /// Implementations delegate inward with [`ChainContext::proceed`], possibly
    /// under a different name, and may rewrite the returned value. Returning
    /// `Ok(None)` without proceeding vetoes the lookup.
    fn intercept(&self, ctx: ChainContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>>;
}

/// The built, immutable interceptor pipeline.
pub struct Chain {
    stages: Vec<Arc<dyn Interceptor>>,
}

impl Chain {
    /// Build the chain from (priority, interceptor) pairs.
    ///
    /// The sort is stable, so equal priorities keep registration order.
    pub fn new(mut stages: Vec<(i32, Arc<dyn Interceptor>)>) -> Self {
        stages.sort_by_key(|(priority, _)| *priority);
        Self {
            stages: stages.into_iter().map(|(_, stage)| stage).collect(),
        }
    }

    /// Resolve `name` through the whole pipeline against a registry snapshot.
    pub fn resolve(
        &self,
        registry: &SourceRegistry,
        name: &str,
    ) -> ConfigResult<Option<ConfigValue>> {
        self.head(registry).proceed(name)
    }

    /// A context positioned before the first stage.
    pub fn head<'a>(&'a self, registry: &'a SourceRegistry) -> ChainContext<'a> {
        ChainContext {
            stages: &self.stages,
            registry,
            index: 0,
        }
    }
}

/// A position in the pipeline, handed to each stage.
#[derive(Clone, Copy)]
pub struct ChainContext<'a> {
    stages: &'a [Arc<dyn Interceptor>],
    registry: &'a SourceRegistry,
    index: usize,
}

impl<'a> ChainContext<'a> {
    /// Invoke the next stage, or the terminal source-registry lookup.
    pub fn proceed(&self, name: &str) -> ConfigResult<Option<ConfigValue>> {
        if let Some(stage) = self.stages.get(self.index) {
            let next = ChainContext {
                index: self.index + 1,
                ..*self
            };
            stage.intercept(next, name)
        } else {
            Ok(self.registry.lookup(name))
        }
    }

    /// Restart resolution from the head of the chain.
    ///
    /// Used by the expression stage so that a value in one source can refer
    /// to a key that only exists, post-interception, in another.
    pub fn restart(&self, name: &str) -> ConfigResult<Option<ConfigValue>> {
        ChainContext { index: 0, ..*self }.proceed(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MapSource;

    struct Uppercase;

    impl Interceptor for Uppercase {
        fn intercept(
            &self,
            ctx: ChainContext<'_>,
            name: &str,
        ) -> ConfigResult<Option<ConfigValue>> {
            Ok(ctx.proceed(name)?.map(|value| {
                let upper = value.value.as_deref().unwrap_or_default().to_uppercase();
                value.with_value(upper).with_step("uppercase")
            }))
        }
    }

    struct Veto;

    impl Interceptor for Veto {
        fn intercept(
            &self,
            _ctx: ChainContext<'_>,
            _name: &str,
        ) -> ConfigResult<Option<ConfigValue>> {
            Ok(None)
        }
    }

    fn registry() -> SourceRegistry {
        SourceRegistry::new(vec![Arc::new(MapSource::new("src").set("key", "value"))])
    }

    #[test]
    fn test_empty_chain_hits_terminal_stage() {
        let chain = Chain::new(Vec::new());
        let reg = registry();
        let value = chain.resolve(&reg, "key").unwrap().unwrap();
        assert_eq!(value.value.as_deref(), Some("value"));
        assert_eq!(value.source_name.as_deref(), Some("src"));
    }

    #[test]
    fn test_stage_rewrites_value() {
        let chain = Chain::new(vec![(500, Arc::new(Uppercase) as Arc<dyn Interceptor>)]);
        let reg = registry();
        let value = chain.resolve(&reg, "key").unwrap().unwrap();
        assert_eq!(value.value.as_deref(), Some("VALUE"));
        assert_eq!(value.lineage, vec!["uppercase".to_string()]);
    }

    #[test]
    fn test_veto_hides_existing_key() {
        let chain = Chain::new(vec![(100, Arc::new(Veto) as Arc<dyn Interceptor>)]);
        let reg = registry();
        assert!(chain.resolve(&reg, "key").unwrap().is_none());
    }

    #[test]
    fn test_priority_orders_stages() {
        struct Tag(&'static str);

        impl Interceptor for Tag {
            fn intercept(
                &self,
                ctx: ChainContext<'_>,
                name: &str,
            ) -> ConfigResult<Option<ConfigValue>> {
                Ok(ctx.proceed(name)?.map(|value| value.with_step(self.0)))
            }
        }

        let chain = Chain::new(vec![
            (300, Arc::new(Tag("inner")) as Arc<dyn Interceptor>),
            (100, Arc::new(Tag("outer")) as Arc<dyn Interceptor>),
        ]);
        let reg = registry();
        let value = chain.resolve(&reg, "key").unwrap().unwrap();
        // The inner stage tags first on the way back out.
        assert_eq!(value.lineage, vec!["inner".to_string(), "outer".to_string()]);
    }
}
