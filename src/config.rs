//! Configuration assembly and the resolved-configuration facade.
//!
//! A [`ConfigBuilder`] gathers sources, profiles, interceptors, converters,
//! secret handlers and schemas, then freezes them into an immutable
//! [`Config`]. The only mutable state afterwards is the source-registry
//! snapshot, swapped atomically on refresh so in-flight lookups keep the
//! consistent view they started with.

use crate::convert::{Converter, ConverterRegistry};
use crate::error::{ConfigError, ConfigResult};
use crate::interceptor::{
    Chain, ExpressionInterceptor, FallbackInterceptor, IgnorePrefixInterceptor, Interceptor,
    ProfileInterceptor, SecretHandler, SecretInterceptor, priority,
};
use crate::names::PropertyNameIndex;
use crate::schema::{BindContext, BoundValue, SchemaNode, bind_schema};
use crate::source::{ConfigSource, MapSource, SourceRegistry};
use crate::value::ConfigValue;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Priority of the namespace-veto stage. Runs before everything else so a
/// vetoed lookup never reaches the rest of the pipeline.
const IGNORE_PREFIX_PRIORITY: i32 = 50;

/// Builder collecting every collaborator of a configuration.
pub struct ConfigBuilder {
    sources: Vec<Arc<dyn ConfigSource>>,
    profiles: Vec<String>,
    interceptors: Vec<(i32, Arc<dyn Interceptor>)>,
    secret_handlers: Vec<Arc<dyn SecretHandler>>,
    converters: ConverterRegistry,
    defaults: MapSource,
    fallbacks: HashMap<String, String>,
    ignored_prefixes: Vec<String>,
    schemas: Vec<(String, SchemaNode)>,
    expressions: bool,
    secrets: bool,
    lenient: bool,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            profiles: Vec::new(),
            interceptors: Vec::new(),
            secret_handlers: Vec::new(),
            converters: ConverterRegistry::new(),
            defaults: MapSource::new(crate::source::DEFAULTS_SOURCE_NAME)
                .with_ordinal(crate::source::DEFAULTS_ORDINAL),
            fallbacks: HashMap::new(),
            ignored_prefixes: Vec::new(),
            schemas: Vec::new(),
            expressions: true,
            secrets: true,
            lenient: false,
        }
    }

    /// Register a source. Ordinals decide precedence, not registration order.
    pub fn with_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn with_source_arc(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Activate profiles, lowest priority first.
    pub fn with_profiles(mut self, profiles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.profiles.extend(profiles.into_iter().map(Into::into));
        self
    }

    pub fn with_profile(self, profile: impl Into<String>) -> Self {
        self.with_profiles([profile.into()])
    }

    /// Add a custom interceptor stage at the given priority.
    pub fn with_interceptor(
        mut self,
        priority: i32,
        interceptor: impl Interceptor + 'static,
    ) -> Self {
        self.interceptors.push((priority, Arc::new(interceptor)));
        self
    }

    pub fn with_secret_handler(mut self, handler: impl SecretHandler + 'static) -> Self {
        self.secret_handlers.push(Arc::new(handler));
        self
    }

    /// Register an explicit converter for `T`.
    pub fn with_converter<T: 'static>(
        mut self,
        priority: i32,
        converter: Arc<dyn Converter<T>>,
    ) -> Self {
        self.converters.register(priority, converter);
        self
    }

    /// Register a conversion function for `T` at the default priority.
    pub fn with_converter_fn<T, F>(mut self, convert: F) -> Self
    where
        T: 'static,
        F: Fn(&str) -> ConfigResult<T> + Send + Sync + 'static,
    {
        self.converters.register_fn(convert);
        self
    }

    /// Add a default value, stored in the lowest-ordinal defaults source so
    /// it enumerates and expands like any other source value.
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name, value);
        self
    }

    /// Add a literal fallback, supplied only after every other path misses.
    /// Unlike defaults, fallbacks do not enumerate and are never expanded.
    pub fn with_fallback(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fallbacks.insert(name.into(), value.into());
        self
    }

    /// Hide an entire namespace from resolution.
    pub fn with_ignored_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ignored_prefixes.push(prefix.into());
        self
    }

    /// Register a schema rooted at `prefix`, usable later via [`Config::bind`].
    /// Its declared defaults join the defaults source immediately.
    pub fn with_schema(mut self, prefix: impl Into<String>, schema: SchemaNode) -> Self {
        let prefix = prefix.into();
        let mut defaults = Vec::new();
        schema.collect_defaults(&prefix, &mut defaults);
        for (name, value) in defaults {
            self.defaults.insert(name, value);
        }
        self.schemas.push((prefix, schema));
        self
    }

    /// Enable or disable `${...}` expansion. Enabled by default.
    pub fn expressions(mut self, enabled: bool) -> Self {
        self.expressions = enabled;
        self
    }

    /// Enable or disable secret decoding. Enabled by default.
    pub fn secrets(mut self, enabled: bool) -> Self {
        self.secrets = enabled;
        self
    }

    /// Keep unresolvable `${key}` references verbatim instead of failing.
    pub fn lenient_expressions(mut self) -> Self {
        self.lenient = true;
        self
    }

    pub fn build(self) -> Config {
        let mut sources = self.sources;
        sources.push(Arc::new(self.defaults));
        let registry = SourceRegistry::new(sources);

        let secret_handlers: HashMap<String, Arc<dyn SecretHandler>> = self
            .secret_handlers
            .iter()
            .map(|handler| (handler.name().to_string(), Arc::clone(handler)))
            .collect();

        let mut stages = self.interceptors;
        stages.push((
            priority::PROFILE,
            Arc::new(ProfileInterceptor::new(self.profiles.clone())) as Arc<dyn Interceptor>,
        ));
        stages.push((
            priority::EXPRESSION,
            Arc::new(ExpressionInterceptor::new(self.expressions, self.lenient)),
        ));
        stages.push((
            priority::SECRET,
            Arc::new(SecretInterceptor::new(
                self.secrets,
                self.secret_handlers.clone(),
            )),
        ));
        if !self.fallbacks.is_empty() {
            stages.push((
                priority::FALLBACK,
                Arc::new(FallbackInterceptor::new(self.fallbacks)),
            ));
        }
        if !self.ignored_prefixes.is_empty() {
            stages.push((
                IGNORE_PREFIX_PRIORITY,
                Arc::new(IgnorePrefixInterceptor::new(self.ignored_prefixes)),
            ));
        }

        info!(
            sources = registry.sources().len(),
            profiles = ?self.profiles,
            "configuration built"
        );

        Config {
            registry: ArcSwap::from_pointee(registry),
            chain: Chain::new(stages),
            converters: self.converters,
            profiles: self.profiles,
            secret_handlers,
            schemas: self.schemas.into_iter().collect(),
            lenient: self.lenient,
        }
    }
}

/// An assembled configuration.
///
/// Every lookup runs the full pipeline against the current registry snapshot
/// and produces a fresh [`ConfigValue`]; nothing is cached between lookups.
pub struct Config {
    registry: ArcSwap<SourceRegistry>,
    chain: Chain,
    converters: ConverterRegistry,
    profiles: Vec<String>,
    secret_handlers: HashMap<String, Arc<dyn SecretHandler>>,
    schemas: HashMap<String, SchemaNode>,
    lenient: bool,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Resolve one property with full attribution.
    pub fn config_value(&self, name: &str) -> ConfigResult<ConfigValue> {
        let registry = self.registry.load();
        self.chain
            .resolve(&registry, name)?
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))
    }

    /// Resolve and convert a required property.
    ///
    /// Fails with [`ConfigError::NotFound`] when no source supplies the name
    /// and [`ConfigError::EmptyValue`] when it exists without a usable value.
    pub fn get<T>(&self, name: &str) -> ConfigResult<T>
    where
        T: FromStr + 'static,
        T::Err: Display,
    {
        let value = self.config_value(name)?;
        match value.value.as_deref() {
            Some(raw) if !raw.is_empty() => self.converters.convert(raw),
            _ => Err(ConfigError::EmptyValue(name.to_string())),
        }
    }

    /// Resolve and convert an optional property. Missing, explicitly null and
    /// empty values are all `None`.
    pub fn get_optional<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr + 'static,
        T::Err: Display,
    {
        let registry = self.registry.load();
        match self.chain.resolve(&registry, name)? {
            Some(value) => match value.value.as_deref() {
                Some(raw) => self.converters.convert_optional(raw),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Resolve a comma-delimited property into a list.
    pub fn get_values<T>(&self, name: &str) -> ConfigResult<Vec<T>>
    where
        T: FromStr + 'static,
        T::Err: Display,
    {
        let value = self.config_value(name)?;
        match value.value.as_deref() {
            Some(raw) if !raw.is_empty() => self.converters.convert_list(raw),
            _ => Err(ConfigError::EmptyValue(name.to_string())),
        }
    }

    /// Active profiles, lowest priority first.
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    /// The current source-registry snapshot.
    pub fn sources(&self) -> Arc<SourceRegistry> {
        self.registry.load_full()
    }

    /// All known property names, with active-profile prefixes normalized.
    pub fn property_names(&self) -> Vec<String> {
        self.name_index().names().map(str::to_string).collect()
    }

    /// Index of every enumerable property name.
    pub fn name_index(&self) -> PropertyNameIndex {
        let registry = self.registry.load();
        PropertyNameIndex::new(registry.property_names().iter().cloned(), &self.profiles)
    }

    /// Replace the same-named source with a fresh snapshot, atomically.
    ///
    /// Lookups already in flight finish against the snapshot they loaded.
    pub fn refresh_source(&self, replacement: Arc<dyn ConfigSource>) {
        info!(source = replacement.name(), "refreshing source");
        self.registry
            .rcu(|registry| registry.with_replaced(Arc::clone(&replacement)));
    }

    /// Bind the schema registered under `prefix`.
    pub fn bind(&self, prefix: &str) -> ConfigResult<BoundValue> {
        let schema = self
            .schemas
            .get(prefix)
            .ok_or_else(|| ConfigError::UnknownSchema(prefix.to_string()))?;
        self.bind_schema(prefix, schema)
    }

    /// Bind an ad-hoc schema rooted at `prefix`.
    pub fn bind_schema(&self, prefix: &str, schema: &SchemaNode) -> ConfigResult<BoundValue> {
        let registry = self.registry.load();
        let index =
            PropertyNameIndex::new(registry.property_names().iter().cloned(), &self.profiles);
        let ctx = BindContext {
            chain: &self.chain,
            registry: &registry,
            converters: &self.converters,
            index: &index,
            secret_handlers: &self.secret_handlers,
            lenient: self.lenient,
        };
        bind_schema(&ctx, prefix, schema)
    }
}
