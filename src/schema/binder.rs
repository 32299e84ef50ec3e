//! Schema binding against a resolution pipeline.
//!
//! One bind pass walks the schema tree depth-first, resolving each leaf
//! through the full interceptor chain. Failures never abort the walk: every
//! problem is recorded and a placeholder is bound in its place, so the caller
//! sees the complete list at once.

use super::{
    BoundValue, CollectionSchema, GroupSchema, MapSchema, PrimitiveSchema, PrimitiveType,
    SchemaNode, join,
};
use crate::convert::{ConverterRegistry, split_list};
use crate::error::{ConfigError, ConfigResult, Problem, ValidationError};
use crate::expr::Expression;
use crate::interceptor::{Chain, SecretHandler, expand_expression};
use crate::names::PropertyNameIndex;
use crate::source::SourceRegistry;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a bind pass needs from the owning configuration.
pub(crate) struct BindContext<'a> {
    pub chain: &'a Chain,
    pub registry: &'a SourceRegistry,
    pub converters: &'a ConverterRegistry,
    pub index: &'a PropertyNameIndex,
    pub secret_handlers: &'a HashMap<String, Arc<dyn SecretHandler>>,
    pub lenient: bool,
}

/// Bind a schema rooted at `prefix`. All-or-nothing: any problem fails the
/// whole bind with every problem listed.
pub(crate) fn bind_schema(
    ctx: &BindContext<'_>,
    prefix: &str,
    node: &SchemaNode,
) -> ConfigResult<BoundValue> {
    let mut problems = Vec::new();
    let value = bind_node(ctx, prefix, node, &mut problems);
    if problems.is_empty() {
        Ok(value)
    } else {
        Err(ValidationError::new(problems).into())
    }
}

fn bind_node(
    ctx: &BindContext<'_>,
    prefix: &str,
    node: &SchemaNode,
    problems: &mut Vec<Problem>,
) -> BoundValue {
    match node {
        SchemaNode::Primitive(primitive) => bind_primitive(ctx, prefix, primitive, problems),
        SchemaNode::Group(group) => bind_group(ctx, prefix, group, problems),
        SchemaNode::Collection(collection) => bind_collection(ctx, prefix, collection, problems),
        SchemaNode::Map(map) => bind_map(ctx, prefix, map, problems),
    }
}

fn bind_primitive(
    ctx: &BindContext<'_>,
    name: &str,
    primitive: &PrimitiveSchema,
    problems: &mut Vec<Problem>,
) -> BoundValue {
    match resolve_leaf(ctx, name, primitive.default.as_deref(), problems) {
        Some(raw) => convert_primitive(ctx, primitive.ty, name, &raw, problems),
        None if primitive.optional => BoundValue::Absent,
        None => {
            problems.push(Problem::new(format!("missing required property {name}")));
            BoundValue::Absent
        }
    }
}

fn bind_group(
    ctx: &BindContext<'_>,
    prefix: &str,
    group: &GroupSchema,
    problems: &mut Vec<Problem>,
) -> BoundValue {
    if group.optional && !group_present(ctx, prefix, group) {
        return BoundValue::Absent;
    }
    let mut entries = Vec::with_capacity(group.members.len());
    for member in &group.members {
        let child = if member.inline {
            prefix.to_string()
        } else {
            join(prefix, &member.name)
        };
        let value = bind_node(ctx, &child, &member.node, problems);
        entries.push((member.name.clone(), value));
    }
    BoundValue::Group(entries)
}

/// Whether an optional group has any configured presence.
///
/// The name index catches enumerable sources; the chain probe additionally
/// catches values that only exist post-interception, such as fallback
/// defaults for a direct primitive member.
fn group_present(ctx: &BindContext<'_>, prefix: &str, group: &GroupSchema) -> bool {
    if ctx.index.has_children(prefix) || ctx.index.contains(prefix) {
        return true;
    }
    group.members.iter().any(|member| {
        let child = if member.inline {
            prefix.to_string()
        } else {
            join(prefix, &member.name)
        };
        matches!(member.node, SchemaNode::Primitive(_) | SchemaNode::Collection(_))
            && matches!(ctx.chain.resolve(ctx.registry, &child), Ok(Some(_)))
    })
}

/// A collection is one delimiter-split string at `name`, or, when no single
/// value exists, the indexed entries `name[0]`, `name[1]`, ... that tree
/// sources flatten lists into. A single string wins over indexed entries.
fn bind_collection(
    ctx: &BindContext<'_>,
    name: &str,
    collection: &CollectionSchema,
    problems: &mut Vec<Problem>,
) -> BoundValue {
    match resolve_leaf(ctx, name, collection.default.as_deref(), problems) {
        Some(raw) => {
            let elements = split_list(&raw)
                .iter()
                .map(|element| convert_primitive(ctx, collection.element, name, element, problems))
                .collect();
            BoundValue::List(elements)
        }
        None => {
            let indexed = ctx.index.indexed_names(name);
            if !indexed.is_empty() {
                return bind_indexed_collection(ctx, &indexed, collection, problems);
            }
            if collection.optional {
                BoundValue::Absent
            } else {
                problems.push(Problem::new(format!("missing required property {name}")));
                BoundValue::Absent
            }
        }
    }
}

fn bind_indexed_collection(
    ctx: &BindContext<'_>,
    indexed: &[String],
    collection: &CollectionSchema,
    problems: &mut Vec<Problem>,
) -> BoundValue {
    let mut elements = Vec::with_capacity(indexed.len());
    for entry in indexed {
        match resolve_leaf(ctx, entry, None, problems) {
            Some(raw) => {
                elements.push(convert_primitive(ctx, collection.element, entry, &raw, problems));
            }
            None => {
                problems.push(Problem::new(format!("missing required property {entry}")));
                elements.push(BoundValue::Absent);
            }
        }
    }
    BoundValue::List(elements)
}

fn bind_map(
    ctx: &BindContext<'_>,
    prefix: &str,
    map: &MapSchema,
    problems: &mut Vec<Problem>,
) -> BoundValue {
    let mut entries = Vec::new();
    for key in ctx.index.map_keys(prefix) {
        let child = join(prefix, &key);
        let value = bind_node(ctx, &child, &map.element, problems);
        entries.push((key, value));
    }
    BoundValue::Map(entries)
}

/// Resolve one leaf name to its effective raw string.
///
/// `None` means the leaf is genuinely absent; resolution errors are recorded
/// as problems and also yield `None` so binding continues past them. The
/// schema default steps in when the chain finds nothing, and is itself run
/// through expression expansion and secret decoding.
fn resolve_leaf(
    ctx: &BindContext<'_>,
    name: &str,
    default: Option<&str>,
    problems: &mut Vec<Problem>,
) -> Option<String> {
    match ctx.chain.resolve(ctx.registry, name) {
        Ok(Some(value)) => match value.value {
            Some(raw) if !raw.is_empty() => return Some(raw),
            _ => {}
        },
        Ok(None) => {}
        Err(err) => {
            problems.push(Problem::new(err.to_string()));
            return None;
        }
    }
    let default = default?;
    match expand_default(ctx, name, default) {
        Ok(value) => Some(value),
        Err(err) => {
            problems.push(Problem::new(err.to_string()));
            None
        }
    }
}

/// Expand a default literal as if it had been found in a source.
fn expand_default(ctx: &BindContext<'_>, name: &str, literal: &str) -> ConfigResult<String> {
    let expression = Expression::compile(literal);
    if !expression.has_references() {
        return Ok(literal.to_string());
    }
    let head = ctx.chain.head(ctx.registry);
    let expanded = expand_expression(&head, name, &expression, ctx.lenient)?;
    match expanded.secret_handler {
        Some(handler_name) => {
            let handler = ctx
                .secret_handlers
                .get(&handler_name)
                .ok_or(ConfigError::UnknownSecretHandler(handler_name))?;
            handler.decode(&expanded.value)
        }
        None => Ok(expanded.value),
    }
}

fn convert_primitive(
    ctx: &BindContext<'_>,
    ty: PrimitiveType,
    name: &str,
    raw: &str,
    problems: &mut Vec<Problem>,
) -> BoundValue {
    let converted = match ty {
        PrimitiveType::Str => return BoundValue::Str(raw.to_string()),
        PrimitiveType::Int => ctx.converters.convert::<i64>(raw).map(BoundValue::Int),
        PrimitiveType::Float => ctx.converters.convert::<f64>(raw).map(BoundValue::Float),
        PrimitiveType::Bool => ctx.converters.convert::<bool>(raw).map(BoundValue::Bool),
    };
    match converted {
        Ok(value) => value,
        Err(err) => {
            problems.push(Problem::new(format!("{name}: {err}")));
            BoundValue::Absent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::{
        ExpressionInterceptor, Interceptor, ProfileInterceptor, priority,
    };
    use crate::schema::{Group, boolean, integer, list, map_of, string};
    use crate::source::MapSource;

    struct Fixture {
        chain: Chain,
        registry: SourceRegistry,
        converters: ConverterRegistry,
        index: PropertyNameIndex,
        secret_handlers: HashMap<String, Arc<dyn SecretHandler>>,
    }

    impl Fixture {
        fn new(pairs: &[(&str, &str)]) -> Self {
            let source = MapSource::from_pairs("test", pairs.iter().copied());
            let registry = SourceRegistry::new(vec![Arc::new(source)]);
            let chain = Chain::new(vec![
                (
                    priority::EXPRESSION,
                    Arc::new(ExpressionInterceptor::new(true, false)) as Arc<dyn Interceptor>,
                ),
                (
                    priority::PROFILE,
                    Arc::new(ProfileInterceptor::new(Vec::new())) as Arc<dyn Interceptor>,
                ),
            ]);
            let index =
                PropertyNameIndex::new(registry.property_names().iter().cloned(), &[]);
            Self {
                chain,
                registry,
                converters: ConverterRegistry::new(),
                index,
                secret_handlers: HashMap::new(),
            }
        }

        fn ctx(&self) -> BindContext<'_> {
            BindContext {
                chain: &self.chain,
                registry: &self.registry,
                converters: &self.converters,
                index: &self.index,
                secret_handlers: &self.secret_handlers,
                lenient: false,
            }
        }
    }

    #[test]
    fn test_bind_simple_group() {
        let fixture = Fixture::new(&[("server.host", "localhost"), ("server.port", "8080")]);
        let schema = Group::new()
            .member("host", string())
            .member("port", integer())
            .build();

        let bound = bind_schema(&fixture.ctx(), "server", &schema).unwrap();
        assert_eq!(bound.get("host").and_then(BoundValue::as_str), Some("localhost"));
        assert_eq!(bound.get("port").and_then(BoundValue::as_int), Some(8080));
    }

    #[test]
    fn test_default_fills_missing_leaf() {
        let fixture = Fixture::new(&[("server.host", "localhost")]);
        let schema = Group::new()
            .member("host", string())
            .member("port", integer().with_default("9090"))
            .build();

        let bound = bind_schema(&fixture.ctx(), "server", &schema).unwrap();
        assert_eq!(bound.get("port").and_then(BoundValue::as_int), Some(9090));
    }

    #[test]
    fn test_default_literal_is_expanded() {
        let fixture = Fixture::new(&[("base.port", "7000")]);
        let schema = Group::new()
            .member("port", integer().with_default("${base.port}"))
            .build();

        let bound = bind_schema(&fixture.ctx(), "server", &schema).unwrap();
        assert_eq!(bound.get("port").and_then(BoundValue::as_int), Some(7000));
    }

    #[test]
    fn test_all_problems_reported_in_one_pass() {
        let fixture = Fixture::new(&[("server.port", "not-a-number")]);
        let schema = Group::new()
            .member("host", string())
            .member("port", integer())
            .build();

        let err = bind_schema(&fixture.ctx(), "server", &schema).unwrap_err();
        let ConfigError::Validation(validation) = err else {
            panic!("expected a validation error");
        };
        assert_eq!(validation.problem_count(), 2);
        let messages: Vec<_> = validation
            .problems()
            .iter()
            .map(Problem::message)
            .collect();
        assert!(messages.iter().any(|m| m.contains("server.host")));
        assert!(messages.iter().any(|m| m.contains("not-a-number")));
    }

    #[test]
    fn test_optional_group_absent_binds_clean() {
        let fixture = Fixture::new(&[("server.host", "localhost")]);
        let schema = Group::new()
            .member("host", string())
            .member(
                "tls",
                Group::new()
                    .member("cert", string())
                    .member("key", string())
                    .build()
                    .optional(),
            )
            .build();

        let bound = bind_schema(&fixture.ctx(), "server", &schema).unwrap();
        assert!(bound.get("tls").unwrap().is_absent());
    }

    #[test]
    fn test_optional_group_present_requires_members() {
        let fixture = Fixture::new(&[
            ("server.host", "localhost"),
            ("server.tls.cert", "/etc/cert.pem"),
        ]);
        let schema = Group::new()
            .member("host", string())
            .member(
                "tls",
                Group::new()
                    .member("cert", string())
                    .member("key", string())
                    .build()
                    .optional(),
            )
            .build();

        // tls has configured children, so its required key member is enforced.
        let err = bind_schema(&fixture.ctx(), "server", &schema).unwrap_err();
        let ConfigError::Validation(validation) = err else {
            panic!("expected a validation error");
        };
        assert_eq!(validation.problem_count(), 1);
        assert!(validation.problems()[0].message().contains("server.tls.key"));
    }

    #[test]
    fn test_map_keys_discovered_from_index() {
        let fixture = Fixture::new(&[
            ("the-map.foo.value", "1"),
            ("the-map.bar.value", "2"),
        ]);
        let schema = map_of(Group::new().member("value", integer()).build());

        let bound = bind_schema(&fixture.ctx(), "the-map", &schema).unwrap();
        let entries = bound.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            bound
                .get("foo")
                .and_then(|v| v.get("value"))
                .and_then(BoundValue::as_int),
            Some(1)
        );
        assert_eq!(
            bound
                .get("bar")
                .and_then(|v| v.get("value"))
                .and_then(BoundValue::as_int),
            Some(2)
        );
    }

    #[test]
    fn test_collection_splits_with_escapes() {
        let fixture = Fixture::new(&[("tags", "item1,item2,item3\\,stillItem3")]);
        let schema = list(PrimitiveType::Str);

        let bound = bind_schema(&fixture.ctx(), "tags", &schema).unwrap();
        let items = bound.as_list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].as_str(), Some("item3,stillItem3"));
    }

    #[test]
    fn test_indexed_entries_bind_as_collection() {
        let fixture = Fixture::new(&[
            ("app.tags[0]", "alpha"),
            ("app.tags[1]", "beta"),
        ]);
        let schema = Group::new()
            .member("tags", list(PrimitiveType::Str))
            .build();

        let bound = bind_schema(&fixture.ctx(), "app", &schema).unwrap();
        let tags = bound.get("tags").and_then(BoundValue::as_list).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].as_str(), Some("alpha"));
        assert_eq!(tags[1].as_str(), Some("beta"));
    }

    #[test]
    fn test_single_string_wins_over_indexed_entries() {
        let fixture = Fixture::new(&[
            ("app.tags", "x,y"),
            ("app.tags[0]", "shadowed"),
        ]);
        let schema = Group::new()
            .member("tags", list(PrimitiveType::Str))
            .build();

        let bound = bind_schema(&fixture.ctx(), "app", &schema).unwrap();
        let tags = bound.get("tags").and_then(BoundValue::as_list).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].as_str(), Some("x"));
    }

    #[test]
    fn test_inline_member_binds_at_parent_prefix() {
        let fixture = Fixture::new(&[("server.host", "localhost"), ("server.port", "1")]);
        let schema = Group::new()
            .inline(
                "net",
                Group::new()
                    .member("host", string())
                    .member("port", integer())
                    .build(),
            )
            .build();

        let bound = bind_schema(&fixture.ctx(), "server", &schema).unwrap();
        let net = bound.get("net").unwrap();
        assert_eq!(net.get("host").and_then(BoundValue::as_str), Some("localhost"));
    }

    #[test]
    fn test_optional_leaf_absent() {
        let fixture = Fixture::new(&[]);
        let schema = Group::new().member("debug", boolean().optional()).build();

        let bound = bind_schema(&fixture.ctx(), "app", &schema).unwrap();
        assert!(bound.get("debug").unwrap().is_absent());
    }
}
