//! Declarative schemas and the values they bind to.
//!
//! A schema is a tree of nodes mirroring a property-name namespace: primitive
//! leaves, nested groups, delimiter-split collections, and maps whose keys are
//! discovered from the name index rather than declared. Binding a schema walks
//! the tree once, records every problem it finds, and either returns a fully
//! populated [`BoundValue`] or a validation error listing all of them.

mod binder;

pub(crate) use binder::{BindContext, bind_schema};

/// Primitive leaf types a schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Str,
    Int,
    Float,
    Bool,
}

/// A primitive leaf.
#[derive(Debug, Clone)]
pub struct PrimitiveSchema {
    pub ty: PrimitiveType,
    pub default: Option<String>,
    pub optional: bool,
}

/// One named member of a group.
#[derive(Debug, Clone)]
pub struct GroupMember {
    pub name: String,
    pub node: SchemaNode,
    /// An inline member binds at the parent's own prefix instead of
    /// `parent.name`, collapsing one nesting level in the property names.
    pub inline: bool,
}

/// A nested group of named members.
#[derive(Debug, Clone)]
pub struct GroupSchema {
    pub members: Vec<GroupMember>,
    pub optional: bool,
}

/// A list of primitives stored as one delimiter-split string.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub element: PrimitiveType,
    pub default: Option<String>,
    pub optional: bool,
}

/// A map whose keys come from the property-name index.
#[derive(Debug, Clone)]
pub struct MapSchema {
    pub element: Box<SchemaNode>,
}

/// One node of a schema tree.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Primitive(PrimitiveSchema),
    Group(GroupSchema),
    Collection(CollectionSchema),
    Map(MapSchema),
}

impl SchemaNode {
    /// Attach a default literal. Defaults participate in resolution like any
    /// source value, so they may contain `${...}` expressions.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        match &mut self {
            Self::Primitive(p) => p.default = Some(default.into()),
            Self::Collection(c) => c.default = Some(default.into()),
            Self::Group(_) | Self::Map(_) => {}
        }
        self
    }

    /// Mark this node optional: absence binds to [`BoundValue::Absent`]
    /// instead of recording a problem.
    pub fn optional(mut self) -> Self {
        match &mut self {
            Self::Primitive(p) => p.optional = true,
            Self::Group(g) => g.optional = true,
            Self::Collection(c) => c.optional = true,
            Self::Map(_) => {}
        }
        self
    }

    /// Collect `(name, default)` pairs for every defaulted leaf under this
    /// node, prefixed into the given namespace. Map elements have no concrete
    /// names until discovery, so they contribute nothing.
    pub(crate) fn collect_defaults(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        match self {
            Self::Primitive(p) => {
                if let Some(default) = &p.default {
                    out.push((prefix.to_string(), default.clone()));
                }
            }
            Self::Collection(c) => {
                if let Some(default) = &c.default {
                    out.push((prefix.to_string(), default.clone()));
                }
            }
            Self::Group(g) => {
                for member in &g.members {
                    let child = if member.inline {
                        prefix.to_string()
                    } else {
                        join(prefix, &member.name)
                    };
                    member.node.collect_defaults(&child, out);
                }
            }
            Self::Map(_) => {}
        }
    }
}

pub(crate) fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// A required string leaf.
pub fn string() -> SchemaNode {
    primitive(PrimitiveType::Str)
}

/// A required integer leaf.
pub fn integer() -> SchemaNode {
    primitive(PrimitiveType::Int)
}

/// A required float leaf.
pub fn float() -> SchemaNode {
    primitive(PrimitiveType::Float)
}

/// A required boolean leaf.
pub fn boolean() -> SchemaNode {
    primitive(PrimitiveType::Bool)
}

fn primitive(ty: PrimitiveType) -> SchemaNode {
    SchemaNode::Primitive(PrimitiveSchema {
        ty,
        default: None,
        optional: false,
    })
}

/// A required comma-delimited collection of primitives.
pub fn list(element: PrimitiveType) -> SchemaNode {
    SchemaNode::Collection(CollectionSchema {
        element,
        default: None,
        optional: false,
    })
}

/// A map of discovered keys to the given element schema.
pub fn map_of(element: SchemaNode) -> SchemaNode {
    SchemaNode::Map(MapSchema {
        element: Box::new(element),
    })
}

/// Builder for group nodes.
#[derive(Debug, Clone, Default)]
pub struct Group {
    members: Vec<GroupMember>,
    optional: bool,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member bound at `prefix.name`.
    pub fn member(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.members.push(GroupMember {
            name: name.into(),
            node,
            inline: false,
        });
        self
    }

    /// Add a member bound at the group's own prefix.
    pub fn inline(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.members.push(GroupMember {
            name: name.into(),
            node,
            inline: true,
        });
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn build(self) -> SchemaNode {
        SchemaNode::Group(GroupSchema {
            members: self.members,
            optional: self.optional,
        })
    }
}

/// A value bound from a schema.
///
/// Groups and maps keep their entries in declaration order and first-discovery
/// order respectively.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    /// An optional node whose properties were entirely absent.
    Absent,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<BoundValue>),
    Group(Vec<(String, BoundValue)>),
    Map(Vec<(String, BoundValue)>),
}

impl BoundValue {
    /// Member or map entry by name.
    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        match self {
            Self::Group(entries) | Self::Map(entries) => entries
                .iter()
                .find(|(entry, _)| entry == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[BoundValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Entries of a group or map, in order.
    pub fn entries(&self) -> Option<&[(String, BoundValue)]> {
        match self {
            Self::Group(entries) | Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}
