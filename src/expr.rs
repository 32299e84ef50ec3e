//! The `${...}` expression grammar.
//!
//! ```text
//! Text    := (Literal | Ref)*
//! Ref     := '${' Key (':' Default)? '}'
//! Default := Text | Ref
//! ```
//!
//! `$$` and `\$` escape to a literal `$`. A key containing `::` selects a
//! secret handler: `${handler::payload}` is a non-recursive leaf whose payload
//! is spliced verbatim and decoded by the secret stage. Syntax is lenient:
//! an unterminated `${` is kept as literal text rather than rejected.
//!
//! This module only compiles; evaluation lives with the expression
//! interceptor, which resolves references through the whole chain.

/// Guard against runaway nesting while expanding references.
pub const MAX_EXPANSION_DEPTH: usize = 32;

/// One piece of a compiled expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A verbatim run of text.
    Literal(String),
    /// A `${key}` or `${key:default}` reference.
    Reference {
        key: String,
        default: Option<Expression>,
    },
    /// A `${handler::payload}` secret leaf.
    Secret { handler: String, payload: String },
}

/// A compiled token sequence over a raw string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    segments: Vec<Segment>,
}

impl Expression {
    /// Compile a raw string. Never fails; malformed syntax degrades to
    /// literal text.
    pub fn compile(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let bytes = raw.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'$' if bytes.get(i + 1) == Some(&b'$') => {
                    literal.push('$');
                    i += 2;
                }
                b'\\' if bytes.get(i + 1) == Some(&b'$') => {
                    literal.push('$');
                    i += 2;
                }
                b'$' if bytes.get(i + 1) == Some(&b'{') => {
                    match matching_brace(raw, i + 2) {
                        Some(close) => {
                            if !literal.is_empty() {
                                segments.push(Segment::Literal(std::mem::take(&mut literal)));
                            }
                            segments.push(parse_body(&raw[i + 2..close]));
                            i = close + 1;
                        }
                        None => {
                            // Unterminated reference: keep it literally.
                            literal.push_str(&raw[i..]);
                            i = bytes.len();
                        }
                    }
                }
                _ => {
                    // Advance one full character, not one byte.
                    let ch = raw[i..].chars().next().expect("in-bounds char");
                    literal.push(ch);
                    i += ch.len_utf8();
                }
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether evaluation would do anything beyond copying literals.
    pub fn has_references(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| !matches!(segment, Segment::Literal(_)))
    }
}

/// Find the `}` closing the reference whose body starts at `start`,
/// accounting for nested `${...}` inside defaults.
fn matching_brace(raw: &str, start: usize) -> Option<usize> {
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 2;
            }
            b'}' if depth == 0 => return Some(i),
            b'}' => {
                depth -= 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Parse the text between `${` and `}`.
fn parse_body(body: &str) -> Segment {
    // Split on the first ':' at nesting depth zero. A double colon marks a
    // secret-handler leaf instead of a default separator.
    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 2;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                i += 1;
            }
            b':' if depth == 0 => {
                if bytes.get(i + 1) == Some(&b':') {
                    return Segment::Secret {
                        handler: body[..i].to_string(),
                        payload: body[i + 2..].to_string(),
                    };
                }
                return Segment::Reference {
                    key: body[..i].to_string(),
                    default: Some(Expression::compile(&body[i + 1..])),
                };
            }
            _ => i += 1,
        }
    }
    Segment::Reference {
        key: body.to_string(),
        default: None,
    }
}
