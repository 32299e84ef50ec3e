//! Expression expansion stage.

use super::{ChainContext, Interceptor};
use crate::error::{ConfigError, ConfigResult};
use crate::expr::{Expression, MAX_EXPANSION_DEPTH, Segment};
use crate::value::ConfigValue;
use std::cell::RefCell;

thread_local! {
    // Keys currently being expanded on this thread. Re-entering one is a
    // cycle; the stack doubles as the depth guard.
    static RESOLUTION_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Result of expanding one raw string.
pub(crate) struct Expanded {
    pub value: String,
    pub secret_handler: Option<String>,
}

/// Expands `${...}` references in resolved values.
///
/// Nested references restart the whole chain, not just the source registry,
/// so a value in one source can refer to a key that only exists after
/// interception in another. Strict mode fails on an unresolved reference
/// without a default; lenient mode keeps the `${key}` text in place.
pub struct ExpressionInterceptor {
    enabled: bool,
    lenient: bool,
}

impl ExpressionInterceptor {
    pub fn new(enabled: bool, lenient: bool) -> Self {
        Self { enabled, lenient }
    }
}

impl Interceptor for ExpressionInterceptor {
    fn intercept(&self, ctx: ChainContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>> {
        let Some(value) = ctx.proceed(name)? else {
            return Ok(None);
        };
        if !self.enabled {
            return Ok(Some(value));
        }
        let Some(raw) = value.value.clone() else {
            return Ok(Some(value));
        };

        let expression = Expression::compile(&raw);
        if !expression.has_references() {
            return Ok(Some(value));
        }

        let _guard = StackGuard::enter(name)?;
        let expanded = expand(&ctx, name, &expression, self.lenient)?;

        let mut value = value.with_value(expanded.value).with_step("expression");
        if let Some(handler) = expanded.secret_handler {
            value = value.with_secret_handler(handler);
        }
        Ok(Some(value))
    }
}

/// Expand a compiled expression against the chain.
///
/// Also used for schema default literals, which are passed through the
/// resolver as if they had been discovered in a source.
pub(crate) fn expand(
    ctx: &ChainContext<'_>,
    owner: &str,
    expression: &Expression,
    lenient: bool,
) -> ConfigResult<Expanded> {
    let mut out = String::new();
    let mut secret_handler = None;
    expand_into(ctx, owner, expression, lenient, &mut out, &mut secret_handler)?;
    Ok(Expanded {
        value: out,
        secret_handler,
    })
}

fn expand_into(
    ctx: &ChainContext<'_>,
    owner: &str,
    expression: &Expression,
    lenient: bool,
    out: &mut String,
    secret_handler: &mut Option<String>,
) -> ConfigResult<()> {
    for segment in expression.segments() {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Secret { handler, payload } => {
                *secret_handler = Some(handler.clone());
                out.push_str(payload);
            }
            Segment::Reference { key, default } => {
                match ctx.restart(key)? {
                    Some(resolved) => {
                        // Found-as-null splices the empty string.
                        out.push_str(resolved.value.as_deref().unwrap_or_default());
                    }
                    None => match default {
                        Some(default) => {
                            expand_into(ctx, owner, default, lenient, out, secret_handler)?;
                        }
                        None if lenient => {
                            out.push_str("${");
                            out.push_str(key);
                            out.push('}');
                        }
                        None => {
                            return Err(ConfigError::UnresolvedExpression {
                                key: key.clone(),
                                name: owner.to_string(),
                            });
                        }
                    },
                }
            }
        }
    }
    Ok(())
}

/// RAII entry on the thread-local resolution stack.
struct StackGuard;

impl StackGuard {
    fn enter(name: &str) -> ConfigResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|entry| entry == name) {
                let mut cycle = stack.join(" -> ");
                cycle.push_str(" -> ");
                cycle.push_str(name);
                return Err(ConfigError::ExpansionCycle {
                    name: name.to_string(),
                    cycle,
                });
            }
            if stack.len() >= MAX_EXPANSION_DEPTH {
                return Err(ConfigError::ExpansionDepth {
                    name: name.to_string(),
                    max_depth: MAX_EXPANSION_DEPTH,
                });
            }
            stack.push(name.to_string());
            Ok(Self)
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
