//! Rendering parsed templates against a [`Context`].
//!
//! Rendering is a depth-first walk that appends literal SQL and placeholder
//! markers to a buffer. Directive bodies that need post-processing (`where`,
//! `set`, `trim`, `foreach` items) are rendered into their own buffer first
//! and spliced into the parent afterwards, so bound values always stay in
//! emission order.

mod buffer;
mod trim;


use crate::config::{EngineConfig, PlaceholderStyle};
use crate::context::{Context, Scope, value_kind};
use crate::error::{DynSqlResult, RenderError};
use crate::expr::{eval_bool, eval_value};
use crate::node::{Node, ParsedTemplate, Segment};
use crate::registry::FragmentRegistry;
use buffer::SqlBuffer;
use serde_json::Value;
use trim::TrimRule;

/// SQL text with positional placeholders plus the values to bind, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    pub sql: String,
    pub params: Vec<Value>,
    /// Placeholder style `sql` was written with.
    pub style: PlaceholderStyle,
}

impl RenderResult {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

/// Render `template` with default settings and no fragments.
///
/// Templates containing `<include>` need a [`Renderer`] built over a
/// [`FragmentRegistry`] (or an [`Engine`](crate::Engine)).
pub fn render(template: &ParsedTemplate, ctx: &Context) -> DynSqlResult<RenderResult> {
    Renderer::default().render(template, ctx)
}

/// Renders templates with a fixed set of fragments and output options.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    fragments: Option<&'a FragmentRegistry>,
    style: PlaceholderStyle,
    collapse_whitespace: bool,
}

impl Default for Renderer<'_> {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            fragments: None,
            style: config.placeholder,
            collapse_whitespace: config.collapse_whitespace,
        }
    }
}

impl<'a> Renderer<'a> {
    pub fn new(fragments: &'a FragmentRegistry, config: &EngineConfig) -> Self {
        Self {
            fragments: Some(fragments),
            style: config.placeholder,
            collapse_whitespace: config.collapse_whitespace,
        }
    }

    pub fn render(&self, template: &ParsedTemplate, ctx: &Context) -> DynSqlResult<RenderResult> {
        let mut out = SqlBuffer::new();
        self.render_nodes(template.nodes(), &ctx.scope(), &mut out)?;

        let sql = out.to_sql(self.style, self.collapse_whitespace);
        let params = out.into_params();
        tracing::debug!(
            target: "dynsql.render",
            template = template.id(),
            params = params.len(),
            "rendered template"
        );
        tracing::trace!(target: "dynsql.render", template = template.id(), sql = %sql);

        Ok(RenderResult {
            sql,
            params,
            style: self.style,
        })
    }

    fn render_nodes(&self, nodes: &[Node], scope: &Scope<'_>, out: &mut SqlBuffer) -> Result<(), RenderError> {
        for node in nodes {
            self.render_node(node, scope, out)?;
        }
        Ok(())
    }

    fn render_node(&self, node: &Node, scope: &Scope<'_>, out: &mut SqlBuffer) -> Result<(), RenderError> {
        match node {
            Node::Text(segments) => {
                for segment in segments {
                    match segment {
                        Segment::Literal(text) => {
                            out.push(text);
                        }
                        Segment::Placeholder(expr) => {
                            let value = eval_value(expr, scope)?.into_owned();
                            out.push_bind(value);
                        }
                        Segment::Property(name) => {
                            let value = scope
                                .property(name)
                                .ok_or_else(|| RenderError::UnresolvedProperty(name.clone()))?;
                            out.push(value);
                        }
                    }
                }
                Ok(())
            }
            Node::If { test, children } => {
                if eval_bool(test, scope)? {
                    self.render_nodes(children, scope, out)?;
                }
                Ok(())
            }
            Node::Choose { whens, otherwise } => {
                for when in whens {
                    if eval_bool(&when.test, scope)? {
                        return self.render_nodes(&when.children, scope, out);
                    }
                }
                match otherwise {
                    Some(children) => self.render_nodes(children, scope, out),
                    None => Ok(()),
                }
            }
            Node::Where(children) => self.render_trimmed(&TrimRule::where_clause(), children, scope, out),
            Node::Set(children) => self.render_trimmed(&TrimRule::set_clause(), children, scope, out),
            Node::Trim {
                prefix,
                suffix,
                prefix_overrides,
                suffix_overrides,
                children,
            } => {
                let rule = TrimRule {
                    prefix,
                    suffix,
                    prefix_overrides,
                    suffix_overrides,
                };
                self.render_trimmed(&rule, children, scope, out)
            }
            Node::Foreach {
                collection,
                item,
                index,
                open,
                close,
                separator,
                nullable,
                children,
            } => {
                let value = eval_value(collection, scope)?;
                let items = match value.as_ref() {
                    Value::Array(items) => items,
                    Value::Null if *nullable => return Ok(()),
                    other => {
                        return Err(RenderError::NotACollection {
                            expr: collection.to_string(),
                            found: value_kind(other),
                        });
                    }
                };
                if items.is_empty() {
                    return Ok(());
                }

                let mut joined = SqlBuffer::new();
                let mut first = true;
                for (i, element) in items.iter().enumerate() {
                    let mut vars = vec![(item.clone(), element.clone())];
                    if let Some(index) = index {
                        vars.push((index.clone(), Value::from(i)));
                    }
                    // Each iteration gets a fresh frame; nothing leaks between items.
                    let frame = scope.child(vars);
                    let mut body = SqlBuffer::new();
                    self.render_nodes(children, &frame, &mut body)?;
                    body.trim();
                    if body.is_blank() {
                        continue;
                    }
                    if !first {
                        joined.push(separator);
                    }
                    first = false;
                    joined.append(body);
                }

                out.push(open);
                out.append(joined);
                out.push(close);
                Ok(())
            }
            Node::Bind {
                name,
                value,
                children,
            } => {
                let value = eval_value(value, scope)?.into_owned();
                let frame = scope.child(vec![(name.clone(), value)]);
                self.render_nodes(children, &frame, out)
            }
            Node::Include { refid, properties } => {
                let fragment = self
                    .fragments
                    .and_then(|f| f.get(refid))
                    .ok_or_else(|| RenderError::MissingFragment(refid.clone()))?;
                let mut resolved = Vec::with_capacity(properties.len());
                for (name, value) in properties {
                    resolved.push((name.clone(), substitute_properties(value, scope)?));
                }
                let frame = scope.include_child(&resolved);
                self.render_nodes(fragment.nodes(), &frame, out)
            }
        }
    }

    fn render_trimmed(
        &self,
        rule: &TrimRule<'_>,
        children: &[Node],
        scope: &Scope<'_>,
        out: &mut SqlBuffer,
    ) -> Result<(), RenderError> {
        let mut body = SqlBuffer::new();
        self.render_nodes(children, scope, &mut body)?;
        if rule.apply(&mut body) {
            out.append_clause(body);
        }
        Ok(())
    }
}

/// Expand `${name}` references in an include property value using the
/// properties of the including scope.
fn substitute_properties(text: &str, scope: &Scope<'_>) -> Result<String, RenderError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = rest[start + 2..start + 2 + len].trim();
        let value = scope
            .property(name)
            .ok_or_else(|| RenderError::UnresolvedProperty(name.to_string()))?;
        out.push_str(value);
        rest = &rest[start + 2 + len + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
