//! Template parser.
//!
//! Templates use MyBatis dynamic-SQL markup:
//!
//! ```text
//! SELECT * FROM blog
//! <where>
//!   <if test="state != null">state = #{state}</if>
//!   <if test="title != null">AND title LIKE #{title}</if>
//! </where>
//! ```
//!
//! The parser is a recursive descent over a [`Cursor`]: runs of text become
//! [`Node::Text`] (with `#{...}` / `${...}` split out inline) and every
//! directive parses its attributes and then its children up to the matching
//! closing tag. All expressions are parsed here, so a template that parses
//! can only fail at render time on data, never on syntax.

mod mapper;
mod scanner;

#[cfg(test)]
mod tests;

pub use mapper::{Mapper, Statement, StatementKind, parse_mapper};

use crate::error::{DynSqlError, DynSqlResult, Location};
use crate::expr::{self, Expr};
use crate::node::{Node, ParsedTemplate, Segment, WhenClause, source_hash};
use scanner::{Attr, Cursor, OffsetMap, Tag, decode_entities};
use std::sync::Arc;

/// Parse template source into an immutable syntax tree.
pub fn parse_template(id: &str, source: &str) -> DynSqlResult<Arc<ParsedTemplate>> {
    let mut cursor = Cursor::new(id, source);
    let nodes = TemplateParser::new(&mut cursor, None).parse_block(None)?;
    let template = ParsedTemplate::new(id, nodes, source_hash(source));
    tracing::debug!(
        target: "dynsql.parse",
        template = id,
        nodes = template.node_count(),
        "parsed template"
    );
    Ok(Arc::new(template))
}

/// The closing tag a block ends at.
#[derive(Clone, Copy)]
struct Closing<'a> {
    name: &'a str,
    /// Offset of the opening tag, for "unclosed" errors.
    offset: usize,
}

pub(crate) struct TemplateParser<'c, 's> {
    cur: &'c mut Cursor<'s>,
    /// Mapper namespace used to qualify bare include refids.
    namespace: Option<&'c str>,
}

impl<'c, 's> TemplateParser<'c, 's> {
    pub(crate) fn new(cur: &'c mut Cursor<'s>, namespace: Option<&'c str>) -> Self {
        Self { cur, namespace }
    }

    /// Parse the body of an element whose opening tag was already consumed.
    pub(crate) fn parse_element_body(&mut self, tag: &Tag) -> DynSqlResult<Vec<Node>> {
        if tag.self_closing {
            return Ok(Vec::new());
        }
        self.parse_block(Some(Closing {
            name: &tag.name,
            offset: tag.offset,
        }))
    }

    fn parse_block(&mut self, closing: Option<Closing<'_>>) -> DynSqlResult<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut text = TextBuilder::default();

        loop {
            if self.cur.eof() {
                if let Some(c) = closing {
                    return Err(self.cur.error_at(c.offset, format!("unclosed <{}>", c.name)));
                }
                break;
            }

            if self.cur.starts_with("<!--") {
                self.cur.skip_comment()?;
            } else if self.cur.starts_with("<![CDATA[") {
                let (raw, offset) = self.cur.take_cdata()?;
                self.push_segments(&mut text, raw, &OffsetMap::verbatim(offset))?;
            } else if self.cur.starts_with("<!") {
                return Err(self.cur.error("unsupported markup declaration"));
            } else if self.cur.starts_with("</") {
                let (name, offset) = self.cur.read_close_tag()?;
                match closing {
                    Some(c) if c.name == name => break,
                    Some(c) => {
                        return Err(self
                            .cur
                            .error_at(offset, format!("expected </{}>, found </{name}>", c.name)));
                    }
                    None => return Err(self.cur.error_at(offset, format!("unexpected </{name}>"))),
                }
            } else if self.cur.at_markup() {
                let tag = self.cur.read_tag()?;
                text.flush_into(&mut nodes);
                if tag.name == "bind" && tag.self_closing {
                    // A self-closing bind scopes over the rest of the block.
                    let (name, value) = self.bind_attrs(&tag)?;
                    let children = self.parse_block(closing)?;
                    nodes.push(Node::Bind {
                        name,
                        value,
                        children,
                    });
                    return Ok(nodes);
                }
                nodes.push(self.parse_directive(tag)?);
            } else {
                let (raw, offset) = self.cur.take_text();
                let (decoded, offsets) = decode_entities(raw, offset)
                    .map_err(|rel| self.cur.error_at(offset + rel, "unknown character entity"))?;
                self.push_segments(&mut text, &decoded, &offsets)?;
            }
        }

        text.flush_into(&mut nodes);
        Ok(nodes)
    }

    fn parse_directive(&mut self, tag: Tag) -> DynSqlResult<Node> {
        match tag.name.as_str() {
            "if" => {
                self.check_attrs(&tag, &["test"])?;
                let test = self.required_expr(&tag, "test")?;
                let children = self.parse_element_body(&tag)?;
                Ok(Node::If { test, children })
            }
            "choose" => {
                self.check_attrs(&tag, &[])?;
                self.parse_choose(&tag)
            }
            "where" => {
                self.check_attrs(&tag, &[])?;
                Ok(Node::Where(self.parse_element_body(&tag)?))
            }
            "set" => {
                self.check_attrs(&tag, &[])?;
                Ok(Node::Set(self.parse_element_body(&tag)?))
            }
            "trim" => {
                self.check_attrs(&tag, &["prefix", "suffix", "prefixOverrides", "suffixOverrides"])?;
                let text_attr = |name: &str| tag.attr(name).map(|a| a.value.clone()).unwrap_or_default();
                let overrides = |name: &str| {
                    tag.attr(name)
                        .map(|a| {
                            a.value
                                .split('|')
                                .filter(|t| !t.is_empty())
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default()
                };
                let prefix = text_attr("prefix");
                let suffix = text_attr("suffix");
                let prefix_overrides = overrides("prefixOverrides");
                let suffix_overrides = overrides("suffixOverrides");
                let children = self.parse_element_body(&tag)?;
                Ok(Node::Trim {
                    prefix,
                    suffix,
                    prefix_overrides,
                    suffix_overrides,
                    children,
                })
            }
            "foreach" => {
                self.check_attrs(
                    &tag,
                    &["collection", "item", "index", "open", "close", "separator", "nullable"],
                )?;
                let collection = self.required_expr(&tag, "collection")?;
                let item = match tag.attr("item") {
                    Some(a) => self.identifier(a, "item")?,
                    None => "item".to_string(),
                };
                let index = tag.attr("index").map(|a| self.identifier(a, "index")).transpose()?;
                let text_attr = |name: &str| tag.attr(name).map(|a| a.value.clone()).unwrap_or_default();
                let nullable = match tag.attr("nullable").map(|a| (a.value.as_str(), a.offset)) {
                    None | Some(("false", _)) => false,
                    Some(("true", _)) => true,
                    Some((_, offset)) => {
                        return Err(self.cur.error_at(offset, "nullable must be \"true\" or \"false\""));
                    }
                };
                let (open, close, separator) = (text_attr("open"), text_attr("close"), text_attr("separator"));
                let children = self.parse_element_body(&tag)?;
                Ok(Node::Foreach {
                    collection,
                    item,
                    index,
                    open,
                    close,
                    separator,
                    nullable,
                    children,
                })
            }
            "bind" => {
                let (name, value) = self.bind_attrs(&tag)?;
                let children = self.parse_element_body(&tag)?;
                Ok(Node::Bind {
                    name,
                    value,
                    children,
                })
            }
            "include" => {
                self.check_attrs(&tag, &["refid"])?;
                self.parse_include(&tag)
            }
            "when" | "otherwise" => Err(self
                .cur
                .error_at(tag.offset, format!("<{}> is only allowed inside <choose>", tag.name))),
            "property" => Err(self
                .cur
                .error_at(tag.offset, "<property> is only allowed inside <include>")),
            other => Err(self
                .cur
                .error_at(tag.offset, format!("unknown directive <{other}>"))),
        }
    }

    fn parse_choose(&mut self, tag: &Tag) -> DynSqlResult<Node> {
        let mut whens = Vec::new();
        let mut otherwise: Option<Vec<Node>> = None;
        if tag.self_closing {
            return Ok(Node::Choose { whens, otherwise });
        }

        loop {
            self.cur.skip_ws();
            if self.cur.eof() {
                return Err(self.cur.error_at(tag.offset, "unclosed <choose>"));
            }
            if self.cur.starts_with("<!--") {
                self.cur.skip_comment()?;
                continue;
            }
            if self.cur.starts_with("</") {
                let (name, offset) = self.cur.read_close_tag()?;
                if name != "choose" {
                    return Err(self.cur.error_at(offset, format!("expected </choose>, found </{name}>")));
                }
                break;
            }
            if !self.cur.at_markup() || self.cur.starts_with("<!") {
                return Err(self.cur.error("only <when> and <otherwise> may appear inside <choose>"));
            }

            let child = self.cur.read_tag()?;
            match child.name.as_str() {
                "when" => {
                    if otherwise.is_some() {
                        return Err(self.cur.error_at(child.offset, "<when> must come before <otherwise>"));
                    }
                    self.check_attrs(&child, &["test"])?;
                    let test = self.required_expr(&child, "test")?;
                    let children = self.parse_element_body(&child)?;
                    whens.push(WhenClause { test, children });
                }
                "otherwise" => {
                    if otherwise.is_some() {
                        return Err(self.cur.error_at(child.offset, "duplicate <otherwise>"));
                    }
                    self.check_attrs(&child, &[])?;
                    otherwise = Some(self.parse_element_body(&child)?);
                }
                other => {
                    return Err(self.cur.error_at(
                        child.offset,
                        format!("<{other}> is not allowed inside <choose>"),
                    ));
                }
            }
        }

        Ok(Node::Choose { whens, otherwise })
    }

    fn parse_include(&mut self, tag: &Tag) -> DynSqlResult<Node> {
        let refid = self.required_attr(tag, "refid")?;
        if refid.value.contains("${") {
            return Err(self
                .cur
                .error_at(refid.offset, "include refid must be a static fragment id"));
        }
        let refid = match self.namespace {
            Some(ns) if !refid.value.contains('.') => format!("{ns}.{}", refid.value),
            _ => refid.value.clone(),
        };

        let mut properties: Vec<(String, String)> = Vec::new();
        if !tag.self_closing {
            loop {
                self.cur.skip_ws();
                if self.cur.eof() {
                    return Err(self.cur.error_at(tag.offset, "unclosed <include>"));
                }
                if self.cur.starts_with("<!--") {
                    self.cur.skip_comment()?;
                    continue;
                }
                if self.cur.starts_with("</") {
                    let (name, offset) = self.cur.read_close_tag()?;
                    if name != "include" {
                        return Err(self.cur.error_at(offset, format!("expected </include>, found </{name}>")));
                    }
                    break;
                }
                if !self.cur.at_markup() || self.cur.starts_with("<!") {
                    return Err(self.cur.error("only <property> may appear inside <include>"));
                }
                let prop = self.cur.read_tag()?;
                if prop.name != "property" {
                    return Err(self.cur.error_at(
                        prop.offset,
                        format!("<{}> is not allowed inside <include>", prop.name),
                    ));
                }
                self.check_attrs(&prop, &["name", "value"])?;
                let name = self.identifier(self.required_attr(&prop, "name")?, "name")?;
                let value = self.required_attr(&prop, "value")?.value.clone();
                if !prop.self_closing {
                    self.cur.skip_ws();
                    if !self.cur.starts_with("</") {
                        return Err(self.cur.error("<property> must be empty"));
                    }
                    let (close, offset) = self.cur.read_close_tag()?;
                    if close != "property" {
                        return Err(self.cur.error_at(offset, format!("expected </property>, found </{close}>")));
                    }
                }
                properties.push((name, value));
            }
        }

        Ok(Node::Include { refid, properties })
    }

    fn bind_attrs(&mut self, tag: &Tag) -> DynSqlResult<(String, Expr)> {
        self.check_attrs(tag, &["name", "value"])?;
        let name = self.identifier(self.required_attr(tag, "name")?, "name")?;
        let value = self.required_expr(tag, "value")?;
        Ok((name, value))
    }

    fn check_attrs(&self, tag: &Tag, allowed: &[&str]) -> DynSqlResult<()> {
        for attr in &tag.attrs {
            if !allowed.contains(&attr.name.as_str()) {
                return Err(self.cur.error_at(
                    attr.offset,
                    format!("unknown attribute '{}' on <{}>", attr.name, tag.name),
                ));
            }
        }
        Ok(())
    }

    fn required_attr<'t>(&self, tag: &'t Tag, name: &str) -> DynSqlResult<&'t Attr> {
        tag.attr(name).ok_or_else(|| {
            self.cur
                .error_at(tag.offset, format!("<{}> requires a '{name}' attribute", tag.name))
        })
    }

    fn required_expr(&self, tag: &Tag, name: &str) -> DynSqlResult<Expr> {
        let attr = self.required_attr(tag, name)?;
        if attr.value.trim().is_empty() {
            return Err(self
                .cur
                .error_at(attr.offset, format!("'{name}' of <{}> must not be empty", tag.name)));
        }
        self.expression(&attr.value, &attr.offsets, 0)
    }

    fn identifier(&self, attr: &Attr, what: &str) -> DynSqlResult<String> {
        let value = attr.value.trim();
        let mut chars = value.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
            && chars.all(|c| c == '_' || c.is_ascii_alphanumeric());
        if !valid {
            return Err(self
                .cur
                .error_at(attr.offset, format!("'{what}' must be a simple name, got '{}'", attr.value)));
        }
        Ok(value.to_string())
    }

    /// Parse `source`, which begins at byte `start` of the decoded text `offsets` maps.
    fn expression(&self, source: &str, offsets: &OffsetMap, start: usize) -> DynSqlResult<Expr> {
        expr::parse_raw(source).map_err(|e| DynSqlError::Expression {
            template: self.cur.template().to_string(),
            location: Location::of_offset(self.cur.src(), offsets.source_offset(start + e.offset)),
            expr: source.to_string(),
            message: e.message,
        })
    }

    /// Split decoded text into literal, `#{}` and `${}` segments.
    fn push_segments(&self, text: &mut TextBuilder, decoded: &str, offsets: &OffsetMap) -> DynSqlResult<()> {
        let mut rest = decoded;
        let mut consumed = 0;

        while let Some(start) = find_marker(rest) {
            text.literal(&rest[..start]);
            let is_placeholder = rest[start..].starts_with('#');
            let body_start = start + 2;
            let marker_offset = offsets.source_offset(consumed + start);
            let Some(len) = find_closing_brace(&rest[body_start..]) else {
                return Err(self.cur.error_at(marker_offset, "unclosed parameter marker"));
            };
            let body = &rest[body_start..body_start + len];

            if is_placeholder {
                // `#{id, jdbcType=INTEGER}`: driver options are accepted and ignored.
                let expr_src = split_options(body);
                if expr_src.trim().is_empty() {
                    return Err(DynSqlError::Expression {
                        template: self.cur.template().to_string(),
                        location: Location::of_offset(self.cur.src(), marker_offset),
                        expr: body.to_string(),
                        message: "empty expression".to_string(),
                    });
                }
                let parsed = self.expression(expr_src, offsets, consumed + body_start)?;
                text.push(Segment::Placeholder(parsed));
            } else {
                let name = body.trim();
                let valid = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c == '_' || c == '.' || c.is_ascii_alphanumeric());
                if !valid {
                    return Err(self
                        .cur
                        .error_at(marker_offset, format!("invalid property reference '${{{body}}}'")));
                }
                text.push(Segment::Property(name.to_string()));
            }

            let step = body_start + len + 1;
            consumed += step;
            rest = &rest[step..];
        }
        text.literal(rest);
        Ok(())
    }
}

fn find_marker(s: &str) -> Option<usize> {
    let hash = s.find("#{");
    let dollar = s.find("${");
    match (hash, dollar) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Length of a marker body up to its `}`, skipping quoted strings.
fn find_closing_brace(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '}' => return Some(i),
                _ => {}
            },
        }
    }
    None
}

/// The expression part of a `#{expr, option=value}` body.
fn split_options(body: &str) -> &str {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (i, c) in body.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' => depth += 1,
                ')' | ']' => depth -= 1,
                ',' if depth == 0 => return &body[..i],
                _ => {}
            },
        }
    }
    body
}

#[derive(Default)]
struct TextBuilder {
    segments: Vec<Segment>,
}

impl TextBuilder {
    fn literal(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        match self.segments.last_mut() {
            Some(Segment::Literal(last)) => last.push_str(s),
            _ => self.segments.push(Segment::Literal(s.to_string())),
        }
    }

    fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    fn flush_into(&mut self, nodes: &mut Vec<Node>) {
        if !self.segments.is_empty() {
            nodes.push(Node::Text(std::mem::take(&mut self.segments)));
        }
    }
}
