//! MyBatis mapper documents.

use super::TemplateParser;
use super::scanner::Cursor;
use crate::error::DynSqlResult;
use crate::node::{ParsedTemplate, source_hash};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Kind of a mapped statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    fn from_tag(name: &str) -> Option<Self> {
        match name {
            "select" => Some(Self::Select),
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `<select>`, `<insert>`, `<update>` or `<delete>` element.
#[derive(Debug, Clone)]
pub struct Statement {
    kind: StatementKind,
    template: Arc<ParsedTemplate>,
    /// Attributes other than `id`, such as `parameterType` or `resultType`.
    attributes: BTreeMap<String, String>,
}

impl Statement {
    pub fn new(kind: StatementKind, template: Arc<ParsedTemplate>) -> Self {
        Self {
            kind,
            template,
            attributes: BTreeMap::new(),
        }
    }

    /// Fully qualified id (`namespace.id`).
    pub fn id(&self) -> &str {
        self.template.id()
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn template(&self) -> &Arc<ParsedTemplate> {
        &self.template
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

/// The contents of one `<mapper>` document.
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    pub namespace: String,
    /// `<sql>` fragments in document order.
    pub fragments: Vec<Arc<ParsedTemplate>>,
    /// Statements in document order.
    pub statements: Vec<Statement>,
}

/// Parse a `<mapper namespace="...">` document.
///
/// Ids are qualified with the namespace, and so are `include` refids that
/// do not already contain a dot. Elements other than `sql` and the four
/// statement kinds (`resultMap`, `cache`, ...) are skipped.
pub fn parse_mapper(source: &str) -> DynSqlResult<Mapper> {
    let mut cur = Cursor::new("<mapper>", source);

    loop {
        cur.skip_ws();
        if cur.starts_with("<?") || cur.starts_with("<!DOCTYPE") {
            cur.skip_declaration()?;
        } else if cur.starts_with("<!--") {
            cur.skip_comment()?;
        } else {
            break;
        }
    }

    if !cur.at_markup() || cur.starts_with("</") || cur.starts_with("<!") {
        return Err(cur.error("expected a <mapper> element"));
    }
    let root = cur.read_tag()?;
    if root.name != "mapper" {
        return Err(cur.error_at(root.offset, format!("expected <mapper>, found <{}>", root.name)));
    }
    let namespace = root
        .attr("namespace")
        .map(|a| a.value.trim())
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| cur.error_at(root.offset, "<mapper> requires a 'namespace' attribute"))?
        .to_string();
    cur.set_template(namespace.clone());

    let mut mapper = Mapper {
        namespace,
        ..Mapper::default()
    };
    if root.self_closing {
        return finish(cur, mapper);
    }

    let mut seen: Vec<String> = Vec::new();
    loop {
        cur.skip_ws();
        if cur.eof() {
            return Err(cur.error_at(root.offset, "unclosed <mapper>"));
        }
        if cur.starts_with("<!--") {
            cur.skip_comment()?;
            continue;
        }
        if cur.starts_with("</") {
            let (name, offset) = cur.read_close_tag()?;
            if name != "mapper" {
                return Err(cur.error_at(offset, format!("expected </mapper>, found </{name}>")));
            }
            break;
        }
        if !cur.at_markup() || cur.starts_with("<!") {
            return Err(cur.error("text is not allowed directly inside <mapper>"));
        }

        let tag = cur.read_tag()?;
        let kind = StatementKind::from_tag(&tag.name);
        if kind.is_none() && tag.name != "sql" {
            cur.skip_element(&tag)?;
            continue;
        }

        let local = tag
            .attr("id")
            .map(|a| a.value.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| cur.error_at(tag.offset, format!("<{}> requires an 'id' attribute", tag.name)))?;
        if seen.contains(&local) {
            return Err(cur.error_at(tag.offset, format!("duplicate id '{local}'")));
        }
        seen.push(local.clone());

        let id = format!("{}.{local}", mapper.namespace);
        let start = cur.pos();
        // Errors inside the element are reported against its own id.
        cur.set_template(id.clone());
        let nodes = TemplateParser::new(&mut cur, Some(&mapper.namespace)).parse_element_body(&tag)?;
        cur.set_template(mapper.namespace.clone());
        let end = cur.pos();
        let template = Arc::new(ParsedTemplate::new(
            id,
            nodes,
            source_hash(&source[start..end]),
        ));

        match kind {
            Some(kind) => {
                let attributes = tag
                    .attrs
                    .iter()
                    .filter(|a| a.name != "id")
                    .map(|a| (a.name.clone(), a.value.clone()))
                    .collect();
                mapper.statements.push(Statement {
                    kind,
                    template,
                    attributes,
                });
            }
            None => mapper.fragments.push(template),
        }
    }

    finish(cur, mapper)
}

fn finish(mut cur: Cursor<'_>, mapper: Mapper) -> DynSqlResult<Mapper> {
    loop {
        cur.skip_ws();
        if cur.starts_with("<!--") {
            cur.skip_comment()?;
        } else {
            break;
        }
    }
    if !cur.eof() {
        return Err(cur.error("unexpected content after </mapper>"));
    }
    tracing::debug!(
        target: "dynsql.parse",
        namespace = %mapper.namespace,
        fragments = mapper.fragments.len(),
        statements = mapper.statements.len(),
        "parsed mapper"
    );
    Ok(mapper)
}
