//! Template syntax tree.
//!
//! Nodes are built once by the parser and never mutated afterwards; a
//! [`ParsedTemplate`] is shared behind an `Arc` between the cache, the
//! fragment registry and any number of concurrent renders.

use crate::expr::Expr;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A piece of a text run.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// SQL emitted verbatim.
    Literal(String),
    /// `#{expr}`: one bound parameter and one placeholder token.
    Placeholder(Expr),
    /// `${name}`: replaced by the value of an include property.
    Property(String),
}

/// One `<when>` arm of a `<choose>`.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    pub test: Expr,
    pub children: Vec<Node>,
}

/// Template constructs.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(Vec<Segment>),
    If {
        test: Expr,
        children: Vec<Node>,
    },
    /// First matching `when` wins; `otherwise` only when none match.
    Choose {
        whens: Vec<WhenClause>,
        otherwise: Option<Vec<Node>>,
    },
    Where(Vec<Node>),
    Set(Vec<Node>),
    Trim {
        prefix: String,
        suffix: String,
        prefix_overrides: Vec<String>,
        suffix_overrides: Vec<String>,
        children: Vec<Node>,
    },
    Foreach {
        collection: Expr,
        item: String,
        index: Option<String>,
        open: String,
        close: String,
        separator: String,
        /// Treat a null collection as empty instead of failing.
        nullable: bool,
        children: Vec<Node>,
    },
    /// `name` is visible to `children` only.
    Bind {
        name: String,
        value: Expr,
        children: Vec<Node>,
    },
    Include {
        refid: String,
        properties: Vec<(String, String)>,
    },
}

impl Node {
    /// Nested node lists, in declaration order.
    pub fn child_lists(&self) -> Vec<&[Node]> {
        match self {
            Node::Text(_) | Node::Include { .. } => Vec::new(),
            Node::If { children, .. }
            | Node::Where(children)
            | Node::Set(children)
            | Node::Trim { children, .. }
            | Node::Foreach { children, .. }
            | Node::Bind { children, .. } => vec![children.as_slice()],
            Node::Choose { whens, otherwise } => {
                let mut lists: Vec<&[Node]> = whens.iter().map(|w| w.children.as_slice()).collect();
                if let Some(otherwise) = otherwise {
                    lists.push(otherwise.as_slice());
                }
                lists
            }
        }
    }
}

/// A parsed template: immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTemplate {
    id: String,
    nodes: Vec<Node>,
    source_hash: u64,
}

impl ParsedTemplate {
    pub fn new(id: impl Into<String>, nodes: Vec<Node>, source_hash: u64) -> Self {
        Self {
            id: id.into(),
            nodes,
            source_hash,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn source_hash(&self) -> u64 {
        self.source_hash
    }

    /// Every `include` refid reachable in this template, deduplicated, in
    /// first-seen order.
    pub fn include_refs(&self) -> Vec<&str> {
        fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a str>) {
            for node in nodes {
                if let Node::Include { refid, .. } = node {
                    if !out.contains(&refid.as_str()) {
                        out.push(refid);
                    }
                }
                for list in node.child_lists() {
                    walk(list, out);
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }

    /// Total number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[Node]) -> usize {
            nodes
                .iter()
                .map(|n| 1 + n.child_lists().into_iter().map(count).sum::<usize>())
                .sum()
        }
        count(&self.nodes)
    }
}

/// Hash used to detect changed template sources.
pub fn source_hash(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}
