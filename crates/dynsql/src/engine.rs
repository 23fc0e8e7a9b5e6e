//! The main entry point: fragments, statements, cache and settings together.

use crate::cache::{CacheStats, TemplateCache};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::{DynSqlError, DynSqlResult};
use crate::node::ParsedTemplate;
use crate::parser::{Statement, StatementKind, parse_mapper, parse_template};
use crate::registry::FragmentRegistry;
use crate::render::{RenderResult, Renderer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A loaded set of mapper statements and fragments.
///
/// Loading takes `&mut self`; rendering takes `&self`, so a fully loaded
/// engine can be shared across threads behind an `Arc`.
///
/// ```ignore
/// let mut engine = Engine::new(EngineConfig::default());
/// engine.load_mapper(include_str!("blog_mapper.xml"))?;
///
/// let ctx = Context::new().with("title", "%Rust%");
/// let result = engine.render("blog.findActiveBlogLike", &ctx)?;
/// println!("{} {:?}", result.sql, result.params);
/// ```
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    fragments: FragmentRegistry,
    statements: BTreeMap<String, Statement>,
    cache: TemplateCache,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = match config.cache_capacity {
            Some(capacity) => TemplateCache::with_capacity(capacity),
            None => TemplateCache::new(),
        };
        Self {
            config,
            fragments: FragmentRegistry::new(),
            statements: BTreeMap::new(),
            cache,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fragments(&self) -> &FragmentRegistry {
        &self.fragments
    }

    /// Parse a mapper document and register its fragments and statements.
    /// Returns the mapper namespace.
    ///
    /// Nothing is registered if any part of the document is rejected.
    pub fn load_mapper(&mut self, source: &str) -> DynSqlResult<String> {
        let mapper = parse_mapper(source)?;

        if let Some(dup) = mapper
            .statements
            .iter()
            .find(|s| self.statements.contains_key(s.id()))
        {
            return Err(DynSqlError::DuplicateStatement(dup.id().to_string()));
        }

        // Register into a copy so a rejected fragment leaves the engine untouched.
        let mut fragments = self.fragments.clone();
        for fragment in &mapper.fragments {
            fragments.register(fragment.id(), fragment.clone())?;
        }
        self.fragments = fragments;

        tracing::info!(
            target: "dynsql.registry",
            namespace = %mapper.namespace,
            fragments = mapper.fragments.len(),
            statements = mapper.statements.len(),
            "loaded mapper"
        );
        for statement in mapper.statements {
            self.statements.insert(statement.id().to_string(), statement);
        }
        Ok(mapper.namespace)
    }

    /// Register a reusable fragment for `<include refid="id">`.
    pub fn register_fragment(&mut self, id: impl Into<String>, fragment: Arc<ParsedTemplate>) -> DynSqlResult<()> {
        self.fragments.register(id, fragment)
    }

    /// Parse and register a standalone statement. Its kind is taken from the
    /// leading SQL keyword.
    pub fn add_statement(&mut self, id: &str, source: &str) -> DynSqlResult<()> {
        if self.statements.contains_key(id) {
            return Err(DynSqlError::DuplicateStatement(id.to_string()));
        }
        let template = parse_template(id, source)?;
        let kind = infer_kind(source);
        self.statements
            .insert(id.to_string(), Statement::new(kind, template));
        Ok(())
    }

    pub fn statement(&self, id: &str) -> Option<&Statement> {
        self.statements.get(id)
    }

    /// Registered statement ids, sorted.
    pub fn statement_ids(&self) -> Vec<&str> {
        self.statements.keys().map(String::as_str).collect()
    }

    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.statements.values()
    }

    /// Statements whose includes (directly or through other fragments) name
    /// fragments that are not registered, with the missing ids.
    pub fn unresolved_includes(&self) -> Vec<(&str, Vec<String>)> {
        self.statements
            .values()
            .filter_map(|s| {
                let missing = self.fragments.missing_includes(s.template());
                (!missing.is_empty()).then_some((s.id(), missing))
            })
            .collect()
    }

    /// Render the registered statement `id`.
    pub fn render(&self, id: &str, ctx: &Context) -> DynSqlResult<RenderResult> {
        let statement = self
            .statements
            .get(id)
            .ok_or_else(|| DynSqlError::not_found(format!("statement '{id}'")))?;
        self.render_template(statement.template(), ctx)
    }

    /// Render ad-hoc template source, parsing it through the engine's cache.
    pub fn render_source(&self, id: &str, source: &str, ctx: &Context) -> DynSqlResult<RenderResult> {
        let template = self.cache.get_or_parse(id, source)?;
        self.render_template(&template, ctx)
    }

    pub fn render_template(&self, template: &ParsedTemplate, ctx: &Context) -> DynSqlResult<RenderResult> {
        Renderer::new(&self.fragments, &self.config).render(template, ctx)
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn infer_kind(source: &str) -> StatementKind {
    let keyword: String = source
        .trim_start()
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    match keyword.to_ascii_lowercase().as_str() {
        "insert" => StatementKind::Insert,
        "update" => StatementKind::Update,
        "delete" => StatementKind::Delete,
        _ => StatementKind::Select,
    }
}
