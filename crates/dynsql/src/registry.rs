//! Reusable `<sql>` fragments.

use crate::error::{DynSqlError, DynSqlResult};
use crate::node::ParsedTemplate;
use std::collections::HashMap;
use std::sync::Arc;

/// Fragments available to `<include refid="...">`, keyed by id.
///
/// Registration keeps the include graph acyclic: a fragment whose includes
/// lead back to itself is rejected with [`DynSqlError::CyclicInclude`].
/// Includes of ids that are not registered yet are allowed and only fail if
/// still missing at render time.
#[derive(Debug, Clone, Default)]
pub struct FragmentRegistry {
    fragments: HashMap<String, Arc<ParsedTemplate>>,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `fragment` under `id`, replacing any previous fragment with
    /// that id. On error the registry is left unchanged.
    pub fn register(&mut self, id: impl Into<String>, fragment: Arc<ParsedTemplate>) -> DynSqlResult<()> {
        let id = id.into();
        if let Some(path) = self.find_cycle(&id, &fragment) {
            tracing::warn!(
                target: "dynsql.registry",
                fragment = %id,
                cycle = %path.join(" -> "),
                "rejected cyclic include"
            );
            return Err(DynSqlError::CyclicInclude { path });
        }
        tracing::debug!(
            target: "dynsql.registry",
            fragment = %id,
            includes = fragment.include_refs().len(),
            "registered fragment"
        );
        self.fragments.insert(id, fragment);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ParsedTemplate>> {
        self.fragments.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fragments.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<ParsedTemplate>> {
        self.fragments.remove(id)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.fragments.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Include targets referenced by `template` (or by anything it reaches)
    /// that are not registered.
    pub fn missing_includes(&self, template: &ParsedTemplate) -> Vec<String> {
        let mut missing = Vec::new();
        let mut visited: Vec<&str> = Vec::new();
        let mut stack: Vec<&str> = template.include_refs();
        while let Some(id) = stack.pop() {
            if visited.contains(&id) {
                continue;
            }
            visited.push(id);
            match self.fragments.get(id) {
                Some(fragment) => stack.extend(fragment.include_refs()),
                None => missing.push(id.to_string()),
            }
        }
        missing.sort();
        missing
    }

    /// Depth-first search from the candidate fragment. Returns the cycle
    /// path, starting and ending at the id that closes it.
    fn find_cycle(&self, id: &str, fragment: &ParsedTemplate) -> Option<Vec<String>> {
        let mut path: Vec<&str> = vec![id];
        let mut done: Vec<&str> = Vec::new();
        self.visit(id, fragment, fragment, &mut path, &mut done)
    }

    fn visit<'a>(
        &'a self,
        candidate_id: &'a str,
        candidate: &'a ParsedTemplate,
        node: &'a ParsedTemplate,
        path: &mut Vec<&'a str>,
        done: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        for next in node.include_refs() {
            if let Some(pos) = path.iter().position(|p| *p == next) {
                let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
                cycle.push(next.to_string());
                return Some(cycle);
            }
            if done.contains(&next) {
                continue;
            }
            // The candidate replaces any registered fragment with the same id.
            let target = if next == candidate_id {
                Some(candidate)
            } else {
                self.fragments.get(next).map(Arc::as_ref)
            };
            let Some(target) = target else {
                continue;
            };
            path.push(next);
            if let Some(cycle) = self.visit(candidate_id, candidate, target, path, done) {
                return Some(cycle);
            }
            path.pop();
            done.push(next);
        }
        None
    }
}
