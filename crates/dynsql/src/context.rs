//! Runtime parameters.
//!
//! A [`Context`] is the caller-supplied parameter object. While rendering,
//! the engine layers [`Scope`] frames on top of it for `bind`, `foreach` and
//! `include` names; frames are linked by reference, so a name bound in one
//! frame is only visible to renders nested inside it.

use crate::error::DynSqlResult;
use serde::Serialize;
use serde_json::{Map, Value};

/// Name under which the whole parameter object is reachable.
pub const PARAMETER_ALIAS: &str = "_parameter";

/// Names an array parameter object is also reachable under.
const COLLECTION_ALIASES: [&str; 3] = ["list", "array", "collection"];

/// Parameter object a template is rendered against.
///
/// ```ignore
/// let ctx = Context::new()
///     .with("title", "%Post%")
///     .with("ids", vec![1, 3, 5]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    root: Value,
}

impl Context {
    /// An empty parameter object.
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Use `value` as the parameter object. Non-object values are reachable
    /// through `_parameter`.
    pub fn from_value(value: Value) -> Self {
        Self { root: value }
    }

    /// Serialize any `serde` value into a parameter object.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> DynSqlResult<Self> {
        Ok(Self {
            root: serde_json::to_value(value)?,
        })
    }

    /// Add (or replace) a top-level parameter.
    ///
    /// If the current root is not an object it is kept under `_parameter`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add (or replace) a top-level parameter in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        if !self.root.is_object() {
            let previous = std::mem::take(&mut self.root);
            let mut map = Map::new();
            if !previous.is_null() {
                map.insert(PARAMETER_ALIAS.to_string(), previous);
            }
            self.root = Value::Object(map);
        }
        if let Value::Object(map) = &mut self.root {
            map.insert(name.into(), value.into());
        }
        self
    }

    /// Resolve a dotted path such as `author.address.city` or `ids[0]`.
    /// Missing segments resolve to `None`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let (name, indexes) = split_indexes(first);
        let mut current = match self.root.get(name) {
            Some(v) => v,
            None if name == PARAMETER_ALIAS => &self.root,
            None => return None,
        };
        for idx in indexes {
            current = current.get(idx)?;
        }
        for segment in segments {
            let (name, indexes) = split_indexes(segment);
            current = current.get(name)?;
            for idx in indexes {
                current = current.get(idx)?;
            }
        }
        Some(current)
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Root scope for a render.
    pub fn scope(&self) -> Scope<'_> {
        Scope {
            root: &self.root,
            parent: None,
            vars: Vec::new(),
            properties: Vec::new(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Value> for Context {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

fn split_indexes(segment: &str) -> (&str, Vec<usize>) {
    let Some(open) = segment.find('[') else {
        return (segment, Vec::new());
    };
    let indexes = segment[open..]
        .split(['[', ']'])
        .filter_map(|s| s.trim().parse::<usize>().ok())
        .collect();
    (&segment[..open], indexes)
}

/// One frame of render-time bindings.
#[derive(Debug)]
pub struct Scope<'p> {
    root: &'p Value,
    parent: Option<&'p Scope<'p>>,
    vars: Vec<(String, Value)>,
    properties: Vec<(String, String)>,
}

impl<'p> Scope<'p> {
    /// A child frame binding `vars`; the parent is untouched.
    pub(crate) fn child(&'p self, vars: Vec<(String, Value)>) -> Scope<'p> {
        Scope {
            root: self.root,
            parent: Some(self),
            vars,
            properties: Vec::new(),
        }
    }

    /// A child frame for an included fragment: each property is visible
    /// both as a string variable and as a `${name}` substitution.
    pub(crate) fn include_child(&'p self, properties: &[(String, String)]) -> Scope<'p> {
        Scope {
            root: self.root,
            parent: Some(self),
            vars: properties
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
            properties: properties.to_vec(),
        }
    }

    /// Innermost binding of `name`, falling back to the parameter object.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut frame = Some(self);
        while let Some(f) = frame {
            if let Some((_, v)) = f.vars.iter().rev().find(|(n, _)| n == name) {
                return Some(v);
            }
            frame = f.parent;
        }
        match self.root.get(name) {
            None if name == PARAMETER_ALIAS => Some(self.root),
            None if self.root.is_array() && COLLECTION_ALIASES.contains(&name) => Some(self.root),
            found => found,
        }
    }

    /// Innermost include property named `name`.
    pub fn property(&self, name: &str) -> Option<&str> {
        let mut frame = Some(self);
        while let Some(f) = frame {
            if let Some((_, v)) = f.properties.iter().rev().find(|(n, _)| n == name) {
                return Some(v);
            }
            frame = f.parent;
        }
        None
    }
}

/// Human-readable kind of a value, for error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_navigates_nested_paths() {
        let ctx = Context::from_value(json!({
            "author": {"name": "ann", "tags": ["a", "b"]},
        }));
        assert_eq!(ctx.get("author.name"), Some(&json!("ann")));
        assert_eq!(ctx.get("author.tags[1]"), Some(&json!("b")));
        assert_eq!(ctx.get("author.missing.deeper"), None);
        assert_eq!(ctx.get("nope"), None);
    }

    #[test]
    fn with_wraps_scalar_root() {
        let ctx = Context::from_value(json!(7)).with("extra", true);
        assert_eq!(ctx.get("_parameter"), Some(&json!(7)));
        assert_eq!(ctx.get("extra"), Some(&json!(true)));
    }

    #[test]
    fn from_serialize_uses_field_names() {
        #[derive(Serialize)]
        struct Blog<'a> {
            id: i32,
            title: Option<&'a str>,
        }
        let ctx = Context::from_serialize(&Blog { id: 3, title: None }).unwrap();
        assert_eq!(ctx.get("id"), Some(&json!(3)));
        assert_eq!(ctx.get("title"), Some(&Value::Null));
    }

    #[test]
    fn child_scope_shadows_without_leaking() {
        let ctx = Context::new().with("name", "outer");
        let root = ctx.scope();
        {
            let inner = root.child(vec![("name".into(), json!("inner"))]);
            assert_eq!(inner.lookup("name"), Some(&json!("inner")));
        }
        assert_eq!(root.lookup("name"), Some(&json!("outer")));
        assert_eq!(root.lookup("_parameter"), Some(ctx.root()));
    }

    #[test]
    fn array_root_is_reachable_as_list() {
        let ctx = Context::from_value(json!([1, 2]));
        let scope = ctx.scope();
        assert_eq!(scope.lookup("list"), Some(&json!([1, 2])));
        assert_eq!(scope.lookup("collection"), Some(&json!([1, 2])));
        assert_eq!(scope.lookup("other"), None);
    }

    #[test]
    fn include_properties_resolve_innermost_first() {
        let ctx = Context::new();
        let root = ctx.scope();
        let outer = root.include_child(&[("alias".into(), "b".into())]);
        let inner = outer.include_child(&[("alias".into(), "b2".into())]);
        assert_eq!(inner.property("alias"), Some("b2"));
        assert_eq!(outer.property("alias"), Some("b"));
        assert_eq!(inner.lookup("alias"), Some(&json!("b2")));
        assert_eq!(root.property("alias"), None);
    }
}
