//! Error types for dynsql

use std::fmt;
use thiserror::Error;

/// Result type alias for dynsql operations
pub type DynSqlResult<T> = Result<T, DynSqlError>;

/// A 1-based position inside template source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Compute the location of byte offset `offset` in `source`.
    pub fn of_offset(source: &str, offset: usize) -> Self {
        let mut offset = offset.min(source.len());
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Error types for parsing, registering and rendering templates
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DynSqlError {
    /// Malformed template markup
    #[error("Syntax error in template '{template}' at {location}: {message}")]
    TemplateSyntax {
        template: String,
        location: Location,
        message: String,
    },

    /// Malformed test or value expression
    #[error("Expression error in template '{template}' at {location}: {message} (in `{expr}`)")]
    Expression {
        template: String,
        location: Location,
        expr: String,
        message: String,
    },

    /// Fragment includes form a cycle
    #[error("Cyclic include: {}", .path.join(" -> "))]
    CyclicInclude { path: Vec<String> },

    /// Runtime rendering failure
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Unknown statement id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Statement id registered twice
    #[error("Duplicate statement: {0}")]
    DuplicateStatement(String),

    /// Context could not be built from a `Serialize` value
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures that can only be detected while rendering against a context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// `foreach` collection did not resolve to a sequence
    #[error("`{expr}` must resolve to a sequence, found {found}")]
    NotACollection { expr: String, found: &'static str },

    /// `include` target is not registered
    #[error("include target '{0}' is not registered")]
    MissingFragment(String),

    /// Operands or receiver of an operation have incompatible types
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// `${name}` used where no include property named `name` is in scope
    #[error("unresolved property `${{{0}}}`")]
    UnresolvedProperty(String),
}

impl DynSqlError {
    /// Create a syntax error at a byte offset of `source`
    pub fn syntax(
        template: impl Into<String>,
        source: &str,
        offset: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::TemplateSyntax {
            template: template.into(),
            location: Location::of_offset(source, offset),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a template syntax error
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::TemplateSyntax { .. })
    }

    /// Check if this is an expression error
    pub fn is_expression(&self) -> bool {
        matches!(self, Self::Expression { .. })
    }

    /// Check if this is a cyclic include error
    pub fn is_cyclic_include(&self) -> bool {
        matches!(self, Self::CyclicInclude { .. })
    }

    /// Check if this is a render error
    pub fn is_render(&self) -> bool {
        matches!(self, Self::Render(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a duplicate statement error
    pub fn is_duplicate_statement(&self) -> bool {
        matches!(self, Self::DuplicateStatement(_))
    }

    /// Source location for parse-time errors.
    pub fn location(&self) -> Option<Location> {
        match self {
            Self::TemplateSyntax { location, .. } | Self::Expression { location, .. } => {
                Some(*location)
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DynSqlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
