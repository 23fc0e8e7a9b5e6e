//! Engine configuration.

use serde::Deserialize;

/// How bound parameters are written into rendered SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `?` for every parameter (JDBC, MySQL, SQLite).
    #[default]
    Question,
    /// `$1, $2, ...` numbered in emission order (PostgreSQL).
    Dollar,
}

impl PlaceholderStyle {
    /// Token for the `n`th parameter (1-based).
    pub fn token(&self, n: usize) -> String {
        match self {
            Self::Question => "?".to_string(),
            Self::Dollar => format!("${n}"),
        }
    }
}

/// Options shared by every render of an [`Engine`](crate::Engine).
///
/// ```ignore
/// let config = EngineConfig::new()
///     .placeholder(PlaceholderStyle::Dollar)
///     .cache_capacity(512);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub placeholder: PlaceholderStyle,
    /// Fold whitespace runs outside quoted literals into single spaces.
    pub collapse_whitespace: bool,
    /// Maximum number of templates kept by the engine's cache; `None` is unbounded.
    pub cache_capacity: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            placeholder: PlaceholderStyle::Question,
            collapse_whitespace: true,
            cache_capacity: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placeholder(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder = style;
        self
    }

    pub fn collapse_whitespace(mut self, enabled: bool) -> Self {
        self.collapse_whitespace = enabled;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens() {
        assert_eq!(PlaceholderStyle::Question.token(3), "?");
        assert_eq!(PlaceholderStyle::Dollar.token(12), "$12");
    }

    #[test]
    fn defaults_and_builders() {
        let config = EngineConfig::new();
        assert_eq!(config.placeholder, PlaceholderStyle::Question);
        assert!(config.collapse_whitespace);
        assert_eq!(config.cache_capacity, None);

        let config = config
            .placeholder(PlaceholderStyle::Dollar)
            .collapse_whitespace(false)
            .cache_capacity(8);
        assert_eq!(config.placeholder, PlaceholderStyle::Dollar);
        assert!(!config.collapse_whitespace);
        assert_eq!(config.cache_capacity, Some(8));
    }

    #[test]
    fn deserializes_partial_tables() {
        let config: EngineConfig = serde_json::from_str(r#"{"placeholder": "dollar"}"#).unwrap();
        assert_eq!(config.placeholder, PlaceholderStyle::Dollar);
        assert!(config.collapse_whitespace);
    }
}
