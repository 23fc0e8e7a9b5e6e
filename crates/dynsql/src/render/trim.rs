use super::buffer::SqlBuffer;
use std::sync::LazyLock;

/// Prefix/suffix rewriting applied to a rendered block.
#[derive(Debug)]
pub(crate) struct TrimRule<'a> {
    pub prefix: &'a str,
    pub suffix: &'a str,
    pub prefix_overrides: &'a [String],
    pub suffix_overrides: &'a [String],
}

static WHERE_OVERRIDES: LazyLock<Vec<String>> = LazyLock::new(|| {
    ["AND", "OR"]
        .iter()
        .flat_map(|kw| [' ', '\n', '\r', '\t'].map(|ws| format!("{kw}{ws}")))
        .collect()
});

const NO_OVERRIDES: &[String] = &[];

static COMMA: LazyLock<Vec<String>> = LazyLock::new(|| vec![",".to_string()]);

impl TrimRule<'static> {
    /// `<where>`: drop one leading `AND` / `OR`, prefix `WHERE`.
    pub fn where_clause() -> Self {
        Self {
            prefix: "WHERE",
            suffix: "",
            prefix_overrides: &WHERE_OVERRIDES,
            suffix_overrides: NO_OVERRIDES,
        }
    }

    /// `<set>`: drop a leading or trailing comma, prefix `SET`.
    pub fn set_clause() -> Self {
        Self {
            prefix: "SET",
            suffix: "",
            prefix_overrides: &COMMA,
            suffix_overrides: &COMMA,
        }
    }
}

impl TrimRule<'_> {
    /// Rewrite `body` in place. Returns `false` when nothing is left to emit.
    pub fn apply(&self, body: &mut SqlBuffer) -> bool {
        body.trim();
        if body.is_blank() {
            return false;
        }
        if body.strip_leading_token(self.prefix_overrides) {
            body.trim();
        }
        if body.strip_trailing_token(self.suffix_overrides) {
            body.trim();
        }
        body.wrap(self.prefix, self.suffix);
        !body.is_blank()
    }
}
