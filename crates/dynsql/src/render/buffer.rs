use crate::config::PlaceholderStyle;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum SqlPart {
    Raw(String),
    Param,
}

/// Rendered SQL pieces and their bound values.
///
/// Placeholders are kept as [`SqlPart::Param`] markers and only numbered in
/// [`SqlBuffer::to_sql`], so buffers rendered separately (trim bodies,
/// foreach items, included fragments) can be spliced together without
/// renumbering.
#[derive(Debug, Clone, Default)]
pub(crate) struct SqlBuffer {
    parts: Vec<SqlPart>,
    params: Vec<Value>,
    /// Separate the next non-whitespace output from a clause just appended.
    space_before_next: bool,
}

impl SqlBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw SQL text.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }
        if self.space_before_next && !sql.starts_with(char::is_whitespace) {
            self.push_raw(" ");
        }
        self.space_before_next = false;
        self.push_raw(sql);
        self
    }

    fn push_raw(&mut self, sql: &str) {
        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
    }

    /// Append a placeholder and bind its value.
    pub fn push_bind(&mut self, value: Value) -> &mut Self {
        if self.space_before_next {
            self.push_raw(" ");
            self.space_before_next = false;
        }
        self.parts.push(SqlPart::Param);
        self.params.push(value);
        self
    }

    /// Append another buffer, consuming it.
    pub fn append(&mut self, mut other: SqlBuffer) -> &mut Self {
        if other.parts.is_empty() {
            return self;
        }
        let mut parts = other.parts.drain(..);
        if let Some(first) = parts.next() {
            match first {
                SqlPart::Raw(s) => {
                    self.push(&s);
                }
                SqlPart::Param => {
                    if self.space_before_next {
                        self.push_raw(" ");
                        self.space_before_next = false;
                    }
                    self.parts.push(SqlPart::Param);
                }
            }
        }
        for part in parts {
            match part {
                SqlPart::Raw(s) => self.push_raw(&s),
                SqlPart::Param => self.parts.push(SqlPart::Param),
            }
        }
        self.params.append(&mut other.params);
        self.space_before_next = other.space_before_next;
        self
    }

    /// Append a trimmed clause (`WHERE ...`, `SET ...`), separated by one
    /// space from any adjacent non-whitespace text.
    pub fn append_clause(&mut self, clause: SqlBuffer) -> &mut Self {
        if clause.is_blank() {
            return self;
        }
        let ends_with_text = match self.parts.last() {
            Some(SqlPart::Raw(s)) => !s.ends_with(char::is_whitespace),
            Some(SqlPart::Param) => true,
            None => false,
        };
        if ends_with_text {
            self.push_raw(" ");
        }
        self.space_before_next = false;
        self.append(clause);
        self.space_before_next = true;
        self
    }

    /// True when the buffer holds no placeholder and only whitespace.
    pub fn is_blank(&self) -> bool {
        self.parts.iter().all(|p| match p {
            SqlPart::Raw(s) => s.trim().is_empty(),
            SqlPart::Param => false,
        })
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Remove leading and trailing whitespace.
    pub fn trim(&mut self) {
        while let Some(SqlPart::Raw(s)) = self.parts.first_mut() {
            let trimmed = s.trim_start();
            if trimmed.is_empty() {
                self.parts.remove(0);
            } else {
                *s = trimmed.to_string();
                break;
            }
        }
        while let Some(SqlPart::Raw(s)) = self.parts.last_mut() {
            let trimmed = s.trim_end();
            if trimmed.is_empty() {
                self.parts.pop();
            } else {
                let len = trimmed.len();
                s.truncate(len);
                break;
            }
        }
        self.space_before_next = false;
    }

    /// Strip the first of `tokens` found at the start, ignoring ASCII case.
    pub fn strip_leading_token(&mut self, tokens: &[String]) -> bool {
        let Some(SqlPart::Raw(s)) = self.parts.first_mut() else {
            return false;
        };
        let Some(len) = tokens.iter().find_map(|t| {
            s.get(..t.len())
                .filter(|head| head.eq_ignore_ascii_case(t))
                .map(|_| t.len())
        }) else {
            return false;
        };
        s.replace_range(..len, "");
        if s.is_empty() {
            self.parts.remove(0);
        }
        true
    }

    /// Strip the first of `tokens` found at the end, ignoring ASCII case.
    pub fn strip_trailing_token(&mut self, tokens: &[String]) -> bool {
        let Some(SqlPart::Raw(s)) = self.parts.last_mut() else {
            return false;
        };
        let Some(len) = tokens.iter().find_map(|t| {
            let start = s.len().checked_sub(t.len())?;
            s.get(start..)
                .filter(|tail| tail.eq_ignore_ascii_case(t))
                .map(|_| t.len())
        }) else {
            return false;
        };
        let keep = s.len() - len;
        s.truncate(keep);
        if s.is_empty() {
            self.parts.pop();
        }
        true
    }

    /// Wrap the content with `prefix` / `suffix`, each separated by a space.
    pub fn wrap(&mut self, prefix: &str, suffix: &str) {
        if !prefix.is_empty() {
            self.parts.insert(0, SqlPart::Raw(format!("{prefix} ")));
            self.merge_front();
        }
        if !suffix.is_empty() {
            self.push_raw(" ");
            self.push_raw(suffix);
        }
    }

    fn merge_front(&mut self) {
        if self.parts.len() >= 2 {
            if let [SqlPart::Raw(a), SqlPart::Raw(b), ..] = self.parts.as_mut_slice() {
                a.push_str(b);
                self.parts.remove(1);
            }
        }
    }

    pub fn into_params(self) -> Vec<Value> {
        self.params
    }

    /// Render the SQL text with placeholders in `style`.
    ///
    /// With `collapse`, whitespace runs outside quoted literals become a
    /// single space and the ends are trimmed.
    pub fn to_sql(&self, style: PlaceholderStyle, collapse: bool) -> String {
        let cap = self
            .parts
            .iter()
            .map(|p| match p {
                SqlPart::Raw(s) => s.len(),
                SqlPart::Param => 4,
            })
            .sum();
        let mut out = Collapser::new(String::with_capacity(cap), collapse);
        let mut idx = 0usize;
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    out.push_token(&style.token(idx));
                }
            }
        }
        out.finish()
    }
}

/// Whitespace folding that leaves quoted SQL literals untouched.
struct Collapser {
    out: String,
    enabled: bool,
    quote: Option<char>,
    pending_space: bool,
}

impl Collapser {
    fn new(out: String, enabled: bool) -> Self {
        Self {
            out,
            enabled,
            quote: None,
            pending_space: false,
        }
    }

    fn push_str(&mut self, s: &str) {
        if !self.enabled {
            self.out.push_str(s);
            return;
        }
        for c in s.chars() {
            if let Some(q) = self.quote {
                self.out.push(c);
                if c == q {
                    self.quote = None;
                }
                continue;
            }
            if c.is_whitespace() {
                self.pending_space = true;
                continue;
            }
            self.flush_space();
            if c == '\'' || c == '"' {
                self.quote = Some(c);
            }
            self.out.push(c);
        }
    }

    fn push_token(&mut self, token: &str) {
        self.flush_space();
        self.out.push_str(token);
    }

    fn flush_space(&mut self) {
        if self.pending_space && !self.out.is_empty() {
            self.out.push(' ');
        }
        self.pending_space = false;
    }

    fn finish(self) -> String {
        self.out
    }
}
