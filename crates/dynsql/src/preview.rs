//! Human-readable SQL with parameters inlined.
//!
//! For logs and the CLI only. The output is never meant to be executed;
//! always send [`RenderResult::sql`] and [`RenderResult::params`] to the
//! driver instead.

use crate::config::PlaceholderStyle;
use crate::render::RenderResult;
use serde_json::Value;

impl RenderResult {
    /// Replace each placeholder with its parameter written as a SQL literal.
    ///
    /// Placeholder tokens inside quoted literals or identifiers are left alone.
    pub fn to_inline_sql(&self) -> String {
        let mut out = String::with_capacity(self.sql.len() + self.params.len() * 8);
        let mut chars = self.sql.char_indices();
        let mut quote: Option<char> = None;
        let mut next_param = 0usize;

        while let Some((i, c)) = chars.next() {
            if let Some(q) = quote {
                out.push(c);
                if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '\'' | '"' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' if self.style == PlaceholderStyle::Question => {
                    match self.params.get(next_param) {
                        Some(value) => push_literal(&mut out, value),
                        None => out.push('?'),
                    }
                    next_param += 1;
                }
                '$' if self.style == PlaceholderStyle::Dollar => {
                    let digits: String = self.sql[i + 1..]
                        .chars()
                        .take_while(char::is_ascii_digit)
                        .collect();
                    let param = digits
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|n| self.params.get(n));
                    match param {
                        Some(value) => {
                            push_literal(&mut out, value);
                            for _ in 0..digits.len() {
                                chars.next();
                            }
                        }
                        None => out.push('$'),
                    }
                }
                _ => out.push(c),
            }
        }
        out
    }
}

/// Write `value` as a SQL literal.
pub fn push_literal(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::Bool(true) => out.push_str("TRUE"),
        Value::Bool(false) => out.push_str("FALSE"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => push_quoted(out, s),
        Value::Array(_) | Value::Object(_) => push_quoted(out, &value.to_string()),
    }
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(sql: &str, params: Vec<Value>, style: PlaceholderStyle) -> RenderResult {
        RenderResult {
            sql: sql.to_string(),
            params,
            style,
        }
    }

    #[test]
    fn inlines_question_placeholders() {
        let r = result(
            "SELECT * FROM blog WHERE title = ? AND id IN (?, ?) AND note = 'why?' AND deleted = ?",
            vec![json!("it's"), json!(1), json!(2.5), json!(null)],
            PlaceholderStyle::Question,
        );
        assert_eq!(
            r.to_inline_sql(),
            "SELECT * FROM blog WHERE title = 'it''s' AND id IN (1, 2.5) AND note = 'why?' AND deleted = NULL"
        );
    }

    #[test]
    fn inlines_dollar_placeholders() {
        let params: Vec<Value> = (1..=10).map(|i| json!(i)).chain([json!(true)]).collect();
        let sql = (1..=11).map(|i| format!("${i}")).collect::<Vec<_>>().join(",");
        let r = result(&sql, params, PlaceholderStyle::Dollar);
        assert_eq!(r.to_inline_sql(), "1,2,3,4,5,6,7,8,9,10,TRUE");
    }

    #[test]
    fn json_values_are_quoted() {
        let r = result("?", vec![json!({"a": [1]})], PlaceholderStyle::Question);
        assert_eq!(r.to_inline_sql(), r#"'{"a":[1]}'"#);
    }
}
