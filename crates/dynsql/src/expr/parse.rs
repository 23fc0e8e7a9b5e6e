use super::{BinOp, Expr, Method};
use serde_json::{Number, Value};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExprSyntaxError {
    pub message: String,
    /// Byte offset into the expression source.
    pub offset: usize,
}

impl ExprSyntaxError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(Number),
    Str(String),
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Plus,
    Minus,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

fn tokenize(src: &str) -> Result<Vec<(Tok, usize)>, ExprSyntaxError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'(' => out.push((Tok::LParen, start)),
            b')' => out.push((Tok::RParen, start)),
            b'[' => out.push((Tok::LBracket, start)),
            b']' => out.push((Tok::RBracket, start)),
            b'.' => out.push((Tok::Dot, start)),
            b'+' => out.push((Tok::Plus, start)),
            b'-' => out.push((Tok::Minus, start)),
            b'=' if bytes.get(i + 1) == Some(&b'=') => {
                i += 1;
                out.push((Tok::EqEq, start));
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                i += 1;
                out.push((Tok::NotEq, start));
            }
            b'!' => out.push((Tok::Bang, start)),
            b'<' if bytes.get(i + 1) == Some(&b'=') => {
                i += 1;
                out.push((Tok::Le, start));
            }
            b'<' => out.push((Tok::Lt, start)),
            b'>' if bytes.get(i + 1) == Some(&b'=') => {
                i += 1;
                out.push((Tok::Ge, start));
            }
            b'>' => out.push((Tok::Gt, start)),
            b'&' if bytes.get(i + 1) == Some(&b'&') => {
                i += 1;
                out.push((Tok::AndAnd, start));
            }
            b'|' if bytes.get(i + 1) == Some(&b'|') => {
                i += 1;
                out.push((Tok::OrOr, start));
            }
            b'\'' | b'"' => {
                let (s, end) = lex_string(src, i)?;
                out.push((Tok::Str(s), start));
                i = end;
                continue;
            }
            b'0'..=b'9' => {
                let (n, end) = lex_number(src, i)?;
                out.push((Tok::Number(n), start));
                i = end;
                continue;
            }
            c if c == b'_' || c == b'$' || c.is_ascii_alphabetic() => {
                let mut end = i + 1;
                while end < bytes.len()
                    && (bytes[end] == b'_' || bytes[end] == b'$' || bytes[end].is_ascii_alphanumeric())
                {
                    end += 1;
                }
                out.push((Tok::Ident(src[i..end].to_string()), start));
                i = end;
                continue;
            }
            _ => {
                let ch = src[i..].chars().next().unwrap_or('?');
                return Err(ExprSyntaxError::new(start, format!("unexpected character '{ch}'")));
            }
        }
        i += 1;
    }

    Ok(out)
}

fn lex_string(src: &str, start: usize) -> Result<(String, usize), ExprSyntaxError> {
    let mut chars = src[start..].char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(ExprSyntaxError::new(start, "expected string literal"));
    };
    let mut out = String::new();
    while let Some((off, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            c if c == quote => return Ok((out, start + off + c.len_utf8())),
            c => out.push(c),
        }
    }
    Err(ExprSyntaxError::new(start, "unterminated string literal"))
}

fn lex_number(src: &str, start: usize) -> Result<(Number, usize), ExprSyntaxError> {
    let bytes = src.as_bytes();
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut is_float = false;
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        is_float = true;
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    let text = &src[start..end];
    let number = if is_float {
        text.parse::<f64>().ok().and_then(Number::from_f64)
    } else {
        text.parse::<i64>().ok().map(Number::from)
    };
    number
        .map(|n| (n, end))
        .ok_or_else(|| ExprSyntaxError::new(start, format!("invalid number literal '{text}'")))
}

struct Parser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    end: usize,
}

pub(super) fn parse(src: &str) -> Result<Expr, ExprSyntaxError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(ExprSyntaxError::new(0, "empty expression"));
    }
    let mut p = Parser {
        tokens,
        pos: 0,
        end: src.len(),
    };
    let expr = p.parse_or()?;
    if let Some((tok, off)) = p.tokens.get(p.pos) {
        return Err(ExprSyntaxError::new(*off, format!("unexpected {}", describe(tok))));
    }
    Ok(expr)
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(s) => format!("identifier '{s}'"),
        Tok::Number(n) => format!("number {n}"),
        Tok::Str(s) => format!("string '{s}'"),
        other => format!("token {other:?}"),
    }
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, o)| *o).unwrap_or(self.end)
    }

    fn peek_word(&self, words: &[&str]) -> bool {
        matches!(self.peek(), Some(Tok::Ident(s)) if words.contains(&s.as_str()))
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), ExprSyntaxError> {
        let offset = self.offset();
        match self.bump() {
            Some(t) if t == tok => Ok(()),
            Some(t) => Err(ExprSyntaxError::new(offset, format!("expected {what}, found {}", describe(&t)))),
            None => Err(ExprSyntaxError::new(offset, format!("expected {what}, found end of expression"))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprSyntaxError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Tok::OrOr)) || self.peek_word(&["or"]) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprSyntaxError> {
        let mut lhs = self.parse_not()?;
        while matches!(self.peek(), Some(Tok::AndAnd)) || self.peek_word(&["and"]) {
            self.bump();
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprSyntaxError> {
        if self.peek_word(&["not"]) {
            self.bump();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn cmp_op(&self) -> Option<BinOp> {
        Some(match self.peek()? {
            Tok::EqEq => BinOp::Eq,
            Tok::NotEq => BinOp::Ne,
            Tok::Lt => BinOp::Lt,
            Tok::Le => BinOp::Le,
            Tok::Gt => BinOp::Gt,
            Tok::Ge => BinOp::Ge,
            Tok::Ident(w) => match w.as_str() {
                "eq" => BinOp::Eq,
                "neq" => BinOp::Ne,
                "lt" => BinOp::Lt,
                "lte" => BinOp::Le,
                "gt" => BinOp::Gt,
                "gte" => BinOp::Ge,
                _ => return None,
            },
            _ => return None,
        })
    }

    fn parse_cmp(&mut self) -> Result<Expr, ExprSyntaxError> {
        let lhs = self.parse_add()?;
        let Some(op) = self.cmp_op() else {
            return Ok(lhs);
        };
        self.bump();
        let rhs = self.parse_add()?;
        if self.cmp_op().is_some() {
            return Err(ExprSyntaxError::new(
                self.offset(),
                "comparisons cannot be chained; use parentheses",
            ));
        }
        Ok(Expr::Binary(Box::new(lhs), op, Box::new(rhs)))
    }

    fn parse_add(&mut self) -> Result<Expr, ExprSyntaxError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprSyntaxError> {
        if matches!(self.peek(), Some(Tok::Bang)) {
            self.bump();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        if matches!(self.peek(), Some(Tok::Minus)) {
            self.bump();
            let inner = self.parse_unary()?;
            return Ok(match inner {
                Expr::Literal(Value::Number(n)) => Expr::Literal(negate(&n)),
                other => Expr::Neg(Box::new(other)),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprSyntaxError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Tok::Dot) => {
                    self.bump();
                    let offset = self.offset();
                    let Some(Tok::Ident(name)) = self.bump() else {
                        return Err(ExprSyntaxError::new(offset, "expected property name after '.'"));
                    };
                    if matches!(self.peek(), Some(Tok::LParen)) {
                        self.bump();
                        self.expect(Tok::RParen, "')' (methods take no arguments)")?;
                        let Some(method) = Method::from_name(&name) else {
                            return Err(ExprSyntaxError::new(offset, format!("unknown method '{name}()'")));
                        };
                        expr = Expr::Call(Box::new(expr), method);
                    } else {
                        expr = Expr::Field(Box::new(expr), name);
                    }
                }
                Some(Tok::LBracket) => {
                    self.bump();
                    let index = self.parse_or()?;
                    self.expect(Tok::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprSyntaxError> {
        let offset = self.offset();
        match self.bump() {
            Some(Tok::Number(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Tok::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            Some(Tok::Ident(word)) => match word.as_str() {
                "null" => Ok(Expr::Literal(Value::Null)),
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "and" | "or" | "not" | "eq" | "neq" | "lt" | "lte" | "gt" | "gte" => Err(
                    ExprSyntaxError::new(offset, format!("unexpected operator '{word}'")),
                ),
                _ => Ok(Expr::Var(word)),
            },
            Some(tok) => Err(ExprSyntaxError::new(offset, format!("unexpected {}", describe(&tok)))),
            None => Err(ExprSyntaxError::new(offset, "unexpected end of expression")),
        }
    }
}

fn negate(n: &Number) -> Value {
    if let Some(i) = n.as_i64().and_then(i64::checked_neg) {
        return Value::from(i);
    }
    n.as_f64()
        .and_then(|f| Number::from_f64(-f))
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
