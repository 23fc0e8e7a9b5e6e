//! Test and value expressions.
//!
//! A small OGNL subset, enough for the `test`, `collection`, `value` and
//! `#{...}` positions of a template:
//!
//! ```text
//! title != null and title != ''
//! ids != null and ids.size() > 0
//! state == 'ACTIVE' or (author.id gte 100 && !draft)
//! '%' + pattern + '%'
//! ```
//!
//! Expressions are parsed together with their template, so a syntax error is
//! always reported at parse time. Evaluation never fails on missing data: an
//! absent path is `null`, which is falsy and equal only to `null`.

mod eval;
mod parse;

#[cfg(test)]
mod tests;

pub use eval::{eval_bool, eval_value, is_truthy};
pub(crate) use parse::ExprSyntaxError;

use crate::error::{DynSqlError, DynSqlResult, Location};
use serde_json::Value;
use std::fmt;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
        }
    }
}

/// Zero-argument methods callable on a value (`ids.size()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Size,
    Length,
    IsEmpty,
    Trim,
    ToUpperCase,
    ToLowerCase,
}

impl Method {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "size" => Method::Size,
            "length" => Method::Length,
            "isEmpty" => Method::IsEmpty,
            "trim" => Method::Trim,
            "toUpperCase" => Method::ToUpperCase,
            "toLowerCase" => Method::ToLowerCase,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Method::Size => "size",
            Method::Length => "length",
            Method::IsEmpty => "isEmpty",
            Method::Trim => "trim",
            Method::ToUpperCase => "toUpperCase",
            Method::ToLowerCase => "toLowerCase",
        }
    }
}

/// Expression syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Method),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
}

impl Expr {
    /// Parse a standalone expression.
    pub fn parse(source: &str) -> DynSqlResult<Expr> {
        parse::parse(source).map_err(|e| DynSqlError::Expression {
            template: "<expression>".to_string(),
            location: Location::of_offset(source, e.offset),
            expr: source.to_string(),
            message: e.message,
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::String(s)) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Var(name) => f.write_str(name),
            Expr::Field(base, name) => write!(f, "{base}.{name}"),
            Expr::Index(base, idx) => write!(f, "{base}[{idx}]"),
            Expr::Call(base, method) => write!(f, "{base}.{}()", method.name()),
            Expr::Not(inner) => write!(f, "!{inner}"),
            Expr::Neg(inner) => write!(f, "-{inner}"),
            Expr::And(l, r) => write!(f, "({l} and {r})"),
            Expr::Or(l, r) => write!(f, "({l} or {r})"),
            Expr::Binary(l, op, r) => write!(f, "({l} {} {r})", op.symbol()),
        }
    }
}

pub(crate) fn parse_raw(source: &str) -> Result<Expr, ExprSyntaxError> {
    parse::parse(source)
}
