use super::{BinOp, Expr, Method};
use crate::context::{Scope, value_kind};
use crate::error::RenderError;
use serde_json::{Number, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

static NULL: Value = Value::Null;

/// OGNL-style truthiness: `null`, `false`, `0`, `""` and empty collections are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(m) => !m.is_empty(),
    }
}

/// Evaluate `expr` as a condition.
pub fn eval_bool(expr: &Expr, scope: &Scope<'_>) -> Result<bool, RenderError> {
    match expr {
        Expr::And(l, r) => Ok(eval_bool(l, scope)? && eval_bool(r, scope)?),
        Expr::Or(l, r) => Ok(eval_bool(l, scope)? || eval_bool(r, scope)?),
        Expr::Not(inner) => Ok(!eval_bool(inner, scope)?),
        other => Ok(is_truthy(eval_value(other, scope)?.as_ref())),
    }
}

/// Evaluate `expr` to a value. Values reachable from the scope are borrowed.
pub fn eval_value<'a>(expr: &'a Expr, scope: &'a Scope<'_>) -> Result<Cow<'a, Value>, RenderError> {
    Ok(match expr {
        Expr::Literal(v) => Cow::Borrowed(v),
        Expr::Var(name) => Cow::Borrowed(scope.lookup(name).unwrap_or(&NULL)),
        Expr::Field(base, name) => match eval_value(base, scope)? {
            Cow::Borrowed(v) => Cow::Borrowed(v.get(name.as_str()).unwrap_or(&NULL)),
            Cow::Owned(Value::Object(mut map)) => Cow::Owned(map.remove(name).unwrap_or(Value::Null)),
            Cow::Owned(_) => Cow::Owned(Value::Null),
        },
        Expr::Index(base, index) => {
            let index = eval_value(index, scope)?;
            match eval_value(base, scope)? {
                Cow::Borrowed(v) => Cow::Borrowed(index_into(v, &index).unwrap_or(&NULL)),
                Cow::Owned(v) => Cow::Owned(index_into(&v, &index).cloned().unwrap_or(Value::Null)),
            }
        }
        Expr::Call(base, method) => Cow::Owned(call(eval_value(base, scope)?.as_ref(), *method)?),
        Expr::Not(_) | Expr::And(..) | Expr::Or(..) => Cow::Owned(Value::Bool(eval_bool(expr, scope)?)),
        Expr::Neg(inner) => {
            let v = eval_value(inner, scope)?;
            match v.as_ref() {
                Value::Number(n) => Cow::Owned(sub(&Number::from(0), n)),
                other => {
                    return Err(RenderError::TypeMismatch(format!(
                        "cannot negate {} in `{expr}`",
                        value_kind(other)
                    )));
                }
            }
        }
        Expr::Binary(l, op, r) => {
            let lhs = eval_value(l, scope)?;
            let rhs = eval_value(r, scope)?;
            Cow::Owned(binary(&lhs, *op, &rhs, expr)?)
        }
    })
}

fn index_into<'v>(value: &'v Value, index: &Value) -> Option<&'v Value> {
    match (value, index) {
        (Value::Array(items), Value::Number(n)) => items.get(usize::try_from(n.as_u64()?).ok()?),
        (Value::Object(map), Value::String(key)) => map.get(key),
        _ => None,
    }
}

fn call(value: &Value, method: Method) -> Result<Value, RenderError> {
    let mismatch = || {
        RenderError::TypeMismatch(format!(
            "{}() is not defined for {}",
            method.name(),
            value_kind(value)
        ))
    };
    match method {
        Method::Size | Method::Length => {
            let len = match value {
                Value::Null => 0,
                Value::Array(a) => a.len(),
                Value::Object(m) => m.len(),
                Value::String(s) => s.chars().count(),
                _ => return Err(mismatch()),
            };
            Ok(Value::from(len))
        }
        Method::IsEmpty => match value {
            Value::Null => Ok(Value::Bool(true)),
            Value::Array(a) => Ok(Value::Bool(a.is_empty())),
            Value::Object(m) => Ok(Value::Bool(m.is_empty())),
            Value::String(s) => Ok(Value::Bool(s.is_empty())),
            _ => Err(mismatch()),
        },
        Method::Trim | Method::ToUpperCase | Method::ToLowerCase => match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) => Ok(Value::String(match method {
                Method::Trim => s.trim().to_string(),
                Method::ToUpperCase => s.to_uppercase(),
                _ => s.to_lowercase(),
            })),
            _ => Err(mismatch()),
        },
    }
}

fn binary(lhs: &Value, op: BinOp, rhs: &Value, expr: &Expr) -> Result<Value, RenderError> {
    let ordering = |accept: fn(Ordering) -> bool| -> Result<Value, RenderError> {
        Ok(Value::Bool(compare(lhs, rhs, expr)?.is_some_and(accept)))
    };
    match op {
        BinOp::Eq => Ok(Value::Bool(loose_eq(lhs, rhs))),
        BinOp::Ne => Ok(Value::Bool(!loose_eq(lhs, rhs))),
        BinOp::Lt => ordering(Ordering::is_lt),
        BinOp::Le => ordering(Ordering::is_le),
        BinOp::Gt => ordering(Ordering::is_gt),
        BinOp::Ge => ordering(Ordering::is_ge),
        BinOp::Add => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(add(a, b)),
            (Value::String(_), _) | (_, Value::String(_)) => {
                let mut out = display_text(lhs).ok_or_else(|| concat_mismatch(lhs, expr))?;
                out.push_str(&display_text(rhs).ok_or_else(|| concat_mismatch(rhs, expr))?);
                Ok(Value::String(out))
            }
            _ => Err(RenderError::TypeMismatch(format!(
                "cannot add {} and {} in `{expr}`",
                value_kind(lhs),
                value_kind(rhs)
            ))),
        },
        BinOp::Sub => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(sub(a, b)),
            _ => Err(RenderError::TypeMismatch(format!(
                "cannot subtract {} from {} in `{expr}`",
                value_kind(rhs),
                value_kind(lhs)
            ))),
        },
    }
}

fn concat_mismatch(value: &Value, expr: &Expr) -> RenderError {
    RenderError::TypeMismatch(format!(
        "cannot concatenate {} in `{expr}`",
        value_kind(value)
    ))
}

fn display_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Equality used by `==` / `!=`. `null` equals only `null`; numbers and
/// numeric strings compare by value.
fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(a), Value::Number(b)) => cmp_numbers(a, b) == Some(Ordering::Equal),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .zip(n.as_f64())
            .is_some_and(|(a, b)| a == b),
        _ => lhs == rhs,
    }
}

fn compare(lhs: &Value, rhs: &Value, expr: &Expr) -> Result<Option<Ordering>, RenderError> {
    match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => Ok(None),
        (Value::Number(a), Value::Number(b)) => Ok(cmp_numbers(a, b)),
        (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
        (Value::Number(n), Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(f) => Ok(n.as_f64().and_then(|v| v.partial_cmp(&f))),
            Err(_) => Err(compare_mismatch(lhs, rhs, expr)),
        },
        (Value::String(s), Value::Number(n)) => match s.trim().parse::<f64>() {
            Ok(f) => Ok(n.as_f64().and_then(|v| f.partial_cmp(&v))),
            Err(_) => Err(compare_mismatch(lhs, rhs, expr)),
        },
        _ => Err(compare_mismatch(lhs, rhs, expr)),
    }
}

fn compare_mismatch(lhs: &Value, rhs: &Value, expr: &Expr) -> RenderError {
    RenderError::TypeMismatch(format!(
        "cannot order {} against {} in `{expr}`",
        value_kind(lhs),
        value_kind(rhs)
    ))
}

fn cmp_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn add(a: &Number, b: &Number) -> Value {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Value::from(sum);
        }
    }
    float(a.as_f64().unwrap_or(f64::NAN) + b.as_f64().unwrap_or(f64::NAN))
}

fn sub(a: &Number, b: &Number) -> Value {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(diff) = x.checked_sub(y) {
            return Value::from(diff);
        }
    }
    float(a.as_f64().unwrap_or(f64::NAN) - b.as_f64().unwrap_or(f64::NAN))
}
