use super::*;
use crate::context::Context;
use crate::error::RenderError;
use serde_json::json;

fn eval(src: &str, ctx: &Context) -> Result<Value, RenderError> {
    let expr = Expr::parse(src).unwrap();
    let scope = ctx.scope();
    let value = eval_value(&expr, &scope)?.into_owned();
    Ok(value)
}

fn test(src: &str, ctx: &Context) -> bool {
    let expr = Expr::parse(src).unwrap();
    eval_bool(&expr, &ctx.scope()).unwrap()
}

#[test]
fn null_checks_and_empty_strings() {
    let ctx = Context::new().with("title", "Post").with("empty", "");
    assert!(test("title != null and title != ''", &ctx));
    assert!(!test("empty != null and empty != ''", &ctx));
    assert!(test("missing == null", &ctx));
    assert!(!test("missing != null", &ctx));
}

#[test]
fn absent_values_are_falsy_and_unequal() {
    let ctx = Context::new();
    assert!(!test("missing", &ctx));
    assert!(!test("missing == 0", &ctx));
    assert!(!test("missing == ''", &ctx));
    assert!(!test("missing > 1", &ctx));
    assert!(!test("missing.deep.path", &ctx));
    assert!(test("not missing", &ctx));
}

#[test]
fn relational_and_word_operators() {
    let ctx = Context::from_value(json!({"author": {"id": 101}, "score": 2.5}));
    assert!(test("author.id >= 100", &ctx));
    assert!(test("author.id gte 100 && author.id lt 200", &ctx));
    assert!(test("score > 2", &ctx));
    assert!(test("author.id eq 101", &ctx));
    assert!(test("author.id neq 100", &ctx));
    assert!(!test("author.id <= 100", &ctx));
}

#[test]
fn numeric_strings_compare_by_value() {
    let ctx = Context::new().with("n", "10");
    assert!(test("n == 10", &ctx));
    assert!(test("n > 9", &ctx));
}

#[test]
fn short_circuit_skips_type_errors() {
    let ctx = Context::new().with("state", "ACTIVE");
    // `state > 1` alone would be a type mismatch.
    assert!(test("state == 'ACTIVE' or state > 1", &ctx));
    assert!(!test("state == 'DRAFT' and state > 1", &ctx));
}

#[test]
fn ordering_mismatched_types_is_an_error() {
    let ctx = Context::new().with("state", "ACTIVE").with("flag", true);
    let expr = Expr::parse("state > 1").unwrap();
    let err = eval_bool(&expr, &ctx.scope()).unwrap_err();
    assert!(matches!(err, RenderError::TypeMismatch(_)));

    let expr = Expr::parse("flag < true").unwrap();
    assert!(eval_bool(&expr, &ctx.scope()).is_err());
}

#[test]
fn collection_methods() {
    let ctx = Context::new()
        .with("ids", json!([1, 2, 3]))
        .with("none", json!([]))
        .with("name", " ann ");
    assert!(test("ids != null and ids.size() > 0", &ctx));
    assert!(test("none.isEmpty()", &ctx));
    assert!(test("!none.isEmpty() == false", &ctx));
    assert!(test("missing.isEmpty()", &ctx));
    assert_eq!(eval("ids.size()", &ctx).unwrap(), json!(3));
    assert_eq!(eval("name.trim().toUpperCase()", &ctx).unwrap(), json!("ANN"));
    assert!(eval("ids[0].size()", &ctx).is_err());
}

#[test]
fn string_concatenation_for_bind_values() {
    let ctx = Context::new().with("pattern", "Java");
    assert_eq!(eval("'%' + pattern + '%'", &ctx).unwrap(), json!("%Java%"));
    assert_eq!(eval("'id-' + 7", &ctx).unwrap(), json!("id-7"));
    assert_eq!(eval("'x' + missing", &ctx).unwrap(), json!("x"));
}

#[test]
fn arithmetic() {
    let ctx = Context::new().with("page", 3).with("size", 20);
    assert_eq!(eval("page - 1", &ctx).unwrap(), json!(2));
    assert_eq!(eval("-size + 1", &ctx).unwrap(), json!(-19));
    assert_eq!(eval("1.5 + 1", &ctx).unwrap(), json!(2.5));
    assert!(eval("missing - 1", &ctx).is_err());
}

#[test]
fn indexing() {
    let ctx = Context::from_value(json!({"rows": [{"id": 4}], "m": {"k": "v"}}));
    assert_eq!(eval("rows[0].id", &ctx).unwrap(), json!(4));
    assert_eq!(eval("m['k']", &ctx).unwrap(), json!("v"));
    assert_eq!(eval("rows[5].id", &ctx).unwrap(), Value::Null);
}

#[test]
fn parenthesized_precedence() {
    let ctx = Context::new().with("a", true).with("b", false).with("c", false);
    assert!(!test("a and (b or c)", &ctx));
    assert!(test("(a and b) or not c", &ctx));
}

#[test]
fn syntax_errors_are_reported_with_location() {
    for bad in ["a ==", "a = 1", "(a", "a.", "'open", "a.size(1)", "a.frobnicate()", "a == b == c", ""] {
        let err = Expr::parse(bad).unwrap_err();
        assert!(err.is_expression(), "{bad}: {err}");
    }

    let err = Expr::parse("title != null and and").unwrap_err();
    assert_eq!(err.location().unwrap().column, 19);
}

#[test]
fn display_round_trips_through_parse() {
    let src = "(ids != null and ids.size() > 0) or name == 'it\\'s'";
    let expr = Expr::parse(src).unwrap();
    let reparsed = Expr::parse(&expr.to_string()).unwrap();
    assert_eq!(expr, reparsed);
}

#[test]
fn methods_and_truthiness_on_computed_values() {
    let ctx = Context::new().with("first", "ab").with("last", "c").with("blank", "  ");
    assert_eq!(eval("(first + last).length()", &ctx).unwrap(), json!(3));
    assert_eq!(eval("(first + last).toUpperCase()", &ctx).unwrap(), json!("ABC"));
    assert!(test("first.trim()", &ctx));
    assert!(!test("blank.trim()", &ctx));
    assert!(test("first + last", &ctx));
}
