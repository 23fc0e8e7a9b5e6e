use crate::render::RenderResult;
use bytes::BytesMut;
use serde_json::{Number, Value};
use std::error::Error;
use tokio_postgres::types::{IsNull, Json, Kind, ToSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

/// A rendered parameter, encodable as any PostgreSQL type it can represent.
///
/// - `null` is SQL `NULL` for every type.
/// - Numbers go to `int2`/`int4`/`int8`/`float4`/`float8` (range checked) or
///   to text types as their decimal text.
/// - Strings go to text types, or are parsed for numeric and boolean targets.
/// - Arrays go to PostgreSQL arrays element by element.
/// - Anything goes to `json`/`jsonb` as JSON.
#[derive(Debug, Clone, Copy)]
pub struct PgValue<'a>(pub &'a Value);

impl ToSql for PgValue<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if matches!(*ty, Type::JSON | Type::JSONB) {
            return match self.0 {
                Value::Null => Ok(IsNull::Yes),
                v => Json(v).to_sql(ty, out),
            };
        }
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ if is_text(ty) => b.to_string().to_sql(ty, out),
                _ => Err(mismatch("boolean", ty)),
            },
            Value::Number(n) => number_to_sql(n, ty, out),
            Value::String(s) => string_to_sql(s, ty, out),
            Value::Array(items) => match ty.kind() {
                Kind::Array(_) => items.iter().map(PgValue).collect::<Vec<_>>().to_sql(ty, out),
                _ => Err(mismatch("array", ty)),
            },
            Value::Object(_) => Err(mismatch("object", ty)),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Compatibility depends on the value, checked in `to_sql`.
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

fn mismatch(kind: &str, ty: &Type) -> BoxError {
    format!("cannot encode a JSON {kind} as PostgreSQL type {ty}").into()
}

fn number_to_sql(n: &Number, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    let int = || n.as_i64().ok_or_else(|| BoxError::from(format!("{n} is not an integer")));
    let float = || n.as_f64().ok_or_else(|| BoxError::from(format!("{n} is not a float")));
    match *ty {
        Type::INT2 => i16::try_from(int()?)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(int()?)?.to_sql(ty, out),
        Type::INT8 => int()?.to_sql(ty, out),
        Type::FLOAT4 => (float()? as f32).to_sql(ty, out),
        Type::FLOAT8 => float()?.to_sql(ty, out),
        _ if is_text(ty) => n.to_string().to_sql(ty, out),
        _ => Err(mismatch("number", ty)),
    }
}

fn string_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => s.trim().parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => s.trim().parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => s.trim().parse::<i64>()?.to_sql(ty, out),
        Type::FLOAT4 => s.trim().parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
        Type::BOOL => s.trim().parse::<bool>()?.to_sql(ty, out),
        _ if is_text(ty) => s.to_sql(ty, out),
        _ => Err(mismatch("string", ty)),
    }
}

/// Parameters of one [`RenderResult`], ready for `tokio-postgres`.
#[derive(Debug, Clone)]
pub struct PgParams<'a> {
    values: Vec<PgValue<'a>>,
}

impl PgParams<'_> {
    /// Parameter refs compatible with `tokio-postgres` query methods.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl RenderResult {
    /// Borrow the parameters as PostgreSQL values.
    ///
    /// Render with [`PlaceholderStyle::Dollar`](crate::PlaceholderStyle::Dollar)
    /// when the SQL goes to PostgreSQL.
    pub fn pg_params(&self) -> PgParams<'_> {
        PgParams {
            values: self.params.iter().map(PgValue).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaceholderStyle;
    use serde_json::json;

    fn encode(value: Value, ty: &Type) -> Result<(IsNull, Vec<u8>), BoxError> {
        let mut buf = BytesMut::new();
        let is_null = PgValue(&value).to_sql_checked(ty, &mut buf)?;
        Ok((is_null, buf.to_vec()))
    }

    #[test]
    fn null_is_sql_null_for_any_type() {
        for ty in [Type::INT4, Type::TEXT, Type::JSONB, Type::TIMESTAMPTZ] {
            let (is_null, _) = encode(Value::Null, &ty).unwrap();
            assert!(matches!(is_null, IsNull::Yes));
        }
    }

    #[test]
    fn numbers_follow_target_width() {
        assert_eq!(encode(json!(7), &Type::INT4).unwrap().1, vec![0, 0, 0, 7]);
        assert_eq!(encode(json!(7), &Type::INT2).unwrap().1, vec![0, 7]);
        assert_eq!(encode(json!(7), &Type::INT8).unwrap().1, 7i64.to_be_bytes().to_vec());
        assert_eq!(encode(json!(1.5), &Type::FLOAT8).unwrap().1, 1.5f64.to_be_bytes().to_vec());
        assert_eq!(encode(json!(42), &Type::TEXT).unwrap().1, b"42".to_vec());
        assert!(encode(json!(70000), &Type::INT2).is_err());
        assert!(encode(json!(1.5), &Type::INT4).is_err());
    }

    #[test]
    fn strings_and_bools() {
        assert_eq!(encode(json!("abc"), &Type::VARCHAR).unwrap().1, b"abc".to_vec());
        assert_eq!(encode(json!("12"), &Type::INT4).unwrap().1, vec![0, 0, 0, 12]);
        assert_eq!(encode(json!(true), &Type::BOOL).unwrap().1, vec![1]);
        assert!(encode(json!("abc"), &Type::INT4).is_err());
        assert!(encode(json!(true), &Type::INT4).is_err());
    }

    #[test]
    fn json_targets_take_any_value() {
        let (_, bytes) = encode(json!({"a": 1}), &Type::JSONB).unwrap();
        // jsonb binary format: version byte then the text.
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..], br#"{"a":1}"#);
        assert!(encode(json!({"a": 1}), &Type::TEXT).is_err());
    }

    #[test]
    fn arrays_encode_elementwise() {
        assert!(encode(json!([1, 2, 3]), &Type::INT4_ARRAY).is_ok());
        assert!(encode(json!([1, 2, 3]), &Type::INT4).is_err());
    }

    #[test]
    fn render_result_params() {
        let result = RenderResult {
            sql: "SELECT $1, $2".into(),
            params: vec![json!(1), json!("x")],
            style: PlaceholderStyle::Dollar,
        };
        let params = result.pg_params();
        assert_eq!(params.len(), 2);
        assert_eq!(params.params_ref().len(), 2);
    }
}
