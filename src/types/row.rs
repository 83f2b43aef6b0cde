//! PostgreSQL composite (`row`/`record`) values.
//!
//! Outbound fields are typed one by one through the top-level converter's
//! guess. Inbound fields are not typed: a row literal carries no field types,
//! so every field comes back as text (or NULL).

use super::{Support, TypeMap, ValueConverter};
use crate::context::ConverterContext;
use crate::converter::TYPE_UNKNOWN;
use crate::error::{ConvertError, ConvertResult};
use crate::parser::{Element, escape_element, parse_row, write_row};
use crate::value::{Value, host};

const ROW_TYPES: &[&str] = &["row", "record"];

pub struct RowConverter {
    types: TypeMap,
}

impl Default for RowConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl RowConverter {
    pub fn new() -> Self {
        Self {
            types: TypeMap::new()
                .input(host::ARRAY, ROW_TYPES)
                .outputs(ROW_TYPES, &[host::ARRAY]),
        }
    }
}

fn untyped(element: Element) -> Value {
    match element {
        Element::Null => Value::Null,
        Element::Text(text) => Value::String(text),
        Element::Nested(children) => Value::Array(children.into_iter().map(untyped).collect()),
    }
}

impl ValueConverter for RowConverter {
    fn name(&self) -> &'static str {
        "row"
    }

    fn support(&self) -> Support<'_> {
        Support::Static(&self.types)
    }

    fn from_sql(
        &self,
        _sql_type: &str,
        value: &str,
        _host_type: Option<&str>,
        _ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Value> {
        let fields = parse_row(value)?;
        Ok(Value::Array(fields.into_iter().map(untyped).collect()))
    }

    fn to_sql(
        &self,
        sql_type: &str,
        value: &Value,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Option<String>> {
        let Value::Array(fields) = value else {
            return Err(ConvertError::host(value.host_type(), sql_type));
        };
        let converter = ctx.converter();
        let literal = write_row(fields, |field: &Value| {
            let field_type = converter.guess_type(field, ctx);
            Ok::<_, ConvertError>(match converter.to_sql(field, &field_type, None, ctx)? {
                Some(text) => escape_element(&text),
                None => String::new(),
            })
        })?;
        Ok(Some(literal))
    }

    fn guess_type(&self, _value: &Value, _ctx: &ConverterContext<'_>) -> String {
        // Arrays are claimed by the array converter.
        TYPE_UNKNOWN.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{Converter, PgSqlConverter};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn with_pgsql<F: FnOnce(&PgSqlConverter, &ConverterContext<'_>)>(f: F) {
        let pgsql = PgSqlConverter::new();
        let ctx = ConverterContext::new(&pgsql, "UTC", "UTF8").unwrap();
        f(&pgsql, &ctx);
    }

    #[test]
    fn test_row_fields_are_guessed_individually() {
        with_pgsql(|_, ctx| {
            let row = Value::Array(vec![
                Value::Int(42),
                Value::from("it's \"quoted\""),
                Value::Null,
                Value::Bool(false),
                Value::Array(vec![Value::from("a"), Value::from("b")]),
            ]);
            let literal = RowConverter::new().to_sql("row", &row, ctx).unwrap();
            assert_eq!(
                literal,
                Some(r#"("42","it's \"quoted\"",,"f","{\"a\",\"b\"}")"#.to_string())
            );
        });
    }

    #[test]
    fn test_row_fields_come_back_untyped() {
        with_pgsql(|_, ctx| {
            let value = RowConverter::new()
                .from_sql("record", r#"(42,"a,b",,t)"#, None, ctx)
                .unwrap();
            assert_eq!(
                value,
                Value::Array(vec![
                    Value::from("42"),
                    Value::from("a,b"),
                    Value::Null,
                    Value::from("t"),
                ])
            );
        });
    }

    #[test]
    fn test_row_requires_array() {
        with_pgsql(|pgsql, ctx| {
            let err = RowConverter::new().to_sql("row", &Value::Int(1), ctx).unwrap_err();
            assert!(matches!(err, ConvertError::UnsupportedHostType { .. }));

            let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
            let row = Value::Array(vec![Value::Date(date)]);
            assert_eq!(
                pgsql.to_sql(&row, "ROW", None, ctx).unwrap(),
                Some(r#"("2024-02-29")"#.to_string())
            );
        });
    }
}
