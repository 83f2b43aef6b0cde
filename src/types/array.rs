//! PostgreSQL array types.
//!
//! Drivers name array types two ways: `_int4` (catalog name) and `int4[]`.
//! Both resolve to the same element type, and every leaf goes back through
//! the top-level converter.

use super::{DynamicSupport, Support, ValueConverter};
use crate::context::ConverterContext;
use crate::converter::{TYPE_NULL, TYPE_UNKNOWN};
use crate::error::ConvertResult;
use crate::parser::{Element, escape_element, parse_array, write_array};
use crate::value::{RawValue, Value, host};

const PREFIX: char = '_';
const SUFFIX: &str = "[]";

/// Whether a normalised type name denotes an array.
pub fn is_array_type(sql_type: &str) -> bool {
    sql_type.starts_with(PREFIX) || sql_type.ends_with(SUFFIX)
}

/// Innermost element type, all array markers removed.
pub fn element_type(sql_type: &str) -> &str {
    let mut base = sql_type.trim();
    loop {
        if let Some(stripped) = base.strip_suffix(SUFFIX) {
            base = stripped.trim_end();
        } else if let Some(stripped) = base.strip_prefix(PREFIX) {
            base = stripped;
        } else {
            return base;
        }
    }
}

#[derive(Debug, Default)]
pub struct ArrayConverter;

impl ArrayConverter {
    pub fn new() -> Self {
        Self
    }

    fn hydrate(
        &self,
        element_type: &str,
        elements: Vec<Element>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Vec<Value>> {
        elements
            .into_iter()
            .map(|element| match element {
                Element::Null => Ok(Value::Null),
                Element::Text(text) => {
                    ctx.converter()
                        .from_sql(element_type, RawValue::Text(&text), None, ctx)
                }
                Element::Nested(children) => {
                    Ok(Value::Array(self.hydrate(element_type, children, ctx)?))
                }
            })
            .collect()
    }
}

impl DynamicSupport for ArrayConverter {
    fn supports_output(&self, sql_type: &str, host_type: Option<&str>, _ctx: &ConverterContext<'_>) -> bool {
        is_array_type(sql_type) && matches!(host_type, None | Some(host::ARRAY))
    }

    fn supports_input(&self, _host_type: &str, sql_type: &str, _ctx: &ConverterContext<'_>) -> bool {
        // Scalars are accepted and handed to the element converter.
        is_array_type(sql_type)
    }
}

impl ValueConverter for ArrayConverter {
    fn name(&self) -> &'static str {
        "array"
    }

    fn support(&self) -> Support<'_> {
        Support::Dynamic(self)
    }

    fn from_sql(
        &self,
        sql_type: &str,
        value: &str,
        _host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Value> {
        let elements = parse_array(value)?;
        Ok(Value::Array(self.hydrate(element_type(sql_type), elements, ctx)?))
    }

    fn to_sql(
        &self,
        sql_type: &str,
        value: &Value,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Option<String>> {
        let element_type = element_type(sql_type);
        let items = match value {
            Value::Array(items) => items,
            scalar => return ctx.converter().to_sql(scalar, element_type, None, ctx),
        };
        if items.is_empty() {
            return Ok(Some("{}".to_string()));
        }

        let literal = write_array(items, |leaf: &Value| {
            let text = ctx.converter().to_sql(leaf, element_type, None, ctx)?;
            Ok::<_, crate::error::ConvertError>(match text {
                Some(text) => escape_element(&text),
                None => "NULL".to_string(),
            })
        })?;
        Ok(Some(literal))
    }

    fn guess_type(&self, value: &Value, ctx: &ConverterContext<'_>) -> String {
        let Value::Array(items) = value else {
            return TYPE_UNKNOWN.to_string();
        };
        match items.iter().find(|item| !item.is_null()) {
            Some(first) => {
                let guess = ctx.converter().guess_type(first, ctx);
                format!("{}{}", element_type(&guess), SUFFIX)
            }
            None => TYPE_NULL.to_string(),
        }
    }
}
