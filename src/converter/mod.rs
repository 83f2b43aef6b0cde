//! Top-level conversion contract.
//!
//! Everything outside this crate talks to a [`Converter`]: "give me a SQL
//! string for this value" and "give me a value for this SQL string".

pub mod default;
pub mod driver;
pub mod registry;

pub use default::{DefaultConverter, FallbackMode};
pub use driver::{Driver, MySqlConverter, PgSqlConverter};
pub use registry::Registry;

use crate::context::ConverterContext;
use crate::error::ConvertResult;
use crate::value::{RawValue, Value};

/// The value is SQL NULL whatever its declared type.
pub const TYPE_NULL: &str = "null";

/// The caller did not name a SQL type; guess it from the value.
pub const TYPE_UNKNOWN: &str = "unknown";

/// Two-direction conversion contract.
pub trait Converter: Send + Sync {
    /// Convert a raw SQL value to a host value.
    ///
    /// NULL input is `Value::Null` whatever `sql_type` says.
    fn from_sql(
        &self,
        sql_type: &str,
        value: RawValue<'_>,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Value>;

    /// Convert a host value to SQL literal text, `None` meaning SQL NULL.
    fn to_sql(
        &self,
        value: &Value,
        sql_type: &str,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Option<String>>;

    /// Propose a SQL type for a value of unknown type.
    fn guess_type(&self, value: &Value, ctx: &ConverterContext<'_>) -> String;

    /// Whether some converter handles `sql_type`.
    fn is_type_supported(&self, sql_type: &str, ctx: &ConverterContext<'_>) -> bool;
}

/// Canonical form of a SQL type name.
///
/// Lower-cased, whitespace collapsed, type modifiers such as `(255)` or
/// `(10,2)` removed.
pub fn normalize_type(sql_type: &str) -> String {
    let mut stripped = String::with_capacity(sql_type.len());
    let mut depth = 0usize;
    for c in sql_type.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Primitive SQL type families handled without the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Character,
    Numeric,
    Boolean,
    Json,
    Uuid,
    Binary,
}

impl TypeFamily {
    /// Family of a normalised type name.
    pub fn of(sql_type: &str) -> Option<Self> {
        let family = match sql_type {
            "int" | "int2" | "int4" | "int8" | "integer" | "smallint" | "bigint" | "tinyint"
            | "mediumint" | "serial" | "serial2" | "serial4" | "serial8" | "smallserial"
            | "bigserial" => TypeFamily::Integer,
            "char" | "character" | "varchar" | "character varying" | "nchar" | "nvarchar"
            | "text" | "tinytext" | "mediumtext" | "longtext" | "bpchar" | "name" | "citext" => {
                TypeFamily::Character
            }
            "float" | "float4" | "float8" | "real" | "double" | "double precision" | "numeric"
            | "decimal" => TypeFamily::Numeric,
            "bool" | "boolean" => TypeFamily::Boolean,
            "json" | "jsonb" => TypeFamily::Json,
            "uuid" => TypeFamily::Uuid,
            "bytea" | "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
                TypeFamily::Binary
            }
            _ => return None,
        };
        Some(family)
    }
}

/// Parse a boolean literal.
///
/// Only `""`, `f`, `F` and `false` in any case are false.
pub fn parse_bool(value: &str) -> bool {
    !(value.is_empty() || value == "f" || value == "F" || value.eq_ignore_ascii_case("false"))
}
