//! # qail-convert — SQL ⇄ Rust value conversion
//!
//! > **Give me SQL text for this value. Give me a value for this SQL text.**
//!
//! The conversion layer between database wire text and typed host values:
//! primitives, PostgreSQL arrays and rows, dates with time zones, intervals,
//! and the quirks of each driver.
//!
//! ## Quick Example
//!
//! ```rust
//! use qail_convert::prelude::*;
//!
//! let pgsql = PgSqlConverter::new();
//! let ctx = ConverterContext::new(&pgsql, "Europe/Paris", "UTF8").unwrap();
//!
//! let tags = pgsql
//!     .from_sql("_text", RawValue::Text(r#"{a,"b,c",NULL}"#), None, &ctx)
//!     .unwrap();
//! assert_eq!(tags, Value::Array(vec!["a".into(), "b,c".into(), Value::Null]));
//!
//! let sql = pgsql.to_sql(&tags, "text[]", None, &ctx).unwrap();
//! assert_eq!(sql.as_deref(), Some(r#"{"a","b,c",NULL}"#));
//! ```
//!
//! ## Layers
//!
//! | Layer | Role |
//! |-------|------|
//! | [`Converter`](converter::Converter) | Two-direction contract used by everything else |
//! | [`DefaultConverter`](converter::DefaultConverter) | Primitive fast path, then the registry |
//! | [`MySqlConverter`](converter::MySqlConverter) / [`PgSqlConverter`](converter::PgSqlConverter) | Driver quirks |
//! | [`Registry`](converter::Registry) | Ordered, memoised [`ValueConverter`](types::ValueConverter)s |
//! | [`ConverterContext`](context::ConverterContext) | Client time zone, encoding, active converter |

pub mod config;
pub mod context;
pub mod converter;
pub mod engine;
pub mod error;
pub mod parser;
pub mod types;
pub mod value;

pub mod prelude {
    pub use crate::config::ConverterConfig;
    pub use crate::context::ConverterContext;
    pub use crate::converter::{
        Converter, DefaultConverter, Driver, FallbackMode, MySqlConverter, PgSqlConverter,
        Registry, TYPE_NULL, TYPE_UNKNOWN,
    };
    pub use crate::engine::{Record, Runner, RunnerQuery};
    pub use crate::error::*;
    pub use crate::types::{Interval, ValueConverter};
    pub use crate::value::{RawValue, Value};
}

/// Parse a PostgreSQL array literal into its untyped elements.
///
/// # Example
///
/// ```
/// use qail_convert::parser::Element;
///
/// let items = qail_convert::parse_array(r#"{1,"two",{NULL}}"#).unwrap();
/// assert_eq!(items[1], Element::Text("two".to_string()));
/// ```
pub fn parse_array(input: &str) -> error::ConvertResult<Vec<parser::Element>> {
    parser::parse_array(input)
}
