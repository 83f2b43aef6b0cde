//! Value converters for types outside the facade's fast path.
//!
//! A [`ValueConverter`] claims (host type, SQL type) pairs and advertises them
//! through one of two capabilities:
//!
//! - [`Support::Static`]: a declarative [`TypeMap`], cheap for the registry
//!   to match and to cache.
//! - [`Support::Dynamic`]: a [`DynamicSupport`] predicate, for converters whose
//!   applicability depends on the shape of the type name (arrays).

pub mod array;
pub mod interval;
pub mod row;
pub mod temporal;

pub use array::ArrayConverter;
pub use interval::{Interval, IntervalConverter};
pub use row::RowConverter;
pub use temporal::DateConverter;

use std::collections::HashMap;

use crate::context::ConverterContext;
use crate::converter::TYPE_UNKNOWN;
use crate::error::ConvertResult;
use crate::value::Value;

/// A unit responsible for one or more (host type, SQL type) pairs.
pub trait ValueConverter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// How the registry decides whether this converter applies.
    fn support(&self) -> Support<'_>;

    /// Convert a non-null SQL text value. `sql_type` is normalised.
    fn from_sql(
        &self,
        sql_type: &str,
        value: &str,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Value>;

    /// Convert a host value to SQL text. `sql_type` is normalised.
    fn to_sql(
        &self,
        sql_type: &str,
        value: &Value,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Option<String>>;

    /// Propose a SQL type for the value, or [`TYPE_UNKNOWN`].
    fn guess_type(&self, _value: &Value, _ctx: &ConverterContext<'_>) -> String {
        TYPE_UNKNOWN.to_string()
    }
}

/// Capability advertised by a converter.
pub enum Support<'a> {
    Static(&'a TypeMap),
    Dynamic(&'a dyn DynamicSupport),
}

impl Support<'_> {
    /// Whether `sql_type` can be read, optionally as `host_type`.
    pub fn supports_output(
        &self,
        sql_type: &str,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> bool {
        match self {
            Support::Static(map) => map.supports_output(sql_type, host_type),
            Support::Dynamic(dynamic) => dynamic.supports_output(sql_type, host_type, ctx),
        }
    }

    /// Whether a `host_type` value can be written as `sql_type`.
    pub fn supports_input(&self, host_type: &str, sql_type: &str, ctx: &ConverterContext<'_>) -> bool {
        match self {
            Support::Static(map) => map.supports_input(host_type, sql_type),
            Support::Dynamic(dynamic) => dynamic.supports_input(host_type, sql_type, ctx),
        }
    }

    /// Whether `sql_type` is handled in either direction.
    pub fn supports_type(&self, sql_type: &str, ctx: &ConverterContext<'_>) -> bool {
        match self {
            Support::Static(map) => map.supports_type(sql_type),
            Support::Dynamic(dynamic) => dynamic.supports_output(sql_type, None, ctx),
        }
    }
}

/// Per-call applicability predicate.
pub trait DynamicSupport: Send + Sync {
    fn supports_output(&self, sql_type: &str, host_type: Option<&str>, ctx: &ConverterContext<'_>) -> bool;

    fn supports_input(&self, host_type: &str, sql_type: &str, ctx: &ConverterContext<'_>) -> bool;
}

/// Declarative type map.
///
/// `input` maps a host type to the SQL types it can be written as; `output`
/// maps a SQL type to the host types it can be read as, preferred first.
#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    input: HashMap<&'static str, Vec<&'static str>>,
    output: HashMap<&'static str, Vec<&'static str>>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `host_type` values can be written as each of `sql_types`.
    pub fn input(mut self, host_type: &'static str, sql_types: &[&'static str]) -> Self {
        self.input.entry(host_type).or_default().extend_from_slice(sql_types);
        self
    }

    /// Declare that `sql_type` values can be read as each of `host_types`.
    pub fn output(mut self, sql_type: &'static str, host_types: &[&'static str]) -> Self {
        self.output.entry(sql_type).or_default().extend_from_slice(host_types);
        self
    }

    /// Declare several SQL types read as the same host types.
    pub fn outputs(mut self, sql_types: &[&'static str], host_types: &[&'static str]) -> Self {
        for &sql_type in sql_types {
            self = self.output(sql_type, host_types);
        }
        self
    }

    pub fn supports_output(&self, sql_type: &str, host_type: Option<&str>) -> bool {
        match (self.output.get(sql_type), host_type) {
            (Some(_), None) => true,
            (Some(hosts), Some(host)) => hosts.contains(&host),
            (None, _) => false,
        }
    }

    pub fn supports_input(&self, host_type: &str, sql_type: &str) -> bool {
        self.input
            .get(host_type)
            .is_some_and(|sql_types| sql_types.contains(&sql_type))
    }

    pub fn supports_type(&self, sql_type: &str) -> bool {
        self.output.contains_key(sql_type)
            || self.input.values().any(|sql_types| sql_types.contains(&sql_type))
    }

    /// Preferred host type for `sql_type`.
    pub fn preferred_host(&self, sql_type: &str) -> Option<&'static str> {
        self.output.get(sql_type).and_then(|hosts| hosts.first().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_map_lookup() {
        let map = TypeMap::new()
            .input("datetime", &["timestamptz", "date"])
            .outputs(&["timestamptz", "timestamp"], &["datetime"]);

        assert!(map.supports_input("datetime", "date"));
        assert!(!map.supports_input("string", "date"));
        assert!(map.supports_output("timestamp", None));
        assert!(map.supports_output("timestamp", Some("datetime")));
        assert!(!map.supports_output("timestamp", Some("int")));
        assert!(map.supports_type("date"));
        assert!(!map.supports_type("uuid"));
        assert_eq!(map.preferred_host("timestamptz"), Some("datetime"));
    }
}
