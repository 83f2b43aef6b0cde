//! Per-RDBMS decorators over [`DefaultConverter`].
//!
//! Each wrapper owns the default converter and overrides only what differs on
//! its platform. Everything else, including NULL handling and type guessing,
//! is forwarded untouched.

use serde::Deserialize;

use super::{Converter, DefaultConverter, TYPE_UNKNOWN, TypeFamily, normalize_type};
use crate::context::ConverterContext;
use crate::error::{ConvertError, ConvertResult};
use crate::types::{ArrayConverter, RowConverter};
use crate::value::{RawValue, Value};

/// MySQL has no boolean type: booleans travel as `1`/`0` tinyints.
pub struct MySqlConverter {
    inner: DefaultConverter,
}

impl Default for MySqlConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MySqlConverter {
    pub fn new() -> Self {
        Self::wrap(DefaultConverter::new())
    }

    pub fn wrap(inner: DefaultConverter) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &DefaultConverter {
        &self.inner
    }
}

fn is_boolean(sql_type: &str) -> bool {
    TypeFamily::of(&normalize_type(sql_type)) == Some(TypeFamily::Boolean)
}

impl Converter for MySqlConverter {
    fn from_sql(
        &self,
        sql_type: &str,
        value: RawValue<'_>,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Value> {
        let zero = matches!(value, RawValue::Text("0") | RawValue::Binary(b"0"));
        if zero && is_boolean(sql_type) && host_type.is_none() {
            return Ok(Value::Bool(false));
        }
        self.inner.from_sql(sql_type, value, host_type, ctx)
    }

    fn to_sql(
        &self,
        value: &Value,
        sql_type: &str,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Option<String>> {
        let guessed;
        let sql_type = if normalize_type(sql_type) == TYPE_UNKNOWN {
            guessed = self.inner.guess_type(value, ctx);
            guessed.as_str()
        } else {
            sql_type
        };
        let literal = self.inner.to_sql(value, sql_type, host_type, ctx)?;
        if !is_boolean(sql_type) {
            return Ok(literal);
        }
        Ok(literal.map(|text| match text.as_str() {
            "t" => "1".to_string(),
            "f" => "0".to_string(),
            _ => text,
        }))
    }

    fn guess_type(&self, value: &Value, ctx: &ConverterContext<'_>) -> String {
        self.inner.guess_type(value, ctx)
    }

    fn is_type_supported(&self, sql_type: &str, ctx: &ConverterContext<'_>) -> bool {
        self.inner.is_type_supported(sql_type, ctx)
    }
}

/// PostgreSQL: adds array and composite support.
pub struct PgSqlConverter {
    inner: DefaultConverter,
}

impl Default for PgSqlConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl PgSqlConverter {
    pub fn new() -> Self {
        Self::wrap(DefaultConverter::new())
    }

    /// Take ownership of `inner`, registering the structured-value
    /// converters after whatever it already holds.
    pub fn wrap(mut inner: DefaultConverter) -> Self {
        inner.register(ArrayConverter::new());
        inner.register(RowConverter::new());
        Self { inner }
    }

    pub fn inner(&self) -> &DefaultConverter {
        &self.inner
    }
}

impl Converter for PgSqlConverter {
    fn from_sql(
        &self,
        sql_type: &str,
        value: RawValue<'_>,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Value> {
        self.inner.from_sql(sql_type, value, host_type, ctx)
    }

    fn to_sql(
        &self,
        value: &Value,
        sql_type: &str,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Option<String>> {
        self.inner.to_sql(value, sql_type, host_type, ctx)
    }

    fn guess_type(&self, value: &Value, ctx: &ConverterContext<'_>) -> String {
        self.inner.guess_type(value, ctx)
    }

    fn is_type_supported(&self, sql_type: &str, ctx: &ConverterContext<'_>) -> bool {
        self.inner.is_type_supported(sql_type, ctx)
    }
}

/// Which decorator to put around the default converter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Default,
    #[serde(alias = "mariadb")]
    Mysql,
    #[default]
    #[serde(alias = "postgres", alias = "postgresql")]
    Pgsql,
}

impl Driver {
    /// Wrap `converter` for this driver.
    pub fn build(self, converter: DefaultConverter) -> Box<dyn Converter> {
        tracing::debug!("Building {:?} converter", self);
        match self {
            Driver::Default => Box::new(converter),
            Driver::Mysql => Box::new(MySqlConverter::wrap(converter)),
            Driver::Pgsql => Box::new(PgSqlConverter::wrap(converter)),
        }
    }

    /// Driver implied by a connection URL scheme.
    pub fn from_url(url: &str) -> Self {
        match url.split(':').next().unwrap_or_default() {
            "mysql" | "mariadb" => Driver::Mysql,
            "postgres" | "postgresql" => Driver::Pgsql,
            _ => Driver::Default,
        }
    }
}

impl std::str::FromStr for Driver {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Driver::Default),
            "mysql" | "mariadb" => Ok(Driver::Mysql),
            "pgsql" | "postgres" | "postgresql" => Ok(Driver::Pgsql),
            other => Err(ConvertError::Config(format!("unknown driver '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_booleans() {
        let mysql = MySqlConverter::new();
        let ctx = ConverterContext::new(&mysql, "UTC", "UTF8").unwrap();

        assert_eq!(mysql.to_sql(&Value::Bool(true), "bool", None, &ctx).unwrap(), Some("1".into()));
        assert_eq!(mysql.to_sql(&Value::Bool(false), "BOOLEAN", None, &ctx).unwrap(), Some("0".into()));
        assert_eq!(mysql.from_sql("bool", RawValue::Text("0"), None, &ctx).unwrap(), Value::Bool(false));
        assert_eq!(mysql.from_sql("bool", RawValue::Text("1"), None, &ctx).unwrap(), Value::Bool(true));
        assert_eq!(mysql.from_sql("bool", RawValue::Binary(b"0"), None, &ctx).unwrap(), Value::Bool(false));
        assert_eq!(mysql.from_sql("bool", RawValue::Binary(b"1"), None, &ctx).unwrap(), Value::Bool(true));
        // Other types are untouched.
        assert_eq!(mysql.to_sql(&Value::Bool(true), "text", None, &ctx).unwrap(), Some("t".into()));
        assert_eq!(mysql.from_sql("int", RawValue::Text("0"), None, &ctx).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_mysql_is_transparent_for_null_and_guessing() {
        let mysql = MySqlConverter::new();
        let ctx = ConverterContext::new(&mysql, "UTC", "UTF8").unwrap();

        assert_eq!(mysql.to_sql(&Value::Null, "bool", None, &ctx).unwrap(), None);
        assert_eq!(mysql.from_sql("bool", RawValue::Null, None, &ctx).unwrap(), Value::Null);
        assert_eq!(mysql.guess_type(&Value::Bool(true), &ctx), "bool");
        assert_eq!(mysql.to_sql(&Value::Bool(true), TYPE_UNKNOWN, None, &ctx).unwrap(), Some("1".into()));
        assert_eq!(mysql.to_sql(&Value::Int(1), TYPE_UNKNOWN, None, &ctx).unwrap(), Some("1".into()));
    }

    #[test]
    fn test_pgsql_registers_structured_converters() {
        let pgsql = PgSqlConverter::new();
        assert_eq!(pgsql.inner().registry().names(), vec!["date", "interval", "array", "row"]);

        let ctx = ConverterContext::new(&pgsql, "UTC", "UTF8").unwrap();
        assert!(pgsql.is_type_supported("_text", &ctx));
        assert!(pgsql.is_type_supported("record", &ctx));

        let plain = DefaultConverter::new();
        let ctx = ConverterContext::new(&plain, "UTC", "UTF8").unwrap();
        assert!(!plain.is_type_supported("_text", &ctx));
        assert!(matches!(
            plain.from_sql("_text", RawValue::Text("{a}"), None, &ctx),
            Err(ConvertError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_driver_selection() {
        assert_eq!("MySQL".parse::<Driver>().unwrap(), Driver::Mysql);
        assert_eq!("postgres".parse::<Driver>().unwrap(), Driver::Pgsql);
        assert!("oracle".parse::<Driver>().is_err());
        assert_eq!(Driver::from_url("postgres://localhost/db"), Driver::Pgsql);
        assert_eq!(Driver::from_url("sqlite::memory:"), Driver::Default);

        let converter = Driver::Mysql.build(DefaultConverter::new());
        let ctx = ConverterContext::new(converter.as_ref(), "UTC", "UTF8").unwrap();
        assert_eq!(
            converter.to_sql(&Value::Bool(true), "bool", None, &ctx).unwrap(),
            Some("1".into())
        );
    }
}
