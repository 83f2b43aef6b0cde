//! Ordered collection of value converters.
//!
//! Registration order is priority order: when two converters claim the same
//! type, the one registered first wins. Resolutions are memoised per SQL type
//! (and host type for the outbound direction).

use dashmap::DashMap;

use crate::context::ConverterContext;
use crate::converter::TYPE_UNKNOWN;
use crate::error::{ConvertError, ConvertResult};
use crate::types::{DateConverter, IntervalConverter, ValueConverter};
use crate::value::Value;

/// Memoised outcome of a converter lookup. A missing cache entry means the
/// lookup has not run yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Found(usize),
    Unsupported,
}

pub struct Registry {
    converters: Vec<Box<dyn ValueConverter>>,
    output_cache: DashMap<(String, Option<String>), Resolution>,
    input_cache: DashMap<(String, String), Resolution>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry with the date/time and interval converters installed.
    pub fn new() -> Self {
        Self::with_defaults(true)
    }

    /// Registry with no converters at all.
    pub fn empty() -> Self {
        Self::with_defaults(false)
    }

    pub fn with_defaults(register_defaults: bool) -> Self {
        let mut registry = Self {
            converters: Vec::new(),
            output_cache: DashMap::new(),
            input_cache: DashMap::new(),
        };
        if register_defaults {
            registry.register(DateConverter::new());
            registry.register(IntervalConverter::new());
        }
        registry
    }

    /// Append a converter. It loses ties against every converter already
    /// registered.
    pub fn register(&mut self, converter: impl ValueConverter + 'static) {
        self.register_boxed(Box::new(converter));
    }

    pub fn register_boxed(&mut self, converter: Box<dyn ValueConverter>) {
        tracing::debug!(
            "Registered value converter '{}' at priority {}",
            converter.name(),
            self.converters.len()
        );
        self.converters.push(converter);
        self.output_cache.clear();
        self.input_cache.clear();
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Converter names in priority order.
    pub fn names(&self) -> Vec<&'static str> {
        self.converters.iter().map(|c| c.name()).collect()
    }

    pub fn is_type_supported(&self, sql_type: &str, ctx: &ConverterContext<'_>) -> bool {
        self.resolve_output(sql_type, None, ctx).is_some()
            || self
                .converters
                .iter()
                .any(|c| c.support().supports_type(sql_type, ctx))
    }

    fn resolve_output(
        &self,
        sql_type: &str,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> Option<&dyn ValueConverter> {
        let key = (sql_type.to_string(), host_type.map(str::to_string));
        let resolution = match self.output_cache.get(&key).map(|r| *r) {
            Some(resolution) => resolution,
            None => {
                let resolution = self
                    .converters
                    .iter()
                    .position(|c| c.support().supports_output(sql_type, host_type, ctx))
                    .map(Resolution::Found)
                    .unwrap_or(Resolution::Unsupported);
                tracing::trace!("Resolved output type '{}' to {:?}", sql_type, resolution);
                self.output_cache.insert(key, resolution);
                resolution
            }
        };
        self.converter_at(resolution)
    }

    fn resolve_input(
        &self,
        host_type: &str,
        sql_type: &str,
        ctx: &ConverterContext<'_>,
    ) -> Option<&dyn ValueConverter> {
        let key = (host_type.to_string(), sql_type.to_string());
        let resolution = match self.input_cache.get(&key).map(|r| *r) {
            Some(resolution) => resolution,
            None => {
                let resolution = self
                    .converters
                    .iter()
                    .position(|c| c.support().supports_input(host_type, sql_type, ctx))
                    .map(Resolution::Found)
                    .unwrap_or(Resolution::Unsupported);
                tracing::trace!(
                    "Resolved input {} -> '{}' to {:?}",
                    host_type,
                    sql_type,
                    resolution
                );
                self.input_cache.insert(key, resolution);
                resolution
            }
        };
        self.converter_at(resolution)
    }

    fn converter_at(&self, resolution: Resolution) -> Option<&dyn ValueConverter> {
        match resolution {
            Resolution::Found(index) => self.converters.get(index).map(|c| c.as_ref()),
            Resolution::Unsupported => None,
        }
    }

    /// Delegate a non-null SQL text value to the first matching converter.
    pub fn from_sql(
        &self,
        sql_type: &str,
        value: &str,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Value> {
        match self.resolve_output(sql_type, host_type, ctx) {
            Some(converter) => converter.from_sql(sql_type, value, host_type, ctx),
            None => match host_type {
                Some(host) if self.resolve_output(sql_type, None, ctx).is_some() => {
                    Err(ConvertError::host(host, sql_type))
                }
                _ => Err(ConvertError::UnsupportedType(sql_type.to_string())),
            },
        }
    }

    /// Delegate a non-null host value to the first matching converter.
    pub fn to_sql(
        &self,
        sql_type: &str,
        value: &Value,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Option<String>> {
        let host_type = host_type.unwrap_or_else(|| value.host_type());
        match self.resolve_input(host_type, sql_type, ctx) {
            Some(converter) => converter.to_sql(sql_type, value, ctx),
            None if self.is_type_supported(sql_type, ctx) => {
                Err(ConvertError::host(host_type, sql_type))
            }
            None => Err(ConvertError::UnsupportedType(sql_type.to_string())),
        }
    }

    /// First guess that is not [`TYPE_UNKNOWN`], probing in priority order.
    pub fn guess_type(&self, value: &Value, ctx: &ConverterContext<'_>) -> String {
        self.converters
            .iter()
            .map(|c| c.guess_type(value, ctx))
            .find(|guess| guess != TYPE_UNKNOWN)
            .unwrap_or_else(|| TYPE_UNKNOWN.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::DefaultConverter;
    use crate::types::{Support, TypeMap};
    use chrono::NaiveDate;

    struct Tagged {
        tag: &'static str,
        types: TypeMap,
    }

    impl Tagged {
        fn new(tag: &'static str) -> Self {
            Self {
                tag,
                types: TypeMap::new()
                    .input("string", &["money"])
                    .output("money", &["string"]),
            }
        }
    }

    impl ValueConverter for Tagged {
        fn name(&self) -> &'static str {
            self.tag
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
            Ok(Value::String(format!("{}:{}", self.tag, value)))
        }

        fn to_sql(
            &self,
            _sql_type: &str,
            value: &Value,
            _ctx: &ConverterContext<'_>,
        ) -> ConvertResult<Option<String>> {
            Ok(Some(format!("{}:{}", self.tag, value)))
        }

        fn guess_type(&self, value: &Value, _ctx: &ConverterContext<'_>) -> String {
            match value {
                Value::String(s) if s.starts_with('$') => "money".to_string(),
                _ => TYPE_UNKNOWN.to_string(),
            }
        }
    }

    fn with_context<F: FnOnce(&ConverterContext<'_>)>(f: F) {
        let converter = DefaultConverter::new();
        let ctx = ConverterContext::new(&converter, "UTC", "UTF8").unwrap();
        f(&ctx);
    }

    #[test]
    fn test_default_registration() {
        assert_eq!(Registry::new().names(), vec!["date", "interval"]);
        assert!(Registry::empty().is_empty());
    }

    #[test]
    fn test_first_registered_wins() {
        let mut registry = Registry::empty();
        registry.register(Tagged::new("first"));
        registry.register(Tagged::new("second"));

        with_context(|ctx| {
            assert_eq!(
                registry.from_sql("money", "12", None, ctx).unwrap(),
                Value::String("first:12".into())
            );
            assert_eq!(
                registry.to_sql("money", &Value::from("12"), None, ctx).unwrap(),
                Some("first:12".into())
            );
        });
    }

    #[test]
    fn test_unsupported_type_and_host() {
        let mut registry = Registry::empty();
        registry.register(Tagged::new("money"));

        with_context(|ctx| {
            assert!(matches!(
                registry.from_sql("geometry", "x", None, ctx),
                Err(ConvertError::UnsupportedType(t)) if t == "geometry"
            ));
            assert!(matches!(
                registry.to_sql("money", &Value::Int(3), None, ctx),
                Err(ConvertError::UnsupportedHostType { .. })
            ));
            assert!(matches!(
                registry.from_sql("money", "1", Some("int"), ctx),
                Err(ConvertError::UnsupportedHostType { .. })
            ));
        });
    }

    #[test]
    fn test_resolution_is_cached_until_register() {
        let mut registry = Registry::empty();
        with_context(|ctx| {
            assert!(!registry.is_type_supported("money", ctx));
            assert!(registry.resolve_output("money", None, ctx).is_none());
        });
        assert_eq!(
            registry
                .output_cache
                .get(&("money".to_string(), None))
                .map(|r| *r),
            Some(Resolution::Unsupported)
        );

        registry.register(Tagged::new("money"));
        assert!(registry.output_cache.is_empty());
        with_context(|ctx| assert!(registry.is_type_supported("money", ctx)));
    }

    #[test]
    fn test_guess_probes_in_order() {
        let mut registry = Registry::new();
        registry.register(Tagged::new("money"));

        with_context(|ctx| {
            assert_eq!(registry.guess_type(&Value::from("$12"), ctx), "money");
            let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
            assert_eq!(registry.guess_type(&Value::Date(date), ctx), "date");
            assert_eq!(registry.guess_type(&Value::Bool(true), ctx), TYPE_UNKNOWN);
        });
    }
}
