//! The top-level converter.
//!
//! Primitive type families are converted inline; everything else goes
//! through the [`Registry`].

use serde::Deserialize;
use std::borrow::Cow;

use super::{Converter, Registry, TYPE_NULL, TYPE_UNKNOWN, TypeFamily, normalize_type, parse_bool};
use crate::context::ConverterContext;
use crate::error::{ConvertError, ConvertResult};
use crate::types::ValueConverter;
use crate::value::{RawValue, Value, host};

/// What to do when the registry has no converter for a type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Propagate the conversion error.
    #[default]
    Strict,
    /// Legacy behaviour: cast the value to text.
    StringCast,
}

pub struct DefaultConverter {
    registry: Registry,
    fallback: FallbackMode,
}

impl Default for DefaultConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultConverter {
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            fallback: FallbackMode::Strict,
        }
    }

    pub fn fallback(mut self, mode: FallbackMode) -> Self {
        self.fallback = mode;
        self
    }

    pub fn fallback_mode(&self) -> FallbackMode {
        self.fallback
    }

    pub fn register(&mut self, converter: impl ValueConverter + 'static) {
        self.registry.register(converter);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Whether a registry error may be replaced by a string cast.
    fn falls_back(&self, err: &ConvertError) -> bool {
        self.fallback == FallbackMode::StringCast
            && matches!(
                err,
                ConvertError::UnsupportedType(_) | ConvertError::UnsupportedHostType { .. }
            )
    }
}

impl Converter for DefaultConverter {
    fn from_sql(
        &self,
        sql_type: &str,
        value: RawValue<'_>,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Value> {
        let sql_type = normalize_type(sql_type);
        let family = TypeFamily::of(&sql_type);
        let text = match value {
            RawValue::Null => return Ok(Value::Null),
            RawValue::Binary(bytes) if family == Some(TypeFamily::Binary) => {
                return Ok(Value::Bytes(bytes.to_vec()));
            }
            RawValue::Binary(bytes) => ctx.decode_text(bytes)?,
            RawValue::Text(text) => Cow::Borrowed(text),
        };

        if host_type == Some(host::STRING) || sql_type == TYPE_UNKNOWN {
            return Ok(Value::String(text.into_owned()));
        }
        if sql_type == TYPE_NULL {
            return Ok(Value::Null);
        }

        if let Some(family) = family {
            tracing::trace!("Fast path {:?} for '{}'", family, sql_type);
            return read_primitive(family, &sql_type, &text);
        }

        match self.registry.from_sql(&sql_type, &text, host_type, ctx) {
            Err(err) if self.falls_back(&err) => {
                tracing::warn!("No converter for '{}', reading as text: {}", sql_type, err);
                Ok(Value::String(text.into_owned()))
            }
            result => result,
        }
    }

    fn to_sql(
        &self,
        value: &Value,
        sql_type: &str,
        host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Option<String>> {
        if value.is_null() {
            return Ok(None);
        }

        let mut sql_type = normalize_type(sql_type);
        if sql_type == TYPE_UNKNOWN {
            sql_type = self.guess_type(value, ctx);
        }
        if sql_type == TYPE_NULL {
            return Ok(None);
        }

        if let Some(family) = TypeFamily::of(&sql_type) {
            tracing::trace!("Fast path {:?} for '{}'", family, sql_type);
            return write_primitive(family, &sql_type, value).map(Some);
        }

        match self.registry.to_sql(&sql_type, value, host_type, ctx) {
            Err(err) if self.falls_back(&err) => {
                tracing::warn!("No converter for '{}', writing as text: {}", sql_type, err);
                Ok(Some(value.to_string()))
            }
            result => result,
        }
    }

    fn guess_type(&self, value: &Value, ctx: &ConverterContext<'_>) -> String {
        let guess = match value {
            Value::Null => TYPE_NULL,
            Value::Int(_) | Value::String(_) => "varchar",
            Value::Bool(_) => "bool",
            Value::Float(_) => "numeric",
            Value::DateTime(_) => "timestamptz",
            Value::Bytes(_) => "bytea",
            other => {
                let guess = self.registry.guess_type(other, ctx);
                return if guess == TYPE_UNKNOWN {
                    "varchar".to_string()
                } else {
                    guess
                };
            }
        };
        guess.to_string()
    }

    fn is_type_supported(&self, sql_type: &str, ctx: &ConverterContext<'_>) -> bool {
        let sql_type = normalize_type(sql_type);
        TypeFamily::of(&sql_type).is_some() || self.registry.is_type_supported(&sql_type, ctx)
    }
}

fn read_primitive(family: TypeFamily, sql_type: &str, text: &str) -> ConvertResult<Value> {
    let value = match family {
        TypeFamily::Integer => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| ConvertError::invalid(sql_type, text, e.to_string()))?,
        TypeFamily::Character => Value::String(text.to_string()),
        TypeFamily::Numeric => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| ConvertError::invalid(sql_type, text, e.to_string()))?,
        TypeFamily::Boolean => Value::Bool(parse_bool(text)),
        TypeFamily::Json => serde_json::from_str(text)
            .map(Value::Json)
            .map_err(|e| ConvertError::invalid(sql_type, text, e.to_string()))?,
        #[cfg(feature = "uuid")]
        TypeFamily::Uuid => uuid::Uuid::parse_str(text.trim())
            .map(Value::Uuid)
            .map_err(|e| ConvertError::invalid(sql_type, text, e.to_string()))?,
        #[cfg(not(feature = "uuid"))]
        TypeFamily::Uuid => Value::String(text.to_string()),
        TypeFamily::Binary => Value::Bytes(decode_bytea(sql_type, text)?),
    };
    Ok(value)
}

fn write_primitive(family: TypeFamily, sql_type: &str, value: &Value) -> ConvertResult<String> {
    let unsupported = || ConvertError::host(value.host_type(), sql_type);
    let text = match (family, value) {
        (TypeFamily::Integer, Value::Int(i)) => i.to_string(),
        (TypeFamily::Integer, Value::Bool(b)) => if *b { "1" } else { "0" }.to_string(),
        (TypeFamily::Integer, Value::Float(f)) if f.is_finite() && f.fract() == 0.0 => {
            // 2^63 is exactly representable; anything at or above it saturates.
            if *f < i64::MIN as f64 || *f >= i64::MAX as f64 {
                return Err(ConvertError::invalid(sql_type, f.to_string(), "out of integer range"));
            }
            (*f as i64).to_string()
        }
        (TypeFamily::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(|i| i.to_string())
            .map_err(|e| ConvertError::invalid(sql_type, s, e.to_string()))?,

        (TypeFamily::Character, Value::String(s)) => s.clone(),
        (TypeFamily::Character, Value::Int(i)) => i.to_string(),
        (TypeFamily::Character, Value::Float(f)) => format_float(*f),
        (TypeFamily::Character, Value::Bool(b)) => format_bool(*b),
        (TypeFamily::Character, Value::Json(json)) => json.to_string(),
        #[cfg(feature = "uuid")]
        (TypeFamily::Character, Value::Uuid(u)) => u.hyphenated().to_string(),
        (TypeFamily::Character, Value::Bytes(bytes)) => String::from_utf8(bytes.clone())
            .map_err(|e| ConvertError::invalid(sql_type, "<binary>", e.to_string()))?,

        (TypeFamily::Numeric, Value::Float(f)) => format_float(*f),
        (TypeFamily::Numeric, Value::Int(i)) => i.to_string(),
        (TypeFamily::Numeric, Value::String(s)) => {
            s.trim()
                .parse::<f64>()
                .map_err(|e| ConvertError::invalid(sql_type, s, e.to_string()))?;
            s.trim().to_string()
        }

        (TypeFamily::Boolean, Value::Bool(b)) => format_bool(*b),
        (TypeFamily::Boolean, Value::Int(i)) => format_bool(*i != 0),
        (TypeFamily::Boolean, Value::String(s)) => format_bool(parse_bool(s)),

        (TypeFamily::Json, other) => serde_json::to_string(&other.to_json())
            .map_err(|e| ConvertError::invalid(sql_type, other.to_string(), e.to_string()))?,

        #[cfg(feature = "uuid")]
        (TypeFamily::Uuid, Value::Uuid(u)) => u.hyphenated().to_string(),
        #[cfg(feature = "uuid")]
        (TypeFamily::Uuid, Value::String(s)) => uuid::Uuid::parse_str(s.trim())
            .map(|u| u.hyphenated().to_string())
            .map_err(|e| ConvertError::invalid(sql_type, s, e.to_string()))?,
        #[cfg(not(feature = "uuid"))]
        (TypeFamily::Uuid, Value::String(s)) => s.clone(),

        (TypeFamily::Binary, Value::Bytes(bytes)) => encode_bytea(bytes),
        (TypeFamily::Binary, Value::String(s)) => encode_bytea(s.as_bytes()),

        _ => return Err(unsupported()),
    };
    Ok(text)
}

fn format_bool(value: bool) -> String {
    if value { "t" } else { "f" }.to_string()
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        value.to_string()
    }
}

/// PostgreSQL hex escape form: `\x` followed by two hex digits per byte.
fn encode_bytea(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

fn decode_bytea(sql_type: &str, text: &str) -> ConvertResult<Vec<u8>> {
    let Some(hex) = text.strip_prefix("\\x") else {
        return Ok(text.as_bytes().to_vec());
    };
    if hex.len() % 2 != 0 {
        return Err(ConvertError::invalid(sql_type, text, "odd number of hex digits"));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| ConvertError::invalid(sql_type, text, "invalid hex digit"))
        })
        .collect()
}
