//! Per-unit-of-work conversion context.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::borrow::Cow;
use std::fmt;

use crate::config::ConverterConfig;
use crate::converter::Converter;
use crate::error::{ConvertError, ConvertResult};

/// Session settings plus the active top-level converter.
///
/// Converters that need to recurse (arrays, rows) go back through
/// [`ConverterContext::converter`] so driver decorators stay in the loop.
#[derive(Clone, Copy)]
pub struct ConverterContext<'a> {
    converter: &'a dyn Converter,
    timezone: Tz,
    encoding: &'a str,
    reference_date: Option<NaiveDate>,
}

impl<'a> ConverterContext<'a> {
    /// Build a context, resolving the client time zone identifier.
    pub fn new(converter: &'a dyn Converter, timezone: &str, encoding: &'a str) -> ConvertResult<Self> {
        let timezone = timezone
            .parse::<Tz>()
            .map_err(|_| ConvertError::InvalidTimeZone(timezone.to_string()))?;
        Ok(Self::with_timezone(converter, timezone, encoding))
    }

    pub fn with_timezone(converter: &'a dyn Converter, timezone: Tz, encoding: &'a str) -> Self {
        Self {
            converter,
            timezone,
            encoding,
            reference_date: None,
        }
    }

    /// Pin the date used to pick the zone offset for times of day.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// Build a context from the session section of a configuration.
    pub fn from_config(converter: &'a dyn Converter, config: &'a ConverterConfig) -> ConvertResult<Self> {
        Self::new(converter, &config.client_timezone, &config.client_encoding)
    }

    /// The active top-level converter.
    pub fn converter(&self) -> &'a dyn Converter {
        self.converter
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn timezone_name(&self) -> &'static str {
        self.timezone.name()
    }

    pub fn encoding(&self) -> &'a str {
        self.encoding
    }

    /// The pinned reference date, or today in the client zone.
    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().with_timezone(&self.timezone).date_naive())
    }

    /// Decode driver bytes as text in the client encoding.
    pub fn decode_text<'b>(&self, bytes: &'b [u8]) -> ConvertResult<Cow<'b, str>> {
        let encoding = self.encoding.to_ascii_uppercase().replace(['-', '_'], "");
        match encoding.as_str() {
            "UTF8" | "UNICODE" => std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|e| ConvertError::invalid("text", "<binary>", e.to_string())),
            "LATIN1" | "ISO88591" => Ok(Cow::Owned(bytes.iter().map(|&b| b as char).collect())),
            "SQLASCII" => Ok(String::from_utf8_lossy(bytes)),
            _ => Err(ConvertError::UnsupportedEncoding(self.encoding.to_string())),
        }
    }
}

impl fmt::Debug for ConverterContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterContext")
            .field("timezone", &self.timezone.name())
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::DefaultConverter;

    #[test]
    fn test_context_resolves_timezone() {
        let converter = DefaultConverter::new();
        let ctx = ConverterContext::new(&converter, "Europe/Paris", "UTF8").unwrap();
        assert_eq!(ctx.timezone_name(), "Europe/Paris");
        assert_eq!(ctx.encoding(), "UTF8");
    }

    #[test]
    fn test_context_rejects_unknown_timezone() {
        let converter = DefaultConverter::new();
        let err = ConverterContext::new(&converter, "Mars/Olympus", "UTF8").unwrap_err();
        assert!(matches!(err, ConvertError::InvalidTimeZone(tz) if tz == "Mars/Olympus"));
    }

    #[test]
    fn test_decode_text() {
        let converter = DefaultConverter::new();
        let utf8 = ConverterContext::new(&converter, "UTC", "UTF-8").unwrap();
        assert_eq!(utf8.decode_text("héllo".as_bytes()).unwrap(), "héllo");
        assert!(utf8.decode_text(&[0xff, 0xfe]).is_err());

        let latin1 = ConverterContext::new(&converter, "UTC", "LATIN1").unwrap();
        assert_eq!(latin1.decode_text(&[0x68, 0xe9]).unwrap(), "hé");

        let other = ConverterContext::new(&converter, "UTC", "EUC_JP").unwrap();
        assert!(matches!(
            other.decode_text(b"x"),
            Err(ConvertError::UnsupportedEncoding(_))
        ));
    }
}
