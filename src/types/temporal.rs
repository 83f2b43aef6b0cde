//! Date and time conversions.
//!
//! Timestamps arrive either with an explicit UTC offset (`timestamptz` output)
//! or without one (`timestamp` output). Offset-bearing literals are moved to
//! the client zone, which keeps the instant. Offset-less literals are taken as
//! wall-clock time in the client zone, no arithmetic involved.

use chrono::format::{Parsed, StrftimeItems, parse};
use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone,
};
use chrono_tz::Tz;

use super::{Support, TypeMap, ValueConverter};
use crate::context::ConverterContext;
use crate::converter::TYPE_UNKNOWN;
use crate::error::{ConvertError, ConvertResult};
use crate::value::{Value, host};

const DATE: &[&str] = &["date"];
const TIME: &[&str] = &["time", "time without time zone"];
const TIMETZ: &[&str] = &["timetz", "time with time zone"];
const TIMESTAMP: &[&str] = &["timestamp", "timestamp without time zone", "datetime"];
const TIMESTAMPTZ: &[&str] = &["timestamptz", "timestamp with time zone"];

/// Timestamp formats, tried in order. The first one that parses wins.
const TIMESTAMP_FORMATS: &[(&str, bool)] = &[
    ("%Y-%m-%d %H:%M:%S%.f%#z", true),
    ("%Y-%m-%d %H:%M:%S%.f", false),
    ("%Y-%m-%d %H:%M:%S%#z", true),
    ("%Y-%m-%d %H:%M:%S", false),
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f%#z", "%H:%M:%S%.f", "%H:%M:%S%#z", "%H:%M:%S"];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
}

impl Kind {
    fn of(sql_type: &str) -> Option<Self> {
        if DATE.contains(&sql_type) {
            Some(Kind::Date)
        } else if TIME.contains(&sql_type) {
            Some(Kind::Time)
        } else if TIMETZ.contains(&sql_type) {
            Some(Kind::TimeTz)
        } else if TIMESTAMP.contains(&sql_type) {
            Some(Kind::Timestamp)
        } else if TIMESTAMPTZ.contains(&sql_type) {
            Some(Kind::TimestampTz)
        } else {
            None
        }
    }

    fn output_format(self) -> &'static str {
        match self {
            Kind::Date => DATE_FORMAT,
            Kind::Time => "%H:%M:%S%.6f",
            Kind::TimeTz => "%H:%M:%S%.6f%:z",
            Kind::Timestamp => "%Y-%m-%d %H:%M:%S%.6f",
            Kind::TimestampTz => "%Y-%m-%d %H:%M:%S%.6f%:z",
        }
    }
}

/// Converter for `date`, `time[tz]` and `timestamp[tz]`.
pub struct DateConverter {
    types: TypeMap,
}

impl Default for DateConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl DateConverter {
    pub fn new() -> Self {
        let all: Vec<&'static str> = [DATE, TIME, TIMETZ, TIMESTAMP, TIMESTAMPTZ].concat();
        let date_targets: Vec<&'static str> = [DATE, TIMESTAMP, TIMESTAMPTZ].concat();
        let time_targets: Vec<&'static str> = [TIME, TIMETZ].concat();
        let types = TypeMap::new()
            .input(host::DATETIME, &all)
            .input(host::DATE, &date_targets)
            .input(host::TIME, &time_targets)
            .outputs(DATE, &[host::DATE])
            .outputs(&time_targets, &[host::TIME])
            .outputs(TIMESTAMP, &[host::DATETIME])
            .outputs(TIMESTAMPTZ, &[host::DATETIME]);
        Self { types }
    }
}

impl ValueConverter for DateConverter {
    fn name(&self) -> &'static str {
        "date"
    }

    fn support(&self) -> Support<'_> {
        Support::Static(&self.types)
    }

    fn from_sql(
        &self,
        sql_type: &str,
        value: &str,
        _host_type: Option<&str>,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Value> {
        let value = value.trim();
        match Kind::of(sql_type) {
            Some(Kind::Date) => NaiveDate::parse_from_str(value, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| ConvertError::invalid(sql_type, value, e.to_string())),
            Some(Kind::Time | Kind::TimeTz) => parse_time(sql_type, value, ctx).map(Value::Time),
            Some(Kind::Timestamp | Kind::TimestampTz) => {
                parse_timestamp(sql_type, value, ctx.timezone()).map(Value::DateTime)
            }
            None => Err(ConvertError::UnsupportedType(sql_type.to_string())),
        }
    }

    fn to_sql(
        &self,
        sql_type: &str,
        value: &Value,
        ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Option<String>> {
        let kind = Kind::of(sql_type).ok_or_else(|| ConvertError::UnsupportedType(sql_type.to_string()))?;
        let tz = ctx.timezone();
        let formatted = match value {
            // Work on the converted copy, never on the caller's value.
            Value::DateTime(dt) => dt.with_timezone(&tz).format(kind.output_format()).to_string(),
            Value::Date(date) => match kind {
                Kind::Date => date.format(DATE_FORMAT).to_string(),
                Kind::Timestamp | Kind::TimestampTz => {
                    let midnight = attach_zone(sql_type, date.and_time(NaiveTime::MIN), tz)?;
                    midnight.format(kind.output_format()).to_string()
                }
                Kind::Time | Kind::TimeTz => return Err(ConvertError::host(value.host_type(), sql_type)),
            },
            Value::Time(time) => match kind {
                Kind::Time | Kind::TimeTz => time.format(Kind::Time.output_format()).to_string(),
                _ => return Err(ConvertError::host(value.host_type(), sql_type)),
            },
            other => return Err(ConvertError::host(other.host_type(), sql_type)),
        };
        Ok(Some(formatted))
    }

    fn guess_type(&self, value: &Value, _ctx: &ConverterContext<'_>) -> String {
        let guess = match value {
            Value::DateTime(_) => "timestamptz",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            _ => TYPE_UNKNOWN,
        };
        guess.to_string()
    }
}

fn parse_timestamp(sql_type: &str, value: &str, tz: Tz) -> ConvertResult<DateTime<FixedOffset>> {
    for (format, with_offset) in TIMESTAMP_FORMATS {
        if *with_offset {
            if let Ok(dt) = DateTime::parse_from_str(value, format) {
                let local = dt.with_timezone(&tz);
                return Ok(local.with_timezone(&local.offset().fix()));
            }
        } else if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return attach_zone(sql_type, naive, tz);
        }
    }
    Err(ConvertError::invalid(sql_type, value, "no accepted date/time format matches"))
}

/// Give a wall-clock time the client zone without shifting it.
fn attach_zone(sql_type: &str, naive: NaiveDateTime, tz: Tz) -> ConvertResult<DateTime<FixedOffset>> {
    let local = tz.from_local_datetime(&naive).earliest().ok_or_else(|| {
        ConvertError::invalid(
            sql_type,
            naive.to_string(),
            format!("local time does not exist in {}", tz.name()),
        )
    })?;
    Ok(local.with_timezone(&local.offset().fix()))
}

fn parse_time(sql_type: &str, value: &str, ctx: &ConverterContext<'_>) -> ConvertResult<NaiveTime> {
    for format in TIME_FORMATS {
        let mut parsed = Parsed::new();
        if parse(&mut parsed, value, StrftimeItems::new(format)).is_err() {
            continue;
        }
        let Ok(time) = parsed.to_naive_time() else {
            continue;
        };
        return Ok(match parsed.to_fixed_offset() {
            Ok(offset) => shift_time(time, offset, ctx.timezone(), ctx.reference_date()),
            Err(_) => time,
        });
    }
    Err(ConvertError::invalid(sql_type, value, "no accepted time format matches"))
}

/// Move a time of day from `offset` to the offset `tz` has at the start
/// (UTC) of `date`.
fn shift_time(time: NaiveTime, offset: FixedOffset, tz: Tz, date: NaiveDate) -> NaiveTime {
    let client = tz.offset_from_utc_datetime(&date.and_time(NaiveTime::MIN)).fix();
    let delta = client.local_minus_utc() - offset.local_minus_utc();
    time.overflowing_add_signed(TimeDelta::seconds(i64::from(delta))).0
}
