//! Interval values and conversions.
//!
//! Inbound literals come in three shapes depending on the server's
//! `IntervalStyle`: ISO-8601 (`P1Y2DT1M`), calendar words (`1 year 2 days`)
//! and clock time (`00:01:00`), the last two often combined. Outbound values
//! are always written as ISO-8601 with zero components dropped.

use nom::{
    IResult,
    character::complete::{alpha1, char, digit1, multispace0, multispace1, one_of},
    combinator::{all_consuming, opt, recognize},
    multi::{many0, many1, separated_list1},
    sequence::{pair, preceded, tuple},
};
use std::fmt;

use super::{Support, TypeMap, ValueConverter};
use crate::context::ConverterContext;
use crate::converter::TYPE_UNKNOWN;
use crate::error::{ConvertError, ConvertResult};
use crate::value::{Value, host};

const SQL_TYPE: &str = "interval";

/// Structured duration, each component kept as given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Interval {
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    /// Fraction of `seconds`, same sign.
    pub microseconds: i64,
}

impl Interval {
    pub fn is_zero(&self) -> bool {
        *self == Interval::default()
    }

    /// ISO-8601 duration with zero components dropped, `PT0S` when empty.
    pub fn to_iso8601(&self) -> String {
        let date_part = [(self.years, 'Y'), (self.months, 'M'), (self.days, 'D')];
        let time_part = [(self.hours, 'H'), (self.minutes, 'M')];

        let mut out = String::from("P");
        for (amount, designator) in date_part {
            if amount != 0 {
                out.push_str(&format!("{}{}", amount, designator));
            }
        }

        let mut clock = String::new();
        for (amount, designator) in time_part {
            if amount != 0 {
                clock.push_str(&format!("{}{}", amount, designator));
            }
        }
        if self.seconds != 0 || self.microseconds != 0 {
            clock.push_str(&format_seconds(self.seconds, self.microseconds));
            clock.push('S');
        }

        if !clock.is_empty() {
            out.push('T');
            out.push_str(&clock);
        }
        if out == "P" {
            out.push_str("T0S");
        }
        out
    }

    /// Parse any interval literal the server may send.
    ///
    /// Returns `None` for empty input.
    pub fn parse(input: &str) -> ConvertResult<Option<Self>> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        let has_space = input.contains(' ');
        let has_colon = input.contains(':');
        let interval = if input.starts_with('P') || input.starts_with("-P") {
            parse_iso8601(input)?
        } else if has_space && !has_colon {
            parse_calendar(input)?
        } else if has_colon && !has_space {
            parse_clock(input)?
        } else if has_space && has_colon {
            let split = input.rfind(' ').unwrap_or(0);
            let (calendar, clock) = (&input[..split], &input[split + 1..]);
            parse_calendar(calendar)?
                .checked_add(&parse_clock(clock)?)
                .ok_or_else(|| out_of_range(input))?
        } else {
            return Err(invalid(input, "unrecognised interval format"));
        };
        Ok(Some(interval))
    }

    /// Component-wise sum, `None` on overflow.
    pub fn checked_add(&self, other: &Interval) -> Option<Interval> {
        Some(Interval {
            years: self.years.checked_add(other.years)?,
            months: self.months.checked_add(other.months)?,
            days: self.days.checked_add(other.days)?,
            hours: self.hours.checked_add(other.hours)?,
            minutes: self.minutes.checked_add(other.minutes)?,
            seconds: self.seconds.checked_add(other.seconds)?,
            microseconds: self.microseconds.checked_add(other.microseconds)?,
        })
    }

    /// Every component negated, `None` if one is `i64::MIN`.
    pub fn checked_neg(&self) -> Option<Interval> {
        Some(Interval {
            years: self.years.checked_neg()?,
            months: self.months.checked_neg()?,
            days: self.days.checked_neg()?,
            hours: self.hours.checked_neg()?,
            minutes: self.minutes.checked_neg()?,
            seconds: self.seconds.checked_neg()?,
            microseconds: self.microseconds.checked_neg()?,
        })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn format_seconds(seconds: i64, microseconds: i64) -> String {
    let total = i128::from(seconds) * 1_000_000 + i128::from(microseconds);
    if total % 1_000_000 == 0 {
        return (total / 1_000_000).to_string();
    }
    let sign = if total < 0 { "-" } else { "" };
    let abs = total.unsigned_abs();
    let fraction = format!("{:06}", abs % 1_000_000);
    format!("{}{}.{}", sign, abs / 1_000_000, fraction.trim_end_matches('0'))
}

fn invalid(input: &str, reason: impl Into<String>) -> ConvertError {
    ConvertError::invalid(SQL_TYPE, input, reason)
}

fn out_of_range(input: &str) -> ConvertError {
    invalid(input, "interval out of range")
}

/// `*slot += amount * factor`, failing instead of overflowing.
fn accumulate(input: &str, slot: &mut i64, amount: i64, factor: i64) -> ConvertResult<()> {
    *slot = amount
        .checked_mul(factor)
        .and_then(|scaled| slot.checked_add(scaled))
        .ok_or_else(|| out_of_range(input))?;
    Ok(())
}

fn negated(input: &str, interval: Interval) -> ConvertResult<Interval> {
    interval.checked_neg().ok_or_else(|| out_of_range(input))
}

/// Split `[-]N[.F]` into whole seconds and microseconds of the same sign.
fn split_seconds(input: &str, number: &str) -> ConvertResult<(i64, i64)> {
    let negative = number.starts_with('-');
    let unsigned = number.trim_start_matches(['-', '+']);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let whole: i64 = whole.parse().map_err(|_| invalid(input, "invalid seconds"))?;
    let mut digits: String = fraction.chars().take(6).collect();
    while digits.len() < 6 {
        digits.push('0');
    }
    let micros: i64 = digits.parse().map_err(|_| invalid(input, "invalid fraction"))?;
    Ok(if negative { (-whole, -micros) } else { (whole, micros) })
}

fn parse_integer(input: &str, number: &str) -> ConvertResult<i64> {
    number
        .parse()
        .map_err(|_| invalid(input, format!("'{}' is not a whole number", number)))
}

fn signed_decimal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)
}

type Components<'a> = (Vec<(&'a str, char)>, Option<Vec<(&'a str, char)>>);

fn iso8601_components(input: &str) -> IResult<&str, Components<'_>> {
    let (input, _) = char('P')(input)?;
    let (input, date_part) = many0(pair(signed_decimal, one_of("YMWD")))(input)?;
    let (input, time_part) = opt(preceded(
        char('T'),
        many1(pair(signed_decimal, one_of("HMS"))),
    ))(input)?;
    Ok((input, (date_part, time_part)))
}

fn parse_iso8601(input: &str) -> ConvertResult<Interval> {
    let (negative, body) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    let (_, (date_part, time_part)) = all_consuming(iso8601_components)(body)
        .map_err(|_| invalid(input, "malformed ISO-8601 duration"))?;

    let mut interval = Interval::default();
    for (number, designator) in date_part {
        let amount = parse_integer(input, number)?;
        match designator {
            'Y' => accumulate(input, &mut interval.years, amount, 1)?,
            'M' => accumulate(input, &mut interval.months, amount, 1)?,
            'W' => accumulate(input, &mut interval.days, amount, 7)?,
            _ => accumulate(input, &mut interval.days, amount, 1)?,
        }
    }
    for (number, designator) in time_part.unwrap_or_default() {
        match designator {
            'H' => accumulate(input, &mut interval.hours, parse_integer(input, number)?, 1)?,
            'M' => accumulate(input, &mut interval.minutes, parse_integer(input, number)?, 1)?,
            _ => {
                let (seconds, micros) = split_seconds(input, number)?;
                accumulate(input, &mut interval.seconds, seconds, 1)?;
                accumulate(input, &mut interval.microseconds, micros, 1)?;
            }
        }
    }
    if negative {
        return negated(input, interval);
    }
    Ok(interval)
}

fn calendar_components(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    separated_list1(multispace1, pair(signed_decimal, preceded(multispace0, alpha1)))(input)
}

fn parse_calendar(input: &str) -> ConvertResult<Interval> {
    let mut text = input.trim();
    text = text.strip_prefix('@').map(str::trim_start).unwrap_or(text);
    let ago = text.ends_with(" ago");
    if ago {
        text = text[..text.len() - 4].trim_end();
    }

    let (_, components) = all_consuming(calendar_components)(text)
        .map_err(|_| invalid(input, "malformed calendar interval"))?;

    let mut interval = Interval::default();
    for (number, unit) in components {
        let (slot, factor) = match unit.to_ascii_lowercase().as_str() {
            "year" | "years" => (&mut interval.years, 1),
            "decade" | "decades" => (&mut interval.years, 10),
            "mon" | "mons" | "month" | "months" => (&mut interval.months, 1),
            "week" | "weeks" => (&mut interval.days, 7),
            "day" | "days" => (&mut interval.days, 1),
            "hour" | "hours" => (&mut interval.hours, 1),
            "min" | "mins" | "minute" | "minutes" => (&mut interval.minutes, 1),
            "sec" | "secs" | "second" | "seconds" => {
                let (seconds, micros) = split_seconds(input, number)?;
                accumulate(input, &mut interval.seconds, seconds, 1)?;
                accumulate(input, &mut interval.microseconds, micros, 1)?;
                continue;
            }
            other => return Err(invalid(input, format!("unknown interval unit '{}'", other))),
        };
        accumulate(input, slot, parse_integer(input, number)?, factor)?;
    }
    if ago {
        return negated(input, interval);
    }
    Ok(interval)
}

type Clock<'a> = (Option<char>, &'a str, char, &'a str, Option<&'a str>);

fn clock_components(input: &str) -> IResult<&str, Clock<'_>> {
    tuple((
        opt(one_of("+-")),
        digit1,
        char(':'),
        digit1,
        opt(preceded(
            char(':'),
            recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        )),
    ))(input)
}

fn parse_clock(input: &str) -> ConvertResult<Interval> {
    let (_, (sign, hours, _, minutes, seconds)) = all_consuming(clock_components)(input.trim())
        .map_err(|_| invalid(input, "malformed clock interval"))?;

    let (seconds, microseconds) = match seconds {
        Some(s) => split_seconds(input, s)?,
        None => (0, 0),
    };
    let interval = Interval {
        hours: parse_integer(input, hours)?,
        minutes: parse_integer(input, minutes)?,
        seconds,
        microseconds,
        ..Interval::default()
    };
    if sign == Some('-') {
        return negated(input, interval);
    }
    Ok(interval)
}

/// Converter for the `interval` type.
pub struct IntervalConverter {
    types: TypeMap,
}

impl Default for IntervalConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalConverter {
    pub fn new() -> Self {
        Self {
            types: TypeMap::new()
                .input(host::INTERVAL, &[SQL_TYPE])
                .output(SQL_TYPE, &[host::INTERVAL]),
        }
    }
}

impl ValueConverter for IntervalConverter {
    fn name(&self) -> &'static str {
        "interval"
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
        Ok(Interval::parse(value)?.map(Value::Interval).unwrap_or(Value::Null))
    }

    fn to_sql(
        &self,
        sql_type: &str,
        value: &Value,
        _ctx: &ConverterContext<'_>,
    ) -> ConvertResult<Option<String>> {
        match value {
            Value::Interval(interval) => Ok(Some(interval.to_iso8601())),
            other => Err(ConvertError::host(other.host_type(), sql_type)),
        }
    }

    fn guess_type(&self, value: &Value, _ctx: &ConverterContext<'_>) -> String {
        let guess = match value {
            Value::Interval(_) => SQL_TYPE,
            _ => TYPE_UNKNOWN,
        };
        guess.to_string()
    }
}
