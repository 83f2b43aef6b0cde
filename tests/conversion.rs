//! End-to-end conversion properties through the public API.

use chrono::{FixedOffset, NaiveDate, TimeZone};
use pretty_assertions::assert_eq;
use qail_convert::parser::{Element, escape_element, parse_array, write_array};
use qail_convert::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn paris<F: FnOnce(&dyn Converter, &ConverterContext<'_>)>(f: F) {
    let pgsql = PgSqlConverter::new();
    let ctx = ConverterContext::new(&pgsql, "Europe/Paris", "UTF8").unwrap();
    f(&pgsql, &ctx);
}

fn format_with_offset(value: &Value) -> String {
    match value {
        Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.6f%:z").to_string(),
        other => panic!("expected a datetime, got {:?}", other),
    }
}

#[test]
fn null_short_circuits_for_every_type() {
    paris(|converter, ctx| {
        for sql_type in ["int4", "text", "_int4", "row", "interval", "timestamptz", "no such type", TYPE_UNKNOWN] {
            assert_eq!(converter.to_sql(&Value::Null, sql_type, None, ctx).unwrap(), None);
            assert_eq!(
                converter.from_sql(sql_type, RawValue::Null, None, ctx).unwrap(),
                Value::Null,
                "{}",
                sql_type
            );
        }
    });
}

#[test]
fn primitive_round_trips() {
    paris(|converter, ctx| {
        let cases = vec![
            ("int4", Value::Int(-17)),
            ("bigint", Value::Int(9_007_199_254_740_993)),
            ("text", Value::from("a \"quoted\" {string}")),
            ("bool", Value::Bool(true)),
            ("bool", Value::Bool(false)),
            ("jsonb", Value::Json(serde_json::json!({"k": [1, "two", null]}))),
            ("bytea", Value::Bytes(b"\x00binary\xff".to_vec())),
        ];
        for (sql_type, value) in cases {
            let text = converter.to_sql(&value, sql_type, None, ctx).unwrap().unwrap();
            let back = converter.from_sql(sql_type, RawValue::Text(&text), None, ctx).unwrap();
            assert_eq!(back, value, "{}", sql_type);
        }

        for f in [0.1, -3.75, 1234.5678, f64::MIN_POSITIVE] {
            let text = converter.to_sql(&Value::Float(f), "float8", None, ctx).unwrap().unwrap();
            match converter.from_sql("float8", RawValue::Text(&text), None, ctx).unwrap() {
                Value::Float(back) => assert!((back - f).abs() <= f64::EPSILON * f.abs()),
                other => panic!("expected a float, got {:?}", other),
            }
        }
    });
}

#[test]
fn boolean_parsing_table() {
    paris(|converter, ctx| {
        for literal in ["", "f", "F", "false", "FALSE"] {
            assert_eq!(
                converter.from_sql("bool", RawValue::Text(literal), None, ctx).unwrap(),
                Value::Bool(false)
            );
        }
        for literal in ["t", "true", "y", "on", "2"] {
            assert_eq!(
                converter.from_sql("bool", RawValue::Text(literal), None, ctx).unwrap(),
                Value::Bool(true)
            );
        }
    });
}

#[test]
fn unresolvable_type_fails() {
    paris(|converter, ctx| {
        let err = converter
            .to_sql(&Value::from("value"), "this is a non existing type", None, ctx)
            .unwrap_err();
        assert!(err.is_type_conversion());
    });
}

#[test]
fn malformed_array_literals_fail() {
    assert!(matches!(parse_array("x"), Err(ConvertError::Malformed { .. })));
    assert!(matches!(
        parse_array("{unterminated"),
        Err(ConvertError::UnterminatedToken(_))
    ));
    assert!(matches!(
        parse_array(r#"{"open}"#),
        Err(ConvertError::UnterminatedString(_))
    ));
    assert_eq!(parse_array("").unwrap(), vec![]);
}

#[test]
fn special_characters_survive_an_array_round_trip() {
    let items: Vec<Element> = ["ah\\", "a'h", "a,h", "a}h", "a{h", "a\"h", "ah\""]
        .iter()
        .map(|s| Element::Text(s.to_string()))
        .collect();
    let written = write_array(&items, |leaf: &Element| match leaf {
        Element::Text(text) => Ok::<_, ConvertError>(escape_element(text)),
        _ => Ok("NULL".to_string()),
    })
    .unwrap();
    assert_eq!(parse_array(&written).unwrap(), items);
}

fn random_text(rng: &mut StdRng) -> String {
    const ALPHABET: &[char] = &['a', 'Z', '0', ' ', ',', '{', '}', '"', '\\', '\'', 'é', '\t'];
    let len = rng.random_range(0..8);
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())])
        .collect()
}

fn random_array(rng: &mut StdRng, depth: usize) -> Value {
    let len = rng.random_range(1..5);
    let items = (0..len)
        .map(|_| {
            if depth > 0 && rng.random_range(0..4) == 0 {
                random_array(rng, depth - 1)
            } else {
                Value::String(random_text(rng))
            }
        })
        .collect();
    Value::Array(items)
}

#[test]
fn text_arrays_round_trip_through_the_converter() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    paris(|converter, ctx| {
        for _ in 0..500 {
            let value = random_array(&mut rng, 3);
            let literal = converter.to_sql(&value, "_text", None, ctx).unwrap().unwrap();
            let back = converter.from_sql("text[]", RawValue::Text(&literal), None, ctx).unwrap();
            assert_eq!(back, value, "literal: {}", literal);
        }
    });
}

#[test]
fn empty_array_writes_braces() {
    paris(|converter, ctx| {
        assert_eq!(
            converter.to_sql(&Value::Array(vec![]), "_int4", None, ctx).unwrap(),
            Some("{}".to_string())
        );
        assert_eq!(
            converter.from_sql("_int4", RawValue::Text("{}"), None, ctx).unwrap(),
            Value::Array(vec![])
        );
    });
}

#[test]
fn interval_formatting_and_parsing() {
    paris(|converter, ctx| {
        let two_hours = Interval {
            hours: 2,
            ..Default::default()
        };
        assert_eq!(
            converter.to_sql(&Value::Interval(two_hours), "interval", None, ctx).unwrap(),
            Some("PT2H".to_string())
        );

        for literal in ["1 year 2 days 00:01:00", "P1Y2DT1M"] {
            let value = converter.from_sql("interval", RawValue::Text(literal), None, ctx).unwrap();
            assert_eq!(
                converter.to_sql(&value, "interval", None, ctx).unwrap(),
                Some("P1Y2DT1M".to_string()),
                "{}",
                literal
            );
        }
    });
}

#[test]
fn timezone_offsets_are_normalised_to_the_client_zone() {
    paris(|converter, ctx| {
        let shifted = converter
            .from_sql("timestamptz", RawValue::Text("2020-11-27 13:42:34.901965+00"), None, ctx)
            .unwrap();
        assert_eq!(format_with_offset(&shifted), "2020-11-27 14:42:34.901965+01:00");

        let local = converter
            .from_sql("timestamp", RawValue::Text("2020-11-27 13:42:34.901965"), None, ctx)
            .unwrap();
        assert_eq!(format_with_offset(&local), "2020-11-27 13:42:34.901965+01:00");
    });
}

#[test]
fn outbound_datetimes_are_written_in_the_client_zone() {
    paris(|converter, ctx| {
        let utc = FixedOffset::east_opt(0).unwrap();
        let value = Value::DateTime(utc.with_ymd_and_hms(2021, 7, 1, 10, 0, 0).unwrap());
        assert_eq!(
            converter.to_sql(&value, TYPE_UNKNOWN, None, ctx).unwrap(),
            Some("2021-07-01 12:00:00.000000+02:00".to_string())
        );

        let date = NaiveDate::from_ymd_opt(2021, 7, 1).unwrap();
        assert_eq!(
            converter.to_sql(&Value::Date(date), TYPE_UNKNOWN, None, ctx).unwrap(),
            Some("2021-07-01".to_string())
        );
    });
}

#[test]
fn rows_are_written_with_guessed_fields_and_read_untyped() {
    paris(|converter, ctx| {
        let row = Value::Array(vec![Value::Int(1), Value::Null, Value::from("x y")]);
        let literal = converter.to_sql(&row, "record", None, ctx).unwrap().unwrap();
        assert_eq!(literal, r#"("1",,"x y")"#);

        let back = converter.from_sql("record", RawValue::Text(&literal), None, ctx).unwrap();
        assert_eq!(
            back,
            Value::Array(vec![Value::from("1"), Value::Null, Value::from("x y")])
        );
    });
}

#[test]
fn mysql_booleans_are_tinyints() {
    let mysql = MySqlConverter::new();
    let ctx = ConverterContext::new(&mysql, "UTC", "UTF8").unwrap();
    assert_eq!(
        mysql.to_sql(&Value::Bool(true), "boolean", None, &ctx).unwrap(),
        Some("1".to_string())
    );
    assert_eq!(
        mysql.from_sql("boolean", RawValue::Text("0"), None, &ctx).unwrap(),
        Value::Bool(false)
    );
    assert!(!mysql.is_type_supported("_int4", &ctx));
}

#[test]
fn config_selects_the_converter_stack() {
    let config = ConverterConfig::from_toml_str(
        r#"
        [convert]
        client_timezone = "America/New_York"
        driver = "default"
        fallback = "string_cast"
        "#,
    )
    .unwrap();
    let converter = config.build_converter();
    let ctx = ConverterContext::from_config(converter.as_ref(), &config).unwrap();

    assert_eq!(ctx.timezone_name(), "America/New_York");
    assert_eq!(
        converter.to_sql(&Value::from("{a}"), "_text", None, &ctx).unwrap(),
        Some("{a}".to_string())
    );
}
