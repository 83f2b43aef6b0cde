//! PostgreSQL structured literal grammar.
//!
//! Reads and writes the brace-delimited array syntax and the parenthesised
//! row syntax. Any typo here breaks every array and composite column, so the
//! round-trip tests at the bottom are the contract.
//!
//! ```text
//! array   := '{' '}' | '{' element (',' element)* '}'
//! element := array | '"' quoted '"' | bare
//! quoted  := ( [^"\\] | '\\' any )*
//! bare    := [^,}]*            -- no escapes, NULL keyword is SQL NULL
//! ```
//!
//! Rows use `(` `)` as delimiters and treat an empty bare field as NULL.
//!
//! The parser is lenient: it does not check that siblings share a type or
//! that nested levels have equal lengths.

use crate::error::{ConvertError, ConvertResult};
use crate::value::Value;

/// One parsed element of a structured literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Null,
    Text(String),
    Nested(Vec<Element>),
}

/// Tree-shaped values the writer can walk.
pub trait Nested: Sized {
    /// Child sequence, or `None` for a leaf.
    fn children(&self) -> Option<&[Self]>;
}

impl Nested for Element {
    fn children(&self) -> Option<&[Self]> {
        match self {
            Element::Nested(items) => Some(items),
            _ => None,
        }
    }
}

impl Nested for Value {
    fn children(&self) -> Option<&[Self]> {
        self.as_array()
    }
}

#[derive(Clone, Copy)]
enum NullToken {
    /// Bare `NULL`, any case.
    Keyword,
    /// Bare empty field.
    Empty,
}

#[derive(Clone, Copy)]
struct Grammar {
    open: u8,
    close: u8,
    null: NullToken,
}

const ARRAY: Grammar = Grammar {
    open: b'{',
    close: b'}',
    null: NullToken::Keyword,
};

const ROW: Grammar = Grammar {
    open: b'(',
    close: b')',
    null: NullToken::Empty,
};

/// Parse an array literal such as `{1,"a b",{NULL}}`.
///
/// Empty input is an empty sequence.
pub fn parse_array(input: &str) -> ConvertResult<Vec<Element>> {
    parse_structured(input, ARRAY)
}

/// Parse a row literal such as `(1,"a b",)`.
pub fn parse_row(input: &str) -> ConvertResult<Vec<Element>> {
    parse_structured(input, ROW)
}

/// Deepest nesting accepted before a literal is rejected.
pub const MAX_DEPTH: usize = 64;

fn parse_structured(input: &str, grammar: Grammar) -> ConvertResult<Vec<Element>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let bytes = input.as_bytes();
    if bytes.len() < 2 || bytes[0] != grammar.open {
        return Err(ConvertError::malformed(
            0,
            format!("expected literal starting with '{}'", grammar.open as char),
        ));
    }

    let (items, end) = parse_level(input, 1, 1, grammar)?;
    if end != bytes.len() {
        return Err(ConvertError::malformed(end, "unexpected trailing content"));
    }
    Ok(items)
}

/// Parse one level starting right after its opening delimiter.
///
/// Returns the elements and the position right after the closing delimiter,
/// which the caller resumes from.
fn parse_level(
    input: &str,
    start: usize,
    depth: usize,
    grammar: Grammar,
) -> ConvertResult<(Vec<Element>, usize)> {
    let bytes = input.as_bytes();
    let opened_at = start - 1;
    if depth > MAX_DEPTH {
        return Err(ConvertError::malformed(opened_at, "nesting too deep"));
    }
    let mut items = Vec::new();

    let mut pos = skip_whitespace(bytes, start);
    if bytes.get(pos) == Some(&grammar.close) {
        return Ok((items, pos + 1));
    }

    loop {
        pos = skip_whitespace(bytes, pos);
        let Some(&c) = bytes.get(pos) else {
            return Err(ConvertError::UnterminatedToken(opened_at));
        };

        if c == grammar.open {
            let (nested, next) = parse_level(input, pos + 1, depth + 1, grammar)?;
            items.push(Element::Nested(nested));
            pos = next;
        } else if c == b'"' {
            let (text, next) = scan_quoted(input, pos)?;
            items.push(Element::Text(text));
            pos = next;
        } else {
            let (element, next) = scan_bare(input, pos, grammar)?;
            items.push(element);
            pos = next;
        }

        pos = skip_whitespace(bytes, pos);
        match bytes.get(pos) {
            Some(b',') => pos += 1,
            Some(&c) if c == grammar.close => return Ok((items, pos + 1)),
            Some(_) => {
                let found = input[pos..].chars().next().unwrap_or_default();
                return Err(ConvertError::malformed(
                    pos,
                    format!("expected ',' or '{}', found '{}'", grammar.close as char, found),
                ));
            }
            None => return Err(ConvertError::UnterminatedToken(opened_at)),
        }
    }
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Scan a quoted element starting at its opening quote.
fn scan_quoted(input: &str, start: usize) -> ConvertResult<(String, usize)> {
    let bytes = input.as_bytes();
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'"' => return Ok((unescape(&input[start + 1..pos]), pos + 1)),
            _ => pos += 1,
        }
    }
    Err(ConvertError::UnterminatedString(start))
}

/// Scan a bare element up to the next `,` or closing delimiter.
fn scan_bare(input: &str, start: usize, grammar: Grammar) -> ConvertResult<(Element, usize)> {
    let bytes = input.as_bytes();
    let mut pos = start;
    while pos < bytes.len() {
        let c = bytes[pos];
        if c == b',' || c == grammar.close {
            let token = input[start..pos].trim_end();
            let element = match grammar.null {
                NullToken::Keyword if token.eq_ignore_ascii_case("NULL") => Element::Null,
                NullToken::Empty if token.is_empty() => Element::Null,
                _ => Element::Text(token.to_string()),
            };
            return Ok((element, pos));
        }
        pos += 1;
    }
    Err(ConvertError::UnterminatedToken(start))
}

/// Resolve `\x` escapes left to right: the escaped character is kept as is.
fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Quote a leaf for use inside an array or row literal.
pub fn escape_element(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Write a nested sequence as an array literal.
///
/// Only the structure is written here; `leaf` is responsible for turning each
/// leaf into its final, already quoted, text.
pub fn write_array<T, E, F>(items: &[T], mut leaf: F) -> Result<String, E>
where
    T: Nested,
    F: FnMut(&T) -> Result<String, E>,
{
    let mut out = String::new();
    write_level(items, &mut leaf, &mut out)?;
    Ok(out)
}

fn write_level<T, E, F>(items: &[T], leaf: &mut F, out: &mut String) -> Result<(), E>
where
    T: Nested,
    F: FnMut(&T) -> Result<String, E>,
{
    out.push('{');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match item.children() {
            Some(children) => write_level(children, leaf, out)?,
            None => out.push_str(&leaf(item)?),
        }
    }
    out.push('}');
    Ok(())
}

/// Write a flat sequence as a row literal. Nested items are handed to `leaf`.
pub fn write_row<T, E, F>(items: &[T], leaf: F) -> Result<String, E>
where
    F: FnMut(&T) -> Result<String, E>,
{
    let fields = items.iter().map(leaf).collect::<Result<Vec<_>, E>>()?;
    Ok(format!("({})", fields.join(",")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::convert::Infallible;

    fn text(s: &str) -> Element {
        Element::Text(s.to_string())
    }

    fn write_elements(items: &[Element]) -> String {
        write_array(items, |leaf: &Element| {
            Ok::<_, Infallible>(match leaf {
                Element::Text(s) => escape_element(s),
                _ => "NULL".to_string(),
            })
        })
        .unwrap()
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_array("").unwrap(), vec![]);
        assert_eq!(parse_array("{}").unwrap(), vec![]);
    }

    #[test]
    fn test_parse_bare_elements() {
        assert_eq!(
            parse_array("{1,2,NULL,null,abc}").unwrap(),
            vec![text("1"), text("2"), Element::Null, Element::Null, text("abc")]
        );
    }

    #[test]
    fn test_parse_quoted_elements() {
        assert_eq!(
            parse_array(r#"{"a,b","NULL","","x\"y","back\\slash"}"#).unwrap(),
            vec![text("a,b"), text("NULL"), text(""), text("x\"y"), text("back\\slash")]
        );
    }

    #[test]
    fn test_parse_nested() {
        assert_eq!(
            parse_array("{{1,2},{3},{}}").unwrap(),
            vec![
                Element::Nested(vec![text("1"), text("2")]),
                Element::Nested(vec![text("3")]),
                Element::Nested(vec![]),
            ]
        );
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        assert_eq!(
            parse_array("{ 1 , \"two\" , { 3 } }").unwrap(),
            vec![text("1"), text("two"), Element::Nested(vec![text("3")])]
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_array("x"), Err(ConvertError::Malformed { .. })));
        assert!(matches!(parse_array("abc}"), Err(ConvertError::Malformed { .. })));
        assert!(matches!(parse_array("{a}b"), Err(ConvertError::Malformed { .. })));
        assert!(matches!(parse_array(r#"{"a"b}"#), Err(ConvertError::Malformed { .. })));
    }

    #[test]
    fn test_parse_unterminated() {
        assert!(matches!(
            parse_array("{unterminated"),
            Err(ConvertError::UnterminatedToken(1))
        ));
        assert!(matches!(
            parse_array(r#"{"abc"#),
            Err(ConvertError::UnterminatedString(1))
        ));
        assert!(matches!(
            parse_array(r#"{"abc\"}"#),
            Err(ConvertError::UnterminatedString(1))
        ));
        assert!(matches!(
            parse_array("{{1,2}"),
            Err(ConvertError::UnterminatedToken(0))
        ));
    }

    #[test]
    fn test_write_nested() {
        let items = vec![
            Element::Nested(vec![text("a"), Element::Null]),
            Element::Nested(vec![]),
        ];
        assert_eq!(write_elements(&items), r#"{{"a",NULL},{}}"#);
    }

    #[test]
    fn test_escape_round_trip_special_characters() {
        let items: Vec<Element> = ["ah\\", "a'h", "a,h", "a}h", "a{h", "a\"h", "ah\""]
            .iter()
            .map(|s| text(s))
            .collect();
        let literal = write_elements(&items);
        assert_eq!(literal, r#"{"ah\\","a'h","a,h","a}h","a{h","a\"h","ah\""}"#);
        assert_eq!(parse_array(&literal).unwrap(), items);
    }

    #[test]
    fn test_row_parse_and_write() {
        assert_eq!(
            parse_row(r#"(1,"a b",,"x\"y")"#).unwrap(),
            vec![text("1"), text("a b"), Element::Null, text("x\"y")]
        );
        assert_eq!(parse_row("()").unwrap(), vec![]);
        assert!(matches!(parse_row("(1,2"), Err(ConvertError::UnterminatedToken(3))));

        let written = write_row(&["1", "a b"], |s| Ok::<_, Infallible>(escape_element(s))).unwrap();
        assert_eq!(written, r#"("1","a b")"#);
    }

    const ALPHABET: &[char] = &[
        'a', 'Z', '0', ' ', ',', '{', '}', '(', ')', '"', '\\', '\'', 'N', 'U', 'L', 'é', '\t',
    ];

    fn random_text(rng: &mut StdRng) -> String {
        let len = rng.random_range(0..8);
        (0..len)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())])
            .collect()
    }

    fn random_elements(rng: &mut StdRng, depth: usize) -> Vec<Element> {
        let len = rng.random_range(0..5);
        (0..len)
            .map(|_| match rng.random_range(0..10) {
                0 => Element::Null,
                1 | 2 if depth < 3 => Element::Nested(random_elements(rng, depth + 1)),
                _ => Element::Text(random_text(rng)),
            })
            .collect()
    }

    #[test]
    fn test_random_round_trip() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..2000 {
            let items = random_elements(&mut rng, 0);
            let literal = write_elements(&items);
            assert_eq!(parse_array(&literal).unwrap(), items, "literal: {}", literal);
        }
    }

    #[test]
    fn test_rejects_excessive_nesting() {
        let deep = format!("{}{}", "{".repeat(200_000), "}".repeat(200_000));
        assert!(matches!(parse_array(&deep), Err(ConvertError::Malformed { .. })));

        let deepest = format!("{}{}", "{".repeat(MAX_DEPTH), "}".repeat(MAX_DEPTH));
        assert!(parse_array(&deepest).is_ok());
    }
}
