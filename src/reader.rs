//! Reads source text into [`Form`]s, the syntax tree before special-form analysis.
//!
//! The reader knows only the surface syntax:
//!
//! - numbers (`42`, `-1.5e3`, `0xff`), strings with `\n \t \r \\ \"` escapes
//! - keywords (`:name`), read as strings
//! - symbols, lists `(...)`, arrays `[...]` and objects `{...}`
//! - regexp literals `#"a+"gi` and function shorthands `#(+ %1 1)`
//!
//! Commas are whitespace and `;` starts a comment running to the end of the line.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, hex_digit1, not_line_ending, one_of, satisfy},
    combinator::{cut, not, opt, recognize, value},
    error::ErrorKind,
    multi::many0,
    sequence::preceded,
};

use crate::{MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Characters that may appear in a symbol besides letters and digits
pub const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?&%$_.'^|";

/// Flags accepted after a regexp literal
const REGEXP_FLAGS: &str = "gimsux";

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    Number(f64),
    String(String),
    /// `:name`, without the colon
    Keyword(String),
    Symbol(String),
    List(Vec<Form>),
    Array(Vec<Form>),
    Object(Vec<Form>),
    Regexp { source: String, flags: String },
    /// `#(...)`: the list inside
    FnShorthand(Vec<Form>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub kind: FormKind,
    /// Byte offset of the form in the source
    pub offset: usize,
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

fn error<T>(input: &str, kind: ErrorKind) -> IResult<&str, T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// An error inside a form that has already started; no other form is tried
fn failure<T>(input: &str, kind: ErrorKind) -> IResult<&str, T> {
    Err(nom::Err::Failure(nom::error::Error::new(input, kind)))
}

/// Whitespace (commas included) and comments
fn skip(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            take_while1(|c: char| c.is_whitespace() || c == ','),
            recognize((char(';'), not_line_ending)),
        ))),
    )
    .parse(input)
}

fn parse_hexadecimal(input: &str) -> IResult<&str, f64> {
    let (rest, (sign, digits)) = (opt(one_of("+-")), preceded(tag_no_case("0x"), hex_digit1)).parse(input)?;
    match i64::from_str_radix(digits, 16) {
        Ok(n) if sign == Some('-') => Ok((rest, -(n as f64))),
        Ok(n) => Ok((rest, n as f64)),
        Err(_) => error(input, ErrorKind::HexDigit),
    }
}

fn parse_decimal(input: &str) -> IResult<&str, f64> {
    let (rest, text) = recognize((
        opt(one_of("+-")),
        digit1,
        opt((char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;
    match text.parse::<f64>() {
        Ok(n) => Ok((rest, n)),
        Err(_) => error(input, ErrorKind::Float),
    }
}

/// A number must not run into a symbol: `1abc` is no number
fn parse_number(input: &str) -> IResult<&str, f64> {
    let (rest, n) = alt((parse_hexadecimal, parse_decimal)).parse(input)?;
    let (rest, _) = not(satisfy(is_symbol_char)).parse(rest)?;
    Ok((rest, n))
}

fn parse_symbol(input: &str) -> IResult<&str, String> {
    let (rest, symbol) = take_while1(is_symbol_char).parse(input)?;
    if symbol.starts_with(|c: char| c.is_ascii_digit()) {
        return error(input, ErrorKind::Alpha);
    }
    Ok((rest, symbol.to_owned()))
}

fn parse_keyword(input: &str) -> IResult<&str, String> {
    let (rest, name) = preceded(char(':'), take_while1(is_symbol_char)).parse(input)?;
    Ok((rest, name.to_owned()))
}

fn parse_string(input: &str) -> IResult<&str, String> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut chars = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), chars)),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => chars.push('\n'),
                    Some('t') => chars.push('\t'),
                    Some('r') => chars.push('\r'),
                    Some('\\') => chars.push('\\'),
                    Some('"') => chars.push('"'),
                    Some(_) => return failure(remaining, ErrorKind::Char),
                    // Backslash at the end of the input
                    None => return failure(char_iter.as_str(), ErrorKind::Char),
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                chars.push(ch);
                remaining = char_iter.as_str();
            }
            // Unterminated string
            None => return failure(remaining, ErrorKind::Char),
        }
    }
}

/// `#"source"flags`. Backslashes are kept for the regexp engine, except in `\"`.
fn parse_regexp(input: &str) -> IResult<&str, (String, String)> {
    let (mut remaining, _) = tag("#\"").parse(input)?;
    let mut source = String::new();
    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => {
                let (rest, flags) = take_while(|c: char| REGEXP_FLAGS.contains(c)).parse(char_iter.as_str())?;
                return Ok((rest, (source, flags.to_owned())));
            }
            Some('\\') => {
                match char_iter.next() {
                    Some('"') => source.push('"'),
                    Some(c) => {
                        source.push('\\');
                        source.push(c);
                    }
                    None => return failure(char_iter.as_str(), ErrorKind::Char),
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                source.push(ch);
                remaining = char_iter.as_str();
            }
            None => return failure(remaining, ErrorKind::Char),
        }
    }
}

/// Reads forms with their offsets relative to the whole source
struct Reader<'a> {
    source: &'a str,
}

impl<'a> Reader<'a> {
    fn offset(&self, input: &str) -> usize {
        self.source.len() - input.len()
    }

    /// Forms between `open` and `close`. Once `open` is read the form must complete.
    fn parse_delimited(
        &self,
        input: &'a str,
        open: &'static str,
        close: char,
        depth: usize,
    ) -> IResult<&'a str, Vec<Form>> {
        let (input, _) = tag(open).parse(input)?;
        let (input, forms) = many0(preceded(skip, |i| self.parse_form(i, depth + 1))).parse(input)?;
        let (input, _) = cut(preceded(skip, char(close))).parse(input)?;
        Ok((input, forms))
    }

    fn parse_form(&self, input: &'a str, depth: usize) -> IResult<&'a str, Form> {
        if depth >= MAX_PARSE_DEPTH {
            return failure(input, ErrorKind::TooLarge);
        }
        let offset = self.offset(input);
        let (rest, kind) = alt((
            |i| self.parse_delimited(i, "(", ')', depth).map(|(i, forms)| (i, FormKind::List(forms))),
            |i| self.parse_delimited(i, "[", ']', depth).map(|(i, forms)| (i, FormKind::Array(forms))),
            |i| self.parse_delimited(i, "{", '}', depth).map(|(i, forms)| (i, FormKind::Object(forms))),
            |i| {
                self.parse_delimited(i, "#(", ')', depth)
                    .map(|(i, forms)| (i, FormKind::FnShorthand(forms)))
            },
            |i| parse_regexp(i).map(|(i, (source, flags))| (i, FormKind::Regexp { source, flags })),
            |i| parse_number(i).map(|(i, n)| (i, FormKind::Number(n))),
            |i| parse_string(i).map(|(i, s)| (i, FormKind::String(s))),
            |i| parse_keyword(i).map(|(i, k)| (i, FormKind::Keyword(k))),
            |i| parse_symbol(i).map(|(i, s)| (i, FormKind::Symbol(s))),
        ))
        .parse(input)?;
        Ok((rest, Form { kind, offset }))
    }
}

fn to_parse_error(source: &str, err: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = source.len() - e.input.len();
            let char_position = source[..position].chars().count();
            let (kind, message) = match e.code {
                ErrorKind::TooLarge => (
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                ),
                _ if e.input.trim().is_empty() => {
                    (ParseErrorKind::Incomplete, "Unexpected end of input".to_owned())
                }
                _ => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Invalid syntax at position {char_position}"),
                ),
            };
            ParseError::with_context(kind, message, source, char_position)
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input")
        }
    }
}

/// Read every top-level form of `source`
pub fn read(source: &str) -> Result<Vec<Form>, ParseError> {
    let reader = Reader { source };
    let (rest, forms) = many0(preceded(skip, |i| reader.parse_form(i, 0)))
        .parse(source)
        .map_err(|e| to_parse_error(source, e))?;
    let (rest, ()) = skip(rest).map_err(|e| to_parse_error(source, e))?;
    if rest.is_empty() {
        return Ok(forms);
    }
    // Either a stray closing delimiter or a form that failed part way; reading the form
    // again reports the innermost failure
    let err = match reader.parse_form(rest, 0) {
        Err(e) => to_parse_error(source, e),
        Ok(_) => ParseError::with_context(
            ParseErrorKind::InvalidSyntax,
            "Unexpected input",
            source,
            source[..reader.offset(rest)].chars().count(),
        ),
    };
    Err(err)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<FormKind> {
        read(source).unwrap().into_iter().map(|form| form.kind).collect()
    }

    fn sym(s: &str) -> FormKind {
        FormKind::Symbol(s.to_owned())
    }

    fn form_kinds(forms: &[Form]) -> Vec<FormKind> {
        forms.iter().map(|form| form.kind.clone()).collect()
    }

    #[test]
    fn test_read_atoms() {
        let test_cases = vec![
            ("42", FormKind::Number(42.0)),
            ("-1.5", FormKind::Number(-1.5)),
            ("+7", FormKind::Number(7.0)),
            ("1e3", FormKind::Number(1000.0)),
            ("2.5E-1", FormKind::Number(0.25)),
            ("0xff", FormKind::Number(255.0)),
            ("-0x10", FormKind::Number(-16.0)),
            ("\"a\\n\\\"b\\\"\"", FormKind::String("a\n\"b\"".to_owned())),
            (":key-word", FormKind::Keyword("key-word".to_owned())),
            ("-", sym("-")),
            ("-x", sym("-x")),
            ("empty?", sym("empty?")),
            ("&let", sym("&let")),
            ("%1", sym("%1")),
            ("POSITIVE_INFINITY", sym("POSITIVE_INFINITY")),
            (
                "#\"a\\d+\\\"\"gi",
                FormKind::Regexp {
                    source: "a\\d+\"".to_owned(),
                    flags: "gi".to_owned(),
                },
            ),
        ];

        for (i, (source, expected)) in test_cases.into_iter().enumerate() {
            assert_eq!(kinds(source), vec![expected], "Test case {} failed: {source}", i + 1);
        }
    }

    #[test]
    fn test_read_collections() {
        let forms = read("(+ 1 [2, 3] {:a x}) ; trailing comment\n#(inc %)").unwrap();
        assert_eq!(forms.len(), 2);
        let FormKind::List(items) = &forms[0].kind else {
            panic!("expected a list, got {:?}", forms[0]);
        };
        assert_eq!(items[0].kind, sym("+"));
        assert_eq!(
            items[2].kind,
            FormKind::Array(vec![
                Form { kind: FormKind::Number(2.0), offset: 6 },
                Form { kind: FormKind::Number(3.0), offset: 9 },
            ])
        );
        let FormKind::Object(entries) = &items[3].kind else {
            panic!("expected an object, got {:?}", items[3]);
        };
        assert_eq!(form_kinds(entries), vec![FormKind::Keyword("a".to_owned()), sym("x")]);
        let FormKind::FnShorthand(body) = &forms[1].kind else {
            panic!("expected a shorthand, got {:?}", forms[1]);
        };
        assert_eq!(form_kinds(body), vec![sym("inc"), sym("%")]);
        assert_eq!(forms[1].offset, 39);
        assert!(read("").unwrap().is_empty());
        assert!(read("  ; only a comment").unwrap().is_empty());
    }

    #[test]
    fn test_read_errors() {
        let test_cases = vec![
            ("(+ 1 2", ParseErrorKind::Incomplete),
            ("\"unterminated", ParseErrorKind::Incomplete),
            ("[1 2", ParseErrorKind::Incomplete),
            ("(+ 1 2))", ParseErrorKind::InvalidSyntax),
            ("1abc", ParseErrorKind::InvalidSyntax),
            ("\"bad \\q escape\"", ParseErrorKind::InvalidSyntax),
            ("(a #b)", ParseErrorKind::InvalidSyntax),
        ];
        for (i, (source, expected)) in test_cases.into_iter().enumerate() {
            let err = read(source).unwrap_err();
            assert_eq!(err.kind, expected, "Test case {} failed: {source}: {err}", i + 1);
        }

        let deep = format!("{}1{}", "(".repeat(MAX_PARSE_DEPTH + 1), ")".repeat(MAX_PARSE_DEPTH + 1));
        assert_eq!(read(&deep).unwrap_err().kind, ParseErrorKind::TooDeeplyNested);
        let shallow = format!("{}1{}", "[".repeat(MAX_PARSE_DEPTH - 1), "]".repeat(MAX_PARSE_DEPTH - 1));
        assert!(read(&shallow).is_ok());
    }
}
