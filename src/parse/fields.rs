use nom::{
    IResult, Parser,
    bytes::complete::{tag, take_till, take_while1},
    combinator::rest,
    sequence::separated_pair,
};

use crate::error::{ParseError, ParseErrorKind};

pub struct FieldPairRef<'a> {
    pub name: &'a [u8],
    pub value: &'a [u8],
}

impl<'a> From<(&'a [u8], &'a [u8])> for FieldPairRef<'a> {
    fn from(value: (&'a [u8], &'a [u8])) -> Self {
        Self {
            name: value.0,
            value: value.1,
        }
    }
}

/// Splits a single field line (without its CRLF) into a validated name and
/// a trimmed value.
pub fn field_line(input: &[u8]) -> Result<FieldPairRef<'_>, ParseError> {
    let (name, value) = match raw_field_pair(input) {
        Ok((_remain, pair)) => pair,
        Err(_error) => {
            return Err(ParseError::new(ParseErrorKind::MissingColon)
                .with_snippet(snippet(input)));
        }
    };

    if name.last().is_some_and(|b| is_whitespace(*b)) {
        return Err(ParseError::new(ParseErrorKind::WhitespaceBeforeColon)
            .with_snippet(snippet(name)));
    }

    let name = name.trim_ascii_start();
    crate::parse::validate_field_name(name)?;

    Ok(FieldPairRef {
        name,
        value: value.trim_ascii(),
    })
}

fn raw_field_pair(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    separated_pair(take_till(|b: u8| b == b':'), tag(":"), rest).parse(input)
}

pub fn token(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(is_tchar)(input)
}

pub fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn is_whitespace(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

fn snippet(input: &[u8]) -> String {
    input[0..input.len().min(32)].escape_ascii().to_string()
}
