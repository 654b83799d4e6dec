//! Parsing utilities.
use nom::{
    IResult, Parser,
    bytes::complete::{tag, take_until},
    sequence::terminated,
};

use crate::error::{ParseError, ParseErrorKind};

pub(crate) mod fields;
pub(crate) mod status_line;

/// Splits off one CRLF terminated line.
///
/// Returns the line without its CRLF and the number of bytes consumed, or
/// `None` when the input does not contain a CRLF yet.
pub fn crlf_line(input: &[u8]) -> Option<(&[u8], usize)> {
    let result: IResult<&[u8], &[u8]> = terminated(take_until("\r\n"), tag("\r\n")).parse(input);

    result
        .ok()
        .map(|(remain, line)| (line, input.len() - remain.len()))
}

/// Returns whether the value is a valid name in a HTTP field.
pub fn validate_field_name(value: &[u8]) -> Result<(), ParseError> {
    match nom::combinator::all_consuming(fields::token).parse(value) {
        Ok((_input, _output)) => Ok(()),
        Err(_error) => Err(ParseError::new(ParseErrorKind::InvalidFieldName)
            .with_snippet(value.escape_ascii().to_string())),
    }
}

/// Parses a decimal `u64` consisting only of ASCII digits.
///
/// Unlike [`str::parse()`], a leading `+` is rejected.
pub fn parse_u64_strict(value: &str) -> Result<u64, std::num::ParseIntError> {
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return "?".parse();
    }

    value.parse()
}
