//! HTTP header fields
//!
//! [`Headers`] keeps one value per field name. Names are compared without
//! ASCII case sensitivity and a repeated name is merged into the existing
//! entry as a comma separated list.
use std::io::Write;

use crate::{error::ParseError, parse::fields::FieldPairRef};

/// Outcome of a single [`Headers::parse()`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseProgress {
    /// Number of bytes consumed from the front of the input.
    pub consumed: usize,
    /// Whether the blank line ending the header section was consumed.
    pub done: bool,
}

impl ParseProgress {
    fn want_data() -> Self {
        Self {
            consumed: 0,
            done: false,
        }
    }
}

/// Mapping of header field names to values.
///
/// Entries are kept in insertion order, but the rendering order is not part of
/// the wire contract. Equality ignores both entry order and name case.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a value, appending it as `", " + value` if the name already exists.
    pub fn set<N: Into<String>, V: AsRef<str>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.as_ref();

        if let Some(existing) = self.get_mut(&name) {
            existing.push_str(", ");
            existing.push_str(value);
        } else {
            self.fields.push((name, value.to_string()));
        }
    }

    /// Sets a value, replacing any existing value.
    pub fn set_override<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();

        if let Some(index) = self.position(&name) {
            self.fields[index] = (name, value);
        } else {
            self.fields.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .map(|index| self.fields[index].1.as_str())
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut String> {
        self.position(name)
            .map(|index| &mut self.fields[index].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name)
            .map(|index| self.fields.remove(index).1)
    }

    /// Returns the value parsed as a `u64` if the field is present.
    pub fn get_u64_strict(&self, name: &str) -> Option<Result<u64, std::num::ParseIntError>> {
        self.get(name).map(crate::parse::parse_u64_strict)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(n, _v)| n.eq_ignore_ascii_case(name))
    }

    /// Consumes at most one field line from the front of `data`.
    ///
    /// When no complete line is available, zero bytes are consumed so the
    /// caller can append more input and call again. An empty line marks the
    /// end of the header section. Parsed names are stored in lowercase.
    pub fn parse(&mut self, data: &[u8]) -> Result<ParseProgress, ParseError> {
        let Some((line, consumed)) = crate::parse::crlf_line(data) else {
            return Ok(ParseProgress::want_data());
        };

        if line.is_empty() {
            return Ok(ParseProgress {
                consumed,
                done: true,
            });
        }

        let FieldPairRef { name, value } = crate::parse::fields::field_line(line)?;
        let name = std::str::from_utf8(name)?.to_ascii_lowercase();
        let value = std::str::from_utf8(value)?;

        tracing::trace!(%name, value, "parsed field");
        self.set(name, value);

        Ok(ParseProgress {
            consumed,
            done: false,
        })
    }

    /// Writes each field as a `name: value` line followed by a blank line.
    pub fn serialize<W: Write>(&self, mut buf: W) -> std::io::Result<()> {
        for (name, value) in &self.fields {
            buf.write_all(name.as_bytes())?;
            buf.write_all(b": ")?;
            buf.write_all(value.as_bytes())?;
            buf.write_all(b"\r\n")?;
        }

        buf.write_all(b"\r\n")?;

        Ok(())
    }
}

impl PartialEq for Headers {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl Eq for Headers {}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl<N: Into<String>, V: AsRef<str>> Extend<(N, V)> for Headers {
    fn extend<T: IntoIterator<Item = (N, V)>>(&mut self, iter: T) {
        for (name, value) in iter {
            self.set(name, value);
        }
    }
}

impl<N: Into<String>, V: AsRef<str>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Self::new();
        headers.extend(iter);
        headers
    }
}
