//! HTTP response writing
//!
//! [`ResponseWriter`] renders a response onto any [`Write`] while enforcing the
//! order of the status line, header section and body. An operation called
//! out of order writes nothing and returns an error for which
//! [`GeneralError::is_out_of_order()`] is `true`.
use std::{fmt::Display, io::Write};

use crate::{
    error::{GeneralError, ProtocolError},
    headers::Headers,
};

/// HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: Self = Self(200);
    pub const BAD_REQUEST: Self = Self(400);
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the reason phrase for the codes this crate knows about.
    pub fn reason_phrase(&self) -> Option<&'static str> {
        match *self {
            Self::OK => Some("OK"),
            Self::BAD_REQUEST => Some("Bad Request"),
            Self::INTERNAL_SERVER_ERROR => Some("Internal Server Error"),
            _ => None,
        }
    }
}

impl From<u16> for StatusCode {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Progress of a [`ResponseWriter`].
///
/// The state only moves forward:
/// `Initial → StatusLineWritten → HeadersWritten → BodyWritten`, or through
/// `ChunkedBodyDone` before `BodyWritten` when trailers are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WriterState {
    #[default]
    Initial,
    StatusLineWritten,
    HeadersWritten,
    ChunkedBodyDone,
    BodyWritten,
}

/// Writes a HTTP/1.1 response in order.
#[derive(Debug)]
pub struct ResponseWriter<W: Write> {
    output: W,
    state: WriterState,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            output,
            state: WriterState::Initial,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn get_ref(&self) -> &W {
        &self.output
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    fn expect_state(
        &self,
        expected: WriterState,
        operation: &'static str,
    ) -> Result<(), GeneralError> {
        if self.state == expected {
            Ok(())
        } else {
            tracing::debug!(operation, state = ?self.state, "writer operation out of order");
            Err(ProtocolError::out_of_order(operation, self.state).into())
        }
    }

    fn transition(&mut self, state: WriterState) {
        tracing::trace!(from = ?self.state, to = ?state, "writer state");
        self.state = state;
    }

    /// Writes `HTTP/1.1 <code>[ <reason>]` and a CRLF.
    ///
    /// The reason phrase is omitted for codes without a known phrase.
    pub fn write_status_line(&mut self, status_code: StatusCode) -> Result<(), GeneralError> {
        self.expect_state(WriterState::Initial, "write_status_line")?;

        match status_code.reason_phrase() {
            Some(reason) => write!(self.output, "HTTP/1.1 {} {}\r\n", status_code, reason)?,
            None => write!(self.output, "HTTP/1.1 {}\r\n", status_code)?,
        }

        self.transition(WriterState::StatusLineWritten);

        Ok(())
    }

    /// Writes the header section including its terminating blank line.
    pub fn write_headers(&mut self, headers: &Headers) -> Result<(), GeneralError> {
        self.expect_state(WriterState::StatusLineWritten, "write_headers")?;

        headers.serialize(&mut self.output)?;

        self.transition(WriterState::HeadersWritten);

        Ok(())
    }

    /// Writes the body verbatim. No further writes are allowed afterwards.
    pub fn write_body(&mut self, data: &[u8]) -> Result<(), GeneralError> {
        self.expect_state(WriterState::HeadersWritten, "write_body")?;

        self.output.write_all(data)?;
        self.output.flush()?;

        self.transition(WriterState::BodyWritten);

        Ok(())
    }

    /// Writes one chunk of a chunked body.
    ///
    /// Empty input writes nothing since a zero length chunk would end the body.
    pub fn write_chunked_body(&mut self, data: &[u8]) -> Result<(), GeneralError> {
        self.expect_state(WriterState::HeadersWritten, "write_chunked_body")?;

        if data.is_empty() {
            return Ok(());
        }

        write!(self.output, "{:x}\r\n", data.len())?;
        self.output.write_all(data)?;
        self.output.write_all(b"\r\n")?;

        tracing::trace!(len = data.len(), "wrote chunk");

        Ok(())
    }

    /// Writes the last chunk marker `0\r\n`.
    ///
    /// [`Self::write_trailers()`] must follow to complete the message.
    pub fn write_chunked_body_done(&mut self) -> Result<(), GeneralError> {
        self.expect_state(WriterState::HeadersWritten, "write_chunked_body_done")?;

        self.output.write_all(b"0\r\n")?;

        self.transition(WriterState::ChunkedBodyDone);

        Ok(())
    }

    /// Writes the trailer section and the blank line ending the message.
    ///
    /// Trailer names should have been announced in a `Trailer` header; this
    /// is not checked.
    pub fn write_trailers(&mut self, trailers: &Headers) -> Result<(), GeneralError> {
        self.expect_state(WriterState::ChunkedBodyDone, "write_trailers")?;

        trailers.serialize(&mut self.output)?;
        self.output.flush()?;

        self.transition(WriterState::BodyWritten);

        Ok(())
    }

    /// Writes a complete response with [`default_headers()`] and a plain text body.
    pub fn write_plain_response(
        &mut self,
        status_code: StatusCode,
        body: &str,
    ) -> Result<(), GeneralError> {
        self.write_status_line(status_code)?;
        self.write_headers(&default_headers(body.len()))?;
        self.write_body(body.as_bytes())
    }
}

/// Headers for a non-persistent plain text response of the given length.
pub fn default_headers(content_length: usize) -> Headers {
    let mut headers = Headers::new();
    headers.set("Content-Length", content_length.to_string());
    headers.set("Connection", "close");
    headers.set("Content-Type", "text/plain");
    headers
}
