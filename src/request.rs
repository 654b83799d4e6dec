//! HTTP request parsing
use std::io::Read;

use crate::{
    error::{GeneralError, ParseError, ParseErrorKind},
    headers::Headers,
};

pub use self::recv::{MAX_BODY_LENGTH, MAX_HEADER_LENGTH, Receiver, ReceiverEvent};

mod recv;

const IO_BUFFER_LENGTH: usize = 4096;

/// First line of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    /// Method consisting of uppercase ASCII letters.
    pub method: String,
    /// Target exactly as sent; not validated as a URI.
    pub request_target: String,
    /// Version without the `HTTP/` prefix. Always `1.1`.
    pub http_version: String,
}

impl RequestLine {
    /// Parses a request line from the front of `data`.
    ///
    /// Returns `Ok(None)` if the line is not terminated by a CRLF yet.
    /// Otherwise returns the request line and the number of bytes consumed
    /// including the CRLF.
    pub fn parse(data: &[u8]) -> Result<Option<(Self, usize)>, ParseError> {
        let Some((line, consumed)) = crate::parse::crlf_line(data) else {
            return Ok(None);
        };

        let line = std::str::from_utf8(line)?;

        Ok(Some((Self::from_line(line)?, consumed)))
    }

    fn from_line(line: &str) -> Result<Self, ParseError> {
        let parts = line.split(' ').collect::<Vec<_>>();

        let [method, request_target, version] = parts.as_slice() else {
            return Err(ParseError::new(ParseErrorKind::MalformedRequestLine).with_snippet(line));
        };

        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ParseError::new(ParseErrorKind::InvalidMethod).with_snippet(*method));
        }

        let version_parts = version.split('/').collect::<Vec<_>>();

        let [name, number] = version_parts.as_slice() else {
            return Err(
                ParseError::new(ParseErrorKind::MalformedRequestLine).with_snippet(*version)
            );
        };

        if *name != "HTTP" {
            return Err(ParseError::new(ParseErrorKind::UnsupportedVersion).with_snippet(*name));
        }

        if *number != "1.1" {
            return Err(ParseError::new(ParseErrorKind::UnsupportedVersion).with_snippet(*number));
        }

        Ok(Self {
            method: method.to_string(),
            request_target: request_target.to_string(),
            http_version: number.to_string(),
        })
    }
}

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub request_line: RequestLine,
    pub headers: Headers,
    /// Present only when the request carried a `Content-Length` field.
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn method(&self) -> &str {
        &self.request_line.method
    }

    pub fn request_target(&self) -> &str {
        &self.request_line.request_target
    }

    pub fn body(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    /// Reads and parses exactly one request.
    ///
    /// Bytes following the request are left unread or discarded.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, GeneralError> {
        Self::from_reader_with_receiver(reader, Receiver::new())
    }

    pub(crate) fn from_reader_with_receiver<R: Read>(
        mut reader: R,
        mut receiver: Receiver,
    ) -> Result<Self, GeneralError> {
        let mut buf = vec![0; IO_BUFFER_LENGTH];

        loop {
            match receiver.get_event()? {
                ReceiverEvent::WantData => {
                    let len = reader.read(&mut buf)?;

                    if len == 0 {
                        tracing::debug!("end of stream before complete request");
                        return Err(ParseError::new(ParseErrorKind::IncompleteInput).into());
                    }

                    receiver.recv_data(&buf[0..len]);
                }
                ReceiverEvent::Request(request) => return Ok(request),
            }
        }
    }
}
