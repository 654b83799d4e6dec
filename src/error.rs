//! Error representations
use std::{backtrace::Backtrace, fmt::Display, str::Utf8Error, string::FromUtf8Error};

use crate::response::WriterState;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GeneralError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GeneralError {
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(..))
    }

    pub fn as_parse(&self) -> Option<&ParseError> {
        if let Self::Parse(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn try_into_parse(self) -> Result<ParseError, Self> {
        if let Self::Parse(v) = self {
            Ok(v)
        } else {
            Err(self)
        }
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(..))
    }

    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        if let Self::Protocol(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn try_into_protocol(self) -> Result<ProtocolError, Self> {
        if let Self::Protocol(v) = self {
            Ok(v)
        } else {
            Err(self)
        }
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(..))
    }

    pub fn as_io(&self) -> Option<&std::io::Error> {
        if let Self::Io(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn try_into_io(self) -> Result<std::io::Error, Self> {
        if let Self::Io(v) = self {
            Ok(v)
        } else {
            Err(self)
        }
    }

    /// Returns whether the error is a response writer call made in the wrong order.
    pub fn is_out_of_order(&self) -> bool {
        self.as_protocol()
            .is_some_and(|error| error.kind() == ProtocolErrorKind::OutOfOrder)
    }
}

/// Error for parsing.
#[derive(Debug, thiserror::Error)]
pub struct ParseError {
    kind: ParseErrorKind,
    context: Box<ParseContext>,
    backtrace: Option<Box<Backtrace>>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            context: Default::default(),
            backtrace: Some(Box::new(std::backtrace::Backtrace::capture())),
            source: None,
        }
    }

    pub fn with_position(mut self, value: u64) -> Self {
        self.context.position = Some(value);
        self
    }

    pub fn with_snippet<S: Into<String>>(mut self, value: S) -> Self {
        self.context.snippet = Some(value.into());
        self
    }

    pub fn with_source<T: Into<Box<dyn std::error::Error + Send + Sync>>>(
        mut self,
        source: T,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    pub fn position(&self) -> Option<u64> {
        self.context.position
    }

    pub fn snippet(&self) -> Option<&String> {
        self.context.snippet.as_ref()
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error: {}{}", self.kind, self.context)?;

        Ok(())
    }
}

impl From<ParseErrorKind> for ParseError {
    fn from(value: ParseErrorKind) -> Self {
        Self::new(value)
    }
}

impl From<FromUtf8Error> for ParseError {
    fn from(value: FromUtf8Error) -> Self {
        ParseError::new(ParseErrorKind::InvalidUtf8)
            .with_position(value.utf8_error().valid_up_to() as u64)
    }
}

impl From<Utf8Error> for ParseError {
    fn from(value: Utf8Error) -> Self {
        ParseError::new(ParseErrorKind::InvalidUtf8).with_position(value.valid_up_to() as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ParseErrorKind {
    IncompleteInput,
    MalformedRequestLine,
    InvalidMethod,
    UnsupportedVersion,
    MissingColon,
    InvalidFieldName,
    WhitespaceBeforeColon,
    InvalidContentLength,
    InvalidUtf8,
    HeaderTooBig,
    BodyTooBig,
    Other,
}

impl Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::IncompleteInput => "incomplete input",
            Self::MalformedRequestLine => "malformed request line",
            Self::InvalidMethod => "invalid method",
            Self::UnsupportedVersion => "unsupported HTTP version",
            Self::MissingColon => "header line missing colon",
            Self::InvalidFieldName => "invalid header field name",
            Self::WhitespaceBeforeColon => "whitespace between field name and colon",
            Self::InvalidContentLength => "invalid content length",
            Self::InvalidUtf8 => "invalid UTF-8",
            Self::HeaderTooBig => "header too big",
            Self::BodyTooBig => "body too big",
            Self::Other => "other",
        };

        f.write_str(value)
    }
}

#[derive(Debug, Default)]
struct ParseContext {
    position: Option<u64>,
    snippet: Option<String>,
}

impl Display for ParseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(position) = self.position {
            write!(f, " position {}", position)?;
        }

        if let Some(snippet) = &self.snippet {
            write!(f, " near '{}'", snippet)?;
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
struct ProtocolContext {
    operation: Option<&'static str>,
    state: Option<WriterState>,
    snippet: Option<String>,
}

impl Display for ProtocolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(operation) = self.operation {
            write!(f, " in {}", operation)?;
        }

        if let Some(state) = self.state {
            write!(f, " (writer state {:?})", state)?;
        }

        if let Some(snippet) = &self.snippet {
            write!(f, " near '{}'", snippet)?;
        }

        Ok(())
    }
}

/// Error for protocols.
#[derive(Debug, thiserror::Error)]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
    backtrace: Option<Box<Backtrace>>,
    context: Box<ProtocolContext>,
}

impl ProtocolError {
    pub fn new(kind: ProtocolErrorKind) -> Self {
        Self {
            kind,
            backtrace: Some(Box::new(std::backtrace::Backtrace::capture())),
            context: Default::default(),
        }
    }

    /// Error for a response writer operation called in the wrong state.
    pub fn out_of_order(operation: &'static str, state: WriterState) -> Self {
        let mut error = Self::new(ProtocolErrorKind::OutOfOrder);
        error.context.operation = Some(operation);
        error.context.state = Some(state);
        error
    }

    pub fn with_snippet<S: Into<String>>(mut self, value: S) -> Self {
        self.context.snippet = Some(value.into());
        self
    }

    pub fn kind(&self) -> ProtocolErrorKind {
        self.kind
    }

    /// Name of the writer operation that was rejected, if any.
    pub fn operation(&self) -> Option<&'static str> {
        self.context.operation
    }

    /// Writer state at the time of the rejected operation, if any.
    pub fn state(&self) -> Option<WriterState> {
        self.context.state
    }

    pub fn snippet(&self) -> Option<&String> {
        self.context.snippet.as_ref()
    }
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "protocol error: {}{}", self.kind, self.context)
    }
}

impl From<ProtocolErrorKind> for ProtocolError {
    fn from(value: ProtocolErrorKind) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ProtocolErrorKind {
    OutOfOrder,
    InvalidChunkedEncoding,
    ContentLengthMismatch,
    InvalidStatusLine,
}

impl Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::OutOfOrder => "response writer operation out of order",
            Self::InvalidChunkedEncoding => "invalid chunked encoding",
            Self::ContentLengthMismatch => "content length mismatch",
            Self::InvalidStatusLine => "invalid status line",
        };

        f.write_str(value)
    }
}
