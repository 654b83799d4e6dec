//! Plain text HTTP/1.1 client for a single `GET` request
//!
//! Used by handlers that forward a response from another server. Only the
//! framing needed to read one response per connection is implemented.
use std::{
    collections::VecDeque,
    io::{Read, Write},
    net::{TcpStream, ToSocketAddrs},
};

use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256};

use crate::{
    chunked::ChunkedDecoder,
    error::{GeneralError, ParseError, ParseErrorKind, ProtocolError, ProtocolErrorKind},
    headers::Headers,
    response::{ResponseWriter, StatusCode},
};

const IO_BUFFER_LENGTH: usize = 4096;
const FORWARD_CHUNK_LENGTH: usize = 1024;

pub const CONTENT_SHA256_TRAILER: &str = "X-Content-SHA256";
pub const CONTENT_LENGTH_TRAILER: &str = "X-Content-Length";

/// Fields not copied when forwarding since they describe the upstream connection.
const HOP_FIELDS: [&str; 4] = ["connection", "content-length", "trailer", "transfer-encoding"];

/// Digest and length of a forwarded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardSummary {
    /// Lowercase hex SHA-256.
    pub sha256: String,
    pub content_length: u64,
}

#[derive(Debug)]
enum Framing {
    Length(u64),
    Chunked(ChunkedDecoder),
    UntilEof,
}

/// Response received from an upstream server.
///
/// Reading from it yields the body with any chunked framing removed.
#[derive(Debug)]
pub struct UpstreamResponse<R: Read> {
    status_code: StatusCode,
    reason_phrase: String,
    headers: Headers,
    input: R,
    leftover: Vec<u8>,
    decoded: VecDeque<u8>,
    framing: Framing,
    finished: bool,
}

/// Connects to `address` and sends `GET <path>` with the given `Host`.
pub fn fetch<A: ToSocketAddrs>(
    address: A,
    host: &str,
    path: &str,
) -> Result<UpstreamResponse<TcpStream>, GeneralError> {
    let mut stream = TcpStream::connect(address)?;

    let mut headers = Headers::new();
    headers.set("Host", host);
    headers.set("User-Agent", concat!("httpfromtcp/", env!("CARGO_PKG_VERSION")));
    headers.set("Accept", "*/*");
    headers.set("Connection", "close");

    let mut head = Vec::new();
    write!(head, "GET {} HTTP/1.1\r\n", path)?;
    headers.serialize(&mut head)?;
    stream.write_all(&head)?;
    stream.flush()?;

    tracing::debug!(host, path, "sent upstream request");

    UpstreamResponse::read_from(stream)
}

impl<R: Read> UpstreamResponse<R> {
    /// Reads the status line and header section from `input`.
    pub fn read_from(mut input: R) -> Result<Self, GeneralError> {
        let mut buf = Vec::new();
        let mut chunk = vec![0; IO_BUFFER_LENGTH];

        let (status_code, reason_phrase, consumed) = loop {
            if let Some((line, consumed)) = crate::parse::crlf_line(&buf) {
                let (status_code, reason_phrase) = parse_status_line(line)?;
                break (status_code, reason_phrase, consumed);
            }

            fill(&mut input, &mut buf, &mut chunk)?;
        };
        buf.drain(0..consumed);

        let mut headers = Headers::new();

        loop {
            let progress = headers.parse(&buf)?;
            buf.drain(0..progress.consumed);

            if progress.done {
                break;
            }

            if progress.consumed == 0 {
                fill(&mut input, &mut buf, &mut chunk)?;
            }
        }

        let framing = framing(&headers)?;

        tracing::debug!(%status_code, ?framing, "received upstream response header");

        Ok(Self {
            status_code,
            reason_phrase,
            headers,
            input,
            leftover: buf,
            decoded: VecDeque::new(),
            framing,
            finished: false,
        })
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    /// Header fields with lowercase names.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn into_inner(self) -> R {
        self.input
    }

    /// Sends this response through `writer` as a chunked response.
    ///
    /// The status code and header fields are copied, except for the framing
    /// fields, and the body is followed by trailers carrying its SHA-256
    /// digest and length. The writer must be in the initial state.
    pub fn forward_chunked<W: std::io::Write>(
        &mut self,
        writer: &mut ResponseWriter<W>,
    ) -> Result<ForwardSummary, GeneralError> {
        let mut headers = self
            .headers
            .iter()
            .filter(|(name, _value)| {
                !HOP_FIELDS
                    .iter()
                    .any(|field| name.eq_ignore_ascii_case(field))
            })
            .collect::<Headers>();
        headers.set_override("Transfer-Encoding", "chunked");
        headers.set(
            "Trailer",
            format!("{}, {}", CONTENT_SHA256_TRAILER, CONTENT_LENGTH_TRAILER),
        );
        headers.set_override("Connection", "close");

        writer.write_status_line(self.status_code)?;
        writer.write_headers(&headers)?;

        let mut hasher = Sha256::new();
        let mut content_length = 0u64;
        let mut buf = vec![0; FORWARD_CHUNK_LENGTH];

        loop {
            let len = self.read(&mut buf)?;

            if len == 0 {
                break;
            }

            hasher.update(&buf[0..len]);
            content_length += len as u64;
            writer.write_chunked_body(&buf[0..len])?;
        }

        let summary = ForwardSummary {
            sha256: HEXLOWER.encode(&hasher.finalize()),
            content_length,
        };

        let mut trailers = Headers::new();
        trailers.set(CONTENT_SHA256_TRAILER, &summary.sha256);
        trailers.set(CONTENT_LENGTH_TRAILER, summary.content_length.to_string());

        writer.write_chunked_body_done()?;
        writer.write_trailers(&trailers)?;

        tracing::debug!(content_length, sha256 = %summary.sha256, "forwarded response");

        Ok(summary)
    }

    fn fill_decoded(&mut self) -> Result<(), GeneralError> {
        let data = if self.leftover.is_empty() {
            let mut chunk = vec![0; IO_BUFFER_LENGTH];
            let len = self.input.read(&mut chunk)?;
            chunk.truncate(len);
            chunk
        } else {
            std::mem::take(&mut self.leftover)
        };

        let eof = data.is_empty();

        match &mut self.framing {
            Framing::Length(remain) => {
                if eof && *remain > 0 {
                    return Err(ProtocolError::new(ProtocolErrorKind::ContentLengthMismatch)
                        .with_snippet(format!("{} bytes missing", remain))
                        .into());
                }

                let len = (*remain).min(data.len() as u64) as usize;
                self.decoded.extend(&data[0..len]);
                *remain -= len as u64;
                self.finished = *remain == 0;
            }
            Framing::Chunked(decoder) => {
                if eof {
                    return Err(ProtocolError::new(ProtocolErrorKind::InvalidChunkedEncoding)
                        .with_snippet("unexpected end of stream")
                        .into());
                }

                let mut output = Vec::new();
                decoder.transform(&data, &mut output)?;
                self.decoded.extend(output);
                self.finished = decoder.is_done();
            }
            Framing::UntilEof => {
                self.decoded.extend(data);
                self.finished = eof;
            }
        }

        Ok(())
    }
}

impl<R: Read> Read for UpstreamResponse<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if !self.decoded.is_empty() {
                return self.decoded.read(buf);
            }

            if self.finished || buf.is_empty() {
                return Ok(0);
            }

            self.fill_decoded().map_err(|error| match error {
                GeneralError::Io(error) => error,
                error => std::io::Error::new(std::io::ErrorKind::InvalidData, error),
            })?;
        }
    }
}

fn fill<R: Read>(input: &mut R, buf: &mut Vec<u8>, chunk: &mut [u8]) -> Result<(), GeneralError> {
    if buf.len() > crate::request::MAX_HEADER_LENGTH {
        return Err(ParseError::new(ParseErrorKind::HeaderTooBig).into());
    }

    let len = input.read(chunk)?;

    if len == 0 {
        return Err(ParseError::new(ParseErrorKind::IncompleteInput).into());
    }

    buf.extend_from_slice(&chunk[0..len]);

    Ok(())
}

fn parse_status_line(line: &[u8]) -> Result<(StatusCode, String), GeneralError> {
    let invalid = || {
        ProtocolError::new(ProtocolErrorKind::InvalidStatusLine)
            .with_snippet(line[0..line.len().min(32)].escape_ascii().to_string())
    };

    let (_remain, status_line) =
        crate::parse::status_line::status_line(line).map_err(|_error| invalid())?;

    let status_code = std::str::from_utf8(status_line.status_code)
        .map_err(ParseError::from)?
        .parse::<u16>()
        .map_err(|_error| invalid())?;
    let reason_phrase = String::from_utf8_lossy(status_line.reason_phrase).into_owned();

    Ok((StatusCode(status_code), reason_phrase))
}

fn framing(headers: &Headers) -> Result<Framing, GeneralError> {
    let chunked = headers.get("transfer-encoding").is_some_and(|value| {
        value
            .split(',')
            .any(|item| item.trim().eq_ignore_ascii_case("chunked"))
    });

    if chunked {
        return Ok(Framing::Chunked(ChunkedDecoder::new()));
    }

    match headers.get_u64_strict("content-length") {
        Some(Ok(len)) => Ok(Framing::Length(len)),
        Some(Err(error)) => Err(ParseError::new(ParseErrorKind::InvalidContentLength)
            .with_source(error)
            .into()),
        None => Ok(Framing::UntilEof),
    }
}
