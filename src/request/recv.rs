use crate::{
    error::{ParseError, ParseErrorKind},
    headers::Headers,
};

use super::{Request, RequestLine};

pub const MAX_HEADER_LENGTH: usize = 32768;
pub const MAX_BODY_LENGTH: u64 = 16 * 1024 * 1024;

#[derive(Debug)]
pub enum ReceiverEvent {
    WantData,
    Request(Request),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    RequestLine,
    Headers,
    Body,
    Done,
    Taken,
}

/// Decodes a single HTTP request from incrementally supplied bytes.
///
/// This struct is sans-IO; feed it with [`Self::recv_data()`] and call
/// [`Self::get_event()`] until it returns a request. The request is returned
/// once; later calls return an error.
#[derive(Debug)]
pub struct Receiver {
    state: State,
    buf: Vec<u8>,
    header_length: usize,
    max_header_length: usize,
    max_body_length: u64,
    request_line: Option<RequestLine>,
    headers: Headers,
    content_length: u64,
}

impl Receiver {
    pub fn new() -> Self {
        Self {
            state: State::RequestLine,
            buf: Vec::new(),
            header_length: 0,
            max_header_length: MAX_HEADER_LENGTH,
            max_body_length: MAX_BODY_LENGTH,
            request_line: None,
            headers: Headers::new(),
            content_length: 0,
        }
    }

    /// Sets the maximum length of the request line plus header section.
    pub fn with_max_header_length(mut self, value: usize) -> Self {
        self.max_header_length = value;
        self
    }

    /// Sets the largest `Content-Length` value accepted.
    pub fn with_max_body_length(mut self, value: u64) -> Self {
        self.max_body_length = value;
        self
    }

    pub fn recv_data(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Returns the number of buffered bytes not consumed yet.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    pub fn get_event(&mut self) -> Result<ReceiverEvent, ParseError> {
        loop {
            let progressed = match self.state {
                State::RequestLine => self.process_request_line()?,
                State::Headers => self.process_headers()?,
                State::Body => self.process_body(),
                State::Done => return self.take_request().map(ReceiverEvent::Request),
                State::Taken => {
                    return Err(ParseError::new(ParseErrorKind::Other)
                        .with_snippet("request already received"));
                }
            };

            if !progressed {
                self.check_max_header_length()?;

                return Ok(ReceiverEvent::WantData);
            }
        }
    }

    fn process_request_line(&mut self) -> Result<bool, ParseError> {
        match RequestLine::parse(&self.buf)? {
            Some((request_line, consumed)) => {
                tracing::debug!(
                    method = %request_line.method,
                    target = %request_line.request_target,
                    "parsed request line"
                );
                self.request_line = Some(request_line);
                self.consume_header(consumed)?;
                self.transition(State::Headers);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn process_headers(&mut self) -> Result<bool, ParseError> {
        let progress = self.headers.parse(&self.buf)?;
        self.consume_header(progress.consumed)?;

        if progress.done {
            self.process_content_length()?;
        }

        Ok(progress.consumed > 0)
    }

    fn process_content_length(&mut self) -> Result<(), ParseError> {
        match self.headers.get_u64_strict("content-length") {
            Some(Ok(len)) if len > self.max_body_length => {
                return Err(ParseError::new(ParseErrorKind::BodyTooBig)
                    .with_snippet(len.to_string()));
            }
            Some(Ok(len)) => {
                self.content_length = len;
                self.transition(State::Body);
            }
            Some(Err(error)) => {
                return Err(ParseError::new(ParseErrorKind::InvalidContentLength)
                    .with_snippet(self.headers.get("content-length").unwrap_or_default())
                    .with_source(error));
            }
            None => self.transition(State::Done),
        }

        Ok(())
    }

    fn process_body(&mut self) -> bool {
        if self.buf.len() as u64 >= self.content_length {
            self.transition(State::Done);
            true
        } else {
            false
        }
    }

    fn consume_header(&mut self, len: usize) -> Result<(), ParseError> {
        self.buf.drain(0..len);
        self.header_length += len;

        self.check_header_length(self.header_length)
    }

    /// Checks the consumed header bytes plus any partial line still buffered.
    fn check_max_header_length(&self) -> Result<(), ParseError> {
        let pending = match self.state {
            State::RequestLine | State::Headers => self.buf.len(),
            State::Body | State::Done | State::Taken => 0,
        };

        self.check_header_length(self.header_length + pending)
    }

    fn check_header_length(&self, len: usize) -> Result<(), ParseError> {
        if len > self.max_header_length {
            Err(ParseError::new(ParseErrorKind::HeaderTooBig)
                .with_position(self.header_length as u64))
        } else {
            Ok(())
        }
    }

    fn take_request(&mut self) -> Result<Request, ParseError> {
        let Some(request_line) = self.request_line.take() else {
            return Err(ParseError::new(ParseErrorKind::Other).with_snippet("missing request line"));
        };

        let body = if self.headers.contains("content-length") {
            let len = self.content_length as usize;
            Some(self.buf.drain(0..len).collect())
        } else {
            None
        };

        self.transition(State::Taken);

        Ok(Request {
            request_line,
            headers: std::mem::take(&mut self.headers),
            body,
        })
    }

    fn transition(&mut self, state: State) {
        tracing::trace!(from = ?self.state, to = ?state, "receiver state");
        self.state = state;
    }
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    use super::*;

    const REQUEST: &[u8] = b"POST /coffee HTTP/1.1\r\n\
        Host: localhost:42069\r\n\
        Accept: text/html\r\n\
        accept: application/json\r\n\
        Content-Length: 5\r\n\
        \r\n\
        hello";

    fn receive_in_pieces(data: &[u8], piece_lengths: impl Iterator<Item = usize>) -> Request {
        let mut receiver = Receiver::new();
        let mut remain = data;

        for len in piece_lengths {
            match receiver.get_event().unwrap() {
                ReceiverEvent::WantData => {
                    let len = len.min(remain.len());
                    receiver.recv_data(&remain[0..len]);
                    remain = &remain[len..];
                }
                ReceiverEvent::Request(request) => return request,
            }
        }

        panic!("request not complete")
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_receive_one_shot() {
        let request = receive_in_pieces(REQUEST, std::iter::repeat(REQUEST.len()));

        assert_eq!(request.method(), "POST");
        assert_eq!(request.request_target(), "/coffee");
        assert_eq!(request.headers.len(), 3);
        assert_eq!(
            request.headers.get("accept"),
            Some("text/html, application/json")
        );
        assert_eq!(request.body(), b"hello");
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_receive_byte_by_byte() {
        let expected = receive_in_pieces(REQUEST, std::iter::repeat(REQUEST.len()));
        let request = receive_in_pieces(REQUEST, std::iter::repeat(1));

        assert_eq!(request, expected);
    }

    #[test]
    fn test_receive_random_pieces() {
        let expected = receive_in_pieces(REQUEST, std::iter::repeat(REQUEST.len()));

        for round in 0..50 {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(round);
            let lengths = std::iter::repeat_with(move || rng.random_range(1..16usize));
            let request = receive_in_pieces(REQUEST, lengths);

            assert_eq!(request, expected);
        }
    }

    #[test]
    fn test_receive_want_data_consumes_nothing() {
        let mut receiver = Receiver::new();
        receiver.recv_data(b"GET / HTTP/1.1\r\nHo");

        assert!(matches!(receiver.get_event().unwrap(), ReceiverEvent::WantData));
        assert_eq!(receiver.buffered_len(), 2);

        receiver.recv_data(b"st: x\r\n\r\n");
        let ReceiverEvent::Request(request) = receiver.get_event().unwrap() else {
            panic!("expected request");
        };
        assert_eq!(request.headers.get("host"), Some("x"));
        assert_eq!(request.body, None);
    }

    #[test]
    fn test_receive_ignores_trailing_bytes() {
        let mut receiver = Receiver::new();
        receiver.recv_data(b"POST / HTTP/1.1\r\nContent-Length: 2\r\n\r\nabcdef");

        let ReceiverEvent::Request(request) = receiver.get_event().unwrap() else {
            panic!("expected request");
        };
        assert_eq!(request.body(), b"ab");
    }

    #[test]
    fn test_receive_header_too_big() {
        let mut receiver = Receiver::new().with_max_header_length(64);
        receiver.recv_data(b"GET / HTTP/1.1\r\n");

        for _ in 0..3 {
            receiver.recv_data(b"X-Filler: 0123456789\r\n");
        }

        let error = receiver.get_event().unwrap_err();
        assert_eq!(error.kind(), ParseErrorKind::HeaderTooBig);
    }

    #[test]
    fn test_receive_header_too_big_in_one_piece() {
        let mut data = b"GET / HTTP/1.1\r\n".to_vec();

        for index in 0..40 {
            data.extend_from_slice(format!("X-Filler-{}: 0123456789\r\n", index).as_bytes());
        }
        data.extend_from_slice(b"\r\n");

        let mut receiver = Receiver::new().with_max_header_length(64);
        receiver.recv_data(&data);

        let error = receiver.get_event().unwrap_err();
        assert_eq!(error.kind(), ParseErrorKind::HeaderTooBig);
    }

    #[test]
    fn test_receive_request_line_too_big() {
        let mut receiver = Receiver::new().with_max_header_length(16);
        receiver.recv_data(b"GET /a-long-target HTTP/1.1\r\n\r\n");

        let error = receiver.get_event().unwrap_err();
        assert_eq!(error.kind(), ParseErrorKind::HeaderTooBig);
    }

    #[test]
    fn test_receive_header_at_limit() {
        let data = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        let mut receiver = Receiver::new().with_max_header_length(data.len());
        receiver.recv_data(data);

        assert!(matches!(
            receiver.get_event().unwrap(),
            ReceiverEvent::Request(..)
        ));
    }

    #[test]
    fn test_receive_request_returned_once() {
        let mut receiver = Receiver::new();
        receiver.recv_data(b"GET /a HTTP/1.1\r\n\r\n");

        let ReceiverEvent::Request(request) = receiver.get_event().unwrap() else {
            panic!("expected request");
        };
        assert_eq!(request.request_target(), "/a");

        for _ in 0..2 {
            let error = receiver.get_event().unwrap_err();
            assert_eq!(error.kind(), ParseErrorKind::Other);
        }
    }

    #[test]
    fn test_receive_body_too_big() {
        let mut receiver = Receiver::new().with_max_body_length(10);
        receiver.recv_data(b"POST / HTTP/1.1\r\nContent-Length: 11\r\n\r\n");

        let error = receiver.get_event().unwrap_err();
        assert_eq!(error.kind(), ParseErrorKind::BodyTooBig);

        let mut receiver = Receiver::new();
        receiver.recv_data(b"POST / HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\n");

        let error = receiver.get_event().unwrap_err();
        assert_eq!(error.kind(), ParseErrorKind::BodyTooBig);
    }

    #[test]
    fn test_receive_body_at_limit() {
        let mut receiver = Receiver::new().with_max_body_length(3);
        receiver.recv_data(b"POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc");

        let ReceiverEvent::Request(request) = receiver.get_event().unwrap() else {
            panic!("expected request");
        };
        assert_eq!(request.body(), b"abc");
    }

    #[test]
    fn test_receive_body_not_counted_as_header() {
        let mut receiver = Receiver::new().with_max_header_length(64);
        receiver.recv_data(b"POST / HTTP/1.1\r\nContent-Length: 200\r\n\r\n");
        receiver.recv_data(&[b'a'; 100]);

        assert!(matches!(receiver.get_event().unwrap(), ReceiverEvent::WantData));

        receiver.recv_data(&[b'a'; 100]);
        let ReceiverEvent::Request(request) = receiver.get_event().unwrap() else {
            panic!("expected request");
        };
        assert_eq!(request.body().len(), 200);
    }
}
