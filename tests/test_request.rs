use std::io::Read;

use httpfromtcp::{
    error::ParseErrorKind,
    headers::Headers,
    lines::LineReader,
    request::{Receiver, ReceiverEvent, Request, RequestLine},
};
use rand::{Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Returns a random number of bytes, at least one, for each read call.
struct RandomChunkReader<R: RngCore> {
    data: Vec<u8>,
    position: usize,
    rng: R,
}

impl<R: RngCore> Read for RandomChunkReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remain = self.data.len() - self.position;

        if remain == 0 || buf.is_empty() {
            return Ok(0);
        }

        let len = self.rng.random_range(1..=remain.min(buf.len()).min(12));
        buf[0..len].copy_from_slice(&self.data[self.position..self.position + len]);
        self.position += len;

        Ok(len)
    }
}

fn random_token<R: Rng>(rng: &mut R, alphabet: &[u8]) -> String {
    let len = rng.random_range(1..10usize);

    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

fn generate_request<R: Rng>(rng: &mut R) -> (Vec<u8>, Request) {
    const METHOD_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const NAME_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&'*+-.^_`|~";
    const VALUE_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789/=;,.:";

    let method = random_token(rng, METHOD_CHARS);
    let target = format!("/{}", random_token(rng, VALUE_CHARS));
    let mut data = format!("{} {} HTTP/1.1\r\n", method, target).into_bytes();
    let mut headers = Headers::new();

    for _ in 0..rng.random_range(0..8) {
        let name = random_token(rng, NAME_CHARS);
        let value = random_token(rng, VALUE_CHARS);

        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }

        data.extend_from_slice(format!("{}:  {} \r\n", name, value).as_bytes());
        headers.set(name.to_ascii_lowercase(), &value);
    }

    let body = if rng.random_bool(0.5) {
        let body = random_token(rng, VALUE_CHARS).into_bytes();
        data.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        headers.set("content-length", body.len().to_string());
        Some(body)
    } else {
        None
    };

    data.extend_from_slice(b"\r\n");
    data.extend_from_slice(body.as_deref().unwrap_or_default());

    let request = Request {
        request_line: RequestLine {
            method,
            request_target: target,
            http_version: "1.1".to_string(),
        },
        headers,
        body,
    };

    (data, request)
}

#[tracing_test::traced_test]
#[test]
fn test_random_requests_any_split() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0x42069);

    for _ in 0..200 {
        let (data, expected) = generate_request(&mut rng);
        let reader = RandomChunkReader {
            data: data.clone(),
            position: 0,
            rng: Xoshiro256PlusPlus::seed_from_u64(rng.next_u64()),
        };

        let request = Request::from_reader(reader).unwrap();

        assert_eq!(request, expected, "{}", data.escape_ascii());
    }
}

#[test]
fn test_duplicate_and_case_insensitive_fields() {
    let request = Request::from_reader(
        b"GET / HTTP/1.1\r\n\
        HOST: a\r\n\
        Host: b\r\n\
        host: c\r\n\
        Accept: text/html\r\n\
        Accept: application/json\r\n\
        \r\n"
            .as_slice(),
    )
    .unwrap();

    assert_eq!(request.headers.len(), 2);
    assert_eq!(request.headers.get("Host"), Some("a, b, c"));
    assert_eq!(
        request.headers.get("accept"),
        Some("text/html, application/json")
    );
}

#[test]
fn test_receiver_error_kinds() {
    let cases: [(&[u8], ParseErrorKind); 6] = [
        (b"GET /\r\n\r\n", ParseErrorKind::MalformedRequestLine),
        (b"get / HTTP/1.1\r\n\r\n", ParseErrorKind::InvalidMethod),
        (b"GET / HTTP/1.0\r\n\r\n", ParseErrorKind::UnsupportedVersion),
        (b"GET / HTTP/1.1\r\nHost x\r\n\r\n", ParseErrorKind::MissingColon),
        (b"GET / HTTP/1.1\r\nH\xc3\xb8st: x\r\n\r\n", ParseErrorKind::InvalidFieldName),
        (b"GET / HTTP/1.1\r\nHost : x\r\n\r\n", ParseErrorKind::WhitespaceBeforeColon),
    ];

    for (input, kind) in cases {
        let mut receiver = Receiver::new();
        receiver.recv_data(input);

        let error = receiver.get_event().unwrap_err();
        assert_eq!(error.kind(), kind, "{}", input.escape_ascii());
    }
}

#[test]
fn test_receiver_want_data_then_request() {
    let mut receiver = Receiver::default();

    let pieces: [&[u8]; 3] = [b"GET /coffee HTTP/1.1\r", b"\nHost: x\r\n", b"\r"];

    for piece in pieces {
        receiver.recv_data(piece);
        assert!(matches!(
            receiver.get_event().unwrap(),
            ReceiverEvent::WantData
        ));
    }

    receiver.recv_data(b"\n");
    let ReceiverEvent::Request(request) = receiver.get_event().unwrap() else {
        panic!("expected request");
    };

    assert_eq!(request.request_target(), "/coffee");
}

#[test]
fn test_line_reader_random_split() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
    let text = b"first line\nsecond\n\nlast without newline";

    let reader = RandomChunkReader {
        data: text.to_vec(),
        position: 0,
        rng: Xoshiro256PlusPlus::seed_from_u64(rng.next_u64()),
    };
    let lines = LineReader::new(reader)
        .collect::<std::io::Result<Vec<_>>>()
        .unwrap();

    assert_eq!(lines, ["first line", "second", "", "last without newline"]);
}
