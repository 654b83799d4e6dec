//! Line splitting of a byte stream
use std::io::{ErrorKind, Read};

const CHUNK_LENGTH: usize = 8;

/// Splits a stream into lines terminated by `\n`.
///
/// The stream is read in small fixed size chunks. Lines are returned
/// without the line feed; a carriage return before it is kept. Invalid UTF-8
/// is replaced with U+FFFD.
#[derive(Debug)]
pub struct LineReader<R: Read> {
    input: R,
    buf: Vec<u8>,
    eof: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            buf: Vec::new(),
            eof: false,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.input
    }

    pub fn into_inner(self) -> R {
        self.input
    }

    /// Returns the next line, or `None` once the stream is exhausted.
    ///
    /// A final segment without a line feed is returned as a line if it is
    /// not empty.
    pub fn read_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            if let Some(index) = self.buf.iter().position(|b| *b == b'\n') {
                let line = self.buf.drain(0..=index).collect::<Vec<u8>>();
                return Ok(Some(Self::decode(&line[0..index])));
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }

                let line = std::mem::take(&mut self.buf);
                return Ok(Some(Self::decode(&line)));
            }

            self.fill_buf()?;
        }
    }

    fn fill_buf(&mut self) -> std::io::Result<()> {
        let mut chunk = [0u8; CHUNK_LENGTH];

        let len = loop {
            match self.input.read(&mut chunk) {
                Ok(len) => break len,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            }
        };

        tracing::trace!(len, "read chunk");

        if len == 0 {
            self.eof = true;
        } else {
            self.buf.extend_from_slice(&chunk[0..len]);
        }

        Ok(())
    }

    fn decode(line: &[u8]) -> String {
        String::from_utf8_lossy(line).into_owned()
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_line().transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn lines(data: &[u8]) -> Vec<String> {
        LineReader::new(Cursor::new(data.to_vec()))
            .collect::<std::io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_lines() {
        assert_eq!(
            lines(b"Do you have what it takes to be an engineer at TheStartup\xe2\x84\xa2?\nAre you willing to work 80 hours a week in hopes that your 0.001% equity is worth something?\nend"),
            [
                "Do you have what it takes to be an engineer at TheStartup\u{2122}?",
                "Are you willing to work 80 hours a week in hopes that your 0.001% equity is worth something?",
                "end",
            ]
        );
    }

    #[test]
    fn test_empty_lines_and_trailing_newline() {
        assert_eq!(lines(b"a\n\nb\n"), ["a", "", "b"]);
        assert!(lines(b"").is_empty());
        assert_eq!(lines(b"\n"), [""]);
    }

    #[test]
    fn test_carriage_return_kept() {
        assert_eq!(lines(b"GET / HTTP/1.1\r\n\r\n"), ["GET / HTTP/1.1\r", "\r"]);
    }

    #[test]
    fn test_line_longer_than_chunk() {
        let line = "x".repeat(CHUNK_LENGTH * 5 + 3);
        let data = format!("{}\n{}", line, line);

        assert_eq!(lines(data.as_bytes()), [line.clone(), line]);
    }

    #[test]
    fn test_exhausted_returns_none_repeatedly() {
        let mut reader = LineReader::new(Cursor::new(b"one".to_vec()));

        assert_eq!(reader.read_line().unwrap().as_deref(), Some("one"));
        assert_eq!(reader.read_line().unwrap(), None);
        assert_eq!(reader.read_line().unwrap(), None);
    }
}
