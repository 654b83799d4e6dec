//! Chunked transfer coding decoder
use std::{
    collections::VecDeque,
    io::{Read, Write},
};

use crate::error::{GeneralError, ProtocolError, ProtocolErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Continue,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedDecoderState {
    SizeLine,
    ChunkData,
    Boundary,
    Done,
}

/// Incremental decoder of a chunked message body.
///
/// Input may be split at any byte. After the last chunk, the unparsed trailer
/// section is available from [`Self::remaining_trailer()`].
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: ChunkedDecoderState,
    buf: VecDeque<u8>,
    chunk_len: u64,
    chunk_position: u64,
}

impl ChunkedDecoder {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            state: ChunkedDecoderState::SizeLine,
            buf: VecDeque::new(),
            chunk_len: 0,
            chunk_position: 0,
        }
    }

    /// Returns whether the last chunk has been decoded.
    pub fn is_done(&self) -> bool {
        self.state == ChunkedDecoderState::Done
    }

    /// Decodes `input`, appending chunk data to `output`.
    pub fn transform(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<(), GeneralError> {
        self.buf.write_all(input)?;

        loop {
            let loop_state = match self.state {
                ChunkedDecoderState::SizeLine => self.process_size_line()?,
                ChunkedDecoderState::ChunkData => self.process_chunk(output)?,
                ChunkedDecoderState::Boundary => self.process_boundary()?,
                ChunkedDecoderState::Done => LoopState::Break,
            };

            if self.buf.is_empty() || loop_state == LoopState::Break {
                break;
            }
        }

        Ok(())
    }

    pub fn has_remaining_trailer(&self) -> bool {
        if self.state == ChunkedDecoderState::Done {
            !self.buf.is_empty()
        } else {
            false
        }
    }

    /// Moves bytes following the last chunk into `trailer`.
    pub fn remaining_trailer(&mut self, trailer: &mut Vec<u8>) {
        if self.state == ChunkedDecoderState::Done {
            tracing::trace!(len = self.buf.len(), "remaining trailer");

            trailer.extend(self.buf.drain(..));
        }
    }

    fn process_size_line(&mut self) -> Result<LoopState, GeneralError> {
        let buf_len = self.buf.len();
        let result = parse::chunk_size_line(self.buf.make_contiguous())
            .map(|(remain, len)| (remain.len(), len))
            .map_err(|error| error.is_incomplete());

        match result {
            Ok((remain_len, len)) => {
                self.chunk_len = len;
                self.chunk_position = 0;
                tracing::trace!("SizeLine -> ChunkData");
                self.state = ChunkedDecoderState::ChunkData;

                let consumed_len = buf_len - remain_len;

                self.buf.drain(..consumed_len);
                tracing::trace!(len, consumed_len, "parsed chunk line");

                if self.chunk_len == 0 {
                    tracing::trace!("SizeLine -> Done");
                    self.state = ChunkedDecoderState::Done;
                }

                Ok(LoopState::Continue)
            }
            Err(true) => Ok(LoopState::Break),
            Err(false) => Err(self.invalid_chunked_encoding()),
        }
    }

    fn process_chunk(&mut self, output: &mut Vec<u8>) -> Result<LoopState, GeneralError> {
        debug_assert!(self.chunk_position <= self.chunk_len);

        let chunk_remain_len = self.chunk_len - self.chunk_position;

        let mut reader = (&mut self.buf).take(chunk_remain_len);
        let len = std::io::copy(&mut reader, output)?;

        self.chunk_position += len;

        tracing::trace!(self.chunk_position, self.chunk_len, "process chunk data");

        if self.chunk_position == self.chunk_len {
            tracing::trace!("ChunkData -> Boundary");
            self.state = ChunkedDecoderState::Boundary;
        }

        Ok(LoopState::Continue)
    }

    fn process_boundary(&mut self) -> Result<LoopState, GeneralError> {
        let result = parse::chunk_boundary(self.buf.make_contiguous())
            .map(|(_remain, consumed)| consumed.len())
            .map_err(|error| error.is_incomplete());

        match result {
            Ok(len) => {
                self.buf.drain(0..len);

                tracing::trace!("Boundary -> SizeLine");
                self.state = ChunkedDecoderState::SizeLine;

                Ok(LoopState::Continue)
            }
            Err(true) => Ok(LoopState::Break),
            Err(false) => Err(self.invalid_chunked_encoding()),
        }
    }

    fn invalid_chunked_encoding(&mut self) -> GeneralError {
        let input = self.buf.make_contiguous();

        ProtocolError::new(ProtocolErrorKind::InvalidChunkedEncoding)
            .with_snippet(input[0..input.len().min(16)].escape_ascii().to_string())
            .into()
    }
}

mod parse {
    use nom::{
        IResult, Parser,
        bytes::streaming::{tag, take_while},
        character::streaming::{hex_digit1, line_ending},
        combinator::map_res,
        sequence::{pair, terminated},
    };

    pub fn chunk_size_line(input: &[u8]) -> IResult<&[u8], u64> {
        terminated(
            nom::combinator::map(pair(chunk_size, chunk_ext), |p| p.0),
            tag("\r\n"),
        )
        .parse(input)
    }

    fn chunk_size(input: &[u8]) -> IResult<&[u8], u64> {
        map_res(hex_digit1, |b: &[u8]| {
            u64::from_str_radix(&String::from_utf8_lossy(b), 16)
        })
        .parse(input)
    }

    fn chunk_ext(input: &[u8]) -> IResult<&[u8], &[u8]> {
        take_while(|b: u8| b.is_ascii_graphic() || b == b' ' || b == b'\t')(input)
    }

    pub fn chunk_boundary(input: &[u8]) -> IResult<&[u8], &[u8]> {
        line_ending(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tracing_test::traced_test]
    #[test]
    fn test_decode() {
        let mut decoder = ChunkedDecoder::new();

        let mut output = Vec::new();

        decoder.transform(b"6\r\n", &mut output).unwrap();
        decoder.transform(b"Hello ", &mut output).unwrap();
        decoder.transform(b"\r\n", &mut output).unwrap();
        decoder.transform(b"6\r\n", &mut output).unwrap();
        decoder.transform(b"world!", &mut output).unwrap();
        decoder.transform(b"\r\n", &mut output).unwrap();
        assert!(!decoder.is_done());
        decoder.transform(b"0\r\n", &mut output).unwrap();
        decoder.transform(b"a: b\r\n", &mut output).unwrap();
        decoder.transform(b"\r\n", &mut output).unwrap();

        assert_eq!(output, b"Hello world!");
        assert!(decoder.is_done());

        assert!(decoder.has_remaining_trailer());
        let mut trailer = Vec::new();
        decoder.remaining_trailer(&mut trailer);

        assert_eq!(trailer, b"a: b\r\n\r\n");
        assert!(!decoder.has_remaining_trailer());
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_decode_extension_and_uppercase_hex() {
        let mut decoder = ChunkedDecoder::new();
        let mut output = Vec::new();

        decoder
            .transform(b"A;name=value\r\n0123456789\r\n0\r\n\r\n", &mut output)
            .unwrap();

        assert_eq!(output, b"0123456789");
        assert!(decoder.is_done());
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_decode_partial_chunk_size() {
        let mut decoder = ChunkedDecoder::new();

        let mut output = Vec::new();

        decoder.transform(b"1", &mut output).unwrap();
        assert!(output.is_empty());
        assert!(!decoder.has_remaining_trailer());

        decoder.transform(b"f", &mut output).unwrap();
        assert!(output.is_empty());

        decoder.transform(b"\r", &mut output).unwrap();
        assert!(output.is_empty());

        decoder.transform(b"\n", &mut output).unwrap();
        assert!(output.is_empty());

        decoder.transform(&[1u8; 0x1f], &mut output).unwrap();
        decoder.transform(b"\r\n", &mut output).unwrap();
        assert_eq!(output.len(), 0x1f);
        assert!(!decoder.is_done());
    }

    #[test]
    fn test_decode_invalid() {
        let mut decoder = ChunkedDecoder::new();
        let mut output = Vec::new();

        let error = decoder.transform(b"zz\r\n", &mut output).unwrap_err();
        assert_eq!(
            error.as_protocol().map(|e| e.kind()),
            Some(ProtocolErrorKind::InvalidChunkedEncoding)
        );

        let mut decoder = ChunkedDecoder::new();
        let error = decoder.transform(b"2\r\nabX\r\n", &mut output).unwrap_err();
        assert!(error.is_protocol());
    }
}
