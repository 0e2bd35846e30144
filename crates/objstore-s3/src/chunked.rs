//! Decoder for `aws-chunked` request bodies.
//!
//! Clients that sign or checksum a streaming upload frame the body as:
//!
//! ```text
//! <hex chunk size>[;chunk-signature=...]\r\n
//! <chunk data>\r\n
//! ... (repeat for each chunk)
//! 0\r\n
//! <trailer-name>:<trailer-value>\r\n
//! \r\n
//! ```
//!
//! The decoder does not buffer the body: decoded data is handed to a sink in
//! blocks of at most [`S3_CHUNK_SIZE`] bytes, and decoding stops as soon as the
//! declared decoded length has been produced.

use std::io::{self, BufRead, Read};

use anyhow::Context;
use tracing::{debug, warn};

use crate::S3_CHUNK_SIZE;
use crate::error::{S3ServiceError, S3ServiceResult};

/// Trailing headers found after the final chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trailers {
    entries: Vec<(String, String)>,
}

impl Trailers {
    /// Look up a trailer by name, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over trailers in the order they were sent.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of trailers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no trailer was sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_line(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        if let Some((name, value)) = line.trim().split_once(':') {
            self.entries
                .push((name.trim().to_owned(), value.trim().to_owned()));
        }
    }
}

/// Decode an `aws-chunked` body until `decoded_length` bytes were produced.
///
/// Every decoded block is passed to `sink` before the next one is read. After
/// the payload, the terminating chunk and any trailer lines are consumed and
/// returned as [`Trailers`].
///
/// # Errors
///
/// * [`S3ServiceError::MalformedChunkedBody`] when a size line is not hex.
/// * [`S3ServiceError::TruncatedBody`] when the stream ends, or a zero-size
///   chunk arrives, before `decoded_length` bytes were decoded.
/// * Whatever `sink` returns.
///
/// # Examples
///
/// ```
/// use objstore_s3::chunked::decode_chunked;
///
/// let mut body: &[u8] = b"5\r\nhello\r\n0\r\nx-amz-checksum-crc32:NhCmhg==\r\n\r\n";
/// let mut decoded = Vec::new();
/// let trailers = decode_chunked(&mut body, 5, |block| {
///     decoded.extend_from_slice(block);
///     Ok(())
/// })
/// .unwrap();
/// assert_eq!(decoded, b"hello");
/// assert_eq!(trailers.get("X-Amz-Checksum-CRC32"), Some("NhCmhg=="));
/// ```
pub fn decode_chunked<R, F>(
    reader: &mut R,
    decoded_length: u64,
    mut sink: F,
) -> S3ServiceResult<Trailers>
where
    R: BufRead + ?Sized,
    F: FnMut(&[u8]) -> S3ServiceResult<()>,
{
    let mut block = vec![0u8; S3_CHUNK_SIZE];
    let mut written: u64 = 0;
    let truncated = |received| S3ServiceError::TruncatedBody {
        expected: decoded_length,
        received,
    };

    while written < decoded_length {
        let line = read_line(reader)?.ok_or_else(|| truncated(written))?;
        let mut remaining = parse_chunk_size(&line)?;
        if remaining == 0 {
            return Err(truncated(written));
        }

        while remaining > 0 {
            let amount = usize::try_from(remaining).map_or(S3_CHUNK_SIZE, |r| r.min(S3_CHUNK_SIZE));
            let n = reader
                .read(&mut block[..amount])
                .context("failed to read chunk data")?;
            if n == 0 {
                return Err(truncated(written));
            }
            sink(&block[..n])?;
            remaining -= n as u64;
            written += n as u64;
        }

        // CRLF closing the chunk data
        io::copy(&mut (&mut *reader).take(2), &mut io::sink())
            .context("failed to read chunk terminator")?;
    }

    let mut trailers = Trailers::default();
    if let Some(line) = read_line(reader)? {
        match parse_chunk_size(&line) {
            Ok(0) => {}
            Ok(size) => warn!(
                size,
                decoded_length, "object body did not conform to the aws-chunked format"
            ),
            Err(_) => trailers.push_line(&line),
        }
        while let Some(line) = read_line(reader)? {
            trailers.push_line(&line);
        }
    }

    debug!(
        decoded = written,
        trailers = trailers.len(),
        "decoded aws-chunked body"
    );
    Ok(trailers)
}

/// Read one line without its terminator. `None` signals end of stream.
fn read_line<R: BufRead + ?Sized>(reader: &mut R) -> S3ServiceResult<Option<Vec<u8>>> {
    let mut line = Vec::new();
    let n = reader
        .read_until(b'\n', &mut line)
        .context("failed to read chunked body line")?;
    if n == 0 {
        return Ok(None);
    }
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    Ok(Some(line))
}

/// Parse `<hex>[;extension]`.
fn parse_chunk_size(line: &[u8]) -> S3ServiceResult<u64> {
    let text = String::from_utf8_lossy(line);
    let size = text.split_once(';').map_or(&*text, |(size, _)| size).trim();
    u64::from_str_radix(size, 16).map_err(|_| S3ServiceError::MalformedChunkedBody {
        line: text.into_owned(),
    })
}
