//! Lazy body readers.
//!
//! Both iterators hold their own cursor over a shared [`S3Object`], so any
//! number of them can walk the same object independently. Each step seeks
//! to the cursor and reads one block of at most [`S3_CHUNK_SIZE`] bytes.

use std::sync::Arc;

use bytes::Bytes;

use crate::S3_CHUNK_SIZE;
use crate::error::S3ServiceResult;
use crate::state::S3Object;
use crate::utils::ParsedRange;

/// Iterator over the full body of an object.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use objstore_s3::IngestSource;
/// use objstore_s3::read::BodyIterator;
/// use objstore_s3::state::{ObjectParams, S3Object};
///
/// let mut body: &[u8] = b"hello";
/// let params = ObjectParams::builder().key("a".to_owned()).build();
/// let object = Arc::new(S3Object::new(params, IngestSource::Stream(&mut body)).unwrap());
///
/// let bytes: Vec<u8> = BodyIterator::new(object)
///     .map(|block| block.unwrap())
///     .flat_map(|block| block.to_vec())
///     .collect();
/// assert_eq!(bytes, b"hello");
/// ```
#[derive(Debug)]
pub struct BodyIterator {
    object: Arc<S3Object>,
    pos: u64,
    done: bool,
}

impl BodyIterator {
    /// Start reading `object` from offset 0.
    #[must_use]
    pub fn new(object: Arc<S3Object>) -> Self {
        Self {
            object,
            pos: 0,
            done: false,
        }
    }
}

impl Iterator for BodyIterator {
    type Item = S3ServiceResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.object.read_at(self.pos, S3_CHUNK_SIZE) {
            Ok(block) if block.is_empty() => {
                self.done = true;
                None
            }
            Ok(block) => {
                self.pos += block.len() as u64;
                Some(Ok(block))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Iterator over a byte range of an object.
///
/// Stops after `content_length` bytes, or earlier when the stored value is
/// shorter than the range.
#[derive(Debug)]
pub struct RangeBodyIterator {
    object: Arc<S3Object>,
    pos: u64,
    remaining: u64,
}

impl RangeBodyIterator {
    /// Start reading `range` of `object`.
    #[must_use]
    pub fn new(object: Arc<S3Object>, range: ParsedRange) -> Self {
        Self {
            object,
            pos: range.begin,
            remaining: range.content_length,
        }
    }
}

impl Iterator for RangeBodyIterator {
    type Item = S3ServiceResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let amount = usize::try_from(self.remaining).map_or(S3_CHUNK_SIZE, |r| r.min(S3_CHUNK_SIZE));
        match self.object.read_at(self.pos, amount) {
            Ok(block) if block.is_empty() => {
                self.remaining = 0;
                None
            }
            Ok(block) => {
                let read = block.len() as u64;
                self.pos += read;
                self.remaining -= read;
                Some(Ok(block))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}
