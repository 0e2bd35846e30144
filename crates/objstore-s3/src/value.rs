//! Backing byte sink of an object.
//!
//! Each object owns one [`ObjectValue`]. Small bodies live in memory; once a
//! body grows past the configured threshold it transparently rolls over to an
//! anonymous temporary file that is removed when the value is dropped.

use std::io::{Read, Seek, SeekFrom, Write};

use anyhow::Context;
use bytes::Bytes;
use tempfile::SpooledTempFile;

use crate::error::S3ServiceResult;

/// Truncatable, seekable byte sink with spill-to-disk.
#[derive(Debug)]
pub struct ObjectValue {
    file: SpooledTempFile,
}

impl ObjectValue {
    /// Create an empty value that spills after `max_memory_size` bytes.
    #[must_use]
    pub fn new(max_memory_size: usize) -> Self {
        Self {
            file: SpooledTempFile::new(max_memory_size),
        }
    }

    /// Drop all content and move the cursor back to the start.
    pub fn truncate_and_rewind(&mut self) -> S3ServiceResult<()> {
        self.file
            .set_len(0)
            .context("failed to truncate object value")?;
        self.seek(0)
    }

    /// Append `data` at the cursor.
    pub fn write(&mut self, data: &[u8]) -> S3ServiceResult<()> {
        self.file
            .write_all(data)
            .context("failed to write object value")?;
        Ok(())
    }

    /// Move the cursor to an absolute offset.
    pub fn seek(&mut self, offset: u64) -> S3ServiceResult<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .context("failed to seek object value")?;
        Ok(())
    }

    /// Read up to `max` bytes from the cursor. An empty result means the end
    /// of the value was reached.
    pub fn read(&mut self, max: usize) -> S3ServiceResult<Bytes> {
        let mut buf = Vec::with_capacity(max);
        (&mut self.file)
            .take(max as u64)
            .read_to_end(&mut buf)
            .context("failed to read object value")?;
        Ok(Bytes::from(buf))
    }

    /// Current length of the value. The cursor position is preserved.
    pub fn size(&mut self) -> S3ServiceResult<u64> {
        let pos = self
            .file
            .stream_position()
            .context("failed to query object value position")?;
        let end = self
            .file
            .seek(SeekFrom::End(0))
            .context("failed to seek object value")?;
        self.seek(pos)?;
        Ok(end)
    }

    /// Whether the content has rolled over to a temporary file.
    #[must_use]
    pub fn is_spilled(&self) -> bool {
        self.file.is_rolled()
    }
}
