//! Chunk planning: splits a known content length into disjoint byte ranges.

use tracing::debug;

use super::DownloadError;

/// A contiguous, non-overlapping byte range of the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    /// Position in the plan (0-based, assignment order).
    pub index: usize,
    /// First byte of the range.
    pub offset: u64,
    /// Number of bytes in the range (always > 0).
    pub size: u64,
}

impl Chunk {
    /// Returns the offset one past the last byte of this chunk.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Returns the inclusive last byte, as used by an HTTP `Range` header.
    #[must_use]
    pub fn last_byte(&self) -> u64 {
        self.end() - 1
    }
}

/// The chunk layout of one download. Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    total_size: u64,
    chunk_size: u64,
    chunks: Vec<Chunk>,
}

impl DownloadPlan {
    /// Plans a download of `total_size` bytes in `chunk_size` pieces.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidInput`] if either size is zero.
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self, DownloadError> {
        let chunks = plan(total_size, chunk_size)?;
        Ok(Self {
            total_size,
            chunk_size,
            chunks,
        })
    }

    /// Total content length covered by the plan.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Configured chunk size (the last chunk may be smaller).
    #[must_use]
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Chunks in increasing offset order.
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Always false for a valid plan; provided for API completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Splits `total_size` bytes into `ceil(total_size / chunk_size)` chunks.
///
/// Chunks start at offset 0, are contiguous and ordered, and every chunk is
/// exactly `chunk_size` bytes except a smaller final remainder.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidInput`] if `total_size` or `chunk_size` is zero.
pub fn plan(total_size: u64, chunk_size: u64) -> Result<Vec<Chunk>, DownloadError> {
    if total_size == 0 {
        return Err(DownloadError::invalid_input(format!(
            "total size must be positive, got {total_size}"
        )));
    }
    if chunk_size == 0 {
        return Err(DownloadError::invalid_input(format!(
            "chunk size must be positive, got {chunk_size}"
        )));
    }

    let count = usize::try_from(total_size.div_ceil(chunk_size)).map_err(|_| {
        DownloadError::invalid_input(format!(
            "{total_size} bytes in {chunk_size}-byte chunks is too many chunks"
        ))
    })?;

    let mut chunks = Vec::with_capacity(count);
    let mut offset = 0u64;
    while offset < total_size {
        let size = chunk_size.min(total_size - offset);
        chunks.push(Chunk {
            index: chunks.len(),
            offset,
            size,
        });
        offset += size;
    }

    debug!(total_size, chunk_size, chunks = chunks.len(), "planned chunks");
    Ok(chunks)
}
