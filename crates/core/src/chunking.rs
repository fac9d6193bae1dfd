//! Fixed-size chunking of local files.
//!
//! [`split_ranges`] is a pure function of the file size. [`write_chunk`] copies
//! one range of a source file into its own staging file so an upload job can
//! own it exclusively.

use std::io::SeekFrom;
use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::CoreError;

/// Default chunk size (5 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// A half-open byte range `[start, end)` of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: u32,
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    /// Number of bytes covered by this range.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Number of chunks a file of `file_size` bytes splits into.
pub fn chunk_count(file_size: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    file_size.div_ceil(chunk_size)
}

/// Whether a file should take the chunked upload path.
///
/// Files no larger than one chunk (including empty files) are uploaded whole.
pub fn needs_chunking(file_size: u64, chunk_size: u64) -> bool {
    file_size > chunk_size
}

/// Split a file of `file_size` bytes into consecutive ranges of `chunk_size`.
///
/// Every range but the last has length `chunk_size`. A zero-length file yields
/// no ranges.
pub fn split_ranges(file_size: u64, chunk_size: u64) -> Result<Vec<ChunkRange>, CoreError> {
    if chunk_size == 0 {
        return Err(CoreError::Validation(
            "Chunk size must be greater than zero".to_string(),
        ));
    }

    let count = chunk_count(file_size, chunk_size);
    let index_limit = u64::from(u32::MAX);
    if count > index_limit {
        return Err(CoreError::Validation(format!(
            "File of {file_size} bytes needs {count} chunks, more than the supported {index_limit}"
        )));
    }

    let ranges = (0..count)
        .map(|i| {
            let start = i * chunk_size;
            ChunkRange {
                index: i as u32,
                start,
                end: (start + chunk_size).min(file_size),
            }
        })
        .collect();
    Ok(ranges)
}

/// Copy the bytes of `range` from `src` into a new file at `dest`.
///
/// `dest` is truncated if it already exists, so repeating the call is safe.
pub async fn write_chunk(src: &Path, range: ChunkRange, dest: &Path) -> std::io::Result<()> {
    let mut source = tokio::fs::File::open(src).await?;
    source.seek(SeekFrom::Start(range.start)).await?;
    let mut limited = source.take(range.len());
    let mut target = tokio::fs::File::create(dest).await?;
    let copied = tokio::io::copy(&mut limited, &mut target).await?;
    if copied != range.len() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!(
                "Expected {} bytes for chunk {} of {}, copied {copied}",
                range.len(),
                range.index,
                src.display()
            ),
        ));
    }
    target.sync_all().await?;
    Ok(())
}
