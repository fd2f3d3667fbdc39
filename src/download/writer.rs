//! Offset writer: positional writes into one pre-sized output file.
//!
//! Many workers share one [`OffsetWriter`] and each writes its own chunk's
//! region. Writes are positional (`pwrite`-style), so no shared file cursor is
//! read or moved and no cross-call locking is needed; safety rests on the
//! planner handing out disjoint regions.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures_util::StreamExt;
use tracing::{debug, instrument, warn};

use super::DownloadError;
use super::fetch::ByteStream;

#[derive(Debug)]
enum WriterState {
    Open(Arc<File>),
    Closed,
    Removed,
}

/// Owns the output file of one download and writes chunks at exact offsets.
#[derive(Debug)]
pub struct OffsetWriter {
    path: PathBuf,
    size: u64,
    state: Mutex<WriterState>,
}

impl OffsetWriter {
    /// Creates (or truncates) `path`, creating its parent directory, and
    /// extends it to `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidInput`] for a zero size and
    /// [`DownloadError::Io`] if the directory or file cannot be created or sized.
    #[instrument(level = "debug", fields(path = %path.display()))]
    pub async fn open(path: &Path, size: u64) -> Result<Self, DownloadError> {
        if size == 0 {
            return Err(DownloadError::invalid_input(format!(
                "output file size must be positive, got {size}"
            )));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        if let Err(e) = file.set_len(size).await {
            drop(file);
            // Don't leave an unsized artifact behind.
            if let Err(remove) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), error = %remove, "removing unsized output file failed");
            }
            return Err(DownloadError::io(path, e));
        }

        let file = file.into_std().await;
        debug!(size, "pre-allocated output file");

        Ok(Self {
            path: path.to_path_buf(),
            size,
            state: Mutex::new(WriterState::Open(Arc::new(file))),
        })
    }

    /// Path of the output file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size the file was pre-allocated to.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns true until [`close`](Self::close) or [`cleanup`](Self::cleanup) runs.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(*self.lock_state(), WriterState::Open(_))
    }

    /// Consumes `stream`, writing its bytes to `[offset, offset + expected_size)`.
    ///
    /// Nothing is ever written past `offset + expected_size`: a body that runs
    /// long is rejected before the overflowing piece touches the file.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::OutOfRange`] if the region does not fit in the file
    /// - [`DownloadError::LengthMismatch`] if the stream yields more or fewer bytes
    /// - [`DownloadError::Io`] on a failed positional write
    /// - [`DownloadError::AlreadyClosed`] after close/cleanup
    /// - any error yielded by the stream itself
    pub async fn write_at(
        &self,
        mut stream: ByteStream,
        offset: u64,
        expected_size: u64,
    ) -> Result<(), DownloadError> {
        if offset >= self.size || expected_size > self.size - offset {
            return Err(DownloadError::out_of_range(offset, expected_size, self.size));
        }

        let file = self.handle()?;
        let mut written = 0u64;

        while let Some(piece) = stream.next().await {
            let piece = piece?;
            if piece.is_empty() {
                continue;
            }
            let len = piece.len() as u64;
            if written + len > expected_size {
                return Err(DownloadError::length_mismatch(
                    offset,
                    expected_size,
                    written + len,
                ));
            }
            self.write_piece(Arc::clone(&file), piece, offset + written)
                .await?;
            written += len;
        }

        if written != expected_size {
            return Err(DownloadError::length_mismatch(offset, expected_size, written));
        }
        Ok(())
    }

    /// Releases the file handle.
    ///
    /// In-flight writes keep their own handle clone until they finish.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::AlreadyClosed`] if the writer is no longer open.
    pub fn close(&self) -> Result<(), DownloadError> {
        let mut state = self.lock_state();
        match *state {
            WriterState::Open(_) => {
                *state = WriterState::Closed;
                debug!(path = %self.path.display(), "closed output file");
                Ok(())
            }
            WriterState::Closed | WriterState::Removed => {
                Err(DownloadError::already_closed(&self.path))
            }
        }
    }

    /// Releases the handle (if still open) and deletes the file.
    ///
    /// Used only when a download is abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::AlreadyClosed`] on a second call and
    /// [`DownloadError::Io`] if the file cannot be removed.
    pub async fn cleanup(&self) -> Result<(), DownloadError> {
        {
            let mut state = self.lock_state();
            if matches!(*state, WriterState::Removed) {
                return Err(DownloadError::already_closed(&self.path));
            }
            *state = WriterState::Removed;
        }

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed partial output file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "partial output file already gone");
                Ok(())
            }
            Err(e) => Err(DownloadError::io(&self.path, e)),
        }
    }

    /// Returns a guard that deletes the output file when dropped.
    ///
    /// Call [`RemoveOnDrop::disarm`] once the file is to be kept.
    #[must_use]
    pub fn remove_on_drop(&self) -> RemoveOnDrop {
        RemoveOnDrop {
            path: Some(self.path.clone()),
        }
    }

    fn handle(&self) -> Result<Arc<File>, DownloadError> {
        match &*self.lock_state() {
            WriterState::Open(file) => Ok(Arc::clone(file)),
            WriterState::Closed | WriterState::Removed => {
                Err(DownloadError::already_closed(&self.path))
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn write_piece(
        &self,
        file: Arc<File>,
        piece: Bytes,
        position: u64,
    ) -> Result<(), DownloadError> {
        tokio::task::spawn_blocking(move || write_all_at(&file, &piece, position))
            .await
            .map_err(|e| DownloadError::WorkerPanicked {
                message: e.to_string(),
            })?
            .map_err(|e| DownloadError::io(&self.path, e))
    }
}

/// Deletes an output file on drop unless disarmed.
///
/// Covers the exit paths no `Result` reaches, such as a download future
/// dropped by a timeout or an aborted task.
#[derive(Debug)]
pub struct RemoveOnDrop {
    path: Option<PathBuf>,
}

impl RemoveOnDrop {
    /// Keeps the file.
    pub fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed abandoned output file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "removing abandoned output file failed"),
        }
    }
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], position: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, position)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut position: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, position) {
            Ok(0) => return Err(std::io::Error::from(std::io::ErrorKind::WriteZero)),
            Ok(n) => {
                buf = &buf[n..];
                position += n as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::fetch::bytes_stream;
    use tempfile::TempDir;

    fn pieces(parts: &[&'static [u8]]) -> ByteStream {
        let items: Vec<Result<Bytes, DownloadError>> =
            parts.iter().map(|p| Ok(Bytes::from_static(*p))).collect();
        Box::pin(futures_util::stream::iter(items))
    }

    #[tokio::test]
    async fn test_open_presizes_and_creates_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("out.bin");

        let writer = OffsetWriter::open(&path, 1000).await.unwrap();

        assert!(writer.is_open());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn test_open_truncates_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");
        std::fs::write(&path, vec![7u8; 50]).unwrap();

        let _writer = OffsetWriter::open(&path, 10).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![0u8; 10]);
    }

    #[tokio::test]
    async fn test_armed_guard_removes_file_on_drop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");
        let writer = OffsetWriter::open(&path, 32).await.unwrap();

        let guard = writer.remove_on_drop();
        assert!(path.exists());
        drop(guard);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_disarmed_guard_keeps_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");
        let writer = OffsetWriter::open(&path, 32).await.unwrap();

        writer.remove_on_drop().disarm();
        writer.close().unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_guard_after_cleanup_is_quiet() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");
        let writer = OffsetWriter::open(&path, 8).await.unwrap();
        let guard = writer.remove_on_drop();

        writer.cleanup().await.unwrap();
        drop(guard);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_open_failing_to_size_leaves_no_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("huge.bin");

        let result = OffsetWriter::open(&path, u64::MAX).await;

        assert!(matches!(result, Err(DownloadError::Io { .. })));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_open_rejects_zero_size() {
        let temp = TempDir::new().unwrap();
        let result = OffsetWriter::open(&temp.path().join("x"), 0).await;
        assert!(matches!(result, Err(DownloadError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_write_at_places_bytes_at_offset() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");
        let writer = OffsetWriter::open(&path, 10).await.unwrap();

        writer.write_at(pieces(&[b"89"]), 8, 2).await.unwrap();
        writer.write_at(pieces(&[b"01", b"23"]), 0, 4).await.unwrap();
        writer.write_at(bytes_stream(&b"4567"[..]), 4, 4).await.unwrap();
        writer.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_write_at_rejects_out_of_range_offset() {
        let temp = TempDir::new().unwrap();
        let writer = OffsetWriter::open(&temp.path().join("o"), 10).await.unwrap();

        let result = writer.write_at(pieces(&[b"x"]), 10, 1).await;
        assert!(matches!(result, Err(DownloadError::OutOfRange { offset: 10, .. })));

        let result = writer.write_at(pieces(&[b"xxxx"]), 8, 4).await;
        assert!(matches!(result, Err(DownloadError::OutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_write_at_short_body_is_length_mismatch() {
        let temp = TempDir::new().unwrap();
        let writer = OffsetWriter::open(&temp.path().join("o"), 10).await.unwrap();

        let result = writer.write_at(pieces(&[b"ab"]), 0, 4).await;
        assert!(matches!(
            result,
            Err(DownloadError::LengthMismatch { expected: 4, actual: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_write_at_long_body_never_spills_into_next_region() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("o");
        let writer = OffsetWriter::open(&path, 8).await.unwrap();

        let result = writer.write_at(pieces(&[b"ab", b"cdef"]), 0, 4).await;
        assert!(matches!(result, Err(DownloadError::LengthMismatch { .. })));
        writer.close().unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(&content[..2], b"ab");
        assert_eq!(&content[2..], &[0u8; 6]);
    }

    #[tokio::test]
    async fn test_write_at_propagates_stream_error() {
        let temp = TempDir::new().unwrap();
        let writer = OffsetWriter::open(&temp.path().join("o"), 4).await.unwrap();
        let stream: ByteStream = Box::pin(futures_util::stream::iter([
            Ok(Bytes::from_static(b"ab")),
            Err(DownloadError::timeout("https://example.com/f")),
        ]));

        let result = writer.write_at(stream, 0, 4).await;
        assert!(matches!(result, Err(DownloadError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_close_twice_is_already_closed() {
        let temp = TempDir::new().unwrap();
        let writer = OffsetWriter::open(&temp.path().join("o"), 4).await.unwrap();

        writer.close().unwrap();
        assert!(!writer.is_open());
        assert!(matches!(writer.close(), Err(DownloadError::AlreadyClosed { .. })));
        let result = writer.write_at(pieces(&[b"abcd"]), 0, 4).await;
        assert!(matches!(result, Err(DownloadError::AlreadyClosed { .. })));
    }

    #[tokio::test]
    async fn test_cleanup_removes_file_and_second_call_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("o");
        let writer = OffsetWriter::open(&path, 4).await.unwrap();

        writer.cleanup().await.unwrap();
        assert!(!path.exists());
        assert!(matches!(
            writer.cleanup().await,
            Err(DownloadError::AlreadyClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_cleanup_after_close_still_removes_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("o");
        let writer = OffsetWriter::open(&path, 4).await.unwrap();

        writer.close().unwrap();
        writer.cleanup().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_disjoint_writes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("o");
        let source: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let writer = Arc::new(OffsetWriter::open(&path, source.len() as u64).await.unwrap());

        let mut handles = Vec::new();
        for (i, part) in source.chunks(100).enumerate().rev() {
            let writer = Arc::clone(&writer);
            let data = Bytes::copy_from_slice(part);
            handles.push(tokio::spawn(async move {
                let len = data.len() as u64;
                writer.write_at(bytes_stream(data), (i * 100) as u64, len).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        writer.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), source);
    }
}
