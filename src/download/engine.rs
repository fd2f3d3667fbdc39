//! Download orchestration.
//!
//! The [`Downloader`] wires the pipeline together: plan chunks from the
//! content length, pre-size the output file, run one fetch-and-write job per
//! chunk on a [`WorkerPool`], then verify the assembled file. Any failure or
//! cancellation deletes the partial file before the error is returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::error::DownloadError;
use super::fetch::RangeFetcher;
use super::metadata::{FileMeta, MetadataSource};
use super::planner::{Chunk, DownloadPlan};
use super::scheduler::WorkerPool;
use super::verify::verify_file;
use super::writer::OffsetWriter;
use crate::config::DownloadConfig;

/// Observer for download progress.
///
/// Both callbacks default to doing nothing. `on_chunk_written` is called from
/// worker tasks, once per chunk, in completion order.
pub trait DownloadProgress: Send + Sync {
    /// Called once the output file exists and before any chunk is fetched.
    fn on_start(&self, _plan: &DownloadPlan) {}

    /// Called after a chunk's bytes are fully written.
    fn on_chunk_written(&self, _chunk: &Chunk) {}
}

#[derive(Debug)]
struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Downloads one file in parallel byte ranges and verifies it.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
///
/// use chunky_core::{DownloadConfig, Downloader, HttpClient};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), chunky_core::DownloadError> {
/// let client = Arc::new(HttpClient::new()?);
/// let downloader = Downloader::new(client.clone(), DownloadConfig::default())?;
/// let path = downloader
///     .run(
///         client.as_ref(),
///         "https://example.com/big.iso",
///         Path::new("."),
///         &CancellationToken::new(),
///     )
///     .await?;
/// println!("saved {}", path.display());
/// # Ok(())
/// # }
/// ```
pub struct Downloader {
    fetcher: Arc<dyn RangeFetcher>,
    config: DownloadConfig,
    progress: Arc<dyn DownloadProgress>,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    /// Creates a downloader that fetches ranges through `fetcher`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidInput`] if `config` fails validation.
    pub fn new(
        fetcher: Arc<dyn RangeFetcher>,
        config: DownloadConfig,
    ) -> Result<Self, DownloadError> {
        config.validate()?;
        Ok(Self {
            fetcher,
            config,
            progress: Arc::new(NoProgress),
        })
    }

    /// Attaches a progress observer.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn DownloadProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// The configuration this downloader runs with.
    #[must_use]
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Resolves metadata for `url` through `source`, then downloads it into `dir`.
    ///
    /// # Errors
    ///
    /// Any metadata error is returned before a file is created; otherwise see
    /// [`download`](Self::download).
    #[instrument(skip_all, fields(url = %url))]
    pub async fn run(
        &self,
        source: &dyn MetadataSource,
        url: &str,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        let meta = source.head_meta(url).await?;
        self.download(url, &meta, dir, cancel).await
    }

    /// Downloads the file described by `meta` into `dir`.
    ///
    /// Returns the path of the verified file.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Metadata`] if `meta` does not allow a chunked download
    /// - [`DownloadError::Io`] if the output file cannot be created
    /// - [`DownloadError::RetriesExhausted`] for the first chunk that gave up
    /// - [`DownloadError::Cancelled`] or [`DownloadError::SubmissionCancelled`]
    ///   when `cancel` fires
    /// - [`DownloadError::ChecksumMismatch`] if the assembled file is corrupt
    ///
    /// No output file is left behind when an error is returned or when the
    /// returned future is dropped before completion.
    #[instrument(skip_all, fields(url = %url, file = %meta.file_name))]
    pub async fn download(
        &self,
        url: &str,
        meta: &FileMeta,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        meta.ensure_downloadable(url)?;
        let plan = DownloadPlan::new(meta.content_size, self.config.chunk_size)?;
        let path = dir.join(&meta.file_name);

        info!(
            size = plan.total_size(),
            chunks = plan.len(),
            parallelism = self.config.parallelism,
            retries = self.config.max_retries,
            path = %path.display(),
            "starting download"
        );

        let writer = Arc::new(OffsetWriter::open(&path, plan.total_size()).await?);
        // Removes the file if this future is dropped before it resolves.
        let guard = writer.remove_on_drop();
        self.progress.on_start(&plan);

        match self.assemble(url, &plan, &writer, &meta.signature, cancel).await {
            Ok(()) => {
                guard.disarm();
                info!(path = %path.display(), "download complete");
                Ok(path)
            }
            Err(error) => {
                warn!(error = %error, "download failed, removing partial file");
                match writer.cleanup().await {
                    Ok(()) => guard.disarm(),
                    Err(cleanup) => warn!(error = %cleanup, "cleanup of partial file failed"),
                }
                Err(error)
            }
        }
    }

    async fn assemble(
        &self,
        url: &str,
        plan: &DownloadPlan,
        writer: &Arc<OffsetWriter>,
        signature: &str,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        self.fetch_all(url, plan, writer, cancel).await?;
        writer.close()?;
        verify_file(writer.path(), signature, self.config.verify_read_size).await
    }

    async fn fetch_all(
        &self,
        url: &str,
        plan: &DownloadPlan,
        writer: &Arc<OffsetWriter>,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let pool = WorkerPool::new(self.config.parallelism, self.config.retry_policy(), cancel)?;
        let url: Arc<str> = Arc::from(url);

        let mut rejected = None;
        for &chunk in plan.chunks() {
            let fetcher = Arc::clone(&self.fetcher);
            let writer = Arc::clone(writer);
            let progress = Arc::clone(&self.progress);
            let url = Arc::clone(&url);

            let task = move || {
                let fetcher = Arc::clone(&fetcher);
                let writer = Arc::clone(&writer);
                let progress = Arc::clone(&progress);
                let url = Arc::clone(&url);
                async move {
                    debug!(
                        chunk = chunk.index,
                        offset = chunk.offset,
                        size = chunk.size,
                        "fetching chunk"
                    );
                    let stream = fetcher.fetch_range(&url, chunk.offset, chunk.size).await?;
                    writer.write_at(stream, chunk.offset, chunk.size).await?;
                    progress.on_chunk_written(&chunk);
                    Ok::<(), DownloadError>(())
                }
            };

            if let Err(error) = pool.submit(chunk.index, task).await {
                debug!(chunk = chunk.index, "submission stopped: {error}");
                rejected = Some(error);
                break;
            }
        }

        // The pool's own error explains why submission was rejected.
        pool.wait().await?;
        match rejected {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
