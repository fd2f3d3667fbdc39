//! Parallel chunked download pipeline.
//!
//! A download runs in four stages:
//!
//! 1. [`planner`] splits the content length into disjoint [`Chunk`]s
//! 2. [`writer`] pre-sizes the output file and accepts positional writes
//! 3. [`scheduler`] runs one fetch-and-write job per chunk on a bounded
//!    worker pool, with per-chunk retries and first-failure cancellation
//! 4. [`verify`] re-reads the assembled file and checks its digest
//!
//! [`Downloader`] orchestrates the stages and guarantees that a failed or
//! cancelled download leaves no partial file behind. Remote access goes
//! through two ports, [`MetadataSource`] and [`RangeFetcher`], both
//! implemented for HTTP by [`HttpClient`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use chunky_core::{DownloadConfig, Downloader, HttpClient};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(HttpClient::new()?);
//! let downloader = Downloader::new(client.clone(), DownloadConfig::default())?;
//! let path = downloader
//!     .run(
//!         client.as_ref(),
//!         "https://example.com/big.iso",
//!         Path::new("./downloads"),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! println!("Downloaded: {}", path.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub(crate) mod constants;
mod engine;
mod error;
pub mod fetch;
mod filename;
pub mod metadata;
pub mod planner;
mod retry;
pub mod scheduler;
pub mod verify;
pub mod writer;

pub use client::HttpClient;
pub use constants::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_PARALLELISM};
pub use engine::{DownloadProgress, Downloader};
pub use error::{DownloadError, ErrorKind};
pub use fetch::{ByteStream, RangeFetcher, bytes_stream};
pub use metadata::{FileMeta, MetadataSource, normalize_signature};
pub use planner::{Chunk, DownloadPlan, plan};
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{FailureSlot, PoolStats, TaskOutcome, WorkerPool};
pub use verify::{DigestAlgorithm, digest_file, signatures_match, verify_file};
pub use writer::{OffsetWriter, RemoveOnDrop};

// Use `Result<T, DownloadError>` explicitly in signatures; no module-local alias.
