//! Chunky Core Library
//!
//! This library downloads a single large file by splitting it into fixed-size
//! byte ranges, fetching the ranges concurrently over HTTP, writing every range
//! straight into its final position of a pre-sized output file, and verifying
//! the assembled file against the server-supplied signature.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Tunables for a download run and their validation
//! - [`download`] - Chunk planning, offset writing, the worker pool,
//!   integrity verification and the orchestrating [`Downloader`]

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
mod user_agent;

// Re-export commonly used types
pub use config::DownloadConfig;
pub use download::{
    ByteStream, Chunk, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_PARALLELISM,
    DownloadError, DownloadPlan, DownloadProgress, Downloader, ErrorKind, FileMeta, HttpClient,
    MetadataSource, OffsetWriter, PoolStats, RangeFetcher, RetryPolicy, WorkerPool, plan,
};
