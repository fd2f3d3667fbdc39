//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Fast parallel downloader.
///
/// Fetches a file in concurrent byte ranges, writes every range straight into
/// place and verifies the result against the server's `ETag`.
#[derive(Parser, Debug)]
#[command(name = "chunky")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Read defaults from this TOML file instead of the standard location
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download one file in parallel chunks
    Download(DownloadArgs),
}

/// Arguments of `chunky download`.
///
/// Unset options fall back to the config file, then to built-in defaults.
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// URL of the file to download
    #[arg(short, long)]
    pub url: String,

    /// Directory to save the file in [default: .]
    #[arg(short = 'd', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Number of concurrent workers (1-64) [default: 4]
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub parallelism: Option<u8>,

    /// Chunk size in bytes [default: 1048576]
    #[arg(short = 's', long = "size", value_name = "BYTES", value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: Option<u64>,

    /// Extra attempts per failed chunk (0-20) [default: 0]
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub retries: Option<u32>,
}
