//! One CLI run: resolve settings, wire the downloader, map the outcome.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use chunky_core::{DownloadError, Downloader, HttpClient};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::file_config::{self, ResolvedSettings};
use crate::app::progress::ByteProgress;
use crate::app::terminal;
use crate::cli::{Cli, Command};

pub(crate) async fn run(cli: Cli) -> Result<ProcessExit> {
    terminal::init_tracing(terminal::default_log_level(cli.quiet, cli.verbose));
    debug!(?cli, "CLI arguments parsed");

    let file_config = file_config::load_file_config(cli.config.as_deref())?;
    let Command::Download(args) = &cli.command;
    let settings = file_config::resolve_settings(args, file_config.as_ref())?;

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let show_progress = terminal::should_show_progress(
        io::stderr().is_terminal(),
        cli.quiet,
        terminal::is_dumb_terminal(),
    );
    let progress = Arc::new(ByteProgress::new(show_progress));

    let outcome = download(&settings, Arc::clone(&progress), &cancel).await;
    progress.finish();

    match outcome {
        Ok(path) => {
            println!("{}", path.display());
            Ok(ProcessExit::Success)
        }
        Err(error) if error.is_cancellation() && cancel.is_cancelled() => {
            warn!("Interrupted, partial file removed");
            Ok(ProcessExit::Interrupted)
        }
        Err(error) => Err(error).context(format!("Failed to download {}", settings.url)),
    }
}

async fn download(
    settings: &ResolvedSettings,
    progress: Arc<ByteProgress>,
    cancel: &CancellationToken,
) -> Result<std::path::PathBuf, DownloadError> {
    let config = settings.download.clone();
    let client = Arc::new(HttpClient::with_timeouts(
        config.connect_timeout,
        config.read_timeout,
    )?);
    let downloader = Downloader::new(client.clone(), config)?.with_progress(progress);

    info!(url = %settings.url, dir = %settings.directory.display(), "Chunky starting");
    downloader
        .run(client.as_ref(), &settings.url, &settings.directory, cancel)
        .await
}

/// Cancels `cancel` on Ctrl-C, and on SIGTERM where supported.
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!("Shutdown signal received, cancelling download");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            debug!(error = %e, "SIGTERM handler unavailable");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
