//! Byte progress bar for a download run.

use chunky_core::{Chunk, DownloadPlan, DownloadProgress};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner} [{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Draws bytes written on stderr.
#[derive(Debug)]
pub(crate) struct ByteProgress {
    bar: ProgressBar,
}

impl ByteProgress {
    /// Creates a bar; a hidden bar when `visible` is false.
    pub(crate) fn new(visible: bool) -> Self {
        let bar = ProgressBar::new(0);
        if visible {
            bar.set_draw_target(ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .map(|style| style.progress_chars("=> "))
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self { bar }
    }

    /// Clears the bar from the terminal.
    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl DownloadProgress for ByteProgress {
    fn on_start(&self, plan: &DownloadPlan) {
        self.bar.set_length(plan.total_size());
        self.bar.set_position(0);
    }

    fn on_chunk_written(&self, chunk: &Chunk) {
        self.bar.inc(chunk.size);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_counts_written_bytes() {
        let progress = ByteProgress::new(false);
        let plan = DownloadPlan::new(10, 4).unwrap();
        progress.on_start(&plan);
        for chunk in plan.chunks() {
            progress.on_chunk_written(chunk);
        }
        assert_eq!(progress.position(), 10);
        progress.finish();
    }
}
