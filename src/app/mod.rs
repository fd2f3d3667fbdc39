//! Binary-side wiring: config file, progress bar, terminal and run loop.

pub(crate) mod file_config;
pub(crate) mod progress;
pub(crate) mod runtime;
pub(crate) mod terminal;
