//! Optional TOML config file supplying defaults for CLI options.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chunky_core::DownloadConfig;
use serde::Deserialize;
use tracing::debug;

use crate::cli::DownloadArgs;

const MAX_TIMEOUT_SECS: u64 = 3600;

/// Defaults read from `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    /// Directory to save downloads in.
    pub(crate) directory: Option<PathBuf>,
    /// Number of concurrent workers.
    pub(crate) parallelism: Option<usize>,
    /// Chunk size in bytes.
    pub(crate) chunk_size: Option<u64>,
    /// Extra attempts per failed chunk.
    pub(crate) retries: Option<u32>,
    /// HTTP connect timeout in seconds.
    pub(crate) connect_timeout_secs: Option<u64>,
    /// HTTP request timeout in seconds.
    pub(crate) read_timeout_secs: Option<u64>,
}

impl FileConfig {
    fn validate(&self) -> Result<()> {
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=MAX_TIMEOUT_SECS).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..={MAX_TIMEOUT_SECS}");
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/chunky/config.toml`
/// 2. `$HOME/.config/chunky/config.toml`
#[must_use]
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("chunky")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("chunky")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; the default location is optional.
pub(crate) fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match resolve_default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(None),
        },
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config = parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    debug!(path = %path.display(), "loaded config file");
    Ok(Some(config))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Settings for one run after merging CLI flags over the config file.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedSettings {
    pub(crate) url: String,
    pub(crate) directory: PathBuf,
    pub(crate) download: DownloadConfig,
}

/// Merges `args` over `file` over built-in defaults and validates the result.
pub(crate) fn resolve_settings(
    args: &DownloadArgs,
    file: Option<&FileConfig>,
) -> Result<ResolvedSettings> {
    let file = file.cloned().unwrap_or_default();
    let defaults = DownloadConfig::default();

    let directory = args
        .directory
        .clone()
        .or(file.directory)
        .unwrap_or_else(|| PathBuf::from("."));

    let download = DownloadConfig {
        parallelism: args
            .parallelism
            .map(usize::from)
            .or(file.parallelism)
            .unwrap_or(defaults.parallelism),
        chunk_size: args
            .chunk_size
            .or(file.chunk_size)
            .unwrap_or(defaults.chunk_size),
        max_retries: args
            .retries
            .or(file.retries)
            .unwrap_or(defaults.max_retries),
        connect_timeout: file
            .connect_timeout_secs
            .map_or(defaults.connect_timeout, Duration::from_secs),
        read_timeout: file
            .read_timeout_secs
            .map_or(defaults.read_timeout, Duration::from_secs),
        ..defaults
    };
    download
        .validate()
        .context("Invalid download settings")?;

    Ok(ResolvedSettings {
        url: args.url.clone(),
        directory,
        download,
    })
}
