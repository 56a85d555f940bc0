//! Config file loading and merging with CLI flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use image_fetcher_core::{FetchConfig, ImageType};
use serde::Deserialize;

use crate::cli::Args;

/// TOML-backed file configuration for fetch defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Default output directory.
    pub output_dir: Option<PathBuf>,
    /// Default size ceiling in bytes.
    pub max_bytes: Option<u64>,
    /// Default network timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Default delay between URLs in milliseconds.
    pub delay_ms: Option<u64>,
    /// Default allow-list (MIME strings or short names).
    pub allowed_types: Option<Vec<String>>,
    /// Whether `index.json` is used.
    pub use_index: Option<bool>,
}

impl FileConfig {
    /// Validates config values against the same ranges the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        if self.max_bytes == Some(0) {
            bail!("Invalid config value for `max_bytes`: 0. Expected a positive byte count");
        }
        if let Some(timeout) = self.timeout_secs
            && !(1..=3600).contains(&timeout)
        {
            bail!("Invalid config value for `timeout_secs`: {timeout}. Expected range: 1..=3600");
        }
        if let Some(delay) = self.delay_ms
            && delay > 60_000
        {
            bail!("Invalid config value for `delay_ms`: {delay}. Expected range: 0..=60000");
        }
        if let Some(types) = &self.allowed_types {
            if types.is_empty() {
                bail!("Invalid config value for `allowed_types`: list must not be empty");
            }
            self.parsed_types()?;
        }
        Ok(())
    }

    fn parsed_types(&self) -> Result<Option<Vec<ImageType>>> {
        let Some(types) = &self.allowed_types else {
            return Ok(None);
        };
        let mut parsed = Vec::with_capacity(types.len());
        for name in types {
            let Some(kind) = ImageType::from_name(name) else {
                bail!("Invalid config value for `allowed_types`: unknown image type '{name}'");
            };
            if !parsed.contains(&kind) {
                parsed.push(kind);
            }
        }
        Ok(Some(parsed))
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/image-fetcher/config.toml`
/// 2. `$HOME/.config/image-fetcher/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("image-fetcher")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("image-fetcher")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Merges CLI flags over file config over defaults.
pub fn resolve_fetch_config(args: &Args, file: Option<&FileConfig>) -> Result<FetchConfig> {
    let defaults = FetchConfig::default();
    let file = file.cloned().unwrap_or_default();
    let file_types = file.parsed_types()?;

    let allowed_types = if args.allow_types.is_empty() {
        file_types.unwrap_or(defaults.allowed_types)
    } else {
        let mut types = Vec::with_capacity(args.allow_types.len());
        for kind in &args.allow_types {
            if !types.contains(kind) {
                types.push(*kind);
            }
        }
        types
    };

    Ok(FetchConfig {
        output_dir: args
            .out
            .clone()
            .or(file.output_dir)
            .unwrap_or(defaults.output_dir),
        max_bytes: args
            .max_bytes
            .or(file.max_bytes)
            .unwrap_or(defaults.max_bytes),
        allowed_types,
        timeout: args
            .timeout
            .or(file.timeout_secs)
            .map_or(defaults.timeout, Duration::from_secs),
        delay: args
            .delay
            .or(file.delay_ms)
            .map_or(defaults.delay, Duration::from_millis),
        use_index: !args.no_index && file.use_index.unwrap_or(defaults.use_index),
    })
}
