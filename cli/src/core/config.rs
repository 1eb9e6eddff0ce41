//! # bucketzip Configuration System
//!
//! File: cli/src/core/config.rs
//!
//! ## Overview
//!
//! This module implements loading, merging, and validation of the settings the
//! archive pipelines need: where the object store lives, which bucket to
//! aggregate, how large the streaming copy buffer is, and where the buffered
//! pipeline may stage its temporary archive.
//!
//! ## Architecture
//!
//! Configuration sources (in order of precedence):
//! 1. Command-line flags and their environment variables (`--root`/`BUCKETZIP_ROOT`, `--bucket`/`BUCKETZIP_BUCKET`)
//! 2. Project-specific `.bucketzip.toml` in the current directory or its ancestors
//! 3. User-specific `config.toml` in the platform config directory
//! 4. Default values defined in the code
//!
//! Paths are `~`-expanded and the merged result is validated before use.
//!
//! ## Examples
//!
//! ```toml
//! [store]
//! root = "~/buckets"
//! bucket = "sample-bucket"
//!
//! [archive]
//! copy_chunk_size = 65536
//! staging_dir = "/var/tmp"
//! ```
//!
//! ```rust,ignore
//! let cfg = config::load_config(ConfigOverrides::default())?;
//! let store = LocalStore::new(cfg.store_root());
//! ```
//!
use crate::core::error::{BucketzipError, Result};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Represents the main configuration structure, loaded from TOML files.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)] // Error if unknown fields are in TOML
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Location of the object store and the collection to aggregate.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store root directory; each sub-directory is a bucket (can use ~).
    #[serde(default = "default_store_root")]
    pub root: String,
    /// Name of the bucket whose objects are archived.
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

/// Tuning of the archive pipelines.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Size in bytes of the buffer the streaming pipeline copies through.
    #[serde(default = "default_copy_chunk_size")]
    pub copy_chunk_size: usize,
    /// Directory for the buffered pipeline's staging file. Defaults to the OS temp dir.
    #[serde(default)]
    pub staging_dir: Option<String>,
}

/// Values supplied on the command line; `None` keeps the file/default value.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub root: Option<String>,
    pub bucket: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            bucket: default_bucket(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            copy_chunk_size: default_copy_chunk_size(),
            staging_dir: None,
        }
    }
}

impl Config {
    pub fn store_root(&self) -> PathBuf {
        PathBuf::from(&self.store.root)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.archive
            .staging_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir)
    }
}

fn default_store_root() -> String {
    ".".to_string()
}
fn default_bucket() -> String {
    "sample-bucket".to_string()
}
fn default_copy_chunk_size() -> usize {
    32 * 1024
}

const PROJECT_CONFIG_FILENAME: &str = ".bucketzip.toml";

/// Loads the layered configuration, applies command-line overrides, expands
/// paths, and validates the result.
pub fn load_config(overrides: ConfigOverrides) -> Result<Config> {
    let user_config = load_user_config()?;
    let project_config = load_project_config()?;
    let mut merged_config = merge_configs(user_config.unwrap_or_default(), project_config);
    apply_overrides(&mut merged_config, overrides);
    expand_config_paths(&mut merged_config).context("Failed to expand paths in configuration")?;
    validate_config(&merged_config).context("Configuration validation failed")?;
    debug!("Final loaded configuration: {:?}", merged_config);
    Ok(merged_config)
}

fn load_user_config() -> Result<Option<Config>> {
    if let Some(proj_dirs) = ProjectDirs::from("com", "bucketzip", "bucketzip") {
        let config_path = proj_dirs.config_dir().join("config.toml");
        if config_path.exists() {
            info!("Loading user configuration from: {}", config_path.display());
            load_config_from_path(&config_path).map(Some)
        } else {
            debug!(
                "User configuration file not found at {}",
                config_path.display()
            );
            Ok(None)
        }
    } else {
        warn!("Could not determine user config directory.");
        Ok(None)
    }
}

fn load_project_config() -> Result<Option<Config>> {
    let current_dir = env::current_dir().context("Failed to get current directory")?;
    if let Some(project_config_path) = find_project_config_path(&current_dir) {
        info!(
            "Loading project configuration from: {}",
            project_config_path.display()
        );
        load_config_from_path(&project_config_path).map(Some)
    } else {
        debug!("No project configuration file ({PROJECT_CONFIG_FILENAME}) found in current directory or ancestors.");
        Ok(None)
    }
}

/// Walks from `start` towards the filesystem root looking for the project
/// config file. The search stops at the first directory containing `.git`.
fn find_project_config_path(start: &Path) -> Option<PathBuf> {
    let mut path = start;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Some(project_config);
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return None;
        }
        path = path.parent()?;
    }
}

fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

/// Project values win over user values wherever the project file moved a
/// setting away from its default.
fn merge_configs(user: Config, project: Option<Config>) -> Config {
    let project_cfg = match project {
        Some(p) => p,
        None => return user,
    };
    let mut merged = Config::default();
    merged.store.root = if project_cfg.store.root != default_store_root() {
        project_cfg.store.root
    } else {
        user.store.root
    };
    merged.store.bucket = if project_cfg.store.bucket != default_bucket() {
        project_cfg.store.bucket
    } else {
        user.store.bucket
    };
    merged.archive.copy_chunk_size =
        if project_cfg.archive.copy_chunk_size != default_copy_chunk_size() {
            project_cfg.archive.copy_chunk_size
        } else {
            user.archive.copy_chunk_size
        };
    merged.archive.staging_dir = project_cfg.archive.staging_dir.or(user.archive.staging_dir);
    merged
}

fn apply_overrides(config: &mut Config, overrides: ConfigOverrides) {
    if let Some(root) = overrides.root {
        debug!("Store root overridden on the command line: {}", root);
        config.store.root = root;
    }
    if let Some(bucket) = overrides.bucket {
        debug!("Bucket overridden on the command line: {}", bucket);
        config.store.bucket = bucket;
    }
}

fn expand_config_paths(config: &mut Config) -> Result<()> {
    config.store.root = shellexpand::tilde(&config.store.root).into_owned();
    debug!("Expanded store root: {}", config.store.root);
    if let Some(dir) = config.archive.staging_dir.as_mut() {
        *dir = shellexpand::tilde(dir).into_owned();
        debug!("Expanded staging directory: {}", dir);
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    info!("Validating final configuration...");
    let bucket = &config.store.bucket;
    if bucket.is_empty() || bucket.contains('/') || bucket == "." || bucket == ".." {
        return Err(anyhow!(BucketzipError::Config(format!(
            "Invalid bucket name: '{}'. Expected a single non-empty path segment.",
            bucket
        ))));
    }
    if config.archive.copy_chunk_size == 0 {
        return Err(anyhow!(BucketzipError::Config(
            "archive.copy_chunk_size must be greater than zero.".to_string()
        )));
    }
    let root = config.store_root();
    if !root.exists() {
        warn!("Configured store root '{}' does not exist.", root.display());
    } else if !root.is_dir() {
        return Err(anyhow!(BucketzipError::Config(format!(
            "Configured store root '{}' exists but is not a directory.",
            root.display()
        ))));
    }
    if let Some(dir) = &config.archive.staging_dir {
        if !Path::new(dir).is_dir() {
            return Err(anyhow!(BucketzipError::Config(format!(
                "Configured staging directory '{}' is not an existing directory.",
                dir
            ))));
        }
    }
    info!("Configuration validation successful.");
    Ok(())
}
