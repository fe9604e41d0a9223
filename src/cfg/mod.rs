//! The packaging plan (`distpack.toml`).
//!
//! Relative paths in the plan are resolved against the directory that holds
//! the plan file, never against the process working directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::copy::{CopyOptions, ListingPolicy, OsDepNames};

pub const DEFAULT_CONFIG_FILE: &str = "distpack.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub dist: DistConfig,

    #[serde(default)]
    pub copy: CopyConfig,

    /// Name patterns applied to `[[files]]` steps marked `os_dependent`.
    #[serde(default, skip_serializing_if = "OsDepNames::is_empty")]
    pub os_names: OsDepNames,

    #[serde(default)]
    pub files: Vec<FileStep>,

    #[serde(default)]
    pub trees: Vec<TreeStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistConfig {
    /// Top-level folder the archive extracts into.
    pub name: String,

    /// Output archive path.
    pub archive: PathBuf,

    /// Directory the distribution is laid out in before archiving.
    #[serde(default = "default_staging")]
    pub staging: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    #[serde(default)]
    pub listing: ListingPolicy,

    #[serde(default = "default_preserve_mtime")]
    pub preserve_mtime: bool,
}

/// Flat copy of individual files into one staging subdirectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStep {
    #[serde(default = "default_dest")]
    pub dest: PathBuf,

    pub sources: Vec<PathBuf>,

    #[serde(default)]
    pub os_dependent: bool,
}

/// Copy of a whole directory, nested under its own name below `dest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeStep {
    pub source: PathBuf,

    #[serde(default = "default_dest")]
    pub dest: PathBuf,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub skip_hidden: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dist: DistConfig::default(),
            copy: CopyConfig::default(),
            os_names: OsDepNames::executables(),
            files: vec![
                FileStep {
                    dest: PathBuf::from("bin"),
                    sources: vec![PathBuf::from("target/release/myapp")],
                    os_dependent: true,
                },
                FileStep {
                    dest: default_dest(),
                    sources: vec![PathBuf::from("README.md"), PathBuf::from("LICENSE")],
                    os_dependent: false,
                },
            ],
            trees: vec![TreeStep {
                source: PathBuf::from("assets"),
                dest: default_dest(),
                include: Vec::new(),
                exclude: vec!["*.tmp".to_string(), "*.bak".to_string()],
                skip_hidden: true,
            }],
        }
    }
}

impl Default for DistConfig {
    fn default() -> Self {
        DistConfig {
            name: "myapp-0.1.0".to_string(),
            archive: PathBuf::from("target/myapp-0.1.0.zip"),
            staging: default_staging(),
        }
    }
}

impl Default for CopyConfig {
    fn default() -> Self {
        CopyConfig {
            listing: ListingPolicy::default(),
            preserve_mtime: default_preserve_mtime(),
        }
    }
}

impl Config {
    /// Copy options for a step, with OS-dependent names only when asked for.
    pub fn copy_options(&self, os_dependent: bool) -> CopyOptions {
        CopyOptions {
            os_names: if os_dependent {
                self.os_names.clone()
            } else {
                OsDepNames::new()
            },
            listing: self.copy.listing,
            preserve_mtime: self.copy.preserve_mtime,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.dist.name.trim().is_empty() {
            anyhow::bail!("[dist] name must not be empty");
        }
        for step in &self.files {
            check_relative("[[files]] dest", &step.dest)?;
        }
        for step in &self.trees {
            check_relative("[[trees]] dest", &step.dest)?;
        }
        Ok(())
    }
}

fn check_relative(field: &str, path: &Path) -> Result<()> {
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        anyhow::bail!(
            "{} must stay inside the staging directory: {}",
            field,
            path.display()
        );
    }
    Ok(())
}

fn default_staging() -> PathBuf {
    PathBuf::from("target/dist")
}

fn default_dest() -> PathBuf {
    PathBuf::from(".")
}

fn default_preserve_mtime() -> bool {
    true
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Directory relative plan paths are resolved against.
pub fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub fn init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
    }

    save(config_path, &Config::default())
}

pub fn load(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        anyhow::bail!(
            "Config not found at {}. Run 'distpack init' first.",
            config_path.display()
        );
    }

    let contents = fs::read_to_string(config_path).context("Failed to read config file")?;
    let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

pub fn save(config_path: &Path, config: &Config) -> Result<()> {
    let toml_string = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(config_path, toml_string).context("Failed to write config file")?;
    Ok(())
}
