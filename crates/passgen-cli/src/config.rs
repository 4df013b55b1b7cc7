//! CLI configuration, parsed from a TOML file plus environment variable overrides.
//!
//! Priority: command-line flags > environment variables > config file > defaults.

use anyhow::{Context, Result};
use passgen_core::{OutputMode, DEFAULT_ITERATION_COUNT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name looked up in the data directory
pub const CONFIG_FILE: &str = "passgen.toml";

/// Top-level CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Where key lists live
    #[serde(default)]
    pub store: StoreSection,

    /// Defaults for new lists and entries
    #[serde(default)]
    pub generation: GenerationSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// Directory holding `*.keys.json` / `*.keys` files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// List used when `--list` is not given
    #[serde(default)]
    pub default_list: Option<String>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_list: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSection {
    /// Iteration count for newly created lists
    #[serde(default = "default_iteration_count")]
    pub iteration_count: u32,

    /// Output mode for new entries
    #[serde(default)]
    pub output_mode: OutputMode,

    /// Max length for new entries
    #[serde(default)]
    pub max_length: Option<usize>,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            iteration_count: default_iteration_count(),
            output_mode: OutputMode::default(),
            max_length: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".passgen"))
        .unwrap_or_else(|| PathBuf::from(".passgen"))
}

fn default_iteration_count() -> u32 {
    DEFAULT_ITERATION_COUNT
}

fn default_log_level() -> String {
    "warn".to_string()
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Load `explicit` if given, else `passgen.toml` in `data_dir` (or the
    /// default data dir) if it exists, else defaults.
    pub fn load(explicit: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let implicit = data_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(default_data_dir)
            .join(CONFIG_FILE);
        if implicit.is_file() {
            log::debug!("Using config file {}", implicit.display());
            return Self::from_file(&implicit);
        }
        Ok(Self::default())
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `PASSGEN_DATA_DIR`
    /// - `PASSGEN_DEFAULT_LIST`
    /// - `PASSGEN_ITER_COUNT`
    /// - `PASSGEN_LOG_LEVEL`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("PASSGEN_DATA_DIR") {
            self.store.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("PASSGEN_DEFAULT_LIST") {
            self.store.default_list = Some(v);
        }
        if let Some(v) = var("PASSGEN_ITER_COUNT") {
            if let Ok(count) = v.parse::<u32>() {
                self.generation.iteration_count = count;
            }
        }
        if let Some(v) = var("PASSGEN_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.generation.iteration_count > 0,
            "generation.iteration_count must be > 0"
        );

        anyhow::ensure!(
            self.generation.max_length != Some(0),
            "generation.max_length must be > 0"
        );

        if let Some(ref name) = self.store.default_list {
            anyhow::ensure!(!name.is_empty(), "store.default_list must not be empty");
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
