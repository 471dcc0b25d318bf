//! Validation parameters and bootstrap configuration loading
//!
//! [`RutConfig`] is built once and shared read-only by every worker. The
//! optional TOML file only feeds its construction; nothing is re-read at
//! runtime.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments
//! 2. Environment variables (`RUTIFICADOR_CONFIG`, `RUTIFICADOR_RIGOR`)
//! 3. TOML configuration file
//! 4. Built-in defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "RUTIFICADOR_CONFIG";

/// Environment variable overriding the validation rigor
pub const RIGOR_ENV_VAR: &str = "RUTIFICADOR_RIGOR";

pub const DEFAULT_VERIFICATION_FACTORS: [u32; 6] = [2, 3, 4, 5, 6, 7];
pub const DEFAULT_MODULO: u32 = 11;
pub const DEFAULT_MIN_DIGITS: usize = 1;
pub const DEFAULT_MAX_DIGITS: usize = 8;
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// How much cosmetic deviation is tolerated before normalization fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rigor {
    /// Internal whitespace is fatal
    #[default]
    Strict,
    /// Internal whitespace is stripped with a warning
    Lenient,
    /// Same tolerance as `Lenient`, kept for callers of the old API
    Legacy,
}

impl Rigor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rigor::Strict => "strict",
            Rigor::Lenient => "lenient",
            Rigor::Legacy => "legacy",
        }
    }

    /// Whether internal whitespace may be stripped instead of rejected
    pub fn tolerates_whitespace(&self) -> bool {
        !matches!(self, Rigor::Strict)
    }
}

impl fmt::Display for Rigor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rigor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Rigor::Strict),
            "lenient" => Ok(Rigor::Lenient),
            "legacy" => Ok(Rigor::Legacy),
            other => Err(Error::Config(format!(
                "Unknown rigor '{}' (expected strict, lenient or legacy)",
                other
            ))),
        }
    }
}

/// Immutable validation parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RutConfig {
    verification_factors: Arc<[u32]>,
    modulo: u32,
    min_digits: usize,
    max_digits: usize,
    rigor: Rigor,
}

impl RutConfig {
    /// Build a configuration, rejecting inconsistent parameters
    pub fn new(
        verification_factors: Vec<u32>,
        modulo: u32,
        min_digits: usize,
        max_digits: usize,
        rigor: Rigor,
    ) -> Result<Self> {
        if verification_factors.is_empty() {
            return Err(Error::Config(
                "Verification factors cannot be empty".to_string(),
            ));
        }
        if verification_factors.iter().any(|&f| f == 0) {
            return Err(Error::Config(
                "Verification factors must be positive".to_string(),
            ));
        }
        if modulo == 0 {
            return Err(Error::Config("Modulo must be positive".to_string()));
        }
        if min_digits == 0 || max_digits == 0 {
            return Err(Error::Config("Digit limits must be positive".to_string()));
        }
        if min_digits > max_digits {
            return Err(Error::Config(format!(
                "Min digits ({}) cannot exceed max digits ({})",
                min_digits, max_digits
            )));
        }

        Ok(Self {
            verification_factors: verification_factors.into(),
            modulo,
            min_digits,
            max_digits,
            rigor,
        })
    }

    pub fn verification_factors(&self) -> &[u32] {
        &self.verification_factors
    }

    /// Factor sequence handle; clones share one allocation
    pub(crate) fn shared_factors(&self) -> Arc<[u32]> {
        Arc::clone(&self.verification_factors)
    }

    pub fn modulo(&self) -> u32 {
        self.modulo
    }

    pub fn min_digits(&self) -> usize {
        self.min_digits
    }

    pub fn max_digits(&self) -> usize {
        self.max_digits
    }

    pub fn rigor(&self) -> Rigor {
        self.rigor
    }

    /// Copy of this configuration with a different rigor
    pub fn with_rigor(&self, rigor: Rigor) -> Self {
        Self {
            rigor,
            ..self.clone()
        }
    }
}

impl Default for RutConfig {
    fn default() -> Self {
        Self {
            verification_factors: Arc::from(&DEFAULT_VERIFICATION_FACTORS[..]),
            modulo: DEFAULT_MODULO,
            min_digits: DEFAULT_MIN_DIGITS,
            max_digits: DEFAULT_MAX_DIGITS,
            rigor: Rigor::Strict,
        }
    }
}

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional in the file; missing ones fall back to the
/// built-in defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub rigor: Option<Rigor>,

    #[serde(default = "default_factors")]
    pub verification_factors: Vec<u32>,

    #[serde(default = "default_modulo")]
    pub modulo: u32,

    #[serde(default = "default_min_digits")]
    pub min_digits: usize,

    #[serde(default = "default_max_digits")]
    pub max_digits: usize,

    /// Checksum memoization capacity (entries)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default)]
    pub batch: BatchSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Batch processor settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BatchSettings {
    /// Items per parallel work unit
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Worker threads (None = one per logical CPU)
    #[serde(default)]
    pub max_workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_factors() -> Vec<u32> {
    DEFAULT_VERIFICATION_FACTORS.to_vec()
}

fn default_modulo() -> u32 {
    DEFAULT_MODULO
}

fn default_min_digits() -> usize {
    DEFAULT_MIN_DIGITS
}

fn default_max_digits() -> usize {
    DEFAULT_MAX_DIGITS
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_workers: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            rigor: None,
            verification_factors: default_factors(),
            modulo: DEFAULT_MODULO,
            min_digits: DEFAULT_MIN_DIGITS,
            max_digits: DEFAULT_MAX_DIGITS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            batch: BatchSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        if config.batch.chunk_size == 0 {
            return Err(Error::Config("batch.chunk_size must be positive".to_string()));
        }
        if config.batch.max_workers == Some(0) {
            return Err(Error::Config("batch.max_workers must be positive".to_string()));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from the resolved location, degrading to defaults when no file exists
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                debug!("No config file located, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Build the validation parameters, with `rigor` taking precedence over the file
    pub fn rut_config(&self, rigor: Option<Rigor>) -> Result<RutConfig> {
        RutConfig::new(
            self.verification_factors.clone(),
            self.modulo,
            self.min_digits,
            self.max_digits,
            rigor.or(self.rigor).unwrap_or_default(),
        )
    }
}

/// Locate the config file
///
/// 1. Command-line argument (highest priority)
/// 2. `RUTIFICADOR_CONFIG` environment variable
/// 3. Platform config directory (`<config_dir>/rutificador/config.toml`)
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("rutificador").join("config.toml"))
        .filter(|p| p.exists())
}

/// Resolve rigor: command line, then `RUTIFICADOR_RIGOR`, then the file
pub fn resolve_rigor(cli_arg: Option<Rigor>, file: &TomlConfig) -> Result<Rigor> {
    if let Some(rigor) = cli_arg {
        return Ok(rigor);
    }

    if let Ok(value) = std::env::var(RIGOR_ENV_VAR) {
        if !value.trim().is_empty() {
            return value.parse();
        }
    }

    Ok(file.rigor.unwrap_or_default())
}
