//! Configuration loading and root folder resolution
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or malformed TOML file never aborts startup; a warning is
//! logged and the remaining tiers apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the data root folder
pub const ENV_ROOT_FOLDER: &str = "BLOOM_ROOT_FOLDER";
/// Environment variable naming the listen port
pub const ENV_PORT: &str = "BLOOM_PORT";
/// Environment variable naming the Python backend base URL
pub const ENV_PYTHON_URL: &str = "BLOOM_PYTHON_URL";
/// Environment variable enabling serverless (no persistent disk) mode
pub const ENV_SERVERLESS: &str = "BLOOM_SERVERLESS";

/// Default upload size limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// TOML file contents. Every field is optional so partial files work.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_upload_bytes: Option<u64>,
    pub serverless: Option<bool>,
    #[serde(default)]
    pub python: PythonToml,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[python]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PythonToml {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// `[logging]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: u64,
    pub python_base_url: String,
    pub python_timeout_secs: u64,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("brandbloom"))
            .unwrap_or_else(|| PathBuf::from("./brandbloom_data"));

        Self {
            root_folder,
            host: "127.0.0.1".to_string(),
            port: 3001,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            python_base_url: "http://localhost:8000".to_string(),
            python_timeout_secs: 60,
            log_level: "info".to_string(),
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config_path: Option<PathBuf>,
    pub python_base_url: Option<String>,
    pub serverless: Option<bool>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub root_folder: PathBuf,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: u64,
    pub python_base_url: String,
    pub python_timeout_secs: u64,
    pub serverless: bool,
    pub log_level: String,
}

impl ServerConfig {
    /// Compiled defaults rooted at `root_folder`
    pub fn for_root(root_folder: impl Into<PathBuf>) -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        Self {
            root_folder: root_folder.into(),
            host: defaults.host,
            port: defaults.port,
            max_upload_bytes: defaults.max_upload_bytes,
            python_base_url: defaults.python_base_url,
            python_timeout_secs: defaults.python_timeout_secs,
            serverless: false,
            log_level: defaults.log_level,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root_folder.join("uploads")
    }

    /// Files produced by the Python backend (concatenated workbooks)
    pub fn processed_dir(&self) -> PathBuf {
        self.root_folder.join("processed")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root_folder.join("metadata")
    }

    pub fn analyses_dir(&self) -> PathBuf {
        self.root_folder.join("analyses")
    }

    pub fn concatenation_states_dir(&self) -> PathBuf {
        self.metadata_dir().join("concatenation_states")
    }

    pub fn filter_states_dir(&self) -> PathBuf {
        self.metadata_dir().join("filters")
    }

    pub fn nonmmm_states_dir(&self) -> PathBuf {
        self.root_folder.join("nonmmm").join("states")
    }

    /// Create the root folder and every data subdirectory (idempotent)
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.root_folder.clone(),
            self.uploads_dir(),
            self.processed_dir(),
            self.metadata_dir(),
            self.analyses_dir(),
            self.concatenation_states_dir(),
            self.filter_states_dir(),
            self.nonmmm_states_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

/// Resolves [`ServerConfig`] from CLI overrides, environment, TOML and defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    overrides: ConfigOverrides,
}

impl ConfigResolver {
    pub fn new(overrides: ConfigOverrides) -> Self {
        Self { overrides }
    }

    pub fn resolve(&self) -> ServerConfig {
        let defaults = CompiledDefaults::for_current_platform();
        let toml_config = self.load_toml();

        let root_folder = self
            .overrides
            .root_folder
            .clone()
            .or_else(|| std::env::var(ENV_ROOT_FOLDER).ok().map(PathBuf::from))
            .or_else(|| toml_config.root_folder.clone())
            .unwrap_or(defaults.root_folder);

        let port = self
            .overrides
            .port
            .or_else(|| env_parse::<u16>(ENV_PORT))
            .or(toml_config.port)
            .unwrap_or(defaults.port);

        let python_base_url = self
            .overrides
            .python_base_url
            .clone()
            .or_else(|| std::env::var(ENV_PYTHON_URL).ok())
            .or_else(|| toml_config.python.base_url.clone())
            .unwrap_or(defaults.python_base_url);

        let serverless = self
            .overrides
            .serverless
            .or_else(|| std::env::var(ENV_SERVERLESS).ok().map(|v| parse_flag(&v)))
            .or(toml_config.serverless)
            .unwrap_or(false);

        ServerConfig {
            root_folder,
            host: self
                .overrides
                .host
                .clone()
                .or(toml_config.host)
                .unwrap_or(defaults.host),
            port,
            max_upload_bytes: toml_config
                .max_upload_bytes
                .unwrap_or(defaults.max_upload_bytes),
            python_base_url,
            python_timeout_secs: toml_config
                .python
                .timeout_secs
                .unwrap_or(defaults.python_timeout_secs),
            serverless,
            log_level: toml_config.logging.level.unwrap_or(defaults.log_level),
        }
    }

    /// Load the TOML tier. Falls back to an empty config on any problem.
    fn load_toml(&self) -> TomlConfig {
        let path = match self.overrides.config_path.clone().or_else(default_config_path) {
            Some(path) => path,
            None => return TomlConfig::default(),
        };

        if !path.exists() {
            if self.overrides.config_path.is_some() {
                warn!("Config file not found: {} (using defaults)", path.display());
            }
            return TomlConfig::default();
        }

        match load_toml_file(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{} (using defaults)", e);
                TomlConfig::default()
            }
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// `<config_dir>/brandbloom/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("brandbloom").join("config.toml"))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}", name, raw);
            None
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
