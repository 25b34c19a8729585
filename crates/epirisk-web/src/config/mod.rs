//! Configuration loading for the Epi-Risk service.
//! Reads epirisk.toml from the current directory or the path in EPIRISK_CONFIG,
//! then applies EPIRISK_* environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use anyhow::Context;

pub const CONFIG_ENV: &str = "EPIRISK_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "epirisk.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8000 }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Persisted predictors, one timestamped directory each.
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    /// Knowledge base tables. Falls back to the bundled tables when empty.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_model_dir() -> PathBuf { PathBuf::from("./models") }
fn default_data_dir() -> PathBuf { PathBuf::from("./data") }

impl Default for PathsConfig {
    fn default() -> Self {
        Self { model_dir: default_model_dir(), data_dir: default_data_dir() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String { "epirisk=debug,info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_log_filter() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_title")]
    pub title: String,
    #[serde(default = "default_api_version")]
    pub version: String,
    #[serde(default = "default_api_description")]
    pub description: String,
}

fn default_api_title()       -> String { "Epi-Risk Lite API".to_string() }
fn default_api_version()     -> String { env!("CARGO_PKG_VERSION").to_string() }
fn default_api_description() -> String { "Clinical decision support for epistatic risk scoring".to_string() }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            title: default_api_title(),
            version: default_api_version(),
            description: default_api_description(),
        }
    }
}


impl Config {
    /// Load configuration from file plus environment.
    /// A missing file yields defaults; `source` stays `None` in that case.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::load_from(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from `path` without environment overrides.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `EPIRISK_HOST`, `EPIRISK_PORT`, `EPIRISK_MODEL_DIR`,
    /// `EPIRISK_DATA_DIR` and `EPIRISK_LOG` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("EPIRISK_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("EPIRISK_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("EPIRISK_PORT is not a port number: {port}"))?;
        }
        if let Some(dir) = lookup("EPIRISK_MODEL_DIR") {
            self.paths.model_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("EPIRISK_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
        if let Some(filter) = lookup("EPIRISK_LOG") {
            self.logging.filter = filter;
        }
        Ok(())
    }

    /// Create the model and data directories if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.paths.model_dir)?;
        std::fs::create_dir_all(&self.paths.data_dir)?;
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
