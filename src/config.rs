//! Configuration management.
//!
//! Settings are resolved in layers: built-in defaults, then the config file,
//! then `EMIGRANT_*` environment variables. Command-line flags are applied on
//! top of the result by the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::enrich::DEFAULT_PROGRESS_INTERVAL;
use crate::error::PipelineError;

/// Default location of the published data archive.
pub const DEFAULT_DATA_URL: &str = "http://emigrantcity.nypl.org/data/latest";

/// Default output subdirectory for the emitted dataset.
pub const OUTPUT_SUBDIR: &str = "output";

/// Name `prefer` discovers config files under.
pub const CONFIG_NAME: &str = "emigrant";

const ENV_DATA_DIR: &str = "EMIGRANT_DATA_DIR";
const ENV_DATA_URL: &str = "EMIGRANT_DATA_URL";
const ENV_GEOCODER_URL: &str = "EMIGRANT_GEOCODER_URL";

/// Resolved runtime settings.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Base data directory holding the step directories.
    pub data_dir: PathBuf,
    /// URL of the compressed record archive.
    pub data_url: String,
    /// Geocoder endpoint. Enrichment refuses to run without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geocoder_url: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Records between enrichment progress lines.
    pub progress_interval: usize,
    /// Directory the dataset writer writes into.
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_data_dir(PathBuf::from("data"))
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            output_dir: data_dir.join(OUTPUT_SUBDIR),
            data_dir,
            data_url: DEFAULT_DATA_URL.to_string(),
            geocoder_url: None,
            request_timeout: 60,
            user_agent: format!("emigrant/{}", env!("CARGO_PKG_VERSION")),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Point the settings at a new data directory.
    ///
    /// The output directory follows unless it was moved elsewhere explicitly.
    pub fn set_data_dir(&mut self, data_dir: PathBuf) {
        if self.output_dir == self.data_dir.join(OUTPUT_SUBDIR) {
            self.output_dir = data_dir.join(OUTPUT_SUBDIR);
        }
        self.data_dir = data_dir;
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Render the settings as TOML.
    pub fn to_toml(&self) -> Result<String, PipelineError> {
        toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("Failed to render settings: {}", e)))
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "target")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocoder_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_interval: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Returns the default config when no emigrant config file exists.
    pub async fn load() -> Result<Self, PipelineError> {
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => Self::load_discovered(pref_config.source_path()).await,
            Err(e) => {
                tracing::debug!("No config file discovered: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Load the file discovery turned up, or fall back to defaults.
    async fn load_discovered<P: AsRef<Path>>(path: Option<P>) -> Result<Self, PipelineError> {
        match path {
            Some(path) => {
                let path = path.as_ref();
                tracing::debug!("Using config file {}", path.display());
                Self::load_from_path(path).await
            }
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    /// The format is chosen by extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, PipelineError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| PipelineError::Config(format!("Failed to parse TOML config: {}", e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| PipelineError::Config(format!("Failed to parse YAML config: {}", e)))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| PipelineError::Config(format!("Failed to parse JSON config: {}", e)))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.set_data_dir(resolve_path(data_dir, base_dir));
        }
        if let Some(ref output_dir) = self.output_dir {
            settings.output_dir = resolve_path(output_dir, base_dir);
        }
        if let Some(ref url) = self.data_url {
            settings.data_url = url.clone();
        }
        if let Some(ref url) = self.geocoder_url {
            settings.geocoder_url = Some(url.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(interval) = self.progress_interval {
            settings.progress_interval = interval;
        }
    }
}

/// Resolve a path that may be relative.
/// - Absolute paths are returned as-is
/// - Paths starting with ~ are expanded
/// - Relative paths are resolved against `base_dir`
pub fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(path_str);
    let path = Path::new(expanded.as_ref());

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Apply `EMIGRANT_*` overrides read through `lookup`.
fn apply_env_overrides<F>(settings: &mut Settings, base_dir: &Path, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(data_dir) = var(ENV_DATA_DIR) {
        settings.set_data_dir(resolve_path(&data_dir, base_dir));
    }
    if let Some(url) = var(ENV_DATA_URL) {
        settings.data_url = url;
    }
    if let Some(url) = var(ENV_GEOCODER_URL) {
        settings.geocoder_url = Some(url);
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), PipelineError> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await?,
    };

    let cwd = std::env::current_dir()?;
    let base_dir = if options.use_cwd {
        cwd
    } else {
        config.base_dir().unwrap_or(cwd)
    };

    let mut settings = Settings::with_data_dir(base_dir.join("data"));
    config.apply_to_settings(&mut settings, &base_dir);
    apply_env_overrides(&mut settings, &base_dir, |name| std::env::var(name).ok());

    Ok((settings, config))
}
