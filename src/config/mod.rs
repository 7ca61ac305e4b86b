//! Configuration loading for pairvault.

use std::path::PathBuf;

use directories::{BaseDirs, ProjectDirs};
use serde::Deserialize;

/// Top-level configuration loaded from config.toml.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

/// Configuration for the artifact store location.
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: String,
}

/// Shape rules applied to uploaded archives.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    /// Upload size ceiling in megabytes.
    #[serde(default = "default_max_archive_mb")]
    pub max_archive_mb: u64,
    /// Code extensions in preference order; the first one present in a
    /// base wins the tie-break.
    #[serde(default = "default_code_extensions")]
    pub code_extensions: Vec<String>,
    /// The single render extension every base must carry.
    #[serde(default = "default_render_extension")]
    pub render_extension: String,
}

fn default_store_dir() -> String {
    "~/.pairvault".to_string()
}

fn default_max_archive_mb() -> u64 {
    1
}

fn default_code_extensions() -> Vec<String> {
    vec!["py".to_string(), "c".to_string()]
}

fn default_render_extension() -> String {
    "svg".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            import: ImportConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_archive_mb: default_max_archive_mb(),
            code_extensions: default_code_extensions(),
            render_extension: default_render_extension(),
        }
    }
}

impl Config {
    /// Load config from the file named by `PAIRVAULT_CONFIG`, else from
    /// ~/.config/pairvault/config.toml, or return defaults.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var_os("PAIRVAULT_CONFIG")
            .map(PathBuf::from)
            .or_else(Self::config_path);

        if let Some(path) = config_path {
            if path.exists() {
                let contents = std::fs::read_to_string(&path)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "pairvault")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

impl ImportConfig {
    /// The size ceiling in bytes.
    #[must_use]
    pub fn max_archive_bytes(&self) -> u64 {
        self.max_archive_mb * 1024 * 1024
    }

    /// Every allowed inner-entry extension, code extensions first.
    #[must_use]
    pub fn allowed_extensions(&self) -> Vec<String> {
        let mut all = self.code_extensions.clone();
        all.push(self.render_extension.clone());
        all
    }
}

/// Expand ~ to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(base_dirs) = BaseDirs::new() {
            return base_dirs.home_dir().join(&path[2..]);
        }
    }
    PathBuf::from(path)
}
