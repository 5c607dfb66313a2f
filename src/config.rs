use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "ANIMALDEX_API_URL";

/// Environment variable that points at an alternative config file.
pub const CONFIG_ENV: &str = "ANIMALDEX_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub map: MapConfig,

    #[serde(default)]
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Every request fails outright after this many seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// File holding the persisted login.
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

fn default_session_path() -> PathBuf {
    data_dir().join("session.json")
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Where downloaded photos and exports are written.
    #[serde(default = "default_download_dir")]
    pub dir: PathBuf,
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("animaldex")
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: default_download_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MapConfig {
    /// Command used to open map links (e.g. "firefox").
    /// If not set, uses the system default (xdg-open on Linux, open on macOS)
    #[serde(default)]
    pub external_opener: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Show the focused photo inline. Needs a terminal that answers the
    /// graphics query; others fall back to half blocks.
    #[serde(default = "default_preview_enabled")]
    pub image_preview: bool,
}

fn default_preview_enabled() -> bool {
    true
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            image_preview: default_preview_enabled(),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("animaldex")
}

impl Config {
    /// Load from `ANIMALDEX_CONFIG` or the default location, writing a default
    /// file on first run.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::config_path);
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("parsing config {}", path.display()))?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            config
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api.base_url = url.trim().to_string();
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("animaldex")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn log_dir() -> PathBuf {
        data_dir().join("logs")
    }

    /// True when the backend is on this machine; shown as a hint when
    /// requests fail with a network error.
    pub fn is_local_backend(&self) -> bool {
        self.api.base_url.contains("localhost") || self.api.base_url.contains("127.0.0.1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            base_url = "https://dex.example.org"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://dex.example.org");
        assert_eq!(config.api.timeout_secs, 10);
        assert!(config.map.external_opener.is_none());
        assert!(config.preview.image_preview);
        assert!(config.session.path.ends_with("session.json"));
    }

    #[test]
    fn test_load_from_missing_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.api.timeout_secs, 10);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.download.dir, config.download.dir);
    }

    #[test]
    fn test_is_local_backend() {
        let mut config = Config::default();
        assert!(config.is_local_backend());
        config.api.base_url = "https://dex.example.org".into();
        assert!(!config.is_local_backend());
    }
}
