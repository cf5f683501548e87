use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{OptionExt, Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_CONFIG: &str = r#"# plex-library-sync configuration

database = "~/.local/share/plex-library-sync/library.db"

[plex]
base_url = "http://localhost:32400"
token = ""
request_timeout = "30s"
page_size = 200

[sync]
fetch_timeout = "5m"
interval = "15m"
"#;

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    database: String,
    #[serde(default)]
    plex: Option<PlexConfig>,
    #[serde(default)]
    sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexConfig {
    pub base_url: String,
    pub token: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upper bound for reading the whole Plex snapshot
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: String,
    /// Default period of the `watch` command
    #[serde(default = "default_interval")]
    pub interval: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: default_fetch_timeout(),
            interval: default_interval(),
        }
    }
}

fn default_request_timeout() -> String {
    "30s".to_string()
}

fn default_page_size() -> u32 {
    200
}

fn default_fetch_timeout() -> String {
    "5m".to_string()
}

fn default_interval() -> String {
    "15m".to_string()
}

fn parse_duration(value: &str, name: &str) -> Result<Duration> {
    humantime::parse_duration(value).wrap_err(format!("Invalid duration for {}: {}", name, value))
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err(format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .wrap_err(format!("Failed to parse config file: {}", path.display()))
    }

    /// `~/.config/plex-library-sync/config.toml` on Linux
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("plex-library-sync").join("config.toml"))
    }

    /// Load config from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path().ok_or_eyre("No config directory on this platform")?;

        Self::from_file(&config_path)
    }

    /// Write the default config file unless one already exists. Returns its path.
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_eyre("No config directory on this platform")?;

        if path.exists() {
            tracing::info!("Config already exists at {}", path.display());
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err(format!("Failed to create config directory: {}", parent.display()))?;
        }
        std::fs::write(&path, DEFAULT_CONFIG)
            .wrap_err(format!("Failed to write config file: {}", path.display()))?;

        Ok(path)
    }

    /// Expand ~ to home directory
    fn expand_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    pub fn database_path(&self) -> PathBuf {
        self.expand_path(&self.database)
    }

    /// The `[plex]` section, falling back to `PLEX_BASEURL` and `PLEX_TOKEN`.
    pub fn plex_config(&self) -> Result<PlexConfig> {
        if let Some(ref plex) = self.plex {
            return Ok(plex.clone());
        }

        let base_url = std::env::var("PLEX_BASEURL")
            .wrap_err("No [plex] section in config and PLEX_BASEURL is not set")?;
        let token = std::env::var("PLEX_TOKEN")
            .wrap_err("No [plex] section in config and PLEX_TOKEN is not set")?;

        Ok(PlexConfig {
            base_url,
            token,
            request_timeout: default_request_timeout(),
            page_size: default_page_size(),
        })
    }

    pub fn fetch_timeout(&self) -> Result<Duration> {
        parse_duration(&self.sync.fetch_timeout, "sync.fetch_timeout")
    }

    pub fn interval(&self) -> Result<Duration> {
        parse_duration(&self.sync.interval, "sync.interval")
    }
}

impl PlexConfig {
    /// The server URL with a trailing slash, so relative joins keep any path prefix.
    pub fn server_url(&self) -> Result<Url> {
        let mut base = self.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base).wrap_err(format!("Invalid Plex base_url: {}", self.base_url))
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration(&self.request_timeout, "plex.request_timeout")
    }

    pub fn checked_token(&self) -> Result<&str> {
        if self.token.trim().is_empty() {
            return Err(eyre!("Plex token is empty, set plex.token or PLEX_TOKEN"));
        }
        Ok(&self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();

        assert_eq!(config.fetch_timeout().unwrap(), Duration::from_secs(300));
        assert_eq!(config.interval().unwrap(), Duration::from_secs(900));

        let plex = config.plex_config().unwrap();
        assert_eq!(plex.page_size, 200);
        assert_eq!(plex.request_timeout().unwrap(), Duration::from_secs(30));
        assert!(plex.checked_token().is_err());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            database = "/var/lib/plex-library-sync.db"

            [plex]
            base_url = "http://plex.lan:32400"
            token = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/plex-library-sync.db")
        );
        assert_eq!(config.fetch_timeout().unwrap(), Duration::from_secs(300));

        let plex = config.plex_config().unwrap();
        assert_eq!(plex.checked_token().unwrap(), "abc");
        assert_eq!(plex.server_url().unwrap().as_str(), "http://plex.lan:32400/");
    }

    #[test]
    fn test_server_url_keeps_path_prefix() {
        let plex = PlexConfig {
            base_url: "https://example.com/plex".into(),
            token: "t".into(),
            request_timeout: default_request_timeout(),
            page_size: default_page_size(),
        };

        let url = plex.server_url().unwrap().join("playlists?type=15").unwrap();

        assert_eq!(url.as_str(), "https://example.com/plex/playlists?type=15");
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let config: Config = toml::from_str(
            r#"
            database = "db.sqlite"

            [sync]
            fetch_timeout = "soon"
            "#,
        )
        .unwrap();

        assert!(config.fetch_timeout().is_err());
    }

    #[test]
    fn test_expand_home() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();

        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                config.database_path(),
                home.join(".local/share/plex-library-sync/library.db")
            );
        }
    }
}
