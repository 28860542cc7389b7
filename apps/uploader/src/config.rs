//! Uploader configuration management.
//!
//! Configuration is stored as TOML in `dropchunk/uploader.toml` under the
//! user's config directory (`$XDG_CONFIG_HOME`, `~/.config`, or `%APPDATA%`).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use dropchunk_transfer::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the stored access token.
pub const TOKEN_ENV: &str = "DROPCHUNK_ACCESS_TOKEN";

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// OAuth2 access token.
    #[serde(default)]
    pub access_token: String,

    /// Upload into the app folder instead of the full Dropbox.
    #[serde(default)]
    pub sandbox: bool,

    /// Bytes sent per chunk request.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Retries per failed chunk (0 = fail on the first error).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout in seconds (0 = no timeout).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            sandbox: false,
            chunk_size: default_chunk_size(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    /// The token from the environment, if set, replaces the stored one.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&config_path()?)?;
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            config.apply_token_override(token);
        }
        Ok(config)
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Writes the configuration to `path`.
    ///
    /// The file holds a bearer token, so it is written to a sibling created
    /// owner-only and then renamed into place.
    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)?;

        let tmp = path.with_extension("toml.tmp");
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp)?;
        file.write_all(toml::to_string_pretty(self)?.as_bytes())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), "configuration written");
        Ok(())
    }

    fn apply_token_override(&mut self, token: String) {
        let token = token.trim();
        if !token.is_empty() {
            self.access_token = token.to_string();
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Directory name under the platform config root.
const APP_DIR: &str = "dropchunk";

/// Config file name, after the binary it configures.
const FILE_NAME: &str = "uploader.toml";

/// Returns the configuration file path for this platform.
pub fn config_path() -> anyhow::Result<PathBuf> {
    let root = config_root(|key| std::env::var_os(key).map(PathBuf::from))
        .context("cannot locate a configuration directory (HOME is not set)")?;
    Ok(root.join(APP_DIR).join(FILE_NAME))
}

/// Resolves the per-user config root from environment lookups.
///
/// Windows uses `%APPDATA%`. Elsewhere `$XDG_CONFIG_HOME` wins over
/// `$HOME/.config`.
fn config_root(env: impl Fn(&str) -> Option<PathBuf>) -> Option<PathBuf> {
    let non_empty = |key: &str| env(key).filter(|p| !p.as_os_str().is_empty());
    if cfg!(windows) {
        return non_empty("APPDATA");
    }
    non_empty("XDG_CONFIG_HOME")
        .filter(|p| p.is_absolute())
        .or_else(|| non_empty("HOME").map(|home| home.join(".config")))
}
