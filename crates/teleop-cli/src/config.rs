//! Relay configuration – reads/writes `~/.teleop/config.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write config at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Relay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP/WebSocket listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Port shared by the operator pages and the WebSocket relay.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding `index.html`, `carros.html`, `controle.html`, …
    #[serde(default = "default_web_root")]
    pub web_root: PathBuf,

    /// JSON file mapping usernames to passwords for `POST /login`.
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
fn default_port() -> u16 {
    teleop_server::DEFAULT_PORT
}
fn default_web_root() -> PathBuf {
    PathBuf::from(teleop_server::DEFAULT_WEB_ROOT)
}
fn default_users_file() -> PathBuf {
    PathBuf::from("users.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            web_root: default_web_root(),
            users_file: default_users_file(),
        }
    }
}

/// `$TELEOP_CONFIG` if set, otherwise `~/.teleop/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(explicit) = std::env::var("TELEOP_CONFIG") {
        return PathBuf::from(explicit);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".teleop").join("config.toml")
}

/// Load the effective configuration: file (or defaults) plus `TELEOP_*`
/// environment overrides.
pub fn load() -> Result<Config, ConfigError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Parse the file at `path`.  `Ok(None)` when it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(cfg))
}

/// Apply environment overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TELEOP_BIND_ADDRESS` | `bind_address` |
/// | `TELEOP_PORT` | `port` |
/// | `TELEOP_WEB_ROOT` | `web_root` |
/// | `TELEOP_USERS_FILE` | `users_file` |
///
/// Unparsable address or port values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("TELEOP_BIND_ADDRESS")
        && let Ok(addr) = v.parse::<IpAddr>()
    {
        cfg.bind_address = addr;
    }
    if let Some(v) = lookup("TELEOP_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.port = port;
    }
    if let Some(v) = lookup("TELEOP_WEB_ROOT") {
        cfg.web_root = PathBuf::from(v);
    }
    if let Some(v) = lookup("TELEOP_USERS_FILE") {
        cfg.users_file = PathBuf::from(v);
    }
}

/// Write `cfg` to `path`, creating the parent directory if needed.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let raw = toml::to_string_pretty(cfg)?;
    fs::write(path, raw).map_err(write_err)
}
