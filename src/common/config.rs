//! Configuration file handling

use serde::Deserialize;
use std::net::IpAddr;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// DAP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Default session settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Protocol limits
    #[serde(default)]
    pub limits: Limits,
}

/// DAP server settings
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// TCP port for the DAP listener
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    4711
}

/// Default session settings
#[derive(Debug, Deserialize, Clone)]
pub struct Defaults {
    /// Stop at the first statement unless the launch request says otherwise
    #[serde(default = "default_pause_on_entry")]
    pub pause_on_entry: bool,

    /// Pause when an uncaught script error propagates
    #[serde(default)]
    pub pause_on_exception: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            pause_on_entry: default_pause_on_entry(),
            pause_on_exception: false,
        }
    }
}

fn default_pause_on_entry() -> bool {
    true
}

/// Protocol limits
#[derive(Debug, Deserialize, Clone)]
pub struct Limits {
    /// Maximum accepted DAP message body, in megabytes
    #[serde(default = "default_max_message_mb")]
    pub max_message_mb: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_message_mb: default_max_message_mb(),
        }
    }
}

fn default_max_message_mb() -> usize {
    16
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    }
                })?;
                return toml::from_str(&content)
                    .map_err(|e| super::Error::ConfigParse(e.to_string()));
            }
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 4711);
        assert!(config.server.host.is_loopback());
        assert!(config.defaults.pause_on_entry);
        assert!(!config.defaults.pause_on_exception);
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str("[server]\nport = 5005\n").unwrap();
        assert_eq!(config.server.port, 5005);
        assert!(config.server.host.is_loopback());
        assert_eq!(config.limits.max_message_mb, 16);
    }
}
