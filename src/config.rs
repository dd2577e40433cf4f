use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".gatorconfig.toml";
const CONFIG_PATH_ENV: &str = "GATOR_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("HOME is not set and GATOR_CONFIG was not given")]
    NoHome,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// Empty when nobody is logged in
    #[serde(default)]
    pub current_user_name: String,
    /// Per-request timeout for feed fetches, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(skip)]
    path: PathBuf,
}

fn default_db_url() -> String {
    "sqlite:gator.db?mode=rwc".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Config {
    /// `$GATOR_CONFIG` if set, otherwise `~/.gatorconfig.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home = std::env::var_os("HOME").ok_or(ConfigError::NoHome)?;
        Ok(PathBuf::from(home).join(CONFIG_FILE_NAME))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_str(&content)?;
        config.path = path.to_path_buf();
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_user(&self) -> Option<&str> {
        if self.current_user_name.is_empty() {
            None
        } else {
            Some(&self.current_user_name)
        }
    }

    /// Records `name` as the current user and rewrites the config file.
    /// An empty name logs everyone out.
    pub fn set_user(&mut self, name: &str) -> Result<(), ConfigError> {
        self.current_user_name = name.to_string();
        self.save()
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.path, content).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
