use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error as ThisError;
use xpost_search::SearchConfig;

const CONFIG_DIR: &str = ".xpost";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "pins.sqlite3";

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("Failed to read config file {path}, cause: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config file, cause: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    /// Pin database, as an sqlite connection string.
    pub database: String,
}

impl Default for Config {
    fn default() -> Self {
        let database = config_dir()
            .map(|dir| dir.join(DATABASE_FILE))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE));
        Self {
            search: SearchConfig::default(),
            database: format!("sqlite://{}", database.display()),
        }
    }
}

impl Config {
    /// Loads `path`, or `~/.xpost/config.toml` when no path is given. A
    /// missing default file means default settings.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match config_dir() {
                Some(dir) => (dir.join(CONFIG_FILE), false),
                None => return Ok(Config::default()),
            },
        };

        match fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text),
            Err(error) if error.kind() == io::ErrorKind::NotFound && !required => {
                Ok(Config::default())
            }
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

fn config_dir() -> Option<PathBuf> {
    simple_home_dir::home_dir().map(|home| home.join(CONFIG_DIR))
}
