use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use toml;

use crate::spotify::data::SPOTIFY_API;

pub const CONFIG_PATH: &str = "config.toml";
pub const CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";
pub const DEFAULT_PLAYER_NAME: &str = "bs-spotify-web-playback test client";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write default config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration file not found. A default '{}' has been created. Please update it with your credentials.", .path.display())]
    Created { path: PathBuf },
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    /// Page the authorization server sends the browser back to.
    pub redirect_uri: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PlayerConfig {
    #[serde(default = "default_player_name")]
    pub name: String,
    /// Name of the Connect device to adopt. Any device is taken when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            name: default_player_name(),
            device: None,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl PlayerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

fn default_api_url() -> String {
    SPOTIFY_API.to_string()
}

fn default_player_name() -> String {
    DEFAULT_PLAYER_NAME.to_string()
}

fn default_poll_interval() -> u64 {
    2
}

impl Config {
    /// Replaces the client id with the environment value when one is set.
    pub fn apply_client_id_override(&mut self, client_id: Option<String>) {
        if let Some(client_id) = client_id.filter(|id| !id.trim().is_empty()) {
            self.spotify.client_id = client_id.trim().to_string();
        }
    }
}

pub fn load_config() -> Result<Config, ConfigError> {
    dotenv::dotenv().ok();
    let mut config = load_config_from(CONFIG_PATH)?;
    config.apply_client_id_override(std::env::var(CLIENT_ID_ENV).ok());
    Ok(config)
}

pub fn load_config_from<P: AsRef<Path>>(config_path: P) -> Result<Config, ConfigError> {
    let config_path = config_path.as_ref();

    if !config_path.exists() {
        let default_config = Config {
            spotify: SpotifyConfig {
                client_id: "your_spotify_client_id".to_string(),
                redirect_uri: "http://localhost:8888/callback".to_string(),
                api_url: default_api_url(),
            },
            player: PlayerConfig::default(),
        };

        let toml_string = toml::to_string_pretty(&default_config)?;

        let mut file = fs::File::create(config_path)?;
        file.write_all(toml_string.as_bytes())?;

        return Err(ConfigError::Created {
            path: config_path.to_path_buf(),
        });
    }

    // Read and parse the existing config file
    let config_str = fs::read_to_string(config_path)?;
    let config: Config = toml::from_str(&config_str)?;
    Ok(config)
}
