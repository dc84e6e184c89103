use std::path::{Path, PathBuf};

use civic_api::DEFAULT_BASE_URL;
use serde::Deserialize;
use tracing::warn;

use crate::error::CivError;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    pub base_url: Option<String>,
    pub session_file: Option<PathBuf>,
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("civic-chat").join("config.toml"))
}

pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("civic-chat")
}

pub fn default_session_path() -> PathBuf {
    data_dir().join("session.json")
}

pub fn default_log_path() -> PathBuf {
    data_dir().join("civ.log")
}

fn parse_config(path: &Path, content: &str) -> Config {
    match toml::from_str(content) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
            Config::default()
        }
    }
}

pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };

    let Ok(content) = std::fs::read_to_string(&path) else {
        return Config::default();
    };

    parse_config(&path, &content)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// CLI flag, then `CIVIC_API_URL`, then the config file, then the default.
pub fn resolve_base_url(cli: Option<String>, config: &Config) -> String {
    non_empty(cli)
        .or_else(|| non_empty(std::env::var("CIVIC_API_URL").ok()))
        .or_else(|| non_empty(config.base_url.clone()))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

pub fn resolve_session_path(cli: Option<PathBuf>, config: &Config) -> PathBuf {
    cli.or_else(|| config.session_file.clone())
        .unwrap_or_else(default_session_path)
}

pub fn load_password(cli: Option<String>) -> Result<String, CivError> {
    non_empty(cli)
        .or_else(|| non_empty(std::env::var("CIVIC_PASSWORD").ok()))
        .ok_or(CivError::PasswordNotFound)
}
