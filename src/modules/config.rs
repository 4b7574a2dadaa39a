use std::fs;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;

const CONFIG_FILE: &str = "wagate_config.json";

/// Application data directory (`<data_dir>/wagate`), created on demand.
pub fn get_data_dir() -> AppResult<PathBuf> {
    let data_dir = dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .ok_or_else(|| AppError::Config("Unable to locate a data directory".to_string()))?
        .join("wagate");

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

fn config_path() -> AppResult<PathBuf> {
    match std::env::var("WAGATE_CONFIG") {
        Ok(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(get_data_dir()?.join(CONFIG_FILE)),
    }
}

/// Load configuration from disk (defaults when the file is missing), then apply env overrides.
/// Runs before logging is up, so it never logs.
pub fn load_app_config() -> AppResult<AppConfig> {
    let config_path = config_path()?;

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed_to_parse_config_file: {}", e)))?
    } else {
        AppConfig::new()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Write a default config file on first run. Returns the path when one was written.
pub fn write_default_config() -> AppResult<Option<PathBuf>> {
    let path = config_path()?;
    Ok(write_default_config_at(&path)?.then_some(path))
}

fn write_default_config_at(path: &PathBuf) -> AppResult<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_app_config_to(&AppConfig::new(), path)?;
    Ok(true)
}

fn save_app_config_to(config: &AppConfig, path: &PathBuf) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

pub(crate) fn flag_enabled(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Overlay environment variables onto a loaded config.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> AppResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = non_empty("PORT") {
        config.port = port
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("PORT is not a valid port number: {}", port)))?;
    }
    if let Some(url) = non_empty("WAGATE_EVOLUTION_URL") {
        config.evolution.api_url = url.trim_end_matches('/').to_string();
    }
    if let Some(key) = non_empty("WAGATE_EVOLUTION_KEY") {
        config.evolution.api_key = key;
    }
    if let Some(instance) = non_empty("WAGATE_INSTANCE") {
        config.evolution.instance_name = instance;
    }
    if let Some(url) = non_empty("WAGATE_WEBHOOK_URL") {
        config.evolution.webhook_url = url;
    }
    if let Some(flag) = non_empty("WAGATE_PERSIST_SESSION") {
        config.evolution.persist_session = flag_enabled(&flag);
    }
    Ok(())
}
