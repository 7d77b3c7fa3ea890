use self::strategy::StrategyConfig;
use crate::error::BotError;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;

pub mod broadcast;
pub mod exchange;
pub mod simulation;
pub mod strategy;
#[cfg(test)]
mod test_secrets;

pub fn load_config(path: &str) -> Result<StrategyConfig, BotError> {
    let content = fs::read_to_string(path)?;
    let config: StrategyConfig = toml::from_str(&content)?;
    config
        .validate()
        .map_err(|e| BotError::ValidationError(e.to_string()))?;
    Ok(config)
}

/// Reads `NAME` directly, or the contents of the file named by `NAME_FILE`.
pub fn read_env_or_file(name: &str) -> Result<String> {
    if let Ok(value) = env::var(name) {
        return Ok(value);
    }
    let file_var = format!("{}_FILE", name);
    match env::var(&file_var) {
        Ok(path) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {} at {}", file_var, path))?;
            Ok(content.trim().to_string())
        }
        Err(_) => Err(anyhow!("Neither {} nor {} is set", name, file_var)),
    }
}
