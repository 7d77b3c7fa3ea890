use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Configuration for the in-memory paper pool used by paper trading and
/// dry-run mode. Amounts are human units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    /// Starting pool price, token1 per token0.
    pub initial_price: f64,
    pub tick_spacing: i32,
    /// Hundredths of a basis point (3000 = 0.3%).
    pub fee_tier: u32,
    pub token0_decimals: u8,
    pub token1_decimals: u8,
    pub initial_token0: f64,
    pub initial_token1: f64,
    /// Relative amplitude of the sine price path (0.1 = +/-10%).
    pub price_amplitude: f64,
    /// Steps for one full sine period.
    pub price_period_steps: u64,
    /// Advance the price path on every pool read.
    pub advance_on_read: bool,
    /// Fraction of in-range position value accrued as fees per step.
    pub fee_accrual_per_step: f64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_price: 2500.0,
            tick_spacing: 60,
            fee_tier: 3000,
            token0_decimals: 18,
            token1_decimals: 6,
            initial_token0: 1.0,
            initial_token1: 2500.0,
            price_amplitude: 0.15,
            price_period_steps: 240,
            advance_on_read: true,
            fee_accrual_per_step: 0.0001,
        }
    }
}

/// Load paper pool configuration from a JSON file.
///
/// Resolution order:
/// 1. Explicit path argument
/// 2. RANGE_BOT_PAPER_CONFIG_FILE environment variable
/// 3. Default: "paper_config.json" in current directory
///
/// If the file doesn't exist, returns default configuration.
pub fn load_paper_config(path: Option<&str>) -> PaperConfig {
    let config_path = path
        .map(String::from)
        .or_else(|| env::var("RANGE_BOT_PAPER_CONFIG_FILE").ok())
        .unwrap_or_else(|| "paper_config.json".to_string());

    if !Path::new(&config_path).exists() {
        log::info!(
            "Paper config not found at '{}', using defaults",
            config_path
        );
        return PaperConfig::default();
    }

    match fs::read_to_string(&config_path) {
        Ok(content) => match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(mut json) => {
                // Filter out comment keys (those starting with "//")
                if let Some(obj) = json.as_object_mut() {
                    obj.retain(|k, _| !k.starts_with("//"));
                }

                match serde_json::from_value(json) {
                    Ok(config) => {
                        log::info!("Loaded paper config from '{}'", config_path);
                        config
                    }
                    Err(e) => {
                        log::warn!(
                            "Failed to parse paper config from '{}': {}. Using defaults.",
                            config_path,
                            e
                        );
                        PaperConfig::default()
                    }
                }
            }
            Err(e) => {
                log::warn!(
                    "Failed to parse JSON from '{}': {}. Using defaults.",
                    config_path,
                    e
                );
                PaperConfig::default()
            }
        },
        Err(e) => {
            log::warn!(
                "Failed to read paper config from '{}': {}. Using defaults.",
                config_path,
                e
            );
            PaperConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = PaperConfig::default();
        assert_eq!(config.tick_spacing, 60);
        assert_eq!(config.fee_tier, 3000);
        assert!(config.advance_on_read);
    }

    #[test]
    fn test_partial_json_with_comments() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"// note": "ignored", "initial_price": 1800.0, "tick_spacing": 10}}"#
        )
        .unwrap();
        let config = load_paper_config(file.path().to_str());
        assert_eq!(config.initial_price, 1800.0);
        assert_eq!(config.tick_spacing, 10);
        // Unspecified fields keep their defaults
        assert_eq!(config.token0_decimals, 18);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let config = load_paper_config(Some("/nonexistent/path.json"));
        assert_eq!(config.initial_price, 2500.0);
    }
}
