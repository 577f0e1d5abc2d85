//! Configuration file support for backtests.
//!
//! Allows loading backtest parameters from TOML files for reproducibility.

use crate::data::DataConfig;
use crate::engine::BacktestParams;
use crate::error::{FaberError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete backtest configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestFileConfig {
    /// Backtest parameter settings.
    #[serde(default)]
    pub backtest: BacktestSettings,
    /// Data settings.
    #[serde(default)]
    pub data: DataSettings,
}

/// Backtest parameter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    /// Start year of the backtest window.
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    /// SMA window length in months.
    #[serde(default = "default_sma_window")]
    pub sma_window: usize,
}

fn default_start_year() -> i32 { 2010 }
fn default_sma_window() -> usize { 10 }

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            start_year: 2010,
            sma_window: 10,
        }
    }
}

/// Data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    /// Path to a CSV file of monthly closes.
    pub path: Option<String>,
    /// Ticker the series belongs to.
    #[serde(default = "default_ticker")]
    pub ticker: String,
    /// Date format in the CSV.
    pub date_format: Option<String>,
    /// CSV delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_ticker() -> String { "^GSPC".to_string() }
fn default_delimiter() -> char { ',' }

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            path: None,
            ticker: "^GSPC".to_string(),
            date_format: None,
            delimiter: ',',
        }
    }
}

impl BacktestFileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let config: BacktestFileConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| FaberError::ConfigError(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Convert to validated engine parameters.
    pub fn to_params(&self) -> Result<BacktestParams> {
        BacktestParams::new(self.backtest.start_year, self.backtest.sma_window)
    }

    /// Convert the data section to a loader configuration.
    pub fn to_data_config(&self) -> DataConfig {
        DataConfig {
            date_format: self.data.date_format.clone(),
            delimiter: Some(self.data.delimiter as u8),
            ..Default::default()
        }
    }

    /// Generate an example configuration file content.
    pub fn example() -> String {
        r#"# Faber backtest configuration file

[backtest]
start_year = 2010
sma_window = 10      # months, 2..=24 is the sensible range

[data]
path = "data/monthly_closes.csv"
ticker = "^GSPC"
# date_format = "%Y-%m-%d"
delimiter = ","
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = BacktestFileConfig::default();
        assert_eq!(config.backtest.start_year, 2010);
        assert_eq!(config.backtest.sma_window, 10);
        assert_eq!(config.data.ticker, "^GSPC");
    }

    #[test]
    fn test_load_config() {
        let toml_content = r#"
[backtest]
start_year = 2015
sma_window = 6

[data]
path = "closes.csv"
ticker = "TEST"
"#;
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", toml_content).unwrap();

        let config = BacktestFileConfig::load(file.path()).unwrap();
        assert_eq!(config.backtest.start_year, 2015);
        assert_eq!(config.backtest.sma_window, 6);
        assert_eq!(config.data.path.as_deref(), Some("closes.csv"));
        assert_eq!(config.data.ticker, "TEST");
    }

    #[test]
    fn test_to_params_validates_window() {
        let config = BacktestFileConfig {
            backtest: BacktestSettings {
                start_year: 2020,
                sma_window: 1,
            },
            ..Default::default()
        };
        assert!(config.to_params().is_err());

        let params = BacktestFileConfig::default().to_params().unwrap();
        assert_eq!(params.sma_window(), 10);
    }

    #[test]
    fn test_save_config() {
        let config = BacktestFileConfig::default();
        let file = NamedTempFile::new().unwrap();
        config.save(file.path()).unwrap();

        let loaded = BacktestFileConfig::load(file.path()).unwrap();
        assert_eq!(loaded.backtest.start_year, config.backtest.start_year);
    }

    #[test]
    fn test_example_config_parses() {
        let example = BacktestFileConfig::example();
        let config: BacktestFileConfig = toml::from_str(&example).unwrap();
        assert_eq!(config.backtest.sma_window, 10);
    }
}
