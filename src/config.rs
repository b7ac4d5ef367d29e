//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the calendar-config.toml file.
//! It provides a centralized way to configure the mark-file directory, panel geometry,
//! calendar layout, refresh timing and hardware pins.
//!
//! Every section falls back to its defaults, so a config file only needs to list
//! the values that differ from the stock 13.3" setup.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "calendar-config.toml";

/// Application configuration loaded from calendar-config.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Where mark files live
    pub storage: StorageConfig,
    /// Panel size
    pub display: DisplayConfig,
    /// Calendar geometry consumed by the renderer
    pub layout: LayoutConfig,
    /// Debounce and idle timeout
    pub timing: TimingConfig,
    /// Cursor behaviour
    pub navigation: NavigationConfig,
    /// GPIO and SPI wiring (hardware feature only)
    pub hardware: HardwareConfig,
}

/// Mark file storage
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one `<year>.txt` per calendar year
    pub data_dir: PathBuf,
}

/// Panel dimensions
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// E-paper width in pixels
    pub width: u32,
    /// E-paper height in pixels
    pub height: u32,
}

/// Year-grid geometry, all values in pixels
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub day_width: u32,
    pub day_height: u32,
    pub padding: u32,
    /// Space reserved for the month label left of the first day column
    pub label_width: u32,
    /// Top of the year header text
    pub header_y: u32,
    /// Top of the weekday letter row
    pub weekday_row_y: u32,
    /// Extra vertical gap between month rows
    pub row_gap: u32,
    /// How many weekday letters to print across the top
    pub weekday_columns: u32,
}

/// Refresh timing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Coalescing window for interactive renders
    pub debounce_ms: u64,
    /// Inactivity before the selection reverts to today and the panel sleeps
    pub idle_timeout_secs: u64,
}

/// Cursor behaviour
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Allow moving past Dec 31 into next year (and before Jan 1 into last year)
    pub year_rollover: bool,
}

/// GPIO pin numbers (BCM) and SPI device for the panel HAT
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub spi_device: String,
    pub dc_pin: u32,
    pub rst_pin: u32,
    pub busy_pin: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: PathBuf::from("/home/admin/CalendarDatabase"),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            width: 960,  // Waveshare 13.3" K
            height: 680, // Waveshare 13.3" K
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            day_width: 20,
            day_height: 30,
            padding: 5,
            label_width: 30,
            header_y: 10,
            weekday_row_y: 50,
            row_gap: 15,
            weekday_columns: 37,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            debounce_ms: 1000,
            idle_timeout_secs: 60,
        }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        HardwareConfig {
            spi_device: "/dev/spidev0.0".to_string(),
            dc_pin: 25,
            rst_pin: 17,
            busy_pin: 24,
        }
    }
}

impl TimingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Config {
    /// Load configuration from calendar-config.toml file
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(
                        "Loaded configuration from {} (data dir {})",
                        path.as_ref().display(),
                        config.storage.data_dir.display()
                    );
                    config
                }
                Err(e) => {
                    warn!("Invalid config file format: {}", e);
                    warn!("Using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                info!(
                    "No config file at {}, using default configuration",
                    path.as_ref().display()
                );
                Self::default()
            }
        }
    }

    /// Save current configuration as pretty TOML
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.display.width, 960);
        assert_eq!(config.display.height, 680);
        assert_eq!(config.timing.debounce(), Duration::from_secs(1));
        assert_eq!(config.timing.idle_timeout(), Duration::from_secs(60));
        assert!(!config.navigation.year_rollover);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.storage.data_dir, parsed.storage.data_dir);
        assert_eq!(config.layout.day_width, parsed.layout.day_width);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[timing]
debounce_ms = 250

[navigation]
year_rollover = true
"#,
        )
        .unwrap();
        assert_eq!(parsed.timing.debounce_ms, 250);
        assert_eq!(parsed.timing.idle_timeout_secs, 60);
        assert!(parsed.navigation.year_rollover);
        assert_eq!(parsed.layout.day_height, 30);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.display.width, 960);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar-config.toml");
        let mut config = Config::default();
        config.timing.idle_timeout_secs = 300;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path);
        assert_eq!(loaded.timing.idle_timeout_secs, 300);
    }
}
