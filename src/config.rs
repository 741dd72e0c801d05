//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the tank-config.toml file.
//! Every section has built-in defaults, so a missing file or a partial file still
//! yields a complete configuration. A few values can be overridden from the
//! environment, which is also the only place the ThingSpeak key should live.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Default config file name, relative to the working directory.
pub const CONFIG_FILE: &str = "tank-config.toml";

/// Application configuration loaded from tank-config.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Tank geometry and sensor mounting
    pub tank: TankConfig,
    /// Sampling cadence and smoothing
    pub sampling: SamplingConfig,
    /// WiFi link handling
    pub network: NetworkConfig,
    /// ThingSpeak uplink
    pub telemetry: TelemetryConfig,
    /// Character LCD
    pub display: DisplayConfig,
    /// Pin assignments and kernel device paths
    pub hardware: HardwareConfig,
}

/// Tank geometry
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TankConfig {
    /// Depth from the reference level to the tank floor in cm
    pub depth_cm: f32,
    /// Distance the sensor sits above the reference level in cm
    pub sensor_offset_cm: f32,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            depth_cm: 30.0,
            sensor_offset_cm: 35.0,
        }
    }
}

/// Sampling cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Seconds between reports (ThingSpeak free tier wants >= 15 s; 20 min is polite)
    pub report_interval_secs: u64,
    /// Rain ADC moving-average window
    pub rain_window: usize,
    /// Climate probe attempts per cycle
    pub climate_retries: u32,
    /// Pause between climate probe attempts in ms
    pub climate_backoff_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 1200,
            rain_window: crate::rain::DEFAULT_WINDOW,
            climate_retries: 3,
            climate_backoff_ms: 150,
        }
    }
}

/// WiFi link handling
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface whose operstate is checked
    pub interface: String,
    /// Minimum time between reconnect attempts in ms
    pub reconnect_cooldown_ms: u64,
    /// How long one reconnect attempt may take in seconds
    pub connect_timeout_secs: u64,
    /// Command that asks the OS to re-associate
    pub reconnect_command: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".to_string(),
            reconnect_cooldown_ms: 10_000,
            connect_timeout_secs: 10,
            reconnect_command: ["wpa_cli", "-i", "wlan0", "reconnect"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// ThingSpeak uplink
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Base URL of the ThingSpeak API
    pub endpoint: String,
    /// Channel write key; empty means log-only
    pub write_api_key: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://api.thingspeak.com".to_string(),
            write_api_key: String::new(),
            request_timeout_secs: 15,
        }
    }
}

/// Character LCD
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Columns on the panel
    pub width: usize,
    /// Scroll frame delay in ms
    pub scroll_delay_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: crate::display::LCD_WIDTH,
            scroll_delay_ms: 300,
        }
    }
}

/// Pin assignments (BCM numbering) and kernel device paths
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// HC-SR04 trigger
    pub trig_pin: u8,
    /// HC-SR04 echo (through a divider, the sensor is 5 V)
    pub echo_pin: u8,
    /// Status LED
    pub led_pin: u8,
    /// MCP3008 channel wired to the rain sensor
    pub adc_channel: u8,
    /// IIO device exposed by the dht11 overlay
    pub iio_device: String,
    /// I2C bus the LCD backpack sits on
    pub lcd_i2c_bus: u8,
    /// 7-bit address of the LCD backpack
    pub lcd_i2c_address: u16,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            trig_pin: 23,
            echo_pin: 24,
            led_pin: 16,
            adc_channel: 0,
            iio_device: "/sys/bus/iio/devices/iio:device0".to_string(),
            lcd_i2c_bus: 1,
            lcd_i2c_address: 0x27,
        }
    }
}

impl Config {
    /// Load configuration from the path in `TANK_CONFIG`, or tank-config.toml,
    /// then apply environment overrides.
    pub fn load() -> Self {
        let path = std::env::var("TANK_CONFIG").unwrap_or_else(|_| CONFIG_FILE.to_string());
        let mut config = Self::load_from_path(path);
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.as_ref().display(),
                        depth_cm = config.tank.depth_cm,
                        "Loaded configuration"
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
                info!("No config file found, using default configuration");
                Self::default()
            }
        }
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("THINGSPEAK_API_KEY") {
            self.telemetry.write_api_key = key;
        }
        if let Some(raw) = lookup("TANK_REPORT_INTERVAL_SECS") {
            match raw.parse() {
                Ok(secs) => self.sampling.report_interval_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid TANK_REPORT_INTERVAL_SECS"),
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!(path = %path.as_ref().display(), "Configuration saved");
        Ok(())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.sampling.report_interval_secs)
    }

    pub fn climate_backoff(&self) -> Duration {
        Duration::from_millis(self.sampling.climate_backoff_ms)
    }

    pub fn reconnect_cooldown(&self) -> Duration {
        Duration::from_millis(self.network.reconnect_cooldown_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.network.connect_timeout_secs)
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.display.scroll_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tank.depth_cm, 30.0);
        assert_eq!(config.tank.sensor_offset_cm, 35.0);
        assert_eq!(config.report_interval(), Duration::from_secs(1200));
        assert_eq!(config.reconnect_cooldown(), Duration::from_millis(10_000));
        assert_eq!(config.sampling.rain_window, 5);
        assert_eq!(config.sampling.climate_retries, 3);
        assert!(config.telemetry.write_api_key.is_empty());
        assert_eq!(config.hardware.lcd_i2c_bus, 1);
        assert_eq!(config.hardware.lcd_i2c_address, 0x27);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.tank.depth_cm, parsed.tank.depth_cm);
        assert_eq!(config.network.reconnect_command, parsed.network.reconnect_command);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            "[tank]\ndepth_cm = 120.0\n\n[sampling]\nreport_interval_secs = 60\n\n[hardware]\nlcd_i2c_address = 63\n",
        )
        .unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config.tank.depth_cm, 120.0);
        assert_eq!(config.tank.sensor_offset_cm, 35.0);
        assert_eq!(config.sampling.report_interval_secs, 60);
        assert_eq!(config.sampling.climate_backoff_ms, 150);
        assert_eq!(config.network.interface, "wlan0");
        assert_eq!(config.hardware.lcd_i2c_address, 0x3F);
        assert_eq!(config.hardware.lcd_i2c_bus, 1);
    }

    #[test]
    fn test_invalid_file_falls_back_to_default() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "[tank\ndepth_cm = ").unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config.tank.depth_cm, 30.0);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.tank.depth_cm, 30.0);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "THINGSPEAK_API_KEY" => Some("SECRET".to_string()),
            "TANK_REPORT_INTERVAL_SECS" => Some("45".to_string()),
            _ => None,
        });
        assert_eq!(config.telemetry.write_api_key, "SECRET");
        assert_eq!(config.report_interval(), Duration::from_secs(45));

        config.apply_env(|key| (key == "TANK_REPORT_INTERVAL_SECS").then(|| "soon".to_string()));
        assert_eq!(config.sampling.report_interval_secs, 45);
    }

    #[test]
    fn test_save_then_load() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.tank.depth_cm = 55.5;
        config.save_to_path(file.path()).unwrap();
        let loaded = Config::load_from_path(file.path());
        assert_eq!(loaded.tank.depth_cm, 55.5);
    }
}
