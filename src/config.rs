//! ==============================================================================
//! config.rs - runtime configuration loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `config/hub.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - NetworkConfig: broadcast address and udp port
//!     - ThresholdConfig: low/high band boundaries for the average
//!     - PeerConfig: expected node count and per-peer silence timeout
//!     - TimingConfig: sweep period, blink half-period, button re-arm delay
//!     - PinConfig: bcm pin numbers for the button and the four leds
//!     - LoggingConfig / ServerConfig: observability surface
//!
//! ==============================================================================

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct HubConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub peers: PeerConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub pins: PinConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub broadcast_addr: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ThresholdConfig {
    pub low: i64,
    pub high: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PeerConfig {
    pub expected_count: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimingConfig {
    pub sweep_period_ms: u64,
    pub blink_half_period_ms: u64,
    pub button_rearm_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PinConfig {
    pub button: u8,
    pub red: u8,
    pub yellow: u8,
    pub green: u8,
    pub white: u8,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub port: u16,
}

impl PeerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl TimingConfig {
    pub fn sweep_period(&self) -> Duration {
        Duration::from_millis(self.sweep_period_ms)
    }

    pub fn blink_half_period(&self) -> Duration {
        Duration::from_millis(self.blink_half_period_ms)
    }

    pub fn button_rearm(&self) -> Duration {
        Duration::from_millis(self.button_rearm_ms)
    }
}

impl HubConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: HubConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback. Runs before tracing is initialized (the
    /// log filter comes from this config), so the chosen source is returned
    /// for the caller to log instead of being logged here.
    pub fn load_or_default() -> (Self, Option<std::path::PathBuf>) {
        let paths = [
            std::path::PathBuf::from("config").join("hub.toml"),
            std::path::PathBuf::from("..").join("config").join("hub.toml"),
        ];

        for path in &paths {
            if path.exists() {
                if let Ok(config) = Self::load(path) {
                    return (config, Some(path.clone()));
                }
            }
        }

        (Self::default(), None)
    }

    /// Log a configuration summary at startup
    pub fn log_summary(&self, source: Option<&Path>) {
        match source {
            Some(path) => tracing::info!(path = %path.display(), "configuration loaded"),
            None => tracing::warn!("no config file found, using defaults"),
        }
        tracing::info!(
            broadcast = %self.network.broadcast_addr,
            port = self.network.port,
            low = self.thresholds.low,
            high = self.thresholds.high,
            expected_peers = self.peers.expected_count,
            peer_timeout_secs = self.peers.timeout_secs,
            sweep_ms = self.timing.sweep_period_ms,
            "hub configuration"
        );
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            thresholds: ThresholdConfig::default(),
            peers: PeerConfig::default(),
            timing: TimingConfig::default(),
            pins: PinConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: "255.255.255.255".to_string(),
            port: 4210,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self { low: 400, high: 700 }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            expected_count: 3,
            timeout_secs: 10,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sweep_period_ms: 1000,
            blink_half_period_ms: 250,
            button_rearm_ms: 500,
        }
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            button: 15,
            red: 27,
            yellow: 22,
            green: 23,
            white: 24,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3000,
        }
    }
}
