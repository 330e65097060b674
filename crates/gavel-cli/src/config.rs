//! CLI Configuration
//!
//! Layered configuration for the `gavel` binary.
//! Supports config files, environment variables and CLI arguments.

use std::time::Duration;

use gavel_agents::{BuyerOptions, HouseConfig, SellerConfig, DEFAULT_EVENT_CAPACITY};
use gavel_types::{Price, DEFAULT_DURATION_SECS, TIME_EXTENSION_SECS};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Gavel configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GavelConfig {
    /// Auction timing
    #[serde(default)]
    pub auction: AuctionSettings,

    /// Automated buyers for `gavel simulate`
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Auction timing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionSettings {
    /// Duration used when the operator does not give one
    #[serde(default = "default_duration")]
    pub default_duration_secs: u64,

    /// Seconds added per time-extension request
    #[serde(default = "default_extension")]
    pub extension_secs: u64,

    /// Wall-clock length of one countdown second, in milliseconds
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

impl Default for AuctionSettings {
    fn default() -> Self {
        Self {
            default_duration_secs: default_duration(),
            extension_secs: default_extension(),
            tick_millis: default_tick_millis(),
        }
    }
}

impl AuctionSettings {
    pub fn seller_config(&self) -> SellerConfig {
        SellerConfig {
            extension_secs: self.extension_secs,
            tick: Duration::from_millis(self.tick_millis),
        }
    }
}

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Number of automated buyers
    #[serde(default = "default_buyers")]
    pub buyers: usize,

    /// Item put up for auction
    #[serde(default = "default_item")]
    pub item: String,

    #[serde(default = "default_reserve")]
    pub reserve_price: Price,

    /// Lowest budget handed to a buyer
    #[serde(default = "default_budget_min")]
    pub budget_min: Price,

    /// Highest budget handed to a buyer
    #[serde(default = "default_budget_max")]
    pub budget_max: Price,

    /// Amount each automated bid adds to the current maximum
    #[serde(default = "default_increment")]
    pub increment: Price,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,

    /// Pause before each automated bid, in milliseconds
    #[serde(default = "default_bid_delay")]
    pub bid_delay_millis: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            buyers: default_buyers(),
            item: default_item(),
            reserve_price: default_reserve(),
            budget_min: default_budget_min(),
            budget_max: default_budget_max(),
            increment: default_increment(),
            seed: None,
            bid_delay_millis: default_bid_delay(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_duration() -> u64 {
    DEFAULT_DURATION_SECS
}

fn default_extension() -> u64 {
    TIME_EXTENSION_SECS
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_buyers() -> usize {
    4
}

fn default_item() -> String {
    "Painting".to_string()
}

fn default_reserve() -> Price {
    Decimal::from(100)
}

fn default_budget_min() -> Price {
    Decimal::from(120)
}

fn default_budget_max() -> Price {
    Decimal::from(400)
}

fn default_increment() -> Price {
    Decimal::from(10)
}

fn default_bid_delay() -> u64 {
    250
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl GavelConfig {
    /// Load configuration from an optional file, default locations and environment
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        // GAVEL__AUCTION__EXTENSION_SECS=15 and friends
        builder = builder.add_source(
            config::Environment::with_prefix("GAVEL")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: GavelConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject settings the auction roles cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auction.default_duration_secs == 0 {
            anyhow::bail!("auction.default_duration_secs must be positive");
        }
        if self.auction.extension_secs == 0 {
            anyhow::bail!("auction.extension_secs must be positive");
        }
        if self.auction.tick_millis == 0 {
            anyhow::bail!("auction.tick_millis must be positive");
        }

        let sim = &self.simulation;
        if sim.reserve_price <= Decimal::ZERO {
            anyhow::bail!("simulation.reserve_price must be positive");
        }
        if sim.increment <= Decimal::ZERO {
            anyhow::bail!("simulation.increment must be positive");
        }
        if sim.budget_min > sim.budget_max {
            anyhow::bail!(
                "simulation.budget_min ({}) exceeds simulation.budget_max ({})",
                sim.budget_min,
                sim.budget_max
            );
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            anyhow::bail!("logging.format must be one of pretty, compact, json");
        }
        Ok(())
    }

    /// House wiring for this configuration
    pub fn house_config(&self) -> HouseConfig {
        HouseConfig {
            seller: self.auction.seller_config(),
            buyer: BuyerOptions {
                bid_delay: Duration::from_millis(self.simulation.bid_delay_millis),
            },
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        let config = GavelConfig::default();
        config.validate().unwrap();
        assert_eq!(config.auction.extension_secs, 30);
        assert_eq!(config.auction.seller_config().tick, Duration::from_secs(1));
    }

    #[test]
    fn test_inverted_budget_rejected() {
        let mut config = GavelConfig::default();
        config.simulation.budget_min = dec!(500);
        config.simulation.budget_max = dec!(100);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timing_rejected() {
        let mut config = GavelConfig::default();
        config.auction.tick_millis = 0;
        assert!(config.validate().is_err());

        let mut config = GavelConfig::default();
        config.auction.extension_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = GavelConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("gavel-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[auction]\nextension_secs = 15\n\n[simulation]\nbuyers = 7\nincrement = \"2.5\"\n",
        )
        .unwrap();

        let config = GavelConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.auction.extension_secs, 15);
        assert_eq!(config.auction.default_duration_secs, 60);
        assert_eq!(config.simulation.buyers, 7);
        assert_eq!(config.simulation.increment, dec!(2.5));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(GavelConfig::load(Some("/nonexistent/gavel.toml")).is_err());
    }
}
