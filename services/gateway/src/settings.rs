//! Gateway configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `GATEWAY__*` environment variables
//! (`GATEWAY__LISTEN_ADDR`, `GATEWAY__HOUSE__OPENING_BALANCE`, ...).

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use settlement::SettlementConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub listen_addr: String,
    /// Journal directory; the ledger is kept in memory only when absent
    pub journal_dir: Option<PathBuf>,
    /// HMAC secret for bearer tokens
    pub jwt_secret: String,
    pub sweep_interval_secs: u64,
    pub house: HouseConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HouseConfig {
    pub currency: String,
    /// Cash the house account starts with when it is first created
    pub opening_balance: Decimal,
}

impl GatewayConfig {
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_else(|| Path::new("gateway.toml"));
        let builder = Config::builder()
            .set_default("listen_addr", "0.0.0.0:8080")?
            .set_default("jwt_secret", "")?
            .set_default("sweep_interval_secs", 60)?
            .set_default("house.currency", "USD")?
            .set_default("house.opening_balance", "0")?
            .add_source(File::from(file).required(false))
            .add_source(
                Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Message("jwt_secret must be set".to_string()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Message("sweep_interval_secs must be at least 1".to_string()));
        }
        if self.house.opening_balance < Decimal::ZERO {
            return Err(ConfigError::Message("house.opening_balance must not be negative".to_string()));
        }
        self.settlement
            .validate()
            .map_err(|errors| ConfigError::Message(errors.join("; ")))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
