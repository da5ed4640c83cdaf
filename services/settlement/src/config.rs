//! Settlement engine configuration

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Longest reservation lifetime accepted, ten years in hours.
pub const MAX_RESERVATION_TTL_HOURS: i64 = 24 * 366 * 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// How long a buy order's cash hold stays valid, in hours
    pub cash_reservation_ttl_hours: i64,
    /// How long a sell order's asset hold stays valid, in hours
    pub asset_reservation_ttl_hours: i64,
    /// Maximum number of orders canceled by one sweep pass
    pub sweep_batch_limit: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            cash_reservation_ttl_hours: 24,
            asset_reservation_ttl_hours: 1000,
            sweep_batch_limit: 500,
        }
    }
}

impl SettlementConfig {
    /// Cash hold lifetime, clamped to `0..=MAX_RESERVATION_TTL_HOURS`.
    pub fn cash_reservation_ttl(&self) -> Duration {
        ttl(self.cash_reservation_ttl_hours)
    }

    pub fn asset_reservation_ttl(&self) -> Duration {
        ttl(self.asset_reservation_ttl_hours)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.cash_reservation_ttl_hours <= 0 {
            errors.push("cash_reservation_ttl_hours must be positive".to_string());
        }
        if self.asset_reservation_ttl_hours <= 0 {
            errors.push("asset_reservation_ttl_hours must be positive".to_string());
        }
        for (name, hours) in [
            ("cash_reservation_ttl_hours", self.cash_reservation_ttl_hours),
            ("asset_reservation_ttl_hours", self.asset_reservation_ttl_hours),
        ] {
            if hours > MAX_RESERVATION_TTL_HOURS {
                errors.push(format!("{} must not exceed {}", name, MAX_RESERVATION_TTL_HOURS));
            }
        }
        if self.sweep_batch_limit == 0 {
            errors.push("sweep_batch_limit must be at least 1".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn ttl(hours: i64) -> Duration {
    Duration::hours(hours.clamp(0, MAX_RESERVATION_TTL_HOURS))
}
