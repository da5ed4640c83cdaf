//! Tradable instruments

use crate::ids::AssetId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument classification, copied onto ledger entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Equity,
    Bond,
    Fund,
    Etf,
    Other,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetType::Equity => "equity",
            AssetType::Bond => "bond",
            AssetType::Fund => "fund",
            AssetType::Etf => "etf",
            AssetType::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: AssetId,
    pub symbol: String,
    pub asset_type: AssetType,
    /// Currency the instrument is quoted and settled in
    pub currency: String,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, asset_type: AssetType, currency: impl Into<String>) -> Self {
        Self {
            asset_id: AssetId::new(),
            symbol: symbol.into(),
            asset_type,
            currency: currency.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_type_wire_names() {
        assert_eq!(serde_json::to_string(&AssetType::Etf).unwrap(), "\"etf\"");
        let parsed: AssetType = serde_json::from_str("\"equity\"").unwrap();
        assert_eq!(parsed, AssetType::Equity);
        assert_eq!(AssetType::Bond.to_string(), "bond");
    }
}
