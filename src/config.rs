use crate::error::{LedgerError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerConfig {
    #[schemars(description = "Allowed gap between a transaction amount and the sum of its payment or expense shares")]
    pub split_tolerance: f64,

    #[schemars(description = "Allowed gap between 100 and the sum of an item's ownership percentages")]
    pub ownership_tolerance: f64,

    #[schemars(description = "Net settlement balances closer to zero than this are dropped")]
    pub settlement_epsilon: f64,

    pub transfer_category: String,
    pub dividend_category: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            split_tolerance: 0.01,
            ownership_tolerance: 0.1,
            settlement_epsilon: 0.01,
            transfer_category: "Transfer".to_string(),
            dividend_category: "Dividends".to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LedgerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("splitTolerance", self.split_tolerance),
            ("ownershipTolerance", self.ownership_tolerance),
            ("settlementEpsilon", self.settlement_epsilon),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LedgerError::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = LedgerConfig::from_json_str(r#"{"splitTolerance": 0.05}"#).unwrap();
        assert_eq!(config.split_tolerance, 0.05);
        assert_eq!(config.ownership_tolerance, 0.1);
        assert_eq!(config.transfer_category, "Transfer");
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let result = LedgerConfig::from_json_str(r#"{"settlementEpsilon": -1.0}"#);
        assert!(matches!(result, Err(LedgerError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join("cashflow_ledger_config_test.json");
        std::fs::write(&path, r#"{"dividendCategory": "Payouts"}"#).unwrap();
        let config = LedgerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.dividend_category, "Payouts");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = LedgerConfig::from_json_file("/nonexistent/ledger-config.json");
        assert!(matches!(result, Err(LedgerError::IoError(_))));
    }
}
