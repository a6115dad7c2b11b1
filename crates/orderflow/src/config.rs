use crate::profile::DEFAULT_WARMUP_FLOOR;
use crate::OrderFlowError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one [`OrderFlowEngine`](crate::OrderFlowEngine) session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum price increment of the instrument (e.g. 0.25 for ES).
    pub tick_size: Decimal,
    /// Start each new bar from the previous bar's cumulative delta. When
    /// disabled every bar's cumulative delta equals its own net delta.
    pub chain_cumulative_delta: bool,
    /// Bars below this index are excluded from volume profiles.
    pub profile_warmup_floor: usize,
    /// Bar boundaries below this index are ignored. Chart hosts commonly
    /// wait for a handful of bars before plotting.
    pub bars_required: usize,
    /// Ratio used by the diagonal imbalance scan.
    pub imbalance_ratio: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_size: dec!(0.25),
            chain_cumulative_delta: true,
            profile_warmup_floor: DEFAULT_WARMUP_FLOOR,
            bars_required: 0,
            imbalance_ratio: dec!(3),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, OrderFlowError> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| OrderFlowError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, OrderFlowError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OrderFlowError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, OrderFlowError> {
        toml::to_string_pretty(self).map_err(|e| OrderFlowError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), OrderFlowError> {
        if self.tick_size <= Decimal::ZERO {
            return Err(OrderFlowError::Config(format!(
                "tick_size must be positive, got {}",
                self.tick_size
            )));
        }
        if self.imbalance_ratio <= Decimal::ZERO {
            return Err(OrderFlowError::Config(format!(
                "imbalance_ratio must be positive, got {}",
                self.imbalance_ratio
            )));
        }
        Ok(())
    }
}
