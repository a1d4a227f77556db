//! Engine tuning: cadences, queue depths and thresholds.
//!
//! Game-design constants (unit costs, outpost prices) live with the game
//! data; this is only the strategist's own clockwork. Loadable from RON,
//! every field optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::economy::LedgerConfig;
use crate::error::{AiError, Result};
use crate::math::{fixed_decimal, Fixed};

/// Engine configuration.
///
/// # Example RON
///
/// ```ron
/// EngineConfig(
///     production_interval: 2.0,
///     tactical_interval: 0.5,
///     amplification_cap: 1000.0,
///     ledger: (regen_amount: 8),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between production passes (drain, fill, worker top-up).
    #[serde(with = "fixed_decimal")]
    pub production_interval: Fixed,
    /// Seconds between labor rebalancing passes.
    #[serde(with = "fixed_decimal")]
    pub labor_interval: Fixed,
    /// Seconds between battlefield assessments.
    #[serde(with = "fixed_decimal")]
    pub scout_interval: Fixed,
    /// Seconds between tactical decisions.
    #[serde(with = "fixed_decimal")]
    pub tactical_interval: Fixed,

    /// The opening script feeds the queue while it holds fewer than this.
    pub opening_queue_depth: usize,
    /// The macro phase fills the queue up to this depth.
    pub macro_queue_depth: usize,
    /// Workers are topped up only while the queue holds fewer than this.
    pub worker_queue_depth: usize,

    /// An attack is called off when own power drops below this.
    #[serde(with = "fixed_decimal")]
    pub attack_power_floor: Fixed,
    /// Radius around each owned base scanned for hostile presence.
    #[serde(with = "fixed_decimal")]
    pub defend_scan_radius: Fixed,

    /// Factor applied to build-list weights of units a pending wave lacks.
    #[serde(with = "fixed_decimal")]
    pub amplification_factor: Fixed,
    /// Amplified weights saturate here.
    #[serde(with = "fixed_decimal")]
    pub amplification_cap: Fixed,
    /// Weight of the forced expansion step under critical economy.
    #[serde(with = "fixed_decimal")]
    pub critical_expansion_weight: Fixed,
    /// Expansion pressure starts when reserves fall below this many outposts.
    pub expansion_reserve_outposts: i32,

    /// Seconds a wave may sit past its trigger time before it is reported.
    #[serde(with = "fixed_decimal")]
    pub wave_stall_warning: Fixed,

    /// Resource ledger setup.
    pub ledger: LedgerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            production_interval: Fixed::from_num(2),
            labor_interval: Fixed::from_num(1),
            scout_interval: Fixed::from_num(1),
            tactical_interval: Fixed::from_num(0.5),
            opening_queue_depth: 3,
            macro_queue_depth: 2,
            worker_queue_depth: 3,
            attack_power_floor: Fixed::from_num(100),
            defend_scan_radius: Fixed::from_num(300),
            amplification_factor: Fixed::from_num(1.25),
            amplification_cap: Fixed::from_num(1000),
            critical_expansion_weight: Fixed::from_num(1000),
            expansion_reserve_outposts: 3,
            wave_stall_warning: Fixed::from_num(60),
            ledger: LedgerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|source| AiError::Parse {
            path: "<inline>".to_string(),
            source,
        })
    }

    /// Load a configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| AiError::Io {
            path: path.display().to_string(),
            source,
        })?;
        ron::from_str(&contents).map_err(|source| AiError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cadences() {
        let config = EngineConfig::default();
        assert_eq!(config.production_interval, Fixed::from_num(2));
        assert_eq!(config.labor_interval, Fixed::from_num(1));
        assert_eq!(config.tactical_interval, Fixed::from_num(0.5));
        assert_eq!(config.ledger.siege_multiplier, 5);
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = EngineConfig::from_ron_str(
            "(production_interval: 3.0, amplification_cap: 50.0, ledger: (regen_amount: 9))",
        )
        .unwrap();
        assert_eq!(config.production_interval, Fixed::from_num(3));
        assert_eq!(config.amplification_cap, Fixed::from_num(50));
        assert_eq!(config.ledger.regen_amount, 9);
        assert_eq!(config.macro_queue_depth, 2);
        assert_eq!(config.ledger.siege_multiplier, 5);
    }

    #[test]
    fn test_bad_ron_is_parse_error() {
        let err = EngineConfig::from_ron_str("(production_interval: \"soon\")").unwrap_err();
        assert!(matches!(err, AiError::Parse { .. }));
    }
}
