//! Tunable algorithm parameters.
//!
//! The optimizer reads its configuration only through an immutable
//! [`AlgorithmConfig`] snapshot built once per call. Partial overrides (as
//! persisted by the surrounding service under SCREAMING_SNAKE_CASE keys)
//! merge over the defaults via [`AlgorithmConfig::with_overrides`]; the
//! snapshot is never mutated or re-read mid-call.

use serde::{Deserialize, Serialize};

/// Immutable algorithm configuration snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// Starting upper slack for nitrogen (kg/ha).
    pub n_tolerance_kg: i64,
    /// Maximum nitrogen slack reached during escalation (kg/ha).
    pub n_max_tolerance_kg: i64,
    /// Lower band for P/K/S as percent of target.
    pub pks_min_pct: i64,
    /// Upper band for P/K/S as percent of target.
    pub pks_max_pct: i64,
    /// Warning threshold (percent of target) for inactive nutrients.
    pub high_level_threshold: i64,
    /// Absolute cap on products per strategy.
    pub max_products_hard: u32,
    /// Number of price-podium entries to return.
    pub num_strategies: usize,
    /// Total wall-clock budget per recommendation (ms).
    pub timeout_ms: u64,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            n_tolerance_kg: 1,
            n_max_tolerance_kg: 5,
            pks_min_pct: 90,
            pks_max_pct: 150,
            high_level_threshold: 151,
            max_products_hard: 5,
            num_strategies: 3,
            timeout_ms: 30_000,
        }
    }
}

impl AlgorithmConfig {
    /// Merge a partial override set over this snapshot, returning a new one.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> AlgorithmConfig {
        AlgorithmConfig {
            n_tolerance_kg: overrides.n_tolerance_kg.unwrap_or(self.n_tolerance_kg),
            n_max_tolerance_kg: overrides
                .n_max_tolerance_kg
                .unwrap_or(self.n_max_tolerance_kg),
            pks_min_pct: overrides.pks_min_pct.unwrap_or(self.pks_min_pct),
            pks_max_pct: overrides.pks_max_pct.unwrap_or(self.pks_max_pct),
            high_level_threshold: overrides
                .high_level_threshold
                .unwrap_or(self.high_level_threshold),
            max_products_hard: overrides
                .max_products_hard
                .unwrap_or(self.max_products_hard),
            num_strategies: overrides.num_strategies.unwrap_or(self.num_strategies),
            timeout_ms: overrides.timeout_ms.unwrap_or(self.timeout_ms),
        }
    }
}

/// Partial configuration, as stored/transmitted by the surrounding service.
///
/// Unknown keys are ignored on deserialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(rename = "N_TOLERANCE_KG", default, skip_serializing_if = "Option::is_none")]
    pub n_tolerance_kg: Option<i64>,
    #[serde(
        rename = "N_MAX_TOLERANCE_KG",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub n_max_tolerance_kg: Option<i64>,
    #[serde(rename = "PKS_MIN_PCT", default, skip_serializing_if = "Option::is_none")]
    pub pks_min_pct: Option<i64>,
    #[serde(rename = "PKS_MAX_PCT", default, skip_serializing_if = "Option::is_none")]
    pub pks_max_pct: Option<i64>,
    #[serde(
        rename = "HIGH_LEVEL_THRESHOLD",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub high_level_threshold: Option<i64>,
    #[serde(
        rename = "MAX_PRODUCTS_HARD",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_products_hard: Option<u32>,
    #[serde(rename = "NUM_STRATEGIES", default, skip_serializing_if = "Option::is_none")]
    pub num_strategies: Option<usize>,
    #[serde(rename = "TIMEOUT_MS", default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}
