//! Request and result records for the optimizer.
//!
//! Outputs are fixed-shape serde records consumed by the API layer; optional
//! numeric fields are `None` where a target of zero makes the ratio
//! undefined. Infeasibility is a status, never an error.

use gro_core::{ActivationFlags, AlgorithmConfig, Nutrient, NutrientAmounts};
use serde::{Deserialize, Serialize};

/// Input to [`crate::optimizer::optimize`].
#[derive(Debug, Clone)]
pub struct OptimizeInput {
    /// Targets in kg/ha; zero means "no target".
    pub targets: NutrientAmounts,
    pub flags: ActivationFlags,
    /// Caller's cap on products per strategy (`1..=MAX_PRODUCTS_HARD`).
    pub max_products: u32,
    /// Dose bounds in integer kg/ha, `0 < min_dose <= max_dose`.
    pub min_dose: i64,
    pub max_dose: i64,
    pub config: AlgorithmConfig,
    /// Product ids that must appear in every strategy.
    pub required_product_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeStatus {
    Ok,
    Infeasible,
}

/// One product line within a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyProduct {
    pub id: String,
    pub artikelnr: i64,
    pub name: String,
    pub dose_kg_per_ha: i64,
    pub cost_sek_per_ha: f64,
}

/// Percent-of-target per nutrient; `None` where the target is zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NutrientPercents {
    #[serde(rename = "N")]
    pub n: Option<f64>,
    #[serde(rename = "P")]
    pub p: Option<f64>,
    #[serde(rename = "K")]
    pub k: Option<f64>,
    #[serde(rename = "S")]
    pub s: Option<f64>,
}

impl NutrientPercents {
    pub fn get(&self, nutrient: Nutrient) -> Option<f64> {
        match nutrient {
            Nutrient::N => self.n,
            Nutrient::P => self.p,
            Nutrient::K => self.k,
            Nutrient::S => self.s,
        }
    }

    pub fn set(&mut self, nutrient: Nutrient, value: Option<f64>) {
        match nutrient {
            Nutrient::N => self.n = value,
            Nutrient::P => self.p = value,
            Nutrient::K => self.k = value,
            Nutrient::S => self.s = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    #[serde(rename = "HIGH_LEVEL")]
    HighLevel,
}

/// Emitted when a nutrient the caller did not ask for is oversupplied past
/// the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub nutrient: Nutrient,
    #[serde(rename = "type")]
    pub kind: WarningKind,
    /// Threshold in percent of target.
    pub threshold: i64,
    pub value_kg_per_ha: f64,
    /// achieved / target, rounded to 0.01.
    pub ratio: f64,
}

/// One ranked entry of the price podium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub rank: u32,
    pub total_cost_sek_per_ha: f64,
    pub products: Vec<StrategyProduct>,
    /// Achieved kg/ha per nutrient, rounded to 0.01.
    pub achieved: NutrientAmounts,
    pub percent_of_target: NutrientPercents,
    pub must_flags: ActivationFlags,
    pub warnings: Vec<Warning>,
    /// The nitrogen tolerance that produced this strategy; `None` when
    /// nitrogen was not active.
    pub n_tolerance_used: Option<i64>,
}

impl Strategy {
    /// Selected product ids, sorted (used for identity checks).
    pub fn product_id_set(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.products.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

/// Result of one recommendation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeOutput {
    pub status: OptimizeStatus,
    pub used_max_products: u32,
    pub strategies: Vec<Strategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_tolerance_used: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OptimizeOutput {
    pub fn infeasible(used_max_products: u32, message: impl Into<String>) -> Self {
        Self {
            status: OptimizeStatus::Infeasible,
            used_max_products,
            strategies: Vec::new(),
            n_tolerance_used: None,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OptimizeStatus::Ok
    }
}

/// Round to two decimals (money, kilograms).
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to one decimal (percentages).
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
