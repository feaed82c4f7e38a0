//! Engine façade.
//!
//! Adapts the service-facing request shape — a nutrient need, a set of
//! required nutrients, per-call options — onto the optimizer's input, and
//! shapes strategies into the `Solution` records the API layer serves.

use crate::backend::LpBackend;
use crate::optimizer::{optimize, optimize_with_fallback};
use crate::types::{
    round2, NutrientPercents, OptimizeInput, StrategyProduct,
};
use gro_core::{
    ActivationFlags, AlgorithmConfig, ConfigOverrides, Nutrient, NutrientAmounts, Product,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Catalogues smaller than this after nutrient filtering are passed through
/// unfiltered; a too-aggressive filter must not starve the optimizer.
const MIN_FILTERED_CATALOGUE: usize = 5;

/// The caller's nutrient requirement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Need {
    /// Requested kg/ha per nutrient.
    pub amounts: NutrientAmounts,
    /// Nutrients the strategies must satisfy (mapped onto must-flags).
    pub required: Vec<Nutrient>,
}

/// Per-call options.
#[derive(Debug, Clone)]
pub struct RecommendOptions {
    pub max_products: u32,
    pub min_dose: i64,
    pub max_dose: i64,
    /// Partial configuration merged over the defaults for this call.
    pub config: Option<ConfigOverrides>,
    /// Products that must appear in every strategy.
    pub required_product_ids: Vec<String>,
    /// Pad a short podium with dose variants (see `optimize_with_fallback`).
    pub use_dose_variation: bool,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            max_products: 3,
            min_dose: 100,
            max_dose: 600,
            config: None,
            required_product_ids: Vec::new(),
            use_dose_variation: false,
        }
    }
}

/// One recommendation as served to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub products: Vec<StrategyProduct>,
    /// Achieved kg/ha per nutrient.
    pub supplied: NutrientAmounts,
    /// `supplied − need` in kg/ha.
    pub deviation_kg: NutrientAmounts,
    /// `percent_of_target − 100`, `None` where the need is zero.
    pub deviation_pct: NutrientPercents,
    pub cost_per_ha: f64,
    /// Ranking score; equals cost (lower is better).
    pub score: f64,
    pub notes: Vec<String>,
}

/// Produce up to `NUM_STRATEGIES` solutions for a need.
///
/// Returns an empty list when optimization finds no strategy; the caller
/// decides how to present that.
pub async fn recommend<B: LpBackend>(
    backend: &B,
    need: &Need,
    products: &[Product],
    options: &RecommendOptions,
) -> Vec<Solution> {
    let mut flags = ActivationFlags::default();
    for &nutrient in &need.required {
        flags.set(nutrient, true);
    }

    let config = match &options.config {
        Some(overrides) => AlgorithmConfig::default().with_overrides(overrides),
        None => AlgorithmConfig::default(),
    };

    // Drop products that supply nothing, unless that leaves too few to
    // optimize over.
    let nutrient_bearing: Vec<Product> = products
        .iter()
        .filter(|p| !p.nutrients.is_empty())
        .cloned()
        .collect();
    let catalogue: &[Product] = if nutrient_bearing.len() < MIN_FILTERED_CATALOGUE {
        debug!(
            filtered = nutrient_bearing.len(),
            total = products.len(),
            "thin catalogue; passing unfiltered list"
        );
        products
    } else {
        &nutrient_bearing
    };

    let input = OptimizeInput {
        targets: need.amounts,
        flags,
        max_products: options.max_products,
        min_dose: options.min_dose,
        max_dose: options.max_dose,
        config,
        required_product_ids: options.required_product_ids.clone(),
    };

    let output = if options.use_dose_variation {
        optimize_with_fallback(backend, catalogue, &input).await
    } else {
        optimize(backend, catalogue, &input).await
    };
    if !output.is_ok() {
        debug!(message = ?output.message, "no strategies for need");
        return Vec::new();
    }

    output
        .strategies
        .into_iter()
        .map(|strategy| {
            let mut deviation_kg = NutrientAmounts::default();
            let mut deviation_pct = NutrientPercents::default();
            for nutrient in Nutrient::ALL {
                let target = need.amounts.get(nutrient);
                let supplied = strategy.achieved.get(nutrient);
                deviation_kg.set(nutrient, round2(supplied - target));
                deviation_pct.set(
                    nutrient,
                    strategy
                        .percent_of_target
                        .get(nutrient)
                        .map(|pct| round2(pct - 100.0)),
                );
            }

            let mut notes: Vec<String> = strategy
                .warnings
                .iter()
                .map(|w| {
                    format!(
                        "High {} level: {:.2} kg/ha is {:.2}x the target (threshold {}%)",
                        w.nutrient.display_name(),
                        w.value_kg_per_ha,
                        w.ratio,
                        w.threshold
                    )
                })
                .collect();
            if let Some(tolerance) = strategy.n_tolerance_used {
                if tolerance > 1 {
                    notes.push(format!("N-tolerance used: +{tolerance}"));
                }
            }

            Solution {
                products: strategy.products,
                supplied: strategy.achieved,
                deviation_kg,
                deviation_pct,
                cost_per_ha: strategy.total_cost_sek_per_ha,
                score: strategy.total_cost_sek_per_ha,
                notes,
            }
        })
        .collect()
}
