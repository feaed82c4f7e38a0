//! Dose-variation fallback.
//!
//! When the catalogue is too thin for the no-good-cut enumeration to fill
//! the podium, additional candidates can be synthesized by scaling the
//! baseline strategy's doses. These keep the same product set, so they are
//! clearly second-class: marked as synthesized, kept only while every active
//! nutrient still reaches a minimum share of its target, and never ranked
//! above a true MILP strategy.

use crate::construct::Candidate;
use gro_core::{Nutrient, NutrientAmounts, ScaledProduct};
use std::collections::HashSet;
use tracing::debug;

/// Multiplicative factors tried against the baseline doses, in order.
pub(crate) const VARIATION_FACTORS: [f64; 4] = [1.05, 0.95, 1.10, 0.90];

/// A variant survives only if each active nutrient keeps at least this
/// share of its target.
pub(crate) const MIN_COVERAGE: f64 = 0.85;

/// Synthesize up to `needed` dose variants of the baseline candidate.
pub(crate) fn dose_variants(
    base: &Candidate,
    products: &[ScaledProduct],
    targets: &NutrientAmounts,
    active: &[Nutrient],
    min_dose: i64,
    max_dose: i64,
    needed: usize,
) -> Vec<Candidate> {
    let mut seen: HashSet<Vec<(usize, i64)>> = HashSet::new();
    seen.insert(base.entries.clone());

    let mut variants = Vec::new();
    for factor in VARIATION_FACTORS {
        if variants.len() >= needed {
            break;
        }
        let entries: Vec<(usize, i64)> = base
            .entries
            .iter()
            .map(|&(index, dose)| {
                let scaled = ((dose as f64 * factor).round() as i64).clamp(min_dose, max_dose);
                (index, scaled)
            })
            .collect();
        if !seen.insert(entries.clone()) {
            continue; // clamping collapsed it onto an existing dose vector
        }

        let cost_ore = entries
            .iter()
            .map(|&(index, dose)| products[index].dose_cost_ore(dose))
            .sum();
        let candidate = Candidate {
            entries,
            cost_ore,
            n_tolerance: base.n_tolerance,
            synthesized: true,
        };

        let achieved = candidate.achieved(products);
        let covered = active
            .iter()
            .all(|&nutrient| achieved.get(nutrient) >= MIN_COVERAGE * targets.get(nutrient));
        if covered {
            debug!(factor, cost_ore = candidate.cost_ore, "kept dose variant");
            variants.push(candidate);
        }
    }
    variants
}
