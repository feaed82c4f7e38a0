//! Single-nutrient fast path.
//!
//! With exactly one active nutrient and nothing forced, each product is an
//! independent 1-D problem: its feasible integer dose window is a simple
//! division, and the best dose is the one closest to the target. Computing
//! this directly is orders of magnitude faster than a MILP round trip and
//! perfectly deterministic, so the optimizer takes this path whenever the
//! structure allows.

use crate::construct::{build_strategies, Candidate};
use crate::model::{nitrogen_band, pks_band};
use crate::types::{OptimizeInput, OptimizeOutput, OptimizeStatus};
use crate::validation::ValidatedInput;
use gro_core::{Nutrient, KG_SCALE};
use tracing::debug;

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1).div_euclid(b)
}

/// Solve the one-active-nutrient case without the solver.
pub fn solve(validated: &ValidatedInput, input: &OptimizeInput) -> OptimizeOutput {
    let nutrient = validated.active[0];
    let target = input.targets.get(nutrient);
    let config = &input.config;

    let (lower, upper) = match nutrient {
        Nutrient::N => nitrogen_band(target, config.n_tolerance_kg),
        _ => pks_band(target, config.pks_min_pct, config.pks_max_pct),
    };
    let target_scaled = (target * KG_SCALE as f64).round() as i64;

    let mut candidates: Vec<Candidate> = Vec::new();
    for (index, product) in validated.products.iter().enumerate() {
        let content = product.content10(nutrient);
        if content <= 0 {
            continue;
        }
        // dose window delivering within [lower, upper] grams, intersected
        // with the practical dose range
        let lo = ceil_div(lower, content).max(input.min_dose);
        let hi = (upper.div_euclid(content)).min(input.max_dose);
        if lo > hi {
            continue;
        }

        // within the window, the dose nearest the target wins; ties go to
        // the lower dose
        let ideal = target_scaled as f64 / content as f64;
        let mut best: Option<(i64, i64)> = None;
        for dose in [ideal.floor() as i64, ideal.ceil() as i64] {
            let dose = dose.clamp(lo, hi);
            let miss = (dose * content - target_scaled).abs();
            best = match best {
                Some((best_miss, best_dose))
                    if (best_miss, best_dose) <= (miss, dose) =>
                {
                    Some((best_miss, best_dose))
                }
                _ => Some((miss, dose)),
            };
        }
        let (_, dose) = best.expect("window is non-empty");

        let mut doses = vec![0i64; validated.products.len()];
        let mut selected = vec![false; validated.products.len()];
        doses[index] = dose;
        selected[index] = true;
        candidates.push(Candidate::from_doses(
            &doses,
            &selected,
            &validated.products,
            (nutrient == Nutrient::N).then_some(config.n_tolerance_kg),
        ));
    }

    if candidates.is_empty() {
        return OptimizeOutput::infeasible(
            1,
            format!(
                "no single product reaches the {} target of {} kg/ha within doses {}..{} kg/ha",
                nutrient, target, input.min_dose, input.max_dose
            ),
        );
    }

    // cost first, deviation second (the shared sort implements exactly that
    // for a single active nutrient), stable ids last
    crate::construct::sort_candidates(
        &mut candidates,
        &validated.products,
        &input.targets,
        &validated.active,
    );
    candidates.truncate(config.num_strategies);

    debug!(
        nutrient = %nutrient,
        candidates = candidates.len(),
        "single-nutrient fast path"
    );

    let strategies = build_strategies(
        &candidates,
        &validated.products,
        &input.targets,
        &input.flags,
        config,
    );
    OptimizeOutput {
        status: OptimizeStatus::Ok,
        used_max_products: 1,
        strategies,
        n_tolerance_used: (nutrient == Nutrient::N).then_some(config.n_tolerance_kg),
        message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use gro_core::{ActivationFlags, AlgorithmConfig, NutrientAmounts, Product};

    fn catalogue() -> Vec<Product> {
        [
            ("P1", "NPK 21-4-7", 4.50, (21.0, 4.0, 7.0, 3.0)),
            ("P2", "NPK 27-3-3", 4.00, (27.0, 3.0, 3.0, 2.0)),
            ("P3", "KAS 27N", 3.50, (27.0, 0.0, 0.0, 0.0)),
            ("P4", "PK 11-21", 5.00, (0.0, 11.0, 21.0, 0.0)),
            ("P5", "AS 21-24", 3.00, (21.0, 0.0, 0.0, 24.0)),
        ]
        .iter()
        .map(|(id, name, price, (n, p, k, s))| Product {
            id: id.to_string(),
            name: name.to_string(),
            price_per_kg: *price,
            nutrients: NutrientAmounts {
                n: *n,
                p: *p,
                k: *k,
                s: *s,
            },
            active: true,
            is_optimizable: true,
        })
        .collect()
    }

    fn n_only_input(target: f64) -> OptimizeInput {
        OptimizeInput {
            targets: NutrientAmounts {
                n: target,
                ..Default::default()
            },
            flags: ActivationFlags {
                must_n: true,
                ..Default::default()
            },
            max_products: 3,
            min_dose: 100,
            max_dose: 600,
            config: AlgorithmConfig::default(),
            required_product_ids: Vec::new(),
        }
    }

    #[test]
    fn test_n_only_podium() {
        let products = catalogue();
        let input = n_only_input(100.0);
        let validated = validate(&products, &input).unwrap();
        let output = solve(&validated, &input);

        assert!(output.is_ok());
        assert_eq!(output.strategies.len(), 3);
        for strategy in &output.strategies {
            assert_eq!(strategy.products.len(), 1);
            // N band with the default +1 tolerance
            assert!(strategy.achieved.n >= 100.0 && strategy.achieved.n <= 101.0);
        }
        // sorted by cost ascending
        let costs: Vec<f64> = output
            .strategies
            .iter()
            .map(|s| s.total_cost_sek_per_ha)
            .collect();
        assert!(costs.windows(2).all(|w| w[0] <= w[1]));
        // cheapest N source is P3 (3.50 SEK/kg at 27%): 371 kg → 100.17 kg N
        assert_eq!(output.strategies[0].products[0].id, "P3");
        assert_eq!(output.strategies[0].products[0].dose_kg_per_ha, 371);
        assert_eq!(output.strategies[0].total_cost_sek_per_ha, 1298.5);
        assert_eq!(output.n_tolerance_used, Some(1));
    }

    #[test]
    fn test_exactness_band_respected() {
        let products = catalogue();
        let input = n_only_input(150.0);
        let validated = validate(&products, &input).unwrap();
        let output = solve(&validated, &input);
        for strategy in &output.strategies {
            assert!(
                strategy.achieved.n >= 150.0 && strategy.achieved.n <= 151.0,
                "achieved {} outside [150, 151]",
                strategy.achieved.n
            );
        }
    }

    #[test]
    fn test_pks_band_window() {
        let products = catalogue();
        let mut input = n_only_input(0.0);
        input.targets = NutrientAmounts {
            k: 60.0,
            ..Default::default()
        };
        input.flags = ActivationFlags {
            must_k: true,
            ..Default::default()
        };
        let validated = validate(&products, &input).unwrap();
        let output = solve(&validated, &input);
        assert!(output.is_ok());
        for strategy in &output.strategies {
            // 90%..150% of 60 kg
            assert!(strategy.achieved.k >= 54.0 && strategy.achieved.k <= 90.0);
            assert!(strategy.n_tolerance_used.is_none());
        }
    }

    #[test]
    fn test_unreachable_target_is_infeasible() {
        let products = catalogue();
        // 27% at 600 kg/ha tops out at 162 kg N
        let input = n_only_input(250.0);
        let validated = validate(&products, &input).unwrap();
        let output = solve(&validated, &input);
        assert_eq!(output.status, OptimizeStatus::Infeasible);
        assert!(output.message.unwrap().contains("N target"));
    }
}
