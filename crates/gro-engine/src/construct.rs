//! Candidate bookkeeping and strategy construction.
//!
//! Both solve paths (MILP and the single-nutrient fast path) produce
//! [`Candidate`] values; this module turns them into ranked [`Strategy`]
//! records with achieved amounts, percent-of-target, cost and warnings, and
//! owns the deterministic sort order.

use crate::types::{
    round1, round2, NutrientPercents, Strategy, StrategyProduct, Warning, WarningKind,
};
use gro_core::{ActivationFlags, AlgorithmConfig, Nutrient, NutrientAmounts, ScaledProduct};

/// One strategy-in-the-making: selected products with doses, before output
/// shaping.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    /// `(product index, dose kg/ha)`, in catalogue order.
    pub entries: Vec<(usize, i64)>,
    /// Exact cost in öre/ha.
    pub cost_ore: i64,
    /// Nitrogen tolerance in effect when this candidate was found.
    pub n_tolerance: Option<i64>,
    /// True for dose-variation variants (never produced by the MILP).
    pub synthesized: bool,
}

impl Candidate {
    pub fn from_doses(
        doses: &[i64],
        selected: &[bool],
        products: &[ScaledProduct],
        n_tolerance: Option<i64>,
    ) -> Candidate {
        let entries: Vec<(usize, i64)> = selected
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s)
            .map(|(i, _)| (i, doses[i]))
            .collect();
        let cost_ore = entries
            .iter()
            .map(|&(i, dose)| products[i].dose_cost_ore(dose))
            .sum();
        Candidate {
            entries,
            cost_ore,
            n_tolerance,
            synthesized: false,
        }
    }

    /// Unrounded achieved kg/ha per nutrient.
    pub fn achieved(&self, products: &[ScaledProduct]) -> NutrientAmounts {
        let mut achieved = NutrientAmounts::default();
        for nutrient in Nutrient::ALL {
            let total: f64 = self
                .entries
                .iter()
                .map(|&(i, dose)| products[i].delivered_kg(nutrient, dose))
                .sum();
            achieved.set(nutrient, total);
        }
        achieved
    }

    /// Summed absolute relative deviation over the active nutrients.
    pub fn deviation(
        &self,
        products: &[ScaledProduct],
        targets: &NutrientAmounts,
        active: &[Nutrient],
    ) -> f64 {
        let achieved = self.achieved(products);
        active
            .iter()
            .map(|&nutrient| {
                let target = targets.get(nutrient);
                (achieved.get(nutrient) / target - 1.0).abs()
            })
            .sum()
    }

    /// The selected product set, as sorted ids (identity for cuts and ties).
    pub fn id_key(&self, products: &[ScaledProduct]) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .iter()
            .map(|&(i, _)| products[i].id.clone())
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Deterministic podium order: cost, then summed deviation over active
/// nutrients, then product count, then the sorted product-id tuple.
pub(crate) fn sort_candidates(
    candidates: &mut [Candidate],
    products: &[ScaledProduct],
    targets: &NutrientAmounts,
    active: &[Nutrient],
) {
    candidates.sort_by(|a, b| {
        a.cost_ore
            .cmp(&b.cost_ore)
            .then_with(|| {
                a.deviation(products, targets, active)
                    .total_cmp(&b.deviation(products, targets, active))
            })
            .then_with(|| a.entries.len().cmp(&b.entries.len()))
            .then_with(|| a.id_key(products).cmp(&b.id_key(products)))
    });
}

/// Shape candidates into ranked output strategies.
pub(crate) fn build_strategies(
    candidates: &[Candidate],
    products: &[ScaledProduct],
    targets: &NutrientAmounts,
    flags: &ActivationFlags,
    config: &AlgorithmConfig,
) -> Vec<Strategy> {
    candidates
        .iter()
        .enumerate()
        .map(|(rank0, candidate)| {
            let achieved_raw = candidate.achieved(products);

            let mut achieved = NutrientAmounts::default();
            let mut percent_of_target = NutrientPercents::default();
            let mut warnings = Vec::new();
            for nutrient in Nutrient::ALL {
                let value = achieved_raw.get(nutrient);
                let target = targets.get(nutrient);
                achieved.set(nutrient, round2(value));
                if target > 0.0 {
                    percent_of_target.set(nutrient, Some(round1(value / target * 100.0)));
                } else {
                    percent_of_target.set(nutrient, None);
                }

                // Oversupply warnings apply only to nutrients the caller did
                // not ask to optimize.
                if !flags.is_active(nutrient, targets) && target > 0.0 {
                    let ratio = value / target;
                    if ratio > config.high_level_threshold as f64 / 100.0 {
                        warnings.push(Warning {
                            nutrient,
                            kind: WarningKind::HighLevel,
                            threshold: config.high_level_threshold,
                            value_kg_per_ha: round2(value),
                            ratio: round2(ratio),
                        });
                    }
                }
            }

            let strategy_products = candidate
                .entries
                .iter()
                .map(|&(i, dose)| StrategyProduct {
                    id: products[i].id.clone(),
                    artikelnr: products[i].artikelnr,
                    name: products[i].name.clone(),
                    dose_kg_per_ha: dose,
                    cost_sek_per_ha: round2(products[i].dose_cost_ore(dose) as f64 / 100.0),
                })
                .collect();

            Strategy {
                rank: rank0 as u32 + 1,
                total_cost_sek_per_ha: round2(candidate.cost_ore as f64 / 100.0),
                products: strategy_products,
                achieved,
                percent_of_target,
                must_flags: *flags,
                warnings,
                n_tolerance_used: candidate.n_tolerance,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gro_core::Product;

    fn scaled(catalog: &[(&str, f64, (f64, f64, f64, f64))]) -> Vec<ScaledProduct> {
        catalog
            .iter()
            .map(|(id, price, (n, p, k, s))| {
                ScaledProduct::from_product(&Product {
                    id: id.to_string(),
                    name: format!("Product {id}"),
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
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_candidate_accounting() {
        let products = scaled(&[
            ("1", 4.50, (21.0, 4.0, 7.0, 3.0)),
            ("2", 3.50, (27.0, 0.0, 0.0, 0.0)),
        ]);
        let candidate = Candidate::from_doses(
            &[500, 200],
            &[true, true],
            &products,
            Some(1),
        );
        assert_eq!(candidate.entries, vec![(0, 500), (1, 200)]);
        // 500×450 + 200×350 öre
        assert_eq!(candidate.cost_ore, 225_000 + 70_000);
        let achieved = candidate.achieved(&products);
        // 500×21% + 200×27% = 105 + 54
        assert!((achieved.n - 159.0).abs() < 1e-9);
        assert!((achieved.p - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_sort_cost_then_deviation_then_count() {
        let products = scaled(&[
            ("1", 1.00, (20.0, 0.0, 0.0, 0.0)),
            ("2", 1.00, (21.0, 0.0, 0.0, 0.0)),
        ]);
        let targets = NutrientAmounts {
            n: 105.0,
            ..Default::default()
        };
        let active = [Nutrient::N];
        // equal dose and price: cost ties at 500 SEK, deviation decides
        let far = Candidate::from_doses(&[500, 0], &[true, false], &products, Some(1));
        let near = Candidate::from_doses(&[0, 500], &[false, true], &products, Some(1));
        // far cheaper in absolute cost: cost decides before deviation
        let cheap = Candidate::from_doses(&[100, 0], &[true, false], &products, Some(1));
        assert_eq!(far.cost_ore, near.cost_ore);

        let mut candidates = vec![far.clone(), near.clone(), cheap.clone()];
        sort_candidates(&mut candidates, &products, &targets, &active);
        assert_eq!(candidates[0], cheap);
        assert_eq!(candidates[1], near); // 105 kg N on a 105 kg target
        assert_eq!(candidates[2], far); // 100 kg N, 4.8% off
    }

    #[test]
    fn test_strategy_shaping_and_warnings() {
        let products = scaled(&[("5", 3.00, (21.0, 0.0, 0.0, 24.0))]);
        let targets = NutrientAmounts {
            n: 100.0,
            s: 10.0,
            ..Default::default()
        };
        let flags = ActivationFlags {
            must_n: true,
            ..Default::default()
        };
        let config = AlgorithmConfig::default();
        let candidate = Candidate {
            entries: vec![(0, 477)],
            cost_ore: 477 * 300,
            n_tolerance: Some(1),
            synthesized: false,
        };
        let strategies =
            build_strategies(&[candidate], &products, &targets, &flags, &config);
        assert_eq!(strategies.len(), 1);
        let strategy = &strategies[0];
        assert_eq!(strategy.rank, 1);
        assert_eq!(strategy.total_cost_sek_per_ha, 1431.0);
        // 477 × 21% = 100.17 kg N; 477 × 24% = 114.48 kg S
        assert_eq!(strategy.achieved.n, 100.17);
        assert_eq!(strategy.percent_of_target.n, Some(100.2));
        assert_eq!(strategy.percent_of_target.p, None);
        // S is 11.45× the 10 kg target: warning on the non-active nutrient
        assert_eq!(strategy.warnings.len(), 1);
        let warning = &strategy.warnings[0];
        assert_eq!(warning.nutrient, Nutrient::S);
        assert_eq!(warning.threshold, 151);
        assert_eq!(warning.value_kg_per_ha, 114.48);
        assert_eq!(warning.ratio, 11.45);
    }
}
