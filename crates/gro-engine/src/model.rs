//! MILP model builder.
//!
//! Pure function from prepared products, targets, flags and cuts to a
//! canonical [`LpProblem`]. Constraints are emitted in a fixed order so the
//! rendered LP text is reproducible byte-for-byte:
//!
//! 1. dose coupling per product (`x_i - min·y_i >= 0`, `x_i - max·y_i <= 0`)
//! 2. cardinality (`Σ y_i <= max_products`)
//! 3. forced inclusions (`y_i = 1`)
//! 4. nitrogen band (when active)
//! 5. P/K/S bands (when active)
//! 6. no-good cuts, in discovery order
//!
//! Decision variables: integer dose `x_i ∈ [0, max_dose]` and binary
//! selector `y_i` per product. The objective minimizes `Σ price_ore_i · x_i`.
//! All coefficients are integers by construction (see `gro_core::product`).

use gro_core::{ActivationFlags, AlgorithmConfig, Nutrient, NutrientAmounts, ScaledProduct, KG_SCALE};
use gro_solver_common::{Cmp, LpProblem, LpTerm, VarKind};

/// Everything one optimization round needs to become an LP.
#[derive(Debug, Clone, Copy)]
pub struct ModelParams<'a> {
    pub products: &'a [ScaledProduct],
    pub targets: &'a NutrientAmounts,
    pub flags: &'a ActivationFlags,
    /// Effective cardinality cap for this round (already clamped).
    pub max_products: u32,
    pub min_dose: i64,
    pub max_dose: i64,
    pub n_tolerance_kg: i64,
    /// Previously selected product sets to exclude, one bool per product.
    pub no_good_cuts: &'a [Vec<bool>],
    /// Product indices whose selectors are fixed to 1.
    pub required_indices: &'a [usize],
    pub config: &'a AlgorithmConfig,
}

/// Nitrogen band in scaled units: `[target, target + tolerance]` grams.
pub fn nitrogen_band(target_kg: f64, tolerance_kg: i64) -> (i64, i64) {
    let lower = (target_kg * KG_SCALE as f64).round() as i64;
    let upper = ((target_kg + tolerance_kg as f64) * KG_SCALE as f64).round() as i64;
    (lower, upper)
}

/// P/K/S band in scaled units: `[min%, max%]` of target, grams. The lower
/// bound rounds up and the upper down so the integer band never widens the
/// configured percentage window.
pub fn pks_band(target_kg: f64, min_pct: i64, max_pct: i64) -> (i64, i64) {
    // pct/100 × kg × 1000 = pct × kg × 10, with 10 exact in binary; dividing
    // by 100 first would let rounding noise leak through the ceil.
    let scale = (KG_SCALE / 100) as f64;
    let lower = (min_pct as f64 * target_kg * scale).ceil() as i64;
    let upper = (max_pct as f64 * target_kg * scale).floor() as i64;
    (lower, upper)
}

/// Build the MILP for one round.
pub fn build_model(params: &ModelParams) -> LpProblem {
    let n = params.products.len();
    let mut problem = LpProblem::new();

    let x: Vec<usize> = (0..n)
        .map(|i| problem.add_variable(format!("x{i}"), VarKind::Integer, 0, params.max_dose))
        .collect();
    let y: Vec<usize> = (0..n)
        .map(|i| problem.add_variable(format!("y{i}"), VarKind::Binary, 0, 1))
        .collect();

    problem.objective = params
        .products
        .iter()
        .enumerate()
        .map(|(i, product)| LpTerm {
            coeff: product.price_ore,
            var: x[i],
        })
        .collect();

    // 1. dose coupling
    for i in 0..n {
        problem.add_constraint(
            vec![
                LpTerm { coeff: 1, var: x[i] },
                LpTerm {
                    coeff: -params.min_dose,
                    var: y[i],
                },
            ],
            Cmp::Ge,
            0,
        );
        problem.add_constraint(
            vec![
                LpTerm { coeff: 1, var: x[i] },
                LpTerm {
                    coeff: -params.max_dose,
                    var: y[i],
                },
            ],
            Cmp::Le,
            0,
        );
    }

    // 2. cardinality
    problem.add_constraint(
        y.iter().map(|&var| LpTerm { coeff: 1, var }).collect(),
        Cmp::Le,
        params.max_products as i64,
    );

    // 3. forced inclusions
    for &i in params.required_indices {
        problem.add_constraint(vec![LpTerm { coeff: 1, var: y[i] }], Cmp::Eq, 1);
    }

    // 4. + 5. nutrient bands
    for nutrient in Nutrient::ALL {
        let target = params.targets.get(nutrient);
        if !params.flags.is_active(nutrient, params.targets) {
            continue;
        }
        let (lower, upper) = match nutrient {
            Nutrient::N => nitrogen_band(target, params.n_tolerance_kg),
            _ => pks_band(target, params.config.pks_min_pct, params.config.pks_max_pct),
        };
        let terms: Vec<LpTerm> = params
            .products
            .iter()
            .enumerate()
            .filter(|(_, product)| product.content10(nutrient) != 0)
            .map(|(i, product)| LpTerm {
                coeff: product.content10(nutrient),
                var: x[i],
            })
            .collect();
        problem.add_constraint(terms.clone(), Cmp::Ge, lower);
        problem.add_constraint(terms, Cmp::Le, upper);
    }

    // 6. no-good cuts: forbid exactly the recorded set S via
    //    Σ_{i∉S} y_i − Σ_{i∈S} y_i ≥ 1 − |S|
    for cut in params.no_good_cuts {
        let size = cut.iter().filter(|&&selected| selected).count() as i64;
        if size == 0 {
            continue;
        }
        let terms: Vec<LpTerm> = cut
            .iter()
            .enumerate()
            .map(|(i, &selected)| LpTerm {
                coeff: if selected { -1 } else { 1 },
                var: y[i],
            })
            .collect();
        problem.add_constraint(terms, Cmp::Ge, 1 - size);
    }

    problem
}
