//! The top-level recommendation algorithm.
//!
//! `optimize` drives one request end to end: validation, catalogue
//! preparation, the single-nutrient fast path, the MILP escalation over
//! nitrogen tolerance and product-count, the price-podium enumeration via
//! no-good cuts, and final shaping into ranked strategies.
//!
//! Two escalation dimensions are searched in a fixed nested order —
//! nitrogen tolerance outermost, cardinality innermost — and the first
//! optimum wins. Escalation only relaxes, so the first optimum is also the
//! cheapest reachable one. Solver-domain failures (timeouts, crashes) are
//! retried per step and never conflated with infeasibility, which is a
//! legitimate answer and ends a step immediately.
//!
//! `optimize_with_fallback` additionally pads a short podium with
//! dose-variation candidates (see [`crate::fallback`]); the strict entry
//! point never synthesizes.

use crate::backend::{LpBackend, MilpOutcome, MilpSolution};
use crate::construct::{build_strategies, sort_candidates, Candidate};
use crate::model::{build_model, ModelParams};
use crate::types::{OptimizeInput, OptimizeOutput, OptimizeStatus};
use crate::{fallback, single_nutrient, validation};
use gro_core::{GroError, Nutrient, Product};
use gro_solver_common::LpProblem;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Product-count ceiling of the MILP path, independent of configuration.
/// Strategies with five or more products stop being practical to spread.
const EFFECTIVE_CARDINALITY_CAP: u32 = 4;

/// Attempts per escalation step when the solver itself fails (1 + 2 retries).
const MAX_SOLVE_ATTEMPTS: u32 = 3;

/// Strict MILP optimization: every returned strategy is a solver optimum
/// under the accumulated no-good cuts.
pub async fn optimize<B: LpBackend>(
    backend: &B,
    products: &[Product],
    input: &OptimizeInput,
) -> OptimizeOutput {
    run(backend, products, input, false).await
}

/// Like [`optimize`], but pads a short podium with dose-variation
/// candidates so thin catalogues still yield alternatives.
pub async fn optimize_with_fallback<B: LpBackend>(
    backend: &B,
    products: &[Product],
    input: &OptimizeInput,
) -> OptimizeOutput {
    run(backend, products, input, true).await
}

async fn run<B: LpBackend>(
    backend: &B,
    products: &[Product],
    input: &OptimizeInput,
    with_dose_variation: bool,
) -> OptimizeOutput {
    let started = Instant::now();
    let config = &input.config;
    let deadline = started + Duration::from_millis(config.timeout_ms);

    let validated = match validation::validate(products, input) {
        Ok(validated) => validated,
        Err(message) => {
            info!(%message, "rejecting request");
            return OptimizeOutput::infeasible(input.max_products, message);
        }
    };

    if validated.active.len() == 1 && validated.required_indices.is_empty() {
        return single_nutrient::solve(&validated, input);
    }

    let hard_cap = config.max_products_hard.min(EFFECTIVE_CARDINALITY_CAP).max(1);
    let mp_start = input.max_products.min(hard_cap);
    let n_active = validated.active.contains(&Nutrient::N);
    let tol_end = if n_active {
        config.n_max_tolerance_kg.max(config.n_tolerance_kg)
    } else {
        config.n_tolerance_kg
    };

    // Escalate until the first optimum: tolerance outermost, then width.
    let mut found: Option<(i64, u32, MilpSolution)> = None;
    'escalation: for n_tol in config.n_tolerance_kg..=tol_end {
        for max_products in mp_start..=hard_cap {
            if Instant::now() >= deadline {
                return OptimizeOutput::infeasible(
                    hard_cap,
                    timeout_message(config.timeout_ms, hard_cap, input),
                );
            }
            let problem = build_model(&ModelParams {
                products: &validated.products,
                targets: &input.targets,
                flags: &input.flags,
                max_products,
                min_dose: input.min_dose,
                max_dose: input.max_dose,
                n_tolerance_kg: n_tol,
                no_good_cuts: &[],
                required_indices: &validated.required_indices,
                config,
            });
            match solve_with_retries(backend, &problem).await {
                Ok(MilpOutcome::Optimal(solution)) => {
                    debug!(
                        n_tol,
                        max_products,
                        cost_ore = solution.objective_ore,
                        "first optimum"
                    );
                    found = Some((n_tol, max_products, solution));
                    break 'escalation;
                }
                Ok(MilpOutcome::Infeasible) => {
                    debug!(n_tol, max_products, "infeasible; escalating");
                }
                Err(err) => {
                    warn!(n_tol, max_products, "giving up on step: {}", err);
                }
            }
        }
    }

    let Some((n_tol, used_max_products, first)) = found else {
        return OptimizeOutput::infeasible(
            hard_cap,
            no_solution_message(hard_cap, n_active, input),
        );
    };
    let n_tolerance = n_active.then_some(n_tol);

    // Price podium: exclude each found selection set and re-solve.
    let mut solutions: Vec<MilpSolution> = vec![first];
    let mut cuts: Vec<Vec<bool>> = Vec::new();
    while solutions.len() < config.num_strategies {
        if Instant::now() >= deadline {
            debug!("deadline reached during podium enumeration");
            break;
        }
        cuts.push(solutions.last().expect("at least one solution").selected.clone());
        let problem = build_model(&ModelParams {
            products: &validated.products,
            targets: &input.targets,
            flags: &input.flags,
            max_products: used_max_products,
            min_dose: input.min_dose,
            max_dose: input.max_dose,
            n_tolerance_kg: n_tol,
            no_good_cuts: &cuts,
            required_indices: &validated.required_indices,
            config,
        });
        match solve_with_retries(backend, &problem).await {
            Ok(MilpOutcome::Optimal(solution)) => solutions.push(solution),
            Ok(MilpOutcome::Infeasible) => break,
            Err(err) => {
                warn!("podium solve failed; keeping {} strategies: {}", solutions.len(), err);
                break;
            }
        }
    }

    let mut candidates: Vec<Candidate> = solutions
        .iter()
        .map(|solution| {
            Candidate::from_doses(
                &solution.doses,
                &solution.selected,
                &validated.products,
                n_tolerance,
            )
        })
        .collect();
    sort_candidates(
        &mut candidates,
        &validated.products,
        &input.targets,
        &validated.active,
    );

    // Synthesized variants rank strictly after every true MILP strategy.
    if with_dose_variation && candidates.len() < config.num_strategies {
        let needed = config.num_strategies - candidates.len();
        let mut variants = fallback::dose_variants(
            &candidates[0],
            &validated.products,
            &input.targets,
            &validated.active,
            input.min_dose,
            input.max_dose,
            needed,
        );
        sort_candidates(
            &mut variants,
            &validated.products,
            &input.targets,
            &validated.active,
        );
        candidates.extend(variants);
        debug!(
            synthesized = candidates.iter().filter(|c| c.synthesized).count(),
            "padded podium with dose variants"
        );
    }

    let strategies = build_strategies(
        &candidates,
        &validated.products,
        &input.targets,
        &input.flags,
        config,
    );

    info!(
        strategies = strategies.len(),
        used_max_products,
        n_tolerance = ?n_tolerance,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "recommendation complete"
    );

    OptimizeOutput {
        status: OptimizeStatus::Ok,
        used_max_products,
        strategies,
        n_tolerance_used: n_tolerance,
        message: None,
    }
}

async fn solve_with_retries<B: LpBackend>(
    backend: &B,
    problem: &LpProblem,
) -> Result<MilpOutcome, GroError> {
    let mut last_error = None;
    for attempt in 1..=MAX_SOLVE_ATTEMPTS {
        match backend.solve(problem).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) => {
                warn!(attempt, "solve attempt failed: {}", err);
                last_error = Some(err);
            }
        }
    }
    Err(last_error.expect("at least one attempt was made"))
}

fn no_solution_message(hard_cap: u32, n_active: bool, input: &OptimizeInput) -> String {
    if n_active {
        format!(
            "no feasible strategy with up to {} products, N tolerance up to +{} kg/ha and \
             doses {}..{} kg/ha",
            hard_cap, input.config.n_max_tolerance_kg, input.min_dose, input.max_dose
        )
    } else {
        format!(
            "no feasible strategy with up to {} products and doses {}..{} kg/ha",
            hard_cap, input.min_dose, input.max_dose
        )
    }
}

fn timeout_message(timeout_ms: u64, hard_cap: u32, input: &OptimizeInput) -> String {
    format!(
        "timed out after {} ms without a feasible strategy (up to {} products, doses {}..{} \
         kg/ha)",
        timeout_ms, hard_cap, input.min_dose, input.max_dose
    )
}
