//! HiGHS MILP solver worker for the gro recommendation engine.
//!
//! This binary implements the gro solver IPC protocol:
//! 1. Reads line-delimited JSON solve requests from stdin (CPLEX LP payload)
//! 2. Solves using HiGHS (branch-and-cut over a dual-simplex relaxation)
//! 3. Writes one JSON response per line to stdout, flushed per response
//!
//! The worker retires itself after a bounded number of solves so that any
//! latent state corruption inside the embedded solver library stays
//! short-lived; the pool respawns workers on demand.
//!
//! # Problem shape
//!
//! The fertilizer strategy model is a small MILP:
//! - Integer dose variables `x0..x(n-1)` (kg/ha), cost coefficients in öre
//! - Binary selection variables `y0..y(n-1)`
//! - Dose-coupling, cardinality, nutrient-band and no-good-cut rows
//!
//! All coefficients and right-hand sides arrive as integers; HiGHS works in
//! doubles internally, and integer inputs of this magnitude are exactly
//! representable.
//!
//! **Reference:** Huangfu, Q., & Hall, J. A. J. (2018). Parallelizing the
//! dual revised simplex method. *Mathematical Programming Computation*,
//! 10(1), 119-142. doi:[10.1007/s12532-017-0130-5]
//!
//! [10.1007/s12532-017-0130-5]: https://doi.org/10.1007/s12532-017-0130-5
//!
//! Exit codes are defined in `gro_solver_common::ExitCode`.

use anyhow::Result;
use gro_solver_common::ipc::Column;
use gro_solver_common::{
    run_solver_plugin, Cmp, HighsResult, LpProblem, SolveStatus, SolverPlugin,
};
use highs::{HighsModelStatus, RowProblem, Sense};
use std::collections::BTreeMap;
use tracing::{debug, info};

struct HighsWorker;

impl SolverPlugin for HighsWorker {
    fn name(&self) -> &'static str {
        "gro-highs"
    }

    fn solve(&self, problem: &LpProblem) -> Result<HighsResult> {
        solve_with_highs(problem)
    }
}

fn main() {
    run_solver_plugin(HighsWorker)
}

/// Build and solve one MILP with HiGHS.
fn solve_with_highs(problem: &LpProblem) -> Result<HighsResult> {
    let start = std::time::Instant::now();
    let n = problem.variables.len();

    // Per-variable objective coefficients (duplicate terms accumulate).
    let mut objective = vec![0.0f64; n];
    for term in &problem.objective {
        objective[term.var] += term.coeff as f64;
    }

    let mut pb = RowProblem::default();
    let mut cols = Vec::with_capacity(n);
    for (i, variable) in problem.variables.iter().enumerate() {
        let lower = variable.lower as f64;
        let upper = if variable.upper == i64::MAX {
            f64::INFINITY
        } else {
            variable.upper as f64
        };
        // Binary selectors arrive as 0..1 integer columns.
        cols.push(pb.add_integer_column(objective[i], lower..=upper));
    }

    for constraint in &problem.constraints {
        let factors: Vec<_> = constraint
            .terms
            .iter()
            .map(|t| (cols[t.var], t.coeff as f64))
            .collect();
        let rhs = constraint.rhs as f64;
        match constraint.cmp {
            Cmp::Ge => pb.add_row(rhs.., factors),
            Cmp::Le => pb.add_row(..=rhs, factors),
            Cmp::Eq => pb.add_row(rhs..=rhs, factors),
        };
    }

    let mut model = pb.optimise(Sense::Minimise);
    // stdout belongs to the protocol; HiGHS must stay off it.
    model.set_option("output_flag", false);
    model.set_option("threads", 1);

    debug!(
        variables = n,
        constraints = problem.constraints.len(),
        "solving MILP"
    );
    let solved = model.solve();

    let status = match solved.status() {
        HighsModelStatus::Optimal => SolveStatus::Optimal,
        HighsModelStatus::Infeasible => SolveStatus::Infeasible,
        HighsModelStatus::Unbounded => SolveStatus::Unbounded,
        HighsModelStatus::ReachedTimeLimit => SolveStatus::TimeLimit,
        HighsModelStatus::ReachedIterationLimit => SolveStatus::IterationLimit,
        other => {
            info!(status = ?other, "solver returned unmodelled status");
            SolveStatus::Unknown
        }
    };

    if status != SolveStatus::Optimal {
        info!(%status, elapsed_ms = start.elapsed().as_millis() as u64, "no optimum");
        return Ok(HighsResult::status_only(status));
    }

    let solution = solved.get_solution();
    let values = solution.columns();

    let mut columns = BTreeMap::new();
    let mut objective_value = 0.0;
    for (i, variable) in problem.variables.iter().enumerate() {
        objective_value += objective[i] * values[i];
        columns.insert(variable.name.clone(), Column { primal: values[i] });
    }

    info!(
        objective = objective_value,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "optimal solution found"
    );

    Ok(HighsResult {
        status,
        columns,
        objective_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gro_solver_common::{LpTerm, VarKind};

    /// Two products, pick-one cardinality, nitrogen band. The cheaper
    /// nitrogen source at its minimal feasible dose must win.
    fn nitrogen_model() -> LpProblem {
        let mut problem = LpProblem::new();
        let x0 = problem.add_variable("x0", VarKind::Integer, 0, 600);
        let x1 = problem.add_variable("x1", VarKind::Integer, 0, 600);
        let y0 = problem.add_variable("y0", VarKind::Binary, 0, 1);
        let y1 = problem.add_variable("y1", VarKind::Binary, 0, 1);
        problem.objective = vec![
            LpTerm { coeff: 450, var: x0 },
            LpTerm { coeff: 400, var: x1 },
        ];
        // dose coupling
        problem.add_constraint(
            vec![
                LpTerm { coeff: 1, var: x0 },
                LpTerm {
                    coeff: -100,
                    var: y0,
                },
            ],
            Cmp::Ge,
            0,
        );
        problem.add_constraint(
            vec![
                LpTerm { coeff: 1, var: x0 },
                LpTerm {
                    coeff: -600,
                    var: y0,
                },
            ],
            Cmp::Le,
            0,
        );
        problem.add_constraint(
            vec![
                LpTerm { coeff: 1, var: x1 },
                LpTerm {
                    coeff: -100,
                    var: y1,
                },
            ],
            Cmp::Ge,
            0,
        );
        problem.add_constraint(
            vec![
                LpTerm { coeff: 1, var: x1 },
                LpTerm {
                    coeff: -600,
                    var: y1,
                },
            ],
            Cmp::Le,
            0,
        );
        // cardinality
        problem.add_constraint(
            vec![LpTerm { coeff: 1, var: y0 }, LpTerm { coeff: 1, var: y1 }],
            Cmp::Le,
            1,
        );
        // nitrogen band: 150..151 kg/ha, contents 21% and 27%
        problem.add_constraint(
            vec![
                LpTerm { coeff: 210, var: x0 },
                LpTerm { coeff: 270, var: x1 },
            ],
            Cmp::Ge,
            150_000,
        );
        problem.add_constraint(
            vec![
                LpTerm { coeff: 210, var: x0 },
                LpTerm { coeff: 270, var: x1 },
            ],
            Cmp::Le,
            151_000,
        );
        problem
    }

    #[test]
    fn test_optimal_picks_cheap_nitrogen() {
        let result = solve_with_highs(&nitrogen_model()).unwrap();
        assert!(result.is_optimal());
        // x1 = 556 (556 × 0.27 = 150.12 kg N), cost 556 × 400 öre
        assert_eq!(result.objective_value.round() as i64, 222_400);
        assert_eq!(result.primal("x1").unwrap().round() as i64, 556);
        assert_eq!(result.primal("y1").unwrap().round() as i64, 1);
        assert_eq!(result.primal("y0").unwrap().round() as i64, 0);
    }

    #[test]
    fn test_infeasible_band() {
        let mut problem = nitrogen_model();
        // Demand more nitrogen than any in-bounds dose can deliver.
        problem.constraints[5].rhs = 10_000_000;
        problem.constraints[6].rhs = 10_001_000;
        let result = solve_with_highs(&problem).unwrap();
        assert_eq!(result.status, SolveStatus::Infeasible);
        assert!(result.columns.is_empty());
    }
}
