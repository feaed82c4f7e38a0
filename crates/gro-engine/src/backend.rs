//! Solve backends: how a built model actually gets solved.
//!
//! The optimizer is generic over [`LpBackend`], which separates the model
//! (what to solve) from the solving machinery (how). Production uses
//! [`PoolBackend`] — the out-of-process worker pool — while the
//! `solver-microlp` feature adds [`MicrolpBackend`], a pure-Rust in-process
//! solver used as the pool's inline fallback and by hermetic tests.
//!
//! The outcome type keeps the crucial distinction intact end to end:
//! infeasibility is a legitimate answer ([`MilpOutcome::Infeasible`]),
//! while transport/runtime trouble is an `Err` the optimizer may retry.

use gro_core::GroError;
use gro_solver_common::pool::SolverPool;
use gro_solver_common::{HighsResult, LpProblem, SolveStatus, VarKind};
use tracing::warn;

/// Integer solution extracted from a solver result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilpSolution {
    /// Dose per product (kg/ha), indexed like the model's products.
    pub doses: Vec<i64>,
    /// Selection flag per product.
    pub selected: Vec<bool>,
    /// Objective in öre/ha, recomputed exactly from the integer doses.
    pub objective_ore: i64,
}

/// Result of one MILP solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MilpOutcome {
    Optimal(MilpSolution),
    Infeasible,
}

/// A way to solve one canonical MILP.
pub trait LpBackend {
    fn solve(
        &self,
        problem: &LpProblem,
    ) -> impl std::future::Future<Output = Result<MilpOutcome, GroError>>;
}

/// Map a worker's [`HighsResult`] back onto product indices.
///
/// Variables follow the `x{i}`/`y{i}` naming of the model builder. Primal
/// values come back as doubles; doses round to the nearest integer (the
/// solver's integrality tolerance keeps them within rounding distance).
pub fn extract_solution(
    problem: &LpProblem,
    result: &HighsResult,
) -> Result<MilpSolution, GroError> {
    let n = problem
        .variables
        .iter()
        .filter(|v| v.kind == VarKind::Integer)
        .count();
    let mut doses = vec![0i64; n];
    let mut selected = vec![false; n];

    for i in 0..n {
        let x = result
            .primal(&format!("x{i}"))
            .ok_or_else(|| GroError::Solver(format!("solution is missing column x{i}")))?;
        let y = result
            .primal(&format!("y{i}"))
            .ok_or_else(|| GroError::Solver(format!("solution is missing column y{i}")))?;
        doses[i] = x.round() as i64;
        selected[i] = y > 0.5;
    }

    let objective_ore = objective_from_doses(problem, &doses)?;
    Ok(MilpSolution {
        doses,
        selected,
        objective_ore,
    })
}

/// Recompute the objective exactly in integer arithmetic.
fn objective_from_doses(problem: &LpProblem, doses: &[i64]) -> Result<i64, GroError> {
    let mut total = 0i64;
    for term in &problem.objective {
        let name = &problem.variables[term.var].name;
        let index: usize = name
            .strip_prefix('x')
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| GroError::Solver(format!("objective on unexpected column {name}")))?;
        total += term.coeff * doses[index];
    }
    Ok(total)
}

/// Production backend: solve through the worker pool.
///
/// After `inline_after_errors` consecutive pool failures the backend falls
/// back to the in-process solver (when compiled in). The default threshold
/// is `u32::MAX`, i.e. the fallback is effectively disabled; it exists for
/// deployments that prefer degraded service over none while workers are
/// recycling.
#[derive(Clone)]
pub struct PoolBackend {
    pool: SolverPool,
    inline_after_errors: u32,
}

impl PoolBackend {
    pub fn new(pool: SolverPool) -> Self {
        Self {
            pool,
            inline_after_errors: u32::MAX,
        }
    }

    pub fn with_inline_after_errors(mut self, threshold: u32) -> Self {
        self.inline_after_errors = threshold;
        self
    }
}

impl LpBackend for PoolBackend {
    async fn solve(&self, problem: &LpProblem) -> Result<MilpOutcome, GroError> {
        #[cfg(feature = "solver-microlp")]
        if self.pool.stats().consecutive_errors >= self.inline_after_errors {
            warn!(
                threshold = self.inline_after_errors,
                "pool is failing repeatedly; solving inline"
            );
            return inline::solve(problem);
        }

        let result = self
            .pool
            .solve(problem.to_lp_format())
            .await
            .map_err(|e| GroError::Solver(e.to_string()))?;
        match result.status {
            SolveStatus::Optimal => Ok(MilpOutcome::Optimal(extract_solution(problem, &result)?)),
            SolveStatus::Infeasible => Ok(MilpOutcome::Infeasible),
            other => {
                warn!(status = %other, "worker returned unusable status");
                Err(GroError::Solver(format!("solver returned {other}")))
            }
        }
    }
}

/// In-process pure-Rust backend (microlp via good_lp).
#[cfg(feature = "solver-microlp")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrolpBackend;

#[cfg(feature = "solver-microlp")]
impl LpBackend for MicrolpBackend {
    async fn solve(&self, problem: &LpProblem) -> Result<MilpOutcome, GroError> {
        inline::solve(problem)
    }
}

#[cfg(feature = "solver-microlp")]
mod inline {
    use super::{objective_from_doses, MilpOutcome, MilpSolution};
    use gro_core::GroError;
    use gro_solver_common::{Cmp, LpProblem, VarKind};
    use good_lp::solvers::microlp::microlp;
    use good_lp::{constraint, variable, variables, Expression, ResolutionError, Solution, SolverModel};

    pub(super) fn solve(problem: &LpProblem) -> Result<MilpOutcome, GroError> {
        let mut vars = variables!();
        let solver_vars: Vec<good_lp::Variable> = problem
            .variables
            .iter()
            .map(|v| {
                let mut definition = variable().integer().min(v.lower as f64);
                if v.upper != i64::MAX {
                    definition = definition.max(v.upper as f64);
                }
                vars.add(definition)
            })
            .collect();

        let objective = problem
            .objective
            .iter()
            .fold(Expression::from(0.0), |acc, term| {
                acc + (term.coeff as f64) * solver_vars[term.var]
            });

        let mut model = vars.minimise(objective).using(microlp);
        for c in &problem.constraints {
            let expr = c.terms.iter().fold(Expression::from(0.0), |acc, term| {
                acc + (term.coeff as f64) * solver_vars[term.var]
            });
            let rhs = c.rhs as f64;
            model = match c.cmp {
                Cmp::Ge => model.with(constraint!(expr >= rhs)),
                Cmp::Le => model.with(constraint!(expr <= rhs)),
                Cmp::Eq => model.with(constraint!(expr == rhs)),
            };
        }

        match model.solve() {
            Ok(solution) => {
                let n = problem
                    .variables
                    .iter()
                    .filter(|v| v.kind == VarKind::Integer)
                    .count();
                let mut doses = vec![0i64; n];
                let mut selected = vec![false; n];
                for (index, variable) in problem.variables.iter().enumerate() {
                    let value = solution.value(solver_vars[index]);
                    if let Some(i) = variable.name.strip_prefix('x').and_then(|s| s.parse::<usize>().ok()) {
                        doses[i] = value.round() as i64;
                    } else if let Some(i) =
                        variable.name.strip_prefix('y').and_then(|s| s.parse::<usize>().ok())
                    {
                        selected[i] = value > 0.5;
                    }
                }
                let objective_ore = objective_from_doses(problem, &doses)?;
                Ok(MilpOutcome::Optimal(MilpSolution {
                    doses,
                    selected,
                    objective_ore,
                }))
            }
            Err(ResolutionError::Infeasible) => Ok(MilpOutcome::Infeasible),
            Err(other) => Err(GroError::Solver(format!("inline solve failed: {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gro_solver_common::ipc::Column;
    use gro_solver_common::{Cmp, LpTerm};
    use std::collections::BTreeMap;

    fn two_product_problem() -> LpProblem {
        let mut problem = LpProblem::new();
        let x0 = problem.add_variable("x0", VarKind::Integer, 0, 600);
        let x1 = problem.add_variable("x1", VarKind::Integer, 0, 600);
        let y0 = problem.add_variable("y0", VarKind::Binary, 0, 1);
        let y1 = problem.add_variable("y1", VarKind::Binary, 0, 1);
        problem.objective = vec![
            LpTerm { coeff: 450, var: x0 },
            LpTerm { coeff: 400, var: x1 },
        ];
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
        problem.add_constraint(vec![LpTerm { coeff: 1, var: y0 }], Cmp::Le, 1);
        problem
    }

    #[test]
    fn test_extract_solution() {
        let problem = two_product_problem();
        let mut columns = BTreeMap::new();
        columns.insert("x0".into(), Column { primal: 0.0 });
        columns.insert("x1".into(), Column { primal: 555.999_999_8 });
        columns.insert("y0".into(), Column { primal: 0.000_000_1 });
        columns.insert("y1".into(), Column { primal: 0.999_999_9 });
        let result = HighsResult {
            status: SolveStatus::Optimal,
            columns,
            objective_value: 222_400.0,
        };
        let solution = extract_solution(&problem, &result).unwrap();
        assert_eq!(solution.doses, vec![0, 556]);
        assert_eq!(solution.selected, vec![false, true]);
        assert_eq!(solution.objective_ore, 556 * 400);
    }

    #[test]
    fn test_extract_missing_column_is_error() {
        let problem = two_product_problem();
        let result = HighsResult::status_only(SolveStatus::Optimal);
        assert!(extract_solution(&problem, &result).is_err());
    }

    #[cfg(feature = "solver-microlp")]
    #[tokio::test]
    async fn test_inline_solves_simple_model() {
        // minimize 400·x1 with x1 ≥ 100·y1 and a nitrogen-like row
        let mut problem = LpProblem::new();
        let x0 = problem.add_variable("x0", VarKind::Integer, 0, 600);
        let y0 = problem.add_variable("y0", VarKind::Binary, 0, 1);
        problem.objective = vec![LpTerm { coeff: 400, var: x0 }];
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
        problem.add_constraint(vec![LpTerm { coeff: 270, var: x0 }], Cmp::Ge, 150_000);
        problem.add_constraint(vec![LpTerm { coeff: 270, var: x0 }], Cmp::Le, 151_000);

        let outcome = MicrolpBackend.solve(&problem).await.unwrap();
        match outcome {
            MilpOutcome::Optimal(solution) => {
                assert_eq!(solution.doses, vec![556]);
                assert_eq!(solution.selected, vec![true]);
                assert_eq!(solution.objective_ore, 222_400);
            }
            MilpOutcome::Infeasible => panic!("expected optimum"),
        }
    }

    #[cfg(feature = "solver-microlp")]
    #[tokio::test]
    async fn test_inline_reports_infeasible() {
        let mut problem = LpProblem::new();
        let x0 = problem.add_variable("x0", VarKind::Integer, 0, 10);
        problem.objective = vec![LpTerm { coeff: 1, var: x0 }];
        problem.add_constraint(vec![LpTerm { coeff: 1, var: x0 }], Cmp::Ge, 100);
        let outcome = MicrolpBackend.solve(&problem).await.unwrap();
        assert_eq!(outcome, MilpOutcome::Infeasible);
    }
}
