//! # gro-engine: Fertilizer Strategy Optimization
//!
//! Recommends up to three cost-ranked fertilizer strategies — small product
//! mixes with integer per-hectare doses — that supply an N/P/K/S target
//! profile within strict tolerance bands.
//!
//! ## Architecture
//!
//! The engine separates the mathematical model from the solving machinery:
//!
//! - **[`model`]**: pure builder from products and targets to a canonical
//!   integer MILP ([`gro_solver_common::LpProblem`])
//! - **[`backend`]**: how a model gets solved — the out-of-process worker
//!   pool in production, a pure-Rust in-process solver behind the
//!   `solver-microlp` feature
//! - **[`optimizer`]**: the recommendation algorithm — validation, the
//!   single-nutrient fast path, nitrogen-tolerance and product-count
//!   escalation, and the no-good-cut price podium
//! - **[`facade`]**: the thin adapter the surrounding service calls
//!
//! ## Solving model
//!
//! Strategy search is a small MILP: integer dose `x_i` and binary selector
//! `y_i` per product, minimize `Σ price·x_i`, subject to dose coupling,
//! a cardinality cap, per-nutrient bands (exact-plus-tolerance for N, a
//! percentage window for P/K/S), and no-good cuts that exclude previously
//! found product sets so runner-up strategies use genuinely different
//! mixes.
//!
//! Infeasibility is a first-class answer throughout: the optimizer returns
//! `status: "infeasible"` with a message naming the binding dimensions, and
//! nothing in this crate throws for "no solution".
//!
//! ## Example
//!
//! ```ignore
//! use gro_engine::backend::PoolBackend;
//! use gro_engine::facade::{recommend, Need, RecommendOptions};
//! use gro_solver_common::pool::{PoolConfig, SolverPool};
//! use gro_solver_common::subprocess::WorkerCommand;
//!
//! let pool = SolverPool::start(PoolConfig::new(WorkerCommand::find()?));
//! let backend = PoolBackend::new(pool);
//! let solutions = recommend(&backend, &need, &products, &RecommendOptions::default()).await;
//! ```

pub mod backend;
pub mod facade;
pub mod model;
pub mod optimizer;
pub mod types;
pub mod validation;

mod construct;
mod fallback;
mod single_nutrient;

pub use backend::{LpBackend, MilpOutcome, MilpSolution, PoolBackend};
pub use facade::{recommend, Need, RecommendOptions, Solution};
pub use optimizer::{optimize, optimize_with_fallback};
pub use types::{
    NutrientPercents, OptimizeInput, OptimizeOutput, OptimizeStatus, Strategy, StrategyProduct,
    Warning, WarningKind,
};
pub use validation::{validate, ValidatedInput};

#[cfg(feature = "solver-microlp")]
pub use backend::MicrolpBackend;
