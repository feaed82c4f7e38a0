//! Common types and IPC protocol for gro solver workers.
//!
//! This crate defines the line-delimited JSON protocol spoken between the
//! recommendation engine and external MILP solver workers (`gro-highs`),
//! plus the supervised worker pool the engine solves through.
//!
//! # Architecture
//!
//! The worker system uses a subprocess model: each worker hosts one solver
//! library instance in its own process, so a native solver crash can never
//! take the recommendation service down. Workers are short-lived by design
//! and retire themselves after a bounded number of solves.
//!
//! ```text
//! gro-engine ──> SolverPool ──stdin──> gro-highs (subprocess)
//!                           <─stdout──
//!                           <─stderr── (logs/diagnostics)
//! ```
//!
//! # Protocol
//!
//! One JSON request per stdin line, one JSON response per stdout line,
//! flushed before the next read. The problem payload is CPLEX LP text (see
//! [`lp`]); the response carries the solver status, primal column values and
//! the objective. stderr is reserved for human-readable diagnostics.
//!
//! The protocol is versioned to ensure compatibility between the engine and
//! worker binaries. Breaking changes increment [`PROTOCOL_VERSION`].

pub mod error;
pub mod ipc;
pub mod lp;
pub mod plugin;
pub mod pool;
pub mod subprocess;

pub use error::{ExitCode, LpParseError, PoolError};
pub use ipc::{HighsResult, SolveStatus, WorkerRequest, WorkerResponse};
pub use lp::{Cmp, LpConstraint, LpProblem, LpTerm, LpVariable, VarKind};
pub use plugin::{run_solver_plugin, SolverPlugin};
pub use pool::{PoolConfig, PoolStatsSnapshot, SolverPool};
pub use subprocess::{Worker, WorkerCommand};

/// Protocol version for IPC compatibility checking.
/// Increment when making breaking changes to the wire format.
pub const PROTOCOL_VERSION: i32 = 1;

/// Binary name of the default MILP worker.
pub const WORKER_BINARY_NAME: &str = "gro-highs";

/// How many solves a worker performs before retiring itself. Deliberately
/// small: latent memory corruption in an embedded solver must not outlive
/// a handful of requests.
pub const DEFAULT_MAX_SOLVES_PER_WORKER: u32 = 25;

/// Environment variable overriding the worker-side solve limit.
pub const MAX_SOLVES_ENV: &str = "GRO_WORKER_MAX_SOLVES";
