//! Error types and exit codes for solver communication.

use thiserror::Error;

/// Exit codes for solver worker processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Clean shutdown (stdin closed or solve limit reached).
    Success = 0,
    /// Malformed input that prevented the request loop from running.
    InvalidInput = 1,
    /// Unrecoverable solver error.
    SolverError = 2,
    /// Solver library failed to initialize.
    InitFailure = 3,
}

impl ExitCode {
    /// Convert from raw exit code to ExitCode enum.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => ExitCode::Success,
            1 => ExitCode::InvalidInput,
            3 => ExitCode::InitFailure,
            _ => ExitCode::SolverError,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

/// Errors surfaced by the solver pool.
///
/// Note the deliberate asymmetry: an `Infeasible` solve is NOT an error —
/// it comes back as a successful [`crate::HighsResult`] with that status.
/// `PoolError` covers transport and runtime failures only.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Worker process failed to start.
    #[error("failed to start solver worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// Worker binary could not be located.
    #[error("solver worker binary {name} not found (searched ~/.gro/solvers and PATH)")]
    NotInstalled { name: String },

    /// No response within the per-solve budget; the worker was killed.
    #[error("solve timed out after {ms} ms")]
    Timeout { ms: u64 },

    /// Worker exited while the request was in flight.
    #[error("solver worker crashed: {message}")]
    WorkerCrashed { message: String },

    /// The worker reported a solver-level failure for this request.
    #[error("solver failed: {message}")]
    Solver { message: String },

    /// Protocol-level failure (unparseable frame, broken pipe).
    #[error("worker IPC error: {0}")]
    Ipc(String),

    /// The pool is shutting down; the request was not attempted.
    #[error("solver pool is shutting down")]
    ShuttingDown,
}

impl PoolError {
    /// Whether the worker that produced this error is still usable.
    /// Solver-level failures leave the process healthy; everything else
    /// means the worker is gone or was killed.
    pub fn worker_survives(&self) -> bool {
        matches!(self, PoolError::Solver { .. })
    }
}

/// Error from parsing CPLEX LP text.
#[derive(Debug, Error)]
#[error("LP parse error on line {line}: {message}")]
pub struct LpParseError {
    pub line: usize,
    pub message: String,
}

impl LpParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}
