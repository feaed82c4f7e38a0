//! Plugin harness for solver worker binaries.
//!
//! Provides common infrastructure for worker binaries, eliminating
//! boilerplate for tracing setup, the request loop, and error management.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gro_solver_common::plugin::{run_solver_plugin, SolverPlugin};
//! use gro_solver_common::{HighsResult, LpProblem};
//! use anyhow::Result;
//!
//! struct HighsWorker;
//!
//! impl SolverPlugin for HighsWorker {
//!     fn name(&self) -> &'static str { "gro-highs" }
//!     fn solve(&self, problem: &LpProblem) -> Result<HighsResult> {
//!         // Solver implementation
//!     }
//! }
//!
//! fn main() {
//!     run_solver_plugin(HighsWorker);
//! }
//! ```

use crate::error::ExitCode;
use crate::ipc::{self, WorkerRequest, WorkerResponse};
use crate::lp::LpProblem;
use crate::{HighsResult, DEFAULT_MAX_SOLVES_PER_WORKER, MAX_SOLVES_ENV, PROTOCOL_VERSION};
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use tracing::{debug, error, info, warn};

/// Trait for implementing a solver worker.
///
/// Implement this trait to create a worker binary. The harness handles the
/// request loop, logging, response flushing, and self-retirement.
pub trait SolverPlugin {
    /// The worker name (e.g., "gro-highs").
    fn name(&self) -> &'static str;

    /// Solve one parsed problem.
    ///
    /// Infeasible/unbounded outcomes are successful results with that
    /// status; `Err` is reserved for solver-library failures and produces a
    /// `type:"error"` response frame.
    fn solve(&self, problem: &LpProblem) -> Result<HighsResult>;

    /// Additional initialization before serving requests.
    ///
    /// Called after tracing is initialized. A failure here exits the
    /// process with [`ExitCode::InitFailure`].
    fn init(&self) -> Result<()> {
        Ok(())
    }
}

/// Run a solver worker with the standard harness.
///
/// This function:
/// 1. Initializes tracing to stderr (respects `RUST_LOG`)
/// 2. Runs plugin initialization and emits a ready diagnostic
/// 3. Serves line-delimited solve requests from stdin, flushing each
///    response line before reading the next request
/// 4. Exits 0 after the configured number of successful solves (the
///    `GRO_WORKER_MAX_SOLVES` environment variable, default
///    [`DEFAULT_MAX_SOLVES_PER_WORKER`]) or when stdin closes
///
/// # Exit Codes
///
/// - `0`: clean shutdown
/// - `2`: unrecoverable I/O failure on the protocol streams
/// - `3`: initialization failure
pub fn run_solver_plugin<P: SolverPlugin>(plugin: P) -> ! {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    info!(
        "{} v{} (protocol v{})",
        plugin.name(),
        env!("CARGO_PKG_VERSION"),
        PROTOCOL_VERSION
    );

    if let Err(e) = plugin.init() {
        error!("solver initialization failed: {:?}", e);
        std::process::exit(ExitCode::InitFailure as i32);
    }

    let max_solves = max_solves_from_env();
    info!(max_solves, "ready");

    let exit_code = match serve(&plugin, max_solves) {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            error!("worker error: {:?}", e);
            ExitCode::SolverError
        }
    };
    std::process::exit(exit_code as i32);
}

fn max_solves_from_env() -> u32 {
    std::env::var(MAX_SOLVES_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_MAX_SOLVES_PER_WORKER)
}

/// The request loop. Returns after `max_solves` solves or on stdin close.
fn serve<P: SolverPlugin>(plugin: &P, max_solves: u32) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let mut solves: u32 = 0;

    for line in stdin.lock().lines() {
        let line = line.context("failed to read request line")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match ipc::from_line::<WorkerRequest>(&line) {
            Ok(WorkerRequest::Solve { id, lp }) => {
                debug!(id = %id, bytes = lp.len(), "solve request");
                match LpProblem::parse(&lp) {
                    Ok(problem) => match plugin.solve(&problem) {
                        Ok(result) => {
                            solves += 1;
                            info!(
                                id = %id,
                                status = %result.status,
                                solves,
                                "solve finished"
                            );
                            WorkerResponse::Result { id, result }
                        }
                        Err(e) => {
                            warn!(id = %id, "solver failure: {:?}", e);
                            WorkerResponse::Error {
                                id,
                                message: format!("{e:#}"),
                            }
                        }
                    },
                    Err(e) => WorkerResponse::Error {
                        id,
                        message: format!("invalid LP input: {e}"),
                    },
                }
            }
            Err(e) => {
                warn!("unparseable request frame: {}", e);
                WorkerResponse::Error {
                    id: recover_id(&line),
                    message: format!("invalid request frame: {e}"),
                }
            }
        };

        let frame = ipc::to_line(&response).context("failed to serialize response")?;
        stdout
            .write_all(frame.as_bytes())
            .and_then(|_| stdout.write_all(b"\n"))
            .and_then(|_| stdout.flush())
            .context("failed to write response")?;

        if solves >= max_solves {
            info!(solves, "solve limit reached; retiring");
            break;
        }
    }
    Ok(())
}

/// Best-effort extraction of the request id from a frame that failed to
/// parse as a request, so the caller can still correlate the error.
fn recover_id(line: &str) -> String {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(String::from))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recover_id() {
        assert_eq!(recover_id(r#"{"type":"bogus","id":"s9"}"#), "s9");
        assert_eq!(recover_id("not json"), "unknown");
    }

    #[test]
    fn test_max_solves_default() {
        // Env var is unset in tests.
        assert_eq!(max_solves_from_env(), DEFAULT_MAX_SOLVES_PER_WORKER);
    }
}
