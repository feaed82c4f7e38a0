//! Wire types for the line-delimited JSON worker protocol.
//!
//! Requests and responses are single JSON objects, one per line, with a
//! `type` discriminator:
//!
//! ```text
//! {"type":"solve","id":"s7","lp":"Minimize\n obj: ...\nEnd\n"}
//! {"type":"result","id":"s7","status":"Optimal",
//!  "columns":{"x0":{"Primal":500},"y0":{"Primal":1}},"objectiveValue":225000}
//! {"type":"error","id":"s7","message":"..."}
//! ```
//!
//! Field spellings (`objectiveValue`, `Primal`) are part of the protocol and
//! must not change without bumping [`crate::PROTOCOL_VERSION`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal status of one solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Proven optimal solution found.
    Optimal,
    /// Problem is infeasible under the given constraints.
    Infeasible,
    /// Problem is unbounded.
    Unbounded,
    /// Solver hit its internal time limit.
    TimeLimit,
    /// Solver hit an iteration/node limit.
    IterationLimit,
    /// Anything the solver reported that we do not model.
    #[serde(other)]
    Unknown,
}

impl SolveStatus {
    /// Whether this status carries a usable primal solution.
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "Optimal",
            SolveStatus::Infeasible => "Infeasible",
            SolveStatus::Unbounded => "Unbounded",
            SolveStatus::TimeLimit => "TimeLimit",
            SolveStatus::IterationLimit => "IterationLimit",
            SolveStatus::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// Primal value of one column in the solution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Column {
    #[serde(rename = "Primal")]
    pub primal: f64,
}

/// Parsed solver result for one LP.
///
/// Columns are keyed by variable name (`x0..`, `y0..`) in a BTreeMap so
/// serialization order is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighsResult {
    pub status: SolveStatus,
    #[serde(default)]
    pub columns: BTreeMap<String, Column>,
    #[serde(rename = "objectiveValue", default)]
    pub objective_value: f64,
}

impl HighsResult {
    /// A result carrying only a status (used for infeasible/unbounded).
    /// The objective is zero, not NaN: NaN does not survive JSON.
    pub fn status_only(status: SolveStatus) -> Self {
        Self {
            status,
            columns: BTreeMap::new(),
            objective_value: 0.0,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }

    /// Primal value of a named column, if present.
    pub fn primal(&self, name: &str) -> Option<f64> {
        self.columns.get(name).map(|c| c.primal)
    }
}

/// Request frame, engine → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerRequest {
    Solve { id: String, lp: String },
}

/// Response frame, worker → engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerResponse {
    Result {
        id: String,
        #[serde(flatten)]
        result: HighsResult,
    },
    Error {
        id: String,
        message: String,
    },
}

impl WorkerResponse {
    pub fn id(&self) -> &str {
        match self {
            WorkerResponse::Result { id, .. } => id,
            WorkerResponse::Error { id, .. } => id,
        }
    }
}

/// Serialize a frame to one protocol line (no trailing newline).
pub fn to_line<T: Serialize>(frame: &T) -> serde_json::Result<String> {
    serde_json::to_string(frame)
}

/// Parse one protocol line.
pub fn from_line<'a, T: Deserialize<'a>>(line: &'a str) -> serde_json::Result<T> {
    serde_json::from_str(line.trim())
}
