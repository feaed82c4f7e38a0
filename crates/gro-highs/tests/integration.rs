//! Integration tests for the gro-highs worker binary.
//!
//! These spawn the built binary and drive the line protocol through its
//! stdio, then exercise the full `SolverPool` against it.

use gro_solver_common::ipc::{self, WorkerRequest, WorkerResponse};
use gro_solver_common::pool::{PoolConfig, SolverPool};
use gro_solver_common::subprocess::WorkerCommand;
use gro_solver_common::{Cmp, LpProblem, LpTerm, SolveStatus, VarKind};
use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

fn worker_binary() -> &'static str {
    env!("CARGO_BIN_EXE_gro-highs")
}

/// One product (27% N @ 4.00 SEK/kg), nitrogen target 150..151 kg/ha,
/// dose 100..600 kg/ha. Optimum: 556 kg at 222 400 öre.
fn single_product_model() -> LpProblem {
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
    problem.add_constraint(vec![LpTerm { coeff: 1, var: y0 }], Cmp::Le, 1);
    problem.add_constraint(vec![LpTerm { coeff: 270, var: x0 }], Cmp::Ge, 150_000);
    problem.add_constraint(vec![LpTerm { coeff: 270, var: x0 }], Cmp::Le, 151_000);
    problem
}

fn request_line(id: &str, problem: &LpProblem) -> String {
    ipc::to_line(&WorkerRequest::Solve {
        id: id.to_string(),
        lp: problem.to_lp_format(),
    })
    .unwrap()
}

#[test]
fn test_protocol_round_trip() {
    let mut child = Command::new(worker_binary())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn gro-highs");

    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap());

    writeln!(stdin, "{}", request_line("t1", &single_product_model())).unwrap();

    let mut line = String::new();
    stdout.read_line(&mut line).expect("response line");
    let response: WorkerResponse = ipc::from_line(&line).expect("parseable response");
    match response {
        WorkerResponse::Result { id, result } => {
            assert_eq!(id, "t1");
            assert_eq!(result.status, SolveStatus::Optimal);
            assert_eq!(result.objective_value.round() as i64, 222_400);
            assert_eq!(result.primal("x0").unwrap().round() as i64, 556);
            assert_eq!(result.primal("y0").unwrap().round() as i64, 1);
        }
        WorkerResponse::Error { message, .. } => panic!("solver error: {message}"),
    }

    // Closing stdin is the clean-shutdown signal.
    drop(stdin);
    let status = child.wait().expect("wait");
    assert!(status.success(), "worker exited with {status:?}");
}

#[test]
fn test_infeasible_is_a_result_not_an_error() {
    let mut problem = single_product_model();
    // 27% N cannot reach 10 000 kg/ha within a 600 kg dose.
    problem.constraints[3].rhs = 10_000_000;
    problem.constraints[4].rhs = 10_001_000;

    let mut child = Command::new(worker_binary())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap());

    writeln!(stdin, "{}", request_line("t2", &problem)).unwrap();
    let mut line = String::new();
    stdout.read_line(&mut line).unwrap();
    let response: WorkerResponse = ipc::from_line(&line).unwrap();
    match response {
        WorkerResponse::Result { result, .. } => {
            assert_eq!(result.status, SolveStatus::Infeasible);
        }
        WorkerResponse::Error { message, .. } => panic!("unexpected error: {message}"),
    }

    drop(stdin);
    assert!(child.wait().unwrap().success());
}

#[test]
fn test_bad_lp_yields_error_frame_and_worker_survives() {
    let mut child = Command::new(worker_binary())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap());

    writeln!(
        stdin,
        r#"{{"type":"solve","id":"bad","lp":"this is not lp format"}}"#
    )
    .unwrap();
    let mut line = String::new();
    stdout.read_line(&mut line).unwrap();
    let response: WorkerResponse = ipc::from_line(&line).unwrap();
    assert!(matches!(response, WorkerResponse::Error { .. }));
    assert_eq!(response.id(), "bad");

    // The same worker still answers a valid request afterwards.
    writeln!(stdin, "{}", request_line("t3", &single_product_model())).unwrap();
    line.clear();
    stdout.read_line(&mut line).unwrap();
    let response: WorkerResponse = ipc::from_line(&line).unwrap();
    assert!(matches!(response, WorkerResponse::Result { .. }));

    drop(stdin);
    assert!(child.wait().unwrap().success());
}

#[test]
fn test_worker_retires_after_solve_limit() {
    let mut child = Command::new(worker_binary())
        .env("GRO_WORKER_MAX_SOLVES", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap());

    writeln!(stdin, "{}", request_line("t4", &single_product_model())).unwrap();
    let mut line = String::new();
    stdout.read_line(&mut line).unwrap();

    // Without closing stdin: the worker must exit on its own.
    let status = child.wait().expect("worker should self-retire");
    assert!(status.success());
    drop(stdin);
}

#[tokio::test]
async fn test_pool_end_to_end() {
    let config = PoolConfig::new(WorkerCommand::new(worker_binary()));
    let pool = SolverPool::start(config);

    let result = pool
        .solve(single_product_model().to_lp_format())
        .await
        .expect("pool solve");
    assert!(result.is_optimal());
    assert_eq!(result.objective_value.round() as i64, 222_400);

    let stats = pool.stats();
    assert_eq!(stats.solves_completed, 1);
    assert_eq!(stats.crashes, 0);
    pool.shutdown().await;
}
