//! Bounded, supervised pool of solver workers.
//!
//! The pool owns every worker process and provides one capability:
//! [`SolverPool::solve`] — submit one LP, get the parsed result or a
//! [`PoolError`]. Many callers may solve concurrently; requests are served
//! FIFO relative to arrival. Per-request timers kill wedged workers, crashed
//! workers fail only their in-flight requests, and fresh workers are spawned
//! on demand up to `max_workers`.
//!
//! Supervision runs in a single task; workers and monitors communicate with
//! it over channels, so no lock is ever held across an await point.

use crate::error::PoolError;
use crate::ipc::HighsResult;
use crate::subprocess::{Worker, WorkerCommand};
use crate::DEFAULT_MAX_SOLVES_PER_WORKER;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Pool tuning knobs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub worker_command: WorkerCommand,
    /// Upper bound on concurrent workers.
    pub max_workers: usize,
    /// Per-request wall clock; the worker is killed when it fires.
    pub solve_timeout: Duration,
    /// Planned retirement trigger; the same limit is exported to the worker.
    pub max_solves_per_worker: u32,
    /// How long a retiring worker may take to exit before being killed.
    pub grace: Duration,
}

impl PoolConfig {
    pub fn new(worker_command: WorkerCommand) -> Self {
        Self {
            worker_command,
            max_workers: 2,
            solve_timeout: Duration::from_millis(30_000),
            max_solves_per_worker: DEFAULT_MAX_SOLVES_PER_WORKER,
            grace: Duration::from_secs(5),
        }
    }
}

#[derive(Default)]
struct PoolStats {
    workers_spawned: AtomicU64,
    workers_retired: AtomicU64,
    solves_completed: AtomicU64,
    solver_errors: AtomicU64,
    timeouts: AtomicU64,
    crashes: AtomicU64,
    queue_peak: AtomicU64,
    consecutive_errors: AtomicU32,
}

impl PoolStats {
    fn note_queue_depth(&self, depth: usize) {
        self.queue_peak.fetch_max(depth as u64, Ordering::Relaxed);
    }

    fn note_outcome(&self, disposition: Disposition) {
        match disposition {
            Disposition::Solved => {
                self.solves_completed.fetch_add(1, Ordering::Relaxed);
                self.consecutive_errors.store(0, Ordering::Relaxed);
                return;
            }
            Disposition::SolverError => {
                self.solver_errors.fetch_add(1, Ordering::Relaxed);
            }
            Disposition::TimedOut => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            Disposition::Crashed => {
                self.crashes.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.consecutive_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub workers_spawned: u64,
    pub workers_retired: u64,
    pub solves_completed: u64,
    pub solver_errors: u64,
    pub timeouts: u64,
    pub crashes: u64,
    pub queue_peak: u64,
    /// Length of the current run of failed solves; resets on any success.
    /// Callers may use this to trigger an inline fallback path.
    pub consecutive_errors: u32,
}

type Reply = oneshot::Sender<Result<HighsResult, PoolError>>;

struct Job {
    lp: String,
    reply: Reply,
}

enum PoolMsg {
    Solve { lp: String, reply: Reply },
    Shutdown { done: oneshot::Sender<()> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Solved,
    SolverError,
    TimedOut,
    Crashed,
}

struct Event {
    worker_id: u64,
    disposition: Disposition,
}

/// Handle to the process-scoped solver pool.
///
/// Cheap to clone; create once at service startup, pass by reference into
/// the optimizer, shut down explicitly at service stop.
#[derive(Clone)]
pub struct SolverPool {
    tx: mpsc::Sender<PoolMsg>,
    stats: Arc<PoolStats>,
}

impl SolverPool {
    /// Start the pool's supervisor task. Must be called within a tokio
    /// runtime.
    pub fn start(config: PoolConfig) -> SolverPool {
        let stats = Arc::new(PoolStats::default());
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(supervise(config, rx, Arc::clone(&stats)));
        SolverPool { tx, stats }
    }

    /// Solve one LP (canonical text form).
    ///
    /// Resolves with the worker's parsed result, or a [`PoolError`] on
    /// timeout, crash, or shutdown. An `Infeasible` status is a successful
    /// result, not an error.
    pub async fn solve(&self, lp: String) -> Result<HighsResult, PoolError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PoolMsg::Solve { lp, reply })
            .await
            .map_err(|_| PoolError::ShuttingDown)?;
        rx.await.map_err(|_| PoolError::ShuttingDown)?
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            workers_spawned: self.stats.workers_spawned.load(Ordering::Relaxed),
            workers_retired: self.stats.workers_retired.load(Ordering::Relaxed),
            solves_completed: self.stats.solves_completed.load(Ordering::Relaxed),
            solver_errors: self.stats.solver_errors.load(Ordering::Relaxed),
            timeouts: self.stats.timeouts.load(Ordering::Relaxed),
            crashes: self.stats.crashes.load(Ordering::Relaxed),
            queue_peak: self.stats.queue_peak.load(Ordering::Relaxed),
            consecutive_errors: self.stats.consecutive_errors.load(Ordering::Relaxed),
        }
    }

    /// Fail queued requests fast, retire in-flight workers (stdin close,
    /// grace period, then kill), and stop the supervisor.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(PoolMsg::Shutdown { done }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

async fn supervise(config: PoolConfig, mut rx: mpsc::Receiver<PoolMsg>, stats: Arc<PoolStats>) {
    let (events_tx, mut events_rx) = mpsc::channel::<Event>(256);
    let mut workers: Vec<Worker> = Vec::new();
    let mut queue: VecDeque<Job> = VecDeque::new();
    let mut next_worker_id: u64 = 0;
    let mut next_request_id: u64 = 0;

    info!(
        max_workers = config.max_workers,
        timeout_ms = config.solve_timeout.as_millis() as u64,
        "solver pool started"
    );

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(PoolMsg::Solve { lp, reply }) => {
                    queue.push_back(Job { lp, reply });
                    stats.note_queue_depth(queue.len());
                    dispatch(
                        &config, &stats, &mut workers, &mut queue,
                        &events_tx, &mut next_worker_id, &mut next_request_id,
                    )
                    .await;
                }
                Some(PoolMsg::Shutdown { done }) => {
                    info!(queued = queue.len(), live = workers.len(), "solver pool shutting down");
                    for job in queue.drain(..) {
                        let _ = job.reply.send(Err(PoolError::ShuttingDown));
                    }
                    let mut retiring = JoinSet::new();
                    for worker in workers.drain(..) {
                        let grace = config.grace;
                        retiring.spawn(worker.retire(grace));
                    }
                    while retiring.join_next().await.is_some() {}
                    let _ = done.send(());
                    return;
                }
                None => {
                    // Every pool handle is gone; nobody is waiting on replies.
                    queue.clear();
                    for worker in workers.drain(..) {
                        let grace = config.grace;
                        tokio::spawn(worker.retire(grace));
                    }
                    return;
                }
            },
            Some(event) = events_rx.recv() => {
                stats.note_outcome(event.disposition);
                settle_worker(&config, &stats, &mut workers, event);
                dispatch(
                    &config, &stats, &mut workers, &mut queue,
                    &events_tx, &mut next_worker_id, &mut next_request_id,
                )
                .await;
            }
        }
    }
}

/// Update worker bookkeeping after a solve finished one way or another.
fn settle_worker(
    config: &PoolConfig,
    stats: &Arc<PoolStats>,
    workers: &mut Vec<Worker>,
    event: Event,
) {
    let Some(idx) = workers.iter().position(|w| w.id == event.worker_id) else {
        return; // already removed (e.g. crash raced a timeout)
    };
    match event.disposition {
        Disposition::Solved | Disposition::SolverError => {
            workers[idx].busy = false;
            if workers[idx].solves_started >= config.max_solves_per_worker {
                let worker = workers.swap_remove(idx);
                stats.workers_retired.fetch_add(1, Ordering::Relaxed);
                debug!(worker = worker.id, "solve limit reached; retiring");
                tokio::spawn(worker.retire(config.grace));
            }
        }
        Disposition::TimedOut | Disposition::Crashed => {
            let worker = workers.swap_remove(idx);
            warn!(
                worker = worker.id,
                disposition = ?event.disposition,
                "removing failed worker"
            );
            tokio::spawn(worker.kill());
        }
    }
}

/// Hand queued jobs to idle workers, spawning new workers while under the
/// bound. Leaves the queue untouched when saturated.
#[allow(clippy::too_many_arguments)]
async fn dispatch(
    config: &PoolConfig,
    stats: &Arc<PoolStats>,
    workers: &mut Vec<Worker>,
    queue: &mut VecDeque<Job>,
    events_tx: &mpsc::Sender<Event>,
    next_worker_id: &mut u64,
    next_request_id: &mut u64,
) {
    while !queue.is_empty() {
        let idle = workers
            .iter()
            .position(|w| !w.busy && w.solves_started < config.max_solves_per_worker);
        let idx = match idle {
            Some(idx) => idx,
            None if workers.len() < config.max_workers => {
                match Worker::spawn(
                    *next_worker_id,
                    &config.worker_command,
                    config.max_solves_per_worker,
                )
                .await
                {
                    Ok(worker) => {
                        *next_worker_id += 1;
                        stats.workers_spawned.fetch_add(1, Ordering::Relaxed);
                        debug!(worker = worker.id, "spawned solver worker");
                        workers.push(worker);
                        workers.len() - 1
                    }
                    Err(err) => {
                        warn!("failed to spawn solver worker: {}", err);
                        let job = queue.pop_front().expect("queue non-empty");
                        let _ = job.reply.send(Err(err));
                        continue;
                    }
                }
            }
            None => break,
        };

        let Job { lp, reply } = queue.pop_front().expect("queue non-empty");
        let request_id = format!("s{}", *next_request_id);
        *next_request_id += 1;

        match workers[idx].submit(request_id, lp).await {
            Ok(rx) => {
                let worker_id = workers[idx].id;
                let solve_timeout = config.solve_timeout;
                let events = events_tx.clone();
                tokio::spawn(monitor(worker_id, rx, reply, solve_timeout, events));
            }
            Err(err) => {
                // The write failed, so the worker is unusable.
                let worker = workers.swap_remove(idx);
                stats.crashes.fetch_add(1, Ordering::Relaxed);
                tokio::spawn(worker.kill());
                let _ = reply.send(Err(err));
            }
        }
    }
}

/// Await one in-flight solve with its timer and report the disposition back
/// to the supervisor. The reply goes straight to the caller from here.
async fn monitor(
    worker_id: u64,
    rx: oneshot::Receiver<Result<HighsResult, PoolError>>,
    reply: Reply,
    solve_timeout: Duration,
    events: mpsc::Sender<Event>,
) {
    let disposition;
    tokio::select! {
        outcome = rx => {
            match outcome {
                Ok(Ok(result)) => {
                    disposition = Disposition::Solved;
                    let _ = reply.send(Ok(result));
                }
                Ok(Err(err)) => {
                    disposition = if err.worker_survives() {
                        Disposition::SolverError
                    } else {
                        Disposition::Crashed
                    };
                    let _ = reply.send(Err(err));
                }
                Err(_) => {
                    disposition = Disposition::Crashed;
                    let _ = reply.send(Err(PoolError::WorkerCrashed {
                        message: "worker dropped the request".to_string(),
                    }));
                }
            }
        }
        _ = tokio::time::sleep(solve_timeout) => {
            disposition = Disposition::TimedOut;
            let _ = reply.send(Err(PoolError::Timeout {
                ms: solve_timeout.as_millis() as u64,
            }));
        }
    }
    let _ = events.send(Event { worker_id, disposition }).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_worker(script: &str) -> WorkerCommand {
        WorkerCommand {
            program: "/bin/sh".into(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    /// A stand-in worker that answers every request with an Optimal frame
    /// echoing the request id; the objective counts up per answered request
    /// so arrival order is observable.
    fn echo_worker() -> WorkerCommand {
        fake_worker(
            r#"i=0; while read line; do id=$(printf '%s' "$line" | sed -n 's/.*"id":"\([^"]*\)".*/\1/p'); echo "{\"type\":\"result\",\"id\":\"$id\",\"status\":\"Optimal\",\"columns\":{},\"objectiveValue\":$((42+i))}"; i=$((i+1)); done"#,
        )
    }

    #[tokio::test]
    async fn test_solves_fifo_through_one_worker() {
        let mut config = PoolConfig::new(echo_worker());
        config.max_workers = 1;
        config.solve_timeout = Duration::from_secs(5);
        let pool = SolverPool::start(config);

        let (a, b, c) = tokio::join!(
            pool.solve("End\n".to_string()),
            pool.solve("End\n".to_string()),
            pool.solve("End\n".to_string()),
        );
        let values: Vec<f64> = [a, b, c]
            .into_iter()
            .map(|r| {
                let result = r.expect("solve should succeed");
                assert!(result.is_optimal());
                result.objective_value
            })
            .collect();
        // FIFO through a single worker: arrival order is service order.
        assert_eq!(values, vec![42.0, 43.0, 44.0]);
        let stats = pool.stats();
        assert_eq!(stats.solves_completed, 3);
        assert_eq!(stats.workers_spawned, 1);
        assert_eq!(stats.consecutive_errors, 0);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_timeout_kills_and_reports() {
        let mut config = PoolConfig::new(fake_worker("sleep 60"));
        config.solve_timeout = Duration::from_millis(200);
        config.grace = Duration::from_millis(100);
        let pool = SolverPool::start(config);

        let result = pool.solve("End\n".to_string()).await;
        assert!(matches!(result, Err(PoolError::Timeout { ms: 200 })));
        let stats = pool.stats();
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.consecutive_errors, 1);

        // The pool recovers: a fresh worker serves the next request.
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_instant_exit_is_a_crash_error() {
        let mut config = PoolConfig::new(fake_worker("exit 0"));
        config.solve_timeout = Duration::from_secs(2);
        let pool = SolverPool::start(config);

        let result = pool.solve("End\n".to_string()).await;
        assert!(
            matches!(result, Err(PoolError::WorkerCrashed { .. })),
            "got {result:?}"
        );
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_fails_queued_fast() {
        let mut config = PoolConfig::new(fake_worker("sleep 60"));
        config.max_workers = 1;
        config.solve_timeout = Duration::from_secs(30);
        config.grace = Duration::from_millis(100);
        let pool = SolverPool::start(config);

        let in_flight = tokio::spawn({
            let pool = pool.clone();
            async move { pool.solve("End\n".to_string()).await }
        });
        let queued = tokio::spawn({
            let pool = pool.clone();
            async move { pool.solve("End\n".to_string()).await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        pool.shutdown().await;

        let queued = queued.await.unwrap();
        assert!(matches!(queued, Err(PoolError::ShuttingDown)));
        // The in-flight worker never answers and gets killed after grace.
        let in_flight = in_flight.await.unwrap();
        assert!(in_flight.is_err());
    }

    #[tokio::test]
    async fn test_worker_retired_at_solve_limit() {
        let mut config = PoolConfig::new(echo_worker());
        config.max_workers = 1;
        config.max_solves_per_worker = 2;
        config.solve_timeout = Duration::from_secs(5);
        config.grace = Duration::from_millis(500);
        let pool = SolverPool::start(config);

        for _ in 0..4 {
            let result = pool.solve("End\n".to_string()).await.expect("solve ok");
            assert!(result.is_optimal());
        }
        let stats = pool.stats();
        assert!(stats.workers_spawned >= 2, "stats: {stats:?}");
        assert!(stats.workers_retired >= 1, "stats: {stats:?}");
        pool.shutdown().await;
    }
}
