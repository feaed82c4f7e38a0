//! Subprocess management for solver workers.
//!
//! A [`Worker`] owns one child process speaking the line protocol: the child
//! handle, a buffered stdin writer, a stdout reader task resolving pending
//! requests, and busy/solve-count bookkeeping. The pool is the only owner;
//! nothing else touches the pipes.

use crate::error::PoolError;
use crate::ipc::{self, HighsResult, WorkerRequest, WorkerResponse};
use crate::{MAX_SOLVES_ENV, WORKER_BINARY_NAME};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// How to launch a worker binary.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Find the default worker binary in standard locations.
    ///
    /// Search order:
    /// 1. `~/.gro/solvers/gro-highs`
    /// 2. System PATH
    pub fn find() -> Result<WorkerCommand, PoolError> {
        if let Some(home) = dirs::home_dir() {
            let installed = home.join(".gro").join("solvers").join(WORKER_BINARY_NAME);
            if installed.exists() {
                return Ok(WorkerCommand::new(installed));
            }
        }
        if let Ok(path) = which::which(WORKER_BINARY_NAME) {
            return Ok(WorkerCommand::new(path));
        }
        Err(PoolError::NotInstalled {
            name: WORKER_BINARY_NAME.to_string(),
        })
    }
}

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Result<HighsResult, PoolError>>>>>;

/// One live worker process.
pub struct Worker {
    pub id: u64,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    pending: Pending,
    reader: JoinHandle<()>,
    /// Requests handed to this worker so far (the pool retires the worker
    /// once this reaches the configured solve limit).
    pub solves_started: u32,
    pub busy: bool,
}

impl Worker {
    /// Spawn a worker and wire up its reader tasks.
    pub async fn spawn(
        id: u64,
        command: &WorkerCommand,
        max_solves: u32,
    ) -> Result<Worker, PoolError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .env(MAX_SOLVES_ENV, max_solves.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(PoolError::Spawn)?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        // Forward worker diagnostics into our log stream.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(worker = id, "{}", line);
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let response: WorkerResponse = match ipc::from_line(&line) {
                            Ok(response) => response,
                            Err(err) => {
                                warn!(worker = id, "unparseable response frame: {}", err);
                                continue;
                            }
                        };
                        let sender = reader_pending.lock().unwrap().remove(response.id());
                        let Some(sender) = sender else {
                            warn!(worker = id, id = response.id(), "response for unknown id");
                            continue;
                        };
                        let outcome = match response {
                            WorkerResponse::Result { result, .. } => Ok(result),
                            WorkerResponse::Error { message, .. } => {
                                Err(PoolError::Solver { message })
                            }
                        };
                        let _ = sender.send(outcome);
                    }
                    Ok(None) | Err(_) => break,
                }
            }
            // stdout closed: the worker is gone; fail whatever is left.
            let mut map = reader_pending.lock().unwrap();
            for (_, sender) in map.drain() {
                let _ = sender.send(Err(PoolError::WorkerCrashed {
                    message: "worker exited mid-solve".to_string(),
                }));
            }
        });

        Ok(Worker {
            id,
            child,
            stdin: Some(BufWriter::new(stdin)),
            pending,
            reader,
            solves_started: 0,
            busy: false,
        })
    }

    /// Submit one solve request. The returned receiver resolves with the
    /// worker's response, or with a crash error if the worker dies first.
    pub async fn submit(
        &mut self,
        request_id: String,
        lp: String,
    ) -> Result<oneshot::Receiver<Result<HighsResult, PoolError>>, PoolError> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap()
            .insert(request_id.clone(), tx);

        let frame = ipc::to_line(&WorkerRequest::Solve {
            id: request_id.clone(),
            lp,
        })
        .map_err(|e| PoolError::Ipc(e.to_string()))?;

        let stdin = self.stdin.as_mut().ok_or_else(|| PoolError::Ipc(
            "worker stdin already closed".to_string(),
        ))?;
        let write = async {
            stdin.write_all(frame.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        if let Err(err) = write.await {
            self.pending.lock().unwrap().remove(&request_id);
            return Err(PoolError::WorkerCrashed {
                message: format!("failed to write request: {}", err),
            });
        }

        self.busy = true;
        self.solves_started += 1;
        Ok(rx)
    }

    /// Kill immediately. Used on per-solve timeout, where the worker is
    /// presumed wedged.
    pub async fn kill(mut self) {
        self.reader.abort();
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }

    /// Graceful shutdown: close stdin (the protocol's clean-exit signal),
    /// give the worker a grace period to finish and exit, then kill.
    pub async fn retire(mut self, grace: Duration) {
        drop(self.stdin.take());
        match timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(worker = self.id, ?status, "worker retired");
            }
            Ok(Err(err)) => {
                warn!(worker = self.id, "wait failed during retirement: {}", err);
            }
            Err(_) => {
                warn!(worker = self.id, "worker ignored stdin close; killing");
                let _ = self.child.start_kill();
                let _ = self.child.wait().await;
            }
        }
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_binary_missing_is_clean_error() {
        // The worker binary is normally not on PATH in test environments;
        // either outcome must be panic-free.
        match WorkerCommand::find() {
            Ok(command) => assert!(command.program.ends_with(WORKER_BINARY_NAME)),
            Err(PoolError::NotInstalled { name }) => assert_eq!(name, WORKER_BINARY_NAME),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_crash_fails_pending() {
        // `true` exits immediately without answering.
        let command = WorkerCommand::new("true");
        let mut worker = Worker::spawn(1, &command, 10).await.unwrap();
        let rx = worker.submit("s1".to_string(), "End\n".to_string()).await;
        match rx {
            Ok(rx) => {
                let outcome = rx.await.expect("sender not dropped");
                assert!(matches!(outcome, Err(PoolError::WorkerCrashed { .. })));
            }
            // The pipe may already be closed by the time we write.
            Err(PoolError::WorkerCrashed { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
