//! Polling worker attached to a coordinator.
//!
//! Registers once per connection, then repeatedly asks for a task, searches
//! it locally and posts the score back. A task it cannot compute is reported
//! as failed so its submitter hears about it at once. Idle polls back off by the poll
//! interval plus a little jitter so a fleet of pullers does not hit the
//! coordinator in lockstep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::board::Board;
use crate::error::{EngineError, Result};
use crate::protocol::{Request, Response, TaskSpec};
use crate::search::Searcher;

use super::rpc::RpcClient;

/// Settings for one pull worker.
#[derive(Debug, Clone)]
pub struct PullConfig {
    pub worker_id: String,
    pub coordinator: String,
    pub max_depth: u32,
    pub poll_interval: Duration,
    pub rpc_timeout: Duration,
}

pub struct PullWorker {
    config: PullConfig,
    searcher: Searcher,
    client: Option<RpcClient>,
    rng: SmallRng,
    completed: u64,
}

impl PullWorker {
    pub fn new(config: PullConfig, searcher: Searcher) -> Self {
        PullWorker {
            config,
            searcher,
            client: None,
            rng: SmallRng::from_entropy(),
            completed: 0,
        }
    }

    /// Number of results accepted by the coordinator so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Runs until `stop` is set. Connection failures are logged and retried
    /// after the poll interval.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!(worker_id = %self.config.worker_id, coordinator = %self.config.coordinator, "pull worker started");
        while !stop.load(Ordering::Acquire) {
            match self.poll_once() {
                Ok(true) => {}
                Ok(false) => self.idle(),
                Err(e) => {
                    warn!(worker_id = %self.config.worker_id, error = %e, "poll failed");
                    if matches!(e, EngineError::WorkerUnavailable { .. }) {
                        self.client = None;
                    }
                    self.idle();
                }
            }
        }
        info!(worker_id = %self.config.worker_id, completed = self.completed, "pull worker stopped");
    }

    /// Fetches and completes at most one task. Returns whether a task was
    /// processed, successfully or by reporting its failure.
    pub fn poll_once(&mut self) -> Result<bool> {
        let request = Request::GetTask {
            worker_id: self.config.worker_id.clone(),
        };
        let task = match self.call(request)? {
            Response::Task { task: Some(task) } => task,
            Response::Task { task: None } => return Ok(false),
            other => return Err(EngineError::Protocol(format!("unexpected response to get_task: {other:?}"))),
        };

        let score = match self.compute(&task) {
            Ok(score) => score,
            Err(e) => {
                self.report_failure(&task.task_id, &e)?;
                return Ok(true);
            }
        };
        let request = Request::SubmitResult {
            task_id: task.task_id.clone(),
            score,
        };
        match self.call(request)? {
            Response::Ack { success: true } => {
                self.completed += 1;
                debug!(task_id = %task.task_id, score, "result accepted");
            }
            Response::Ack { success: false } => {
                debug!(task_id = %task.task_id, "result rejected, task no longer assigned");
            }
            other => return Err(EngineError::Protocol(format!("unexpected response to submit_result: {other:?}"))),
        }
        Ok(true)
    }

    fn compute(&self, task: &TaskSpec) -> Result<i32> {
        if task.depth > self.config.max_depth {
            return Err(EngineError::Protocol(format!(
                "depth {} exceeds this worker's limit of {}",
                task.depth, self.config.max_depth
            )));
        }
        let board = Board::try_from(task.board)?;
        self.searcher
            .subtree_score(&board, task.depth, task.side, task.is_maximizing)
    }

    fn report_failure(&mut self, task_id: &str, error: &EngineError) -> Result<()> {
        warn!(worker_id = %self.config.worker_id, task_id, error = %error, "task failed");
        let request = Request::ReportFailure {
            task_id: task_id.to_string(),
            message: error.to_string(),
        };
        match self.call(request)? {
            Response::Ack { success } => {
                debug!(task_id, success, "failure reported");
                Ok(())
            }
            other => Err(EngineError::Protocol(format!("unexpected response to report_failure: {other:?}"))),
        }
    }

    fn call(&mut self, request: Request) -> Result<Response> {
        if self.client.as_ref().map_or(true, |c| !c.is_alive()) {
            self.client = Some(self.connect()?);
        }
        match &self.client {
            Some(client) => client.call(request, self.config.rpc_timeout),
            None => Err(EngineError::unavailable(&self.config.coordinator, "not connected")),
        }
    }

    fn connect(&self) -> Result<RpcClient> {
        let client = RpcClient::connect(&self.config.coordinator, self.config.rpc_timeout)?;
        let request = Request::RegisterWorker {
            worker_id: self.config.worker_id.clone(),
            max_depth: self.config.max_depth,
        };
        match client.call(request, self.config.rpc_timeout)? {
            Response::Ack { success: true } => {
                info!(worker_id = %self.config.worker_id, max_depth = self.config.max_depth, "registered with coordinator");
                Ok(client)
            }
            other => Err(EngineError::Protocol(format!("registration refused: {other:?}"))),
        }
    }

    fn idle(&mut self) {
        let base = self.config.poll_interval.as_millis() as u64;
        let jitter = self.rng.gen_range(0..=base / 4 + 1);
        thread::sleep(Duration::from_millis(base + jitter));
    }

    /// Runs the worker on its own thread.
    pub fn spawn(mut self) -> Result<PullHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name(format!("kingrow-pull-{}", self.config.worker_id))
                .spawn(move || {
                    self.run(&stop);
                    self.completed
                })?
        };
        Ok(PullHandle {
            stop,
            handle: Some(handle),
        })
    }
}

/// A pull worker running in the background.
pub struct PullHandle {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl PullHandle {
    /// Stops the worker and returns how many results it got accepted.
    pub fn stop(mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        self.handle.take().and_then(|h| h.join().ok()).unwrap_or(0)
    }
}

impl Drop for PullHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
