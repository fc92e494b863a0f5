//! Pull-model task broker.
//!
//! Callers submit subtree evaluations; workers poll for tasks and post
//! results back. A task moves Pending → Assigned → Completed, or to Failed
//! when its worker reports that it cannot compute it, or is evicted as stale
//! when its lease runs out while Assigned. Completion and failure wake the
//! submitter; eviction does not, every submission waits under its own
//! deadline instead.
//!
//! The pending queue, the assignment map, the waiter map and each worker's
//! slot are locked independently. Nesting always runs in the order worker
//! slot, waiters, queue, assignments.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::board::{Board, Side};
use crate::error::{EngineError, Result};
use crate::search::RemoteEvaluator;

/// A unit of remote work: score `board` searched `depth` plies deep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub board: Board,
    pub depth: u32,
    pub side: Side,
    pub maximizing: bool,
}

#[derive(Debug)]
struct Assignment {
    task: Task,
    worker_id: String,
    assigned_at: Instant,
}

#[derive(Debug)]
struct WorkerSlot {
    max_depth: u32,
    current: Option<String>,
}

/// What a submitter receives: the score, or the worker's failure message.
pub type TaskOutcome = std::result::Result<i32, String>;

/// Where a task currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Assigned { worker_id: String },
    Unknown,
}

pub struct Coordinator {
    workers: RwLock<HashMap<String, Arc<Mutex<WorkerSlot>>>>,
    pending: Mutex<VecDeque<Task>>,
    assigned: Mutex<HashMap<String, Assignment>>,
    waiters: Mutex<HashMap<String, Sender<TaskOutcome>>>,
    lease: Duration,
    wait_timeout: Duration,
}

impl Coordinator {
    /// `lease` bounds how long a task may stay Assigned; `wait_timeout` is
    /// the deadline of every [`Coordinator::submit_evaluation`] call.
    pub fn new(lease: Duration, wait_timeout: Duration) -> Self {
        Coordinator {
            workers: RwLock::new(HashMap::new()),
            pending: Mutex::new(VecDeque::new()),
            assigned: Mutex::new(HashMap::new()),
            waiters: Mutex::new(HashMap::new()),
            lease,
            wait_timeout,
        }
    }

    /// Registers a worker or updates its depth limit.
    pub fn register_worker(&self, worker_id: &str, max_depth: u32) {
        let mut workers = self.workers.write();
        match workers.get(worker_id) {
            Some(slot) => slot.lock().max_depth = max_depth,
            None => {
                workers.insert(
                    worker_id.to_string(),
                    Arc::new(Mutex::new(WorkerSlot {
                        max_depth,
                        current: None,
                    })),
                );
                info!(worker_id, max_depth, "worker registered");
            }
        }
    }

    /// Queues `task` under its own id and returns the channel its outcome
    /// will arrive on. Fails with `DuplicateTask` if the id is already in
    /// flight.
    pub fn enqueue(&self, task: Task) -> Result<Receiver<TaskOutcome>> {
        let (tx, rx) = bounded(1);
        {
            let mut waiters = self.waiters.lock();
            if waiters.contains_key(&task.id) || self.assigned.lock().contains_key(&task.id) {
                return Err(EngineError::DuplicateTask(task.id));
            }
            waiters.insert(task.id.clone(), tx);
        }
        debug!(task_id = %task.id, depth = task.depth, "task queued");
        self.pending.lock().push_back(task);
        Ok(rx)
    }

    /// Queues an evaluation and blocks until a worker reports its score or
    /// the deadline passes.
    pub fn submit_evaluation(&self, board: &Board, depth: u32, side: Side, maximizing: bool) -> Result<i32> {
        let id = Uuid::new_v4().to_string();
        let rx = self.enqueue(Task {
            id: id.clone(),
            board: *board,
            depth,
            side,
            maximizing,
        })?;

        match rx.recv_timeout(self.wait_timeout) {
            Ok(Ok(score)) => Ok(score),
            Ok(Err(message)) => Err(EngineError::unavailable(
                "coordinator",
                format!("task {id} failed: {message}"),
            )),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                self.withdraw(&id);
                Err(EngineError::unavailable(
                    "coordinator",
                    format!("task {id} not completed within {} ms", self.wait_timeout.as_millis()),
                ))
            }
        }
    }

    /// Drops the waiter and any still-pending copy of a task whose submitter
    /// gave up. An Assigned copy is left for its worker to finish.
    fn withdraw(&self, task_id: &str) {
        self.waiters.lock().remove(task_id);
        self.pending.lock().retain(|t| t.id != task_id);
    }

    /// Hands the next suitable Pending task to `worker_id`.
    ///
    /// Returns `None` if the worker is unknown, already holds a task, or no
    /// pending task fits its depth limit.
    pub fn get_next_task(&self, worker_id: &str) -> Option<Task> {
        let slot = match self.workers.read().get(worker_id) {
            Some(slot) => Arc::clone(slot),
            None => {
                warn!(worker_id, "task requested by unregistered worker");
                return None;
            }
        };

        let mut slot = slot.lock();
        if slot.current.is_some() {
            return None;
        }

        let task = {
            let mut pending = self.pending.lock();
            let pos = pending.iter().position(|t| t.depth <= slot.max_depth)?;
            pending.remove(pos)?
        };

        self.assigned.lock().insert(
            task.id.clone(),
            Assignment {
                task: task.clone(),
                worker_id: worker_id.to_string(),
                assigned_at: Instant::now(),
            },
        );
        slot.current = Some(task.id.clone());
        debug!(task_id = %task.id, worker_id, "task assigned");
        Some(task)
    }

    /// Records the score for `task_id` and wakes its submitter.
    ///
    /// A result for an id that is neither Pending nor Assigned changes
    /// nothing and returns `UnknownTask`.
    pub fn submit_result(&self, task_id: &str, score: i32) -> Result<()> {
        self.finish(task_id, Ok(score))?;
        debug!(task_id, score, "task completed");
        Ok(())
    }

    /// Drops `task_id` after its worker could not compute it and hands
    /// `message` to the submitter. Unknown ids return `UnknownTask`.
    pub fn fail_task(&self, task_id: &str, message: &str) -> Result<()> {
        self.finish(task_id, Err(message.to_string()))?;
        warn!(task_id, message, "task failed on worker");
        Ok(())
    }

    fn finish(&self, task_id: &str, outcome: TaskOutcome) -> Result<()> {
        let assignment = self.assigned.lock().remove(task_id);
        match assignment {
            Some(assignment) => self.release_worker(&assignment.worker_id, task_id),
            None => {
                let mut pending = self.pending.lock();
                match pending.iter().position(|t| t.id == task_id) {
                    Some(pos) => {
                        pending.remove(pos);
                    }
                    None => {
                        warn!(task_id, "outcome for unknown task ignored");
                        return Err(EngineError::UnknownTask(task_id.to_string()));
                    }
                }
            }
        }

        match self.waiters.lock().remove(task_id) {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => debug!(task_id, "task finished after its submitter gave up"),
        }
        Ok(())
    }

    fn release_worker(&self, worker_id: &str, task_id: &str) {
        let slot = self.workers.read().get(worker_id).cloned();
        if let Some(slot) = slot {
            let mut slot = slot.lock();
            if slot.current.as_deref() == Some(task_id) {
                slot.current = None;
            }
        }
    }

    /// Evicts Assigned tasks whose lease expired before `now`. Returns the
    /// evicted task ids. Waiters are left to their own deadlines.
    pub fn sweep_stale(&self, now: Instant) -> Vec<String> {
        let mut evicted = Vec::new();
        self.assigned.lock().retain(|id, a| {
            let fresh = now.saturating_duration_since(a.assigned_at) < self.lease;
            if !fresh {
                evicted.push((id.clone(), a.worker_id.clone(), a.task.depth));
            }
            fresh
        });

        evicted
            .into_iter()
            .map(|(id, worker_id, depth)| {
                warn!(task_id = %id, worker_id = %worker_id, depth, "stale task evicted");
                self.release_worker(&worker_id, &id);
                id
            })
            .collect()
    }

    /// Starts a thread that calls [`Coordinator::sweep_stale`] every `interval`.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> Result<Sweeper> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let coordinator = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("kingrow-sweeper".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        coordinator.sweep_stale(Instant::now());
                    }
                    _ => break,
                }
            })?;
        Ok(Sweeper {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn task_state(&self, task_id: &str) -> TaskState {
        if let Some(a) = self.assigned.lock().get(task_id) {
            return TaskState::Assigned {
                worker_id: a.worker_id.clone(),
            };
        }
        if self.pending.lock().iter().any(|t| t.id == task_id) {
            return TaskState::Pending;
        }
        TaskState::Unknown
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn assigned_len(&self) -> usize {
        self.assigned.lock().len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.read().len()
    }
}

impl RemoteEvaluator for Coordinator {
    fn evaluate_subtree(&self, board: &Board, depth: u32, side: Side, maximizing: bool) -> Result<i32> {
        self.submit_evaluation(board, depth, side, maximizing)
    }
}

/// Background stale-task sweep. Stops when dropped.
pub struct Sweeper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
