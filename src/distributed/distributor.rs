//! Client side of remote subtree evaluation.
//!
//! Holds one lazily opened connection per configured worker address and
//! picks a worker per call through the [`PerformanceTracker`]. A failed
//! connection is dropped and reopened on the next call that selects it;
//! the failed call itself is not retried.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::board::{Board, Side};
use crate::error::{EngineError, Result};
use crate::protocol::{Request, Response, WireBoard};
use crate::search::RemoteEvaluator;

use super::rpc::RpcClient;
use super::tracker::{PerformanceSample, PerformanceTracker};

struct Endpoint {
    addr: String,
    client: Mutex<Option<Arc<RpcClient>>>,
}

impl Endpoint {
    fn connection(&self, timeout: Duration) -> Result<Arc<RpcClient>> {
        let mut slot = self.client.lock();
        if let Some(client) = slot.as_ref() {
            if client.is_alive() {
                return Ok(Arc::clone(client));
            }
            debug!(addr = %self.addr, "reconnecting to worker");
        }
        let client = Arc::new(RpcClient::connect(&self.addr, timeout)?);
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    fn discard(&self, client: &Arc<RpcClient>) {
        let mut slot = self.client.lock();
        if slot.as_ref().is_some_and(|c| Arc::ptr_eq(c, client)) {
            *slot = None;
        }
    }
}

pub struct MinimaxDistributor {
    endpoints: Vec<Endpoint>,
    tracker: PerformanceTracker,
    concurrency: usize,
    timeout: Duration,
}

impl MinimaxDistributor {
    /// Fails with `NoWorkers` when `addrs` is empty. No connection is opened
    /// until the first call.
    pub fn new(addrs: &[String], concurrency: usize, timeout: Duration) -> Result<Self> {
        if addrs.is_empty() {
            return Err(EngineError::NoWorkers);
        }
        let endpoints = addrs
            .iter()
            .map(|addr| Endpoint {
                addr: addr.clone(),
                client: Mutex::new(None),
            })
            .collect();
        Ok(MinimaxDistributor {
            endpoints,
            tracker: PerformanceTracker::new(addrs.iter().cloned()),
            concurrency: concurrency.max(1),
            timeout,
        })
    }

    /// Minimax score of `board` searched `depth` plies on the selected worker.
    pub fn evaluate(&self, board: &Board, depth: u32, side: Side, maximizing: bool) -> Result<i32> {
        let request = Request::MinimaxSearch {
            board: WireBoard::from(board),
            depth,
            side,
            is_maximizing: maximizing,
        };
        match self.call(request)? {
            Response::Score { score } => Ok(score),
            other => Err(unexpected("minimax_search", &other)),
        }
    }

    /// Static evaluation on the selected worker.
    pub fn evaluate_position(&self, board: &Board, side: Side, maximizing: bool) -> Result<i32> {
        let request = Request::EvaluatePosition {
            board: WireBoard::from(board),
            side,
            is_maximizing: maximizing,
        };
        match self.call(request)? {
            Response::Evaluation { success: true, score } => Ok(score),
            other => Err(unexpected("evaluate_position", &other)),
        }
    }

    pub fn performance(&self) -> Vec<PerformanceSample> {
        self.tracker.snapshot()
    }

    fn call(&self, request: Request) -> Result<Response> {
        let in_flight = self.tracker.acquire(self.concurrency).ok_or(EngineError::NoWorkers)?;
        let endpoint = &self.endpoints[in_flight.index()];
        let method = request.method();

        let client = match endpoint.connection(self.timeout) {
            Ok(client) => client,
            Err(e) => {
                warn!(addr = %endpoint.addr, error = %e, "worker connection failed");
                return Err(e);
            }
        };

        match client.call(request, self.timeout) {
            Ok(response) => {
                in_flight.finish(true);
                Ok(response)
            }
            Err(e) => {
                if matches!(e, EngineError::WorkerUnavailable { .. }) {
                    endpoint.discard(&client);
                }
                warn!(addr = %endpoint.addr, method, error = %e, "remote call failed");
                Err(e)
            }
        }
    }
}

fn unexpected(method: &str, response: &Response) -> EngineError {
    EngineError::Protocol(format!("unexpected response to {method}: {response:?}"))
}

impl RemoteEvaluator for MinimaxDistributor {
    fn evaluate_subtree(&self, board: &Board, depth: u32, side: Side, maximizing: bool) -> Result<i32> {
        self.evaluate(board, depth, side, maximizing)
    }
}
