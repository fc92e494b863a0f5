//! Search observability.
//!
//! Searches report progress to an injected [`SearchObserver`] instead of
//! process-wide counters. [`SearchStats`] holds the per-search counters that
//! end up in the result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::board::Side;
use crate::error::EngineError;

use super::minimax::SearchResult;

/// Receives search events. All methods default to no-ops.
pub trait SearchObserver: Send + Sync {
    fn search_started(&self, _side: Side, _depth: u32) {}

    fn search_finished(&self, _result: &SearchResult, _elapsed: Duration) {}

    /// Called once per remote subtree call, after it returns.
    fn remote_call(&self, _depth: u32, _outcome: Result<i32, &EngineError>, _elapsed: Duration) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SearchObserver for NullObserver {}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SearchObserver for TracingObserver {
    fn search_started(&self, side: Side, depth: u32) {
        debug!(?side, depth, "search started");
    }

    fn search_finished(&self, result: &SearchResult, elapsed: Duration) {
        info!(
            action = %result.action.as_ref().map(|a| a.to_string()).unwrap_or_else(|| "none".into()),
            score = result.score,
            nodes = result.nodes,
            remote_calls = result.remote_calls,
            elapsed_ms = elapsed.as_millis() as u64,
            "search finished"
        );
    }

    fn remote_call(&self, depth: u32, outcome: Result<i32, &EngineError>, elapsed: Duration) {
        match outcome {
            Ok(score) => debug!(depth, score, elapsed_ms = elapsed.as_millis() as u64, "remote subtree"),
            Err(e) => warn!(depth, error = %e, "remote subtree failed"),
        }
    }
}

/// Counters for one search call. Shared by every branch of that search.
#[derive(Debug, Default)]
pub struct SearchStats {
    nodes: AtomicU64,
    remote_calls: AtomicU64,
    remote_failures: AtomicU64,
}

impl SearchStats {
    pub fn node(&self) {
        self.nodes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remote(&self, ok: bool) {
        self.remote_calls.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.remote_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    pub fn remote_calls(&self) -> u64 {
        self.remote_calls.load(Ordering::Relaxed)
    }

    pub fn remote_failures(&self) -> u64 {
        self.remote_failures.load(Ordering::Relaxed)
    }
}
