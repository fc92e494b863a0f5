//! Worker performance tracking and selection.
//!
//! Keeps, per worker address, the number of requests in flight and a rolling
//! average of recent latencies. The numbers only steer selection; nothing
//! else depends on them being exact.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Number of successful calls kept for the rolling average.
const WINDOW: usize = 16;

#[derive(Debug, Default)]
struct WorkerPerf {
    active: usize,
    samples: VecDeque<Duration>,
    completed: u64,
    failures: u64,
}

impl WorkerPerf {
    fn average(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }
}

/// A point-in-time view of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceSample {
    pub addr: String,
    pub active: usize,
    pub avg_latency: Option<Duration>,
    pub completed: u64,
    pub failures: u64,
}

/// Load and latency per worker, in configuration order.
#[derive(Debug)]
pub struct PerformanceTracker {
    workers: Mutex<Vec<(String, WorkerPerf)>>,
}

impl PerformanceTracker {
    pub fn new<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let workers = addrs
            .into_iter()
            .map(|a| (a.into(), WorkerPerf::default()))
            .collect();
        PerformanceTracker {
            workers: Mutex::new(workers),
        }
    }

    /// Picks a worker and counts a request against it.
    ///
    /// Prefers workers below `cap` active requests: fewest active first, then
    /// lowest average latency (untried workers count as zero), then
    /// configuration order. If every worker is at the cap, the least loaded
    /// one is chosen by the same ordering. Returns `None` only when no
    /// workers are known.
    pub fn acquire(&self, cap: usize) -> Option<InFlight<'_>> {
        let mut workers = self.workers.lock();
        let key = |(i, (_, perf)): &(usize, &(String, WorkerPerf))| {
            (perf.active, perf.average().unwrap_or(Duration::ZERO), *i)
        };

        let under_cap = workers
            .iter()
            .enumerate()
            .filter(|(_, (_, perf))| perf.active < cap)
            .min_by_key(|entry| key(entry))
            .map(|(i, _)| i);
        let chosen = under_cap.or_else(|| {
            workers
                .iter()
                .enumerate()
                .min_by_key(|entry| key(entry))
                .map(|(i, _)| i)
        })?;

        workers[chosen].1.active += 1;
        Some(InFlight {
            tracker: self,
            index: chosen,
            addr: workers[chosen].0.clone(),
            started: Instant::now(),
            finished: false,
        })
    }

    fn finish(&self, index: usize, latency: Duration, ok: bool) {
        let mut workers = self.workers.lock();
        let perf = &mut workers[index].1;
        perf.active = perf.active.saturating_sub(1);
        if ok {
            perf.completed += 1;
            if perf.samples.len() == WINDOW {
                perf.samples.pop_front();
            }
            perf.samples.push_back(latency);
        } else {
            perf.failures += 1;
        }
    }

    pub fn snapshot(&self) -> Vec<PerformanceSample> {
        self.workers
            .lock()
            .iter()
            .map(|(addr, perf)| PerformanceSample {
                addr: addr.clone(),
                active: perf.active,
                avg_latency: perf.average(),
                completed: perf.completed,
                failures: perf.failures,
            })
            .collect()
    }
}

/// One request counted against a worker. Dropping it without calling
/// [`InFlight::finish`] records a failure.
pub struct InFlight<'a> {
    tracker: &'a PerformanceTracker,
    index: usize,
    addr: String,
    started: Instant,
    finished: bool,
}

impl InFlight<'_> {
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn finish(mut self, ok: bool) {
        self.finished = true;
        self.tracker.finish(self.index, self.started.elapsed(), ok);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.tracker.finish(self.index, self.started.elapsed(), false);
        }
    }
}
