//! Fixed-depth minimax with parallel fan-out and a distribution threshold.
//!
//! Every node copies the board once per child, so sibling branches never
//! share state and may run concurrently on the rayon pool. The parent waits
//! for all children and reduces with max or min; the reduction does not
//! depend on the order in which children finish.
//!
//! With a remote evaluator attached, the plies above `distribution_ply` are
//! expanded up front into a [`Frontier`], and every node that reaches the
//! threshold becomes one remote job for its whole subtree. Jobs are waited
//! on from dedicated threads, never from the compute pool, so a worker
//! living in the same process always has pool threads to run on.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::board::{Board, Side};
use crate::error::{EngineError, Result};
use crate::eval::{evaluate, EvalParams};
use crate::movegen::{apply_action, legal_actions, Action};

use super::observer::{NullObserver, SearchObserver, SearchStats};

/// Most threads one search spends waiting on remote subtrees.
pub const REMOTE_WAITERS: usize = 64;

/// Evaluates a subtree somewhere else: another process, or a queue that
/// workers drain.
pub trait RemoteEvaluator: Send + Sync {
    /// Returns the minimax score of `board` searched `depth` plies deep with
    /// `side` to move. The score is from the maximizing player's point of
    /// view, which is `side` when `maximizing` is true and its opponent
    /// otherwise.
    fn evaluate_subtree(&self, board: &Board, depth: u32, side: Side, maximizing: bool)
        -> Result<i32>;
}

/// What a node does when its remote call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Log the failure and expand the subtree locally.
    #[default]
    Local,
    /// Abort the search with the error.
    Fail,
}

/// Parameters fixed for the lifetime of a [`Searcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    pub depth: u32,
    pub distribution_ply: u32,
    pub eval: EvalParams,
    pub fallback: FallbackPolicy,
    /// Rayon pool size; 0 uses the global pool.
    pub threads: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            depth: 6,
            distribution_ply: 2,
            eval: EvalParams::default(),
            fallback: FallbackPolicy::default(),
            threads: 0,
        }
    }
}

/// Outcome of a root search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// `None` when the side to move has no legal action.
    pub action: Option<Action>,
    pub score: i32,
    pub nodes: u64,
    pub remote_calls: u64,
}

/// Per-call search state threaded through the recursion.
struct Ctx<'a> {
    max_depth: u32,
    perspective: Side,
    stats: &'a SearchStats,
}

/// Minimax searcher.
pub struct Searcher {
    config: SearchConfig,
    remote: Option<Arc<dyn RemoteEvaluator>>,
    observer: Arc<dyn SearchObserver>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Searcher {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let pool = if config.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .thread_name(|i| format!("kingrow-search-{i}"))
                .build()
                .map_err(|e| EngineError::Config(format!("search thread pool: {e}")))?;
            Some(Arc::new(pool))
        } else {
            None
        };
        Ok(Searcher {
            config,
            remote: None,
            observer: Arc::new(NullObserver),
            pool,
        })
    }

    /// Attaches a remote evaluator used past the distribution threshold.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteEvaluator>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    /// Searches `board` with `side` to move and returns the best action.
    /// Ties go to the earliest action in generation order.
    pub fn best_action(&self, board: &Board, side: Side) -> Result<SearchResult> {
        self.best_action_at_depth(board, side, self.config.depth)
    }

    /// Like [`Searcher::best_action`] with the configured depth replaced.
    pub fn best_action_at_depth(&self, board: &Board, side: Side, depth: u32) -> Result<SearchResult> {
        let started = Instant::now();
        let depth = depth.max(1);
        self.observer.search_started(side, depth);

        let stats = SearchStats::default();
        let ctx = Ctx {
            max_depth: depth,
            perspective: side,
            stats: &stats,
        };

        let actions = legal_actions(board, side);
        if actions.is_empty() {
            let result = SearchResult {
                action: None,
                score: evaluate(board, side, &self.config.eval),
                nodes: 1,
                remote_calls: 0,
            };
            self.observer.search_finished(&result, started.elapsed());
            return Ok(result);
        }

        stats.node();
        let scores = match &self.remote {
            Some(remote) => self.distributed_children(remote.as_ref(), &ctx, board, &actions, depth - 1, side)?,
            None => self.install(|| {
                actions
                    .par_iter()
                    .map(|action| {
                        let child = apply_action(board, action);
                        self.node(&ctx, &child, depth - 1, side.opponent())
                    })
                    .collect::<Result<Vec<i32>>>()
            })?,
        };

        let mut best = 0;
        for (i, &score) in scores.iter().enumerate() {
            if score > scores[best] {
                best = i;
            }
        }

        let result = SearchResult {
            action: Some(actions[best].clone()),
            score: scores[best],
            nodes: stats.nodes(),
            remote_calls: stats.remote_calls(),
        };
        self.observer.search_finished(&result, started.elapsed());
        Ok(result)
    }

    /// Minimax score of `board` searched `depth` plies with `side` to move,
    /// from the maximizing player's perspective. Never calls out remotely;
    /// this is what a worker runs for a shipped subtree.
    pub fn subtree_score(&self, board: &Board, depth: u32, side: Side, maximizing: bool) -> Result<i32> {
        let perspective = if maximizing { side } else { side.opponent() };
        let stats = SearchStats::default();
        let ctx = Ctx {
            max_depth: depth,
            perspective,
            stats: &stats,
        };
        self.install(|| self.node(&ctx, board, depth, side))
    }

    fn node(&self, ctx: &Ctx<'_>, board: &Board, remaining: u32, to_move: Side) -> Result<i32> {
        ctx.stats.node();
        if remaining == 0 {
            return Ok(evaluate(board, ctx.perspective, &self.config.eval));
        }
        self.expand(ctx, board, remaining, to_move)
    }

    /// Searches the children of a node with `remaining > 0` on the pool.
    fn expand(&self, ctx: &Ctx<'_>, board: &Board, remaining: u32, to_move: Side) -> Result<i32> {
        let actions = legal_actions(board, to_move);
        if actions.is_empty() {
            if legal_actions(board, to_move.opponent()).is_empty() {
                return Ok(evaluate(board, ctx.perspective, &self.config.eval));
            }
            // A blocked side passes; the evaluator decides how bad that is.
            return self.node(ctx, board, remaining - 1, to_move.opponent());
        }

        let scores = actions
            .par_iter()
            .map(|action| {
                let child = apply_action(board, action);
                self.node(ctx, &child, remaining - 1, to_move.opponent())
            })
            .collect::<Result<Vec<i32>>>()?;

        Ok(reduce(&scores, to_move == ctx.perspective))
    }

    /// Scores the root's children when subtrees past the threshold go remote.
    fn distributed_children(
        &self,
        remote: &dyn RemoteEvaluator,
        ctx: &Ctx<'_>,
        board: &Board,
        actions: &[Action],
        remaining: u32,
        side: Side,
    ) -> Result<Vec<i32>> {
        let mut jobs = Vec::new();
        let children: Vec<Frontier> = actions
            .iter()
            .map(|action| {
                let child = apply_action(board, action);
                self.frontier(ctx, &child, remaining, side.opponent(), &mut jobs)
            })
            .collect();

        let scores = self.run_remote(remote, ctx, &jobs)?;
        Ok(children.iter().map(|c| c.score(&scores)).collect())
    }

    /// Expands the plies above the threshold, queueing one job per subtree
    /// that reaches it.
    fn frontier(
        &self,
        ctx: &Ctx<'_>,
        board: &Board,
        remaining: u32,
        to_move: Side,
        jobs: &mut Vec<RemoteJob>,
    ) -> Frontier {
        ctx.stats.node();
        if remaining == 0 {
            return Frontier::Scored(evaluate(board, ctx.perspective, &self.config.eval));
        }

        let ply = ctx.max_depth - remaining;
        if ply >= self.config.distribution_ply.max(1) {
            jobs.push(RemoteJob {
                board: *board,
                remaining,
                to_move,
                ply,
            });
            return Frontier::Remote(jobs.len() - 1);
        }

        let actions = legal_actions(board, to_move);
        if actions.is_empty() {
            if legal_actions(board, to_move.opponent()).is_empty() {
                return Frontier::Scored(evaluate(board, ctx.perspective, &self.config.eval));
            }
            return self.frontier(ctx, board, remaining - 1, to_move.opponent(), jobs);
        }

        let children = actions
            .iter()
            .map(|action| {
                let child = apply_action(board, action);
                self.frontier(ctx, &child, remaining - 1, to_move.opponent(), jobs)
            })
            .collect();
        Frontier::Node {
            maximizing: to_move == ctx.perspective,
            children,
        }
    }

    /// Resolves every job to a score, applying the fallback policy to the
    /// ones whose remote call failed.
    fn run_remote(&self, remote: &dyn RemoteEvaluator, ctx: &Ctx<'_>, jobs: &[RemoteJob]) -> Result<Vec<i32>> {
        let mut scores = Vec::with_capacity(jobs.len());
        let mut failed = Vec::new();
        for (i, outcome) in self.wait_remote(remote, ctx, jobs)?.into_iter().enumerate() {
            match outcome {
                Ok(score) => scores.push(score),
                Err(e) if self.config.fallback == FallbackPolicy::Fail => return Err(e),
                Err(e) => {
                    let job = &jobs[i];
                    warn!(ply = job.ply, remaining = job.remaining, error = %e, "remote evaluation failed, searching locally");
                    failed.push(i);
                    scores.push(0);
                }
            }
        }

        if !failed.is_empty() {
            let local = self.install(|| {
                failed
                    .par_iter()
                    .map(|&i| {
                        let job = &jobs[i];
                        self.expand(ctx, &job.board, job.remaining, job.to_move)
                    })
                    .collect::<Result<Vec<i32>>>()
            })?;
            for (i, score) in failed.into_iter().zip(local) {
                scores[i] = score;
            }
        }
        Ok(scores)
    }

    /// Issues the remote calls from up to [`REMOTE_WAITERS`] scoped threads
    /// draining a shared job queue. Outcomes come back in job order.
    fn wait_remote(
        &self,
        remote: &dyn RemoteEvaluator,
        ctx: &Ctx<'_>,
        jobs: &[RemoteJob],
    ) -> Result<Vec<Result<i32>>> {
        let slots: Vec<Mutex<Option<Result<i32>>>> = jobs.iter().map(|_| Mutex::new(None)).collect();
        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 0..jobs.len() {
            let _ = tx.send(i);
        }
        drop(tx);

        let outcomes = &slots;
        thread::scope(|scope| -> Result<()> {
            for n in 0..jobs.len().min(REMOTE_WAITERS) {
                let rx = rx.clone();
                thread::Builder::new()
                    .name(format!("kingrow-remote-{n}"))
                    .spawn_scoped(scope, move || {
                        for i in rx.iter() {
                            let job = &jobs[i];
                            let maximizing = job.to_move == ctx.perspective;
                            let started = Instant::now();
                            let outcome = remote.evaluate_subtree(&job.board, job.remaining, job.to_move, maximizing);
                            ctx.stats.remote(outcome.is_ok());
                            self.observer
                                .remote_call(job.remaining, outcome.as_ref().copied(), started.elapsed());
                            *outcomes[i].lock() = Some(outcome);
                        }
                    })?;
            }
            Ok(())
        })?;

        Ok(slots
            .into_iter()
            .map(|slot| {
                slot.into_inner()
                    .unwrap_or_else(|| Err(EngineError::Protocol("remote job was never issued".into())))
            })
            .collect())
    }
}

/// The tree above the distribution threshold.
enum Frontier {
    Scored(i32),
    /// Index of the job whose score stands here.
    Remote(usize),
    Node { maximizing: bool, children: Vec<Frontier> },
}

impl Frontier {
    fn score(&self, remote: &[i32]) -> i32 {
        match self {
            Frontier::Scored(score) => *score,
            Frontier::Remote(i) => remote[*i],
            Frontier::Node { maximizing, children } => {
                let scores: Vec<i32> = children.iter().map(|c| c.score(remote)).collect();
                reduce(&scores, *maximizing)
            }
        }
    }
}

/// A subtree waiting for a remote score.
struct RemoteJob {
    board: Board,
    remaining: u32,
    to_move: Side,
    ply: u32,
}

/// Max for the maximizing side, min otherwise. `scores` is never empty.
pub fn reduce(scores: &[i32], maximizing: bool) -> i32 {
    let it = scores.iter().copied();
    if maximizing {
        it.max().unwrap_or(i32::MIN)
    } else {
        it.min().unwrap_or(i32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use crate::board::{Piece, CELL_COUNT};

    fn searcher(depth: u32) -> Searcher {
        Searcher::new(SearchConfig {
            depth,
            ..SearchConfig::default()
        })
        .unwrap()
    }

    /// Plain sequential minimax visiting children in a shuffled order.
    fn reference(board: &Board, depth: u32, to_move: Side, perspective: Side, rng: &mut SmallRng) -> i32 {
        let params = EvalParams::default();
        if depth == 0 {
            return evaluate(board, perspective, &params);
        }
        let mut actions = legal_actions(board, to_move);
        if actions.is_empty() {
            if legal_actions(board, to_move.opponent()).is_empty() {
                return evaluate(board, perspective, &params);
            }
            return reference(board, depth - 1, to_move.opponent(), perspective, rng);
        }
        actions.shuffle(rng);
        let mut best: Option<i32> = None;
        for action in &actions {
            let child = apply_action(board, action);
            let s = reference(&child, depth - 1, to_move.opponent(), perspective, rng);
            best = Some(match best {
                None => s,
                Some(b) if to_move == perspective => b.max(s),
                Some(b) => b.min(s),
            });
        }
        best.unwrap()
    }

    fn random_position(rng: &mut SmallRng) -> Board {
        let mut board = Board::empty();
        for i in 0..CELL_COUNT {
            let roll: u32 = rng.gen_range(0..10);
            let piece = match roll {
                0 | 1 => Piece::WhitePawn,
                2 | 3 => Piece::BlackPawn,
                4 => Piece::WhiteKing,
                5 => Piece::BlackKing,
                _ => Piece::Empty,
            };
            board.set(i, piece).unwrap();
        }
        board
    }

    #[test]
    fn depth_zero_subtree_is_static_eval() {
        let s = searcher(3);
        let board = Board::initial();
        for side in [Side::White, Side::Black] {
            assert_eq!(
                s.subtree_score(&board, 0, side, true).unwrap(),
                evaluate(&board, side, &EvalParams::default())
            );
        }
    }

    #[test]
    fn reduction_is_order_independent() {
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..200 {
            let len = rng.gen_range(1..12);
            let mut scores: Vec<i32> = (0..len).map(|_| rng.gen_range(-500..500)).collect();
            let max = reduce(&scores, true);
            let min = reduce(&scores, false);
            for _ in 0..10 {
                scores.shuffle(&mut rng);
                assert_eq!(reduce(&scores, true), max);
                assert_eq!(reduce(&scores, false), min);
            }
        }
    }

    #[test]
    fn parallel_search_matches_shuffled_sequential_search() {
        let mut rng = SmallRng::seed_from_u64(3);
        let s = searcher(3);
        for _ in 0..25 {
            let board = random_position(&mut rng);
            for side in [Side::White, Side::Black] {
                let expected = reference(&board, 3, side, side, &mut rng);
                assert_eq!(s.subtree_score(&board, 3, side, true).unwrap(), expected, "{board:?}");
            }
        }
    }

    #[test]
    fn initial_depth_one_picks_forward_plain_move() {
        let s = searcher(1);
        let result = s.best_action(&Board::initial(), Side::White).unwrap();
        let Some(Action::Move(mv)) = result.action else {
            panic!("expected a plain move, got {:?}", result.action);
        };
        assert!((20..24).contains(&mv.from));
        assert!((16..20).contains(&mv.to), "white must move toward row 0");
    }

    #[test]
    fn takes_the_free_piece() {
        let mut board = Board::empty();
        board.set(0, Piece::WhitePawn).unwrap();
        board.set(4, Piece::BlackPawn).unwrap();
        board.set(30, Piece::BlackPawn).unwrap();
        let result = searcher(2).best_action(&board, Side::White).unwrap();
        assert!(result.action.unwrap().is_capture());
    }

    #[test]
    fn no_legal_action_yields_none() {
        let mut board = Board::empty();
        board.set(0, Piece::WhitePawn).unwrap();
        board.set(31, Piece::BlackPawn).unwrap();
        let result = searcher(3).best_action(&board, Side::White).unwrap();
        assert!(result.action.is_none());
    }

    #[test]
    fn depth_override_matches_configured_depth() {
        let board = Board::initial();
        let a = searcher(5).best_action_at_depth(&board, Side::White, 2).unwrap();
        let b = searcher(2).best_action(&board, Side::White).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dedicated_pool_gives_same_result() {
        let board = Board::initial();
        let pooled = Searcher::new(SearchConfig {
            depth: 3,
            threads: 2,
            ..SearchConfig::default()
        })
        .unwrap();
        let a = pooled.best_action(&board, Side::Black).unwrap();
        let b = searcher(3).best_action(&board, Side::Black).unwrap();
        assert_eq!(a.action, b.action);
        assert_eq!(a.score, b.score);
    }

    /// Remote stand-in that answers with a local search and counts calls.
    struct LocalRemote {
        inner: Searcher,
        calls: AtomicU64,
        depths: parking_lot::Mutex<Vec<u32>>,
    }

    impl RemoteEvaluator for LocalRemote {
        fn evaluate_subtree(&self, board: &Board, depth: u32, side: Side, maximizing: bool) -> Result<i32> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.depths.lock().push(depth);
            self.inner.subtree_score(board, depth, side, maximizing)
        }
    }

    struct FailingRemote;

    impl RemoteEvaluator for FailingRemote {
        fn evaluate_subtree(&self, _: &Board, _: u32, _: Side, _: bool) -> Result<i32> {
            Err(EngineError::unavailable("test", "down"))
        }
    }

    fn distributed(depth: u32, ply: u32, fallback: FallbackPolicy) -> SearchConfig {
        SearchConfig {
            depth,
            distribution_ply: ply,
            fallback,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn threshold_ships_whole_subtrees_with_remaining_depth() {
        let remote = Arc::new(LocalRemote {
            inner: searcher(0),
            calls: AtomicU64::new(0),
            depths: parking_lot::Mutex::new(Vec::new()),
        });
        let s = Searcher::new(distributed(4, 2, FallbackPolicy::Fail))
            .unwrap()
            .with_remote(remote.clone());
        let board = Board::initial();

        let result = s.best_action(&board, Side::White).unwrap();
        let local = searcher(4).best_action(&board, Side::White).unwrap();
        assert_eq!(result.score, local.score);
        assert_eq!(result.action, local.action);

        // Plies 0 and 1 expand locally: 7 white moves, each answered by 7 black moves.
        assert_eq!(remote.calls.load(Ordering::Relaxed), 49);
        assert_eq!(result.remote_calls, 49);
        assert!(remote.depths.lock().iter().all(|&d| d == 2));
    }

    /// Remote stand-in that holds every call for a while and records how
    /// many were in flight at once.
    struct SlowRemote {
        inner: Searcher,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RemoteEvaluator for SlowRemote {
        fn evaluate_subtree(&self, board: &Board, depth: u32, side: Side, maximizing: bool) -> Result<i32> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            let score = self.inner.subtree_score(board, depth, side, maximizing);
            self.active.fetch_sub(1, Ordering::SeqCst);
            score
        }
    }

    fn single_threaded(depth: u32) -> SearchConfig {
        SearchConfig {
            depth,
            threads: 1,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn remote_waits_overlap_beyond_a_single_thread_pool() {
        let remote = Arc::new(SlowRemote {
            inner: Searcher::new(single_threaded(1)).unwrap(),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let s = Searcher::new(SearchConfig {
            distribution_ply: 2,
            fallback: FallbackPolicy::Fail,
            ..single_threaded(4)
        })
        .unwrap()
        .with_remote(remote.clone());

        let board = Board::initial();
        let result = s.best_action(&board, Side::White).unwrap();
        let local = searcher(4).best_action(&board, Side::White).unwrap();
        assert_eq!(result.action, local.action);
        assert_eq!(result.score, local.score);
        assert_eq!(result.remote_calls, 49);
        assert!(
            remote.peak.load(Ordering::SeqCst) > 1,
            "remote calls were serialized behind the search pool"
        );
    }

    #[test]
    fn remote_waits_leave_the_search_pool_free() {
        // The remote side answers from its own thread but searches on the
        // very pool the caller uses, like a worker hosted in-process.
        let pool_searcher = Arc::new(Searcher::new(single_threaded(1)).unwrap());
        struct SharedPool(Arc<Searcher>);
        impl RemoteEvaluator for SharedPool {
            fn evaluate_subtree(&self, board: &Board, depth: u32, side: Side, maximizing: bool) -> Result<i32> {
                let searcher = Arc::clone(&self.0);
                let board = *board;
                thread::spawn(move || searcher.subtree_score(&board, depth, side, maximizing))
                    .join()
                    .unwrap()
            }
        }

        let mut caller = Searcher::new(SearchConfig {
            distribution_ply: 1,
            fallback: FallbackPolicy::Fail,
            ..single_threaded(3)
        })
        .unwrap();
        caller.pool = pool_searcher.pool.clone();
        let caller = caller.with_remote(Arc::new(SharedPool(Arc::clone(&pool_searcher))));

        let board = Board::initial();
        let result = caller.best_action(&board, Side::Black).unwrap();
        let local = searcher(3).best_action(&board, Side::Black).unwrap();
        assert_eq!(result.score, local.score);
        assert_eq!(result.remote_calls, 7);
    }

    #[test]
    fn failed_remote_falls_back_locally() {
        let s = Searcher::new(distributed(3, 1, FallbackPolicy::Local))
            .unwrap()
            .with_remote(Arc::new(FailingRemote));
        let board = Board::initial();
        let result = s.best_action(&board, Side::White).unwrap();
        let local = searcher(3).best_action(&board, Side::White).unwrap();
        assert_eq!(result.score, local.score);
    }

    #[test]
    fn failed_remote_aborts_when_configured() {
        let s = Searcher::new(distributed(3, 1, FallbackPolicy::Fail))
            .unwrap()
            .with_remote(Arc::new(FailingRemote));
        let err = s.best_action(&Board::initial(), Side::White).unwrap_err();
        assert!(matches!(err, EngineError::WorkerUnavailable { .. }));
    }
}
