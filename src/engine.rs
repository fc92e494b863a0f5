//! Engine state management.
//!
//! Holds the current position, side to move and configuration, owns the
//! searcher (and its distributor when workers are configured), and writes
//! the driver's responses for `go`, `eval` and friends.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::board::{Board, Side};
use crate::config::EngineConfig;
use crate::distributed::{MinimaxDistributor, PerformanceSample};
use crate::error::Result;
use crate::eval::{evaluate, MaterialScale, MAX_GRANULARITY};
use crate::movegen::{apply_action, legal_actions, parse_action, Action};
use crate::protocol::GoParams;
use crate::search::{FallbackPolicy, SearchResult, Searcher, TracingObserver};

/// Result of a best-move request. A search failure yields [`BestMove::none`]
/// rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestMove {
    pub action: Option<Action>,
    pub score: i32,
    pub nodes: u64,
    pub remote_calls: u64,
}

impl BestMove {
    /// The "no move" sentinel.
    pub const fn none() -> Self {
        BestMove {
            action: None,
            score: 0,
            nodes: 0,
            remote_calls: 0,
        }
    }

    pub fn is_none(&self) -> bool {
        self.action.is_none()
    }
}

impl From<SearchResult> for BestMove {
    fn from(r: SearchResult) -> Self {
        BestMove {
            action: r.action,
            score: r.score,
            nodes: r.nodes,
            remote_calls: r.remote_calls,
        }
    }
}

/// Holds the mutable state of the engine between commands.
pub struct Engine {
    position: Board,
    side_to_move: Side,
    config: EngineConfig,
    searcher: Searcher,
    distributor: Option<Arc<MinimaxDistributor>>,
}

impl Engine {
    /// Creates an engine at the opening position, White to move.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let (searcher, distributor) = build_searcher(&config)?;
        Ok(Engine {
            position: Board::initial(),
            side_to_move: Side::White,
            config,
            searcher,
            distributor,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn position(&self) -> &Board {
        &self.position
    }

    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    /// Resets to the opening position, White to move.
    pub fn new_game(&mut self) {
        self.position = Board::initial();
        self.side_to_move = Side::White;
    }

    pub fn set_position(&mut self, board: Board, side: Side) {
        self.position = board;
        self.side_to_move = side;
    }

    /// Applies an option and rebuilds the searcher. On failure the previous
    /// configuration stays in effect.
    pub fn set_option(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        let mut next = self.config.clone();
        next.set_option(name, value)?;
        let (searcher, distributor) = build_searcher(&next)?;
        self.config = next;
        self.searcher = searcher;
        self.distributor = distributor;
        debug!(name, ?value, "option set");
        Ok(())
    }

    /// Best action for `side` on `board` at the configured depth.
    pub fn best_move(&self, board: &Board, side: Side) -> BestMove {
        self.best_move_at_depth(board, side, self.config.depth)
    }

    pub fn best_move_at_depth(&self, board: &Board, side: Side, depth: u32) -> BestMove {
        match self.searcher.best_action_at_depth(board, side, depth) {
            Ok(result) => result.into(),
            Err(e) => {
                warn!(error = %e, "search failed");
                BestMove::none()
            }
        }
    }

    /// Static evaluation of `board` from `side`'s point of view.
    pub fn evaluate_position(&self, board: &Board, side: Side) -> i32 {
        evaluate(board, side, &self.config.eval_params())
    }

    /// Plays `text` (`21-17` or `24x17x10`) for the side to move and passes
    /// the turn.
    pub fn play(&mut self, text: &str) -> Result<Action> {
        let action = parse_action(&self.position, self.side_to_move, text)?;
        self.position = apply_action(&self.position, &action);
        self.side_to_move = self.side_to_move.opponent();
        Ok(action)
    }

    /// Per-worker load and latency; empty when searching locally.
    pub fn worker_performance(&self) -> Vec<PerformanceSample> {
        self.distributor
            .as_ref()
            .map(|d| d.performance())
            .unwrap_or_default()
    }

    /// Writes the `hello` handshake: identity, options and `hellook`.
    pub fn handle_hello<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let c = &self.config;
        writeln!(out, "id name kingrow {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "option name Depth type spin default {} min 1 max 32", c.depth)?;
        writeln!(out, "option name DistributionPly type spin default {} min 0 max 32", c.distribution_ply)?;
        writeln!(out, "option name Workers type string default {}", c.workers.join(","))?;
        writeln!(out, "option name Material type combo default {} var 1:3 var 2:5", material_label(c.material))?;
        writeln!(
            out,
            "option name Granularity type spin default {} min 1 max {}",
            c.granularity, MAX_GRANULARITY
        )?;
        writeln!(out, "option name Fallback type combo default {} var local var fail", fallback_label(c.fallback))?;
        writeln!(out, "option name Threads type spin default {} min 0 max 256", c.threads)?;
        writeln!(out, "hellook")?;
        out.flush()
    }

    pub fn handle_isready<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "readyok")?;
        out.flush()
    }

    /// Searches the current position and writes `info` and `bestmove` lines.
    pub fn handle_go<W: Write>(&self, params: &GoParams, out: &mut W) -> io::Result<()> {
        let depth = params.depth.unwrap_or(self.config.depth);
        let best = self.best_move_at_depth(&self.position, self.side_to_move, depth);
        writeln!(
            out,
            "info depth {} score {} nodes {} remote {}",
            depth, best.score, best.nodes, best.remote_calls
        )?;
        match &best.action {
            Some(action) => writeln!(out, "bestmove {action}")?,
            None => writeln!(out, "bestmove none")?,
        }
        out.flush()
    }

    pub fn handle_eval<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let score = self.evaluate_position(&self.position, self.side_to_move);
        writeln!(out, "eval {score}")?;
        out.flush()
    }

    /// Prints the board, side to move and legal actions.
    pub fn handle_show<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.position)?;
        writeln!(out, "side {}", self.side_to_move.as_char())?;
        let actions: Vec<String> = legal_actions(&self.position, self.side_to_move)
            .iter()
            .map(Action::to_string)
            .collect();
        writeln!(out, "legal {}", actions.join(" "))?;
        out.flush()
    }
}

fn material_label(material: MaterialScale) -> &'static str {
    match material {
        MaterialScale::OneToThree => "1:3",
        MaterialScale::TwoToFive => "2:5",
    }
}

fn fallback_label(fallback: FallbackPolicy) -> &'static str {
    match fallback {
        FallbackPolicy::Local => "local",
        FallbackPolicy::Fail => "fail",
    }
}

fn build_searcher(config: &EngineConfig) -> Result<(Searcher, Option<Arc<MinimaxDistributor>>)> {
    let searcher = Searcher::new(config.search_config())?.with_observer(Arc::new(TracingObserver));
    if config.workers.is_empty() {
        return Ok((searcher, None));
    }
    let distributor = Arc::new(MinimaxDistributor::new(
        &config.workers,
        config.worker_concurrency,
        config.rpc_timeout(),
    )?);
    let searcher = searcher.with_remote(Arc::clone(&distributor) as _);
    Ok((searcher, Some(distributor)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Piece;

    fn engine(depth: u32) -> Engine {
        Engine::new(EngineConfig {
            depth,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    fn output<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn new_engine_starts_at_opening_position() {
        let e = engine(2);
        assert_eq!(*e.position(), Board::initial());
        assert_eq!(e.side_to_move(), Side::White);
        assert!(e.worker_performance().is_empty());
    }

    #[test]
    fn play_applies_and_passes_the_turn() {
        let mut e = engine(2);
        let action = e.play("21-17").unwrap();
        assert_eq!(action.to_string(), "21-17");
        assert_eq!(e.position().get(21).unwrap(), Piece::Empty);
        assert_eq!(e.position().get(17).unwrap(), Piece::WhitePawn);
        assert_eq!(e.side_to_move(), Side::Black);

        e.new_game();
        assert_eq!(*e.position(), Board::initial());
        assert_eq!(e.side_to_move(), Side::White);
    }

    #[test]
    fn illegal_play_leaves_position_unchanged() {
        let mut e = engine(2);
        assert!(e.play("21-13").is_err());
        assert!(e.play("nonsense").is_err());
        assert_eq!(*e.position(), Board::initial());
        assert_eq!(e.side_to_move(), Side::White);
    }

    #[test]
    fn best_move_without_actions_is_none() {
        let mut board = Board::empty();
        board.set(0, Piece::WhitePawn).unwrap();
        board.set(31, Piece::BlackPawn).unwrap();
        assert!(engine(3).best_move(&board, Side::White).is_none());
    }

    #[test]
    fn failing_search_returns_sentinel() {
        // Nothing listens on port 1; the first remote call fails.
        let e = Engine::new(EngineConfig {
            depth: 3,
            distribution_ply: 1,
            workers: vec!["127.0.0.1:1".into()],
            rpc_timeout_ms: 500,
            fallback: FallbackPolicy::Fail,
            ..EngineConfig::default()
        })
        .unwrap();
        assert_eq!(e.best_move(&Board::initial(), Side::White), BestMove::none());
    }

    #[test]
    fn local_fallback_still_finds_a_move() {
        let e = Engine::new(EngineConfig {
            depth: 2,
            distribution_ply: 1,
            workers: vec!["127.0.0.1:1".into()],
            rpc_timeout_ms: 500,
            ..EngineConfig::default()
        })
        .unwrap();
        let best = e.best_move(&Board::initial(), Side::White);
        let local = engine(2).best_move(&Board::initial(), Side::White);
        assert_eq!(best.action, local.action);
        assert_eq!(best.score, local.score);
        assert_eq!(best.remote_calls, 7);
        assert_eq!(e.worker_performance()[0].failures, 7);
    }

    #[test]
    fn set_option_rebuilds_or_keeps_previous_config() {
        let mut e = engine(2);
        e.set_option("Depth", Some("3")).unwrap();
        assert_eq!(e.config().depth, 3);
        assert!(e.set_option("Depth", Some("-1")).is_err());
        assert_eq!(e.config().depth, 3);
    }

    #[test]
    fn oversized_granularity_is_refused_and_eval_keeps_working() {
        let mut e = engine(1);
        assert!(e.set_option("Granularity", Some("1000000000")).is_err());
        assert_eq!(e.config().granularity, 100);

        let mut board = Board::empty();
        board.set(17, Piece::WhiteKing).unwrap();
        assert!(e.evaluate_position(&board, Side::White) > 0);
        let hello = output(|o| e.handle_hello(o));
        assert!(hello.contains("option name Granularity type spin default 100 min 1 max 10000"));
    }

    #[test]
    fn evaluate_position_is_antisymmetric() {
        let mut e = engine(1);
        e.play("22-18").unwrap();
        let b = *e.position();
        assert_eq!(e.evaluate_position(&b, Side::White), -e.evaluate_position(&b, Side::Black));
    }

    #[test]
    fn handle_go_outputs_bestmove() {
        let e = engine(2);
        let out = output(|o| e.handle_go(&GoParams::default(), o));
        let line = out.lines().find(|l| l.starts_with("bestmove ")).unwrap();
        let text = line.strip_prefix("bestmove ").unwrap();
        assert!(parse_action(&Board::initial(), Side::White, text).is_ok(), "{text}");
        assert!(out.starts_with("info depth 2 "));
    }

    #[test]
    fn handle_go_respects_depth_override() {
        let e = engine(6);
        let out = output(|o| e.handle_go(&GoParams { depth: Some(1) }, o));
        assert!(out.starts_with("info depth 1 "), "{out}");
    }

    #[test]
    fn handle_hello_and_isready() {
        let e = engine(2);
        let hello = output(|o| e.handle_hello(o));
        assert!(hello.starts_with("id name kingrow"));
        assert!(hello.contains("option name Depth type spin default 2"));
        assert_eq!(hello.lines().last(), Some("hellook"));
        assert_eq!(output(|o| e.handle_isready(o)).trim(), "readyok");
    }

    #[test]
    fn handle_eval_and_show() {
        let e = engine(2);
        assert_eq!(output(|o| e.handle_eval(o)).trim(), "eval 0");
        let show = output(|o| e.handle_show(o));
        assert!(show.contains("side w"));
        assert!(show.contains("legal 20-16 "), "{show}");
    }
}
