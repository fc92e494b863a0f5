use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

use kingrow::board::{Board, Piece, Side};
use kingrow::eval::{evaluate, EvalParams};
use kingrow::movegen::{apply_action, capture_chains, legal_actions};
use kingrow::search::{SearchConfig, Searcher};

/// An opened-up middlegame with a king on each side and captures for White.
fn tactical_position() -> Board {
    let mut board = Board::initial();
    for i in [5, 21, 22, 25] {
        board.set(i, Piece::Empty).unwrap();
    }
    board.set(20, Piece::BlackPawn).unwrap();
    board.set(13, Piece::BlackPawn).unwrap();
    board.set(27, Piece::WhiteKing).unwrap();
    board.set(4, Piece::BlackKing).unwrap();
    board
}

fn bench_board_access(c: &mut Criterion) {
    let board = Board::initial();
    c.bench_function("board_get_all_32", |b| {
        b.iter(|| {
            let mut n = 0;
            for i in 0..32 {
                if !black_box(&board).get(i).unwrap().is_empty() {
                    n += 1;
                }
            }
            n
        })
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let board = tactical_position();
    let params = EvalParams::default();
    c.bench_function("evaluate_middlegame", |b| {
        b.iter(|| evaluate(black_box(&board), black_box(Side::White), &params))
    });
}

fn bench_movegen(c: &mut Criterion) {
    let initial = Board::initial();
    c.bench_function("legal_actions_initial", |b| {
        b.iter(|| legal_actions(black_box(&initial), Side::White))
    });

    let tactical = tactical_position();
    c.bench_function("capture_chains_tactical", |b| {
        b.iter(|| capture_chains(black_box(&tactical), Side::White))
    });
}

fn bench_apply(c: &mut Criterion) {
    let board = Board::initial();
    let actions = legal_actions(&board, Side::White);
    c.bench_function("apply_all_initial_moves", |b| {
        b.iter(|| {
            for action in &actions {
                black_box(apply_action(black_box(&board), action));
            }
        })
    });
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    for depth in [4, 6] {
        let searcher = Searcher::new(SearchConfig {
            depth,
            ..SearchConfig::default()
        })
        .unwrap();
        let board = Board::initial();
        group.bench_function(format!("best_action_initial_depth_{depth}"), |b| {
            b.iter(|| searcher.best_action(black_box(&board), Side::White).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_board_access,
    bench_evaluate,
    bench_movegen,
    bench_apply,
    bench_search
);
criterion_main!(benches);
