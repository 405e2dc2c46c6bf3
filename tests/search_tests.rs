//! Integration tests for the search engine through the public API.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use riposte::{
    search, Caches, Engine, EngineOptions, Evaluator, Position, ProgressCallback, ScoreKind,
    SearchLimits, SearchProgress, SearchState, TimeControl,
};

fn run(fen: &str, limits: SearchLimits) -> (Option<String>, Vec<SearchProgress>) {
    let mut pos: Position = fen.parse().expect("valid fen");
    let evaluator = Evaluator::default();
    let mut caches = Caches::default();
    let mut state = SearchState::new();
    let stop = AtomicBool::new(false);
    let records = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&records);
    let cb: ProgressCallback = Arc::new(move |p: &SearchProgress| {
        sink.lock().unwrap().push(p.clone());
    });
    let result = search(
        &mut pos,
        &evaluator,
        &mut caches,
        &mut state,
        &limits,
        &stop,
        Some(cb),
    );
    let records = records.lock().unwrap().clone();
    (result.best_move.map(|m| m.to_string()), records)
}

#[test]
fn progress_stream_is_monotonic_in_depth() {
    let (best, records) = run(
        "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
        SearchLimits::depth(5),
    );
    assert!(best.is_some());
    let depths: Vec<u32> = records
        .iter()
        .filter(|r| r.kind == ScoreKind::Exact || r.kind == ScoreKind::Mate)
        .map(|r| r.depth)
        .collect();
    for pair in depths.windows(2) {
        assert!(pair[0] <= pair[1], "depth regressed: {depths:?}");
    }
    assert!(records.iter().all(|r| !r.pv.is_empty()));
}

#[test]
fn back_rank_mate_is_seen() {
    // the front rook delivers the back-rank mate behind the pawn shield
    let (best, records) = run("6k1/5ppp/8/8/8/8/R7/R5K1 w - - 0 1", SearchLimits::depth(6));
    let best = best.expect("found a move");
    assert_eq!(best, "a2a8", "expected the back-rank mate");
    let mate = records.iter().rev().find(|r| r.kind == ScoreKind::Mate);
    assert!(mate.is_some(), "no mate score reported, best {best}");
}

#[test]
fn free_queen_is_taken() {
    let (best, _) = run("4k3/8/8/3q4/4P3/8/8/4K3 w - - 0 1", SearchLimits::depth(4));
    assert_eq!(best.unwrap(), "e4d5");
}

#[test]
fn movetime_limit_is_respected() {
    let start = Instant::now();
    let (best, _) = run(
        "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
        SearchLimits::movetime(Duration::from_millis(150)),
    );
    let elapsed = start.elapsed();
    assert!(best.is_some());
    assert!(
        elapsed < Duration::from_secs(3),
        "search ran far past its slice: {elapsed:?}"
    );
}

#[test]
fn clock_time_control_allocates_and_terminates() {
    let limits = SearchLimits {
        time: Some(TimeControl::Clock {
            remaining: Duration::from_millis(800),
            increment: Duration::from_millis(10),
            moves_to_go: Some(20),
        }),
        ..Default::default()
    };
    let start = Instant::now();
    let (best, _) = run(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        limits,
    );
    assert!(best.is_some());
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn node_limited_search_returns_promptly() {
    let (best, records) = run(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        SearchLimits {
            nodes: Some(5_000),
            depth: Some(64),
            ..Default::default()
        },
    );
    assert!(best.is_some());
    let max_nodes = records.iter().map(|r| r.nodes).max().unwrap_or(0);
    // coarse-grained checking may overshoot a little, not by orders of
    // magnitude
    assert!(max_nodes < 200_000, "node cap ignored: {max_nodes}");
}

#[test]
fn ponder_move_is_a_legal_reply() {
    let mut engine = Engine::new(EngineOptions::default());
    engine
        .set_position("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3")
        .unwrap();
    let result = engine.go(SearchLimits::depth(5), None);
    let best = result.best_move.expect("best move");
    if let Some(ponder) = result.ponder_move {
        let mut pos = engine.position().clone();
        pos.play(best).unwrap();
        assert!(pos.is_legal(ponder), "ponder move {ponder} not legal");
    }
}

#[test]
fn repeated_shuffle_scores_draw() {
    // knights shuffle until the position has repeated twice; the search
    // must adjudicate the root as drawn
    let mut engine = Engine::default();
    for _ in 0..2 {
        for mv in ["b1c3", "b8c6", "c3b1", "c6b8"] {
            engine.play_move(mv).unwrap();
        }
    }
    let records = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&records);
    let cb: ProgressCallback = Arc::new(move |p: &SearchProgress| {
        sink.lock().unwrap().push(p.clone());
    });
    let result = engine.go(SearchLimits::depth(4), Some(cb));
    assert!(result.best_move.is_some());
    assert_eq!(records.lock().unwrap().last().unwrap().score, 0);
}

#[test]
fn deeper_searches_reuse_the_transposition_table() {
    let mut pos: Position =
        "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3"
            .parse()
            .unwrap();
    let evaluator = Evaluator::default();
    let mut caches = Caches::default();
    let mut state = SearchState::new();
    let stop = AtomicBool::new(false);
    search(
        &mut pos,
        &evaluator,
        &mut caches,
        &mut state,
        &SearchLimits::depth(5),
        &stop,
        None,
    );
    assert!(state.stats.tt_hits > 0, "cold search never hit the table");
    let cold_nodes = state.stats.nodes;
    search(
        &mut pos,
        &evaluator,
        &mut caches,
        &mut state,
        &SearchLimits::depth(5),
        &stop,
        None,
    );
    assert!(state.stats.tt_hits > 0, "warm search never hit the table");
    assert!(
        state.stats.nodes <= cold_nodes * 2,
        "warm search did not benefit from cached work"
    );
}
