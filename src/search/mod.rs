//! Iterative-deepening search driver and public search API.
//!
//! The search runs synchronously on the caller's thread. Cancellation is a
//! cooperative atomic flag checked at every node entry; time and node
//! budgets promote themselves to that flag. A cancelled search is not an
//! error: the best move found so far is returned and the final progress
//! record carries `finished = false`.

mod constants;
mod move_order;
mod params;
mod pvs;
mod quiescence;
mod time;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::board::{Move, Position, MAX_PLY};
use crate::cache::Caches;
use crate::eval::Evaluator;

use constants::{DRAW_SCORE, MATE_SCORE, MATE_THRESHOLD, ONE_PLY, SCORE_INFINITE};
use pvs::SearchContext;
use time::{SearchClock, TimeAllocation};

pub use params::{SearchParams, TimeParams};
pub use time::TimeControl;

/// Default nominal depth cap when the caller sets none.
pub const DEFAULT_MAX_DEPTH: u32 = 64;

/// What a reported score means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreKind {
    Exact,
    LowerBound,
    UpperBound,
    Mate,
}

/// One streamed progress record.
#[derive(Clone, Debug)]
pub struct SearchProgress {
    pub depth: u32,
    pub seldepth: u32,
    pub nodes: u64,
    pub elapsed: Duration,
    /// Centipawns from the searched side's point of view; mate scores are
    /// in the mate band.
    pub score: i32,
    pub kind: ScoreKind,
    pub pv: Vec<Move>,
    /// Root move the reported line starts with.
    pub current_move: Option<Move>,
    pub hashfull: u32,
    /// False on the last record of a cancelled search.
    pub finished: bool,
}

/// Callback receiving progress records during the search.
pub type ProgressCallback = Arc<dyn Fn(&SearchProgress) + Send + Sync>;

/// Final outcome of a search.
#[derive(Clone, Copy, Debug)]
pub struct SearchResult {
    pub best_move: Option<Move>,
    /// Expected reply, for pondering.
    pub ponder_move: Option<Move>,
}

/// Search limits: any combination of time budget, nominal depth cap, node
/// cap, and a restricted root-move set.
#[derive(Clone, Debug, Default)]
pub struct SearchLimits {
    pub time: Option<TimeControl>,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    /// When non-empty, only these root moves are searched.
    pub root_moves: Vec<Move>,
    /// Pondering searches ignore the clock until stopped.
    pub ponder: bool,
}

impl SearchLimits {
    /// Search to a fixed nominal depth.
    #[must_use]
    pub fn depth(depth: u32) -> Self {
        SearchLimits {
            depth: Some(depth),
            ..Default::default()
        }
    }

    /// Search for a fixed wall-clock duration.
    #[must_use]
    pub fn movetime(duration: Duration) -> Self {
        SearchLimits {
            time: Some(TimeControl::Fixed(duration)),
            ..Default::default()
        }
    }

    /// Search until `n` nodes have been visited.
    #[must_use]
    pub fn nodes(n: u64) -> Self {
        SearchLimits {
            nodes: Some(n),
            ..Default::default()
        }
    }
}

/// Counters accumulated over a search.
#[derive(Clone, Copy, Debug, Default)]
pub struct SearchStats {
    pub nodes: u64,
    pub seldepth: u32,
    pub tt_hits: u64,
}

/// Searcher state persisted between searches: killer and history tables,
/// parameters, and statistics.
pub struct SearchState {
    pub(crate) killers: move_order::KillerTable,
    pub(crate) history: move_order::HistoryTable,
    pub params: SearchParams,
    pub time_params: TimeParams,
    pub stats: SearchStats,
}

impl SearchState {
    #[must_use]
    pub fn new() -> Self {
        SearchState {
            killers: move_order::KillerTable::new(),
            history: move_order::HistoryTable::new(),
            params: SearchParams::default(),
            time_params: TimeParams::default(),
            stats: SearchStats::default(),
        }
    }

    /// Reset per-search state: decay history, clear killers and counters.
    pub fn new_search(&mut self) {
        self.history.decay();
        self.killers.clear();
        self.stats = SearchStats::default();
    }
}

impl Default for SearchState {
    fn default() -> Self {
        SearchState::new()
    }
}

fn emit(progress: &Option<ProgressCallback>, record: &SearchProgress) {
    if let Some(cb) = progress {
        cb(record);
    }
}

/// Run an iterative-deepening search over `pos`.
///
/// Deepens one nominal ply at a time inside aspiration windows, emitting a
/// progress record per depth, and stops on depth cap, time budget, node
/// budget, cancellation, or a fully resolved forced mate.
pub fn search(
    pos: &mut Position,
    evaluator: &Evaluator,
    caches: &mut Caches,
    state: &mut SearchState,
    limits: &SearchLimits,
    stop: &AtomicBool,
    progress: Option<ProgressCallback>,
) -> SearchResult {
    state.new_search();
    caches.new_search();

    let root_moves: Vec<Move> = pos
        .all_moves()
        .iter()
        .copied()
        .filter(|m| limits.root_moves.is_empty() || limits.root_moves.contains(m))
        .collect();
    if root_moves.is_empty() {
        emit(
            &progress,
            &SearchProgress {
                depth: 0,
                seldepth: 0,
                nodes: 0,
                elapsed: Duration::ZERO,
                score: if pos.in_check() { -MATE_SCORE } else { DRAW_SCORE },
                kind: if pos.in_check() {
                    ScoreKind::Mate
                } else {
                    ScoreKind::Exact
                },
                pv: Vec::new(),
                current_move: None,
                hashfull: caches.hashfull_per_mille(),
                finished: true,
            },
        );
        return SearchResult {
            best_move: None,
            ponder_move: None,
        };
    }

    let allocation = if limits.ponder {
        None
    } else {
        limits
            .time
            .as_ref()
            .map(|tc| TimeAllocation::from_control(tc, &state.time_params))
    };
    let clock = SearchClock::new(allocation);

    let mut ctx = SearchContext {
        pos,
        evaluator,
        caches,
        state,
        stop,
        clock,
        node_limit: limits.nodes.unwrap_or(0),
        nodes: 0,
        seldepth: 0,
    };

    // a root that already satisfies a draw rule is adjudicated immediately
    if ctx.pos.is_draw() {
        emit(
            &progress,
            &SearchProgress {
                depth: 1,
                seldepth: 0,
                nodes: 0,
                elapsed: ctx.clock.elapsed(),
                score: DRAW_SCORE,
                kind: ScoreKind::Exact,
                pv: vec![root_moves[0]],
                current_move: Some(root_moves[0]),
                hashfull: ctx.caches.hashfull_per_mille(),
                finished: true,
            },
        );
        return SearchResult {
            best_move: Some(root_moves[0]),
            ponder_move: None,
        };
    }

    let max_depth = limits.depth.unwrap_or(DEFAULT_MAX_DEPTH).min(MAX_PLY as u32 - 2);
    let aspiration_delta = ctx.state.params.aspiration_delta;
    let instability_permille = ctx.state.time_params.instability_permille;
    let instability_swing = ctx.state.time_params.instability_swing;

    let mut best_move = root_moves[0];
    let mut score = 0i32;
    let mut stretch = 1000u32;
    let mut cancelled = false;

    for depth in 1..=max_depth {
        if stop.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }
        if depth > 1 && ctx.clock.soft_expired(stretch) {
            debug!("soft time limit reached before depth {depth}");
            break;
        }

        let prev_best = best_move;
        let prev_score = score;

        // aspiration: open window on the first depth, then a narrow window
        // around the last score, widened asymmetrically on failure
        let mut delta = aspiration_delta;
        let (mut alpha, mut beta) = if depth == 1 || score.abs() >= MATE_THRESHOLD {
            (-SCORE_INFINITE, SCORE_INFINITE)
        } else {
            (score - delta, score + delta)
        };

        loop {
            let (iter_score, iter_move) =
                ctx.search_root(depth as i32 * ONE_PLY, alpha, beta, &root_moves, best_move);
            if stop.load(Ordering::Relaxed) && depth > 1 {
                cancelled = true;
                break;
            }
            // a fail-low line is unreliable; keep the previous best then
            if iter_move != Move::NULL && iter_score > alpha {
                best_move = iter_move;
            }

            if iter_score.abs() >= MATE_THRESHOLD {
                score = iter_score;
                break;
            }
            if iter_score <= alpha {
                emit_window_failure(
                    &progress, &mut ctx, depth, iter_score, ScoreKind::UpperBound, best_move,
                );
                alpha = iter_score - delta;
                delta *= 2;
                if delta > 16 * aspiration_delta {
                    alpha = -SCORE_INFINITE;
                }
            } else if iter_score >= beta {
                emit_window_failure(
                    &progress, &mut ctx, depth, iter_score, ScoreKind::LowerBound, best_move,
                );
                beta = iter_score + delta;
                delta *= 2;
                if delta > 16 * aspiration_delta {
                    beta = SCORE_INFINITE;
                }
            } else {
                score = iter_score;
                break;
            }
        }
        if cancelled {
            break;
        }

        ctx.state.stats.nodes = ctx.nodes;
        ctx.state.stats.seldepth = ctx.seldepth;

        let pv = ctx.extract_pv(depth as usize + 8);
        let kind = if score.abs() >= MATE_THRESHOLD {
            ScoreKind::Mate
        } else {
            ScoreKind::Exact
        };
        let record = SearchProgress {
            depth,
            seldepth: ctx.seldepth,
            nodes: ctx.nodes,
            elapsed: ctx.clock.elapsed(),
            score,
            kind,
            pv: if pv.is_empty() { vec![best_move] } else { pv },
            current_move: Some(best_move),
            hashfull: ctx.caches.hashfull_per_mille(),
            finished: true,
        };
        emit(&progress, &record);
        info!(
            "depth {depth} score {score} nodes {} pv {}",
            ctx.nodes,
            record
                .pv
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        );

        // a resolved forced mate cannot improve with more depth
        if score.abs() >= MATE_THRESHOLD && (MATE_SCORE - score.abs()) as u32 <= depth {
            break;
        }

        // time instability: stretch the soft limit while the root flips
        stretch = if best_move != prev_best || (score - prev_score).abs() > instability_swing {
            instability_permille
        } else {
            1000
        };

        // only one legal reply: no point deepening on the clock
        if root_moves.len() == 1 && limits.time.is_some() {
            break;
        }
    }

    ctx.state.stats.nodes = ctx.nodes;
    ctx.state.stats.seldepth = ctx.seldepth;

    if cancelled {
        // the last record of a cancelled search carries finished = false
        emit(
            &progress,
            &SearchProgress {
                depth: 0,
                seldepth: ctx.seldepth,
                nodes: ctx.nodes,
                elapsed: ctx.clock.elapsed(),
                score,
                kind: ScoreKind::Exact,
                pv: vec![best_move],
                current_move: Some(best_move),
                hashfull: ctx.caches.hashfull_per_mille(),
                finished: false,
            },
        );
    }

    let ponder_move = extract_ponder(&mut ctx, best_move);
    SearchResult {
        best_move: Some(best_move),
        ponder_move,
    }
}

fn emit_window_failure(
    progress: &Option<ProgressCallback>,
    ctx: &mut SearchContext<'_>,
    depth: u32,
    score: i32,
    kind: ScoreKind,
    best_move: Move,
) {
    emit(
        progress,
        &SearchProgress {
            depth,
            seldepth: ctx.seldepth,
            nodes: ctx.nodes,
            elapsed: ctx.clock.elapsed(),
            score,
            kind,
            pv: vec![best_move],
            current_move: Some(best_move),
            hashfull: ctx.caches.hashfull_per_mille(),
            finished: true,
        },
    );
}

/// Probe the table for the expected reply to the chosen move.
fn extract_ponder(ctx: &mut SearchContext<'_>, best_move: Move) -> Option<Move> {
    if best_move == Move::NULL {
        return None;
    }
    ctx.pos.make(best_move);
    let ponder = ctx
        .caches
        .tt
        .probe(ctx.pos.key())
        .and_then(|e| e.best_move())
        .filter(|&m| ctx.pos.is_legal(m));
    ctx.pos.unmake();
    ponder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;

    fn go(fen: &str, limits: SearchLimits) -> (SearchResult, Vec<SearchProgress>) {
        let mut pos: Position = fen.parse().expect("valid fen");
        let evaluator = Evaluator::default();
        let mut caches = Caches::new(CacheConfig::with_megabytes(8));
        let mut state = SearchState::new();
        let stop = AtomicBool::new(false);
        let records = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&records);
        let cb: ProgressCallback = Arc::new(move |p: &SearchProgress| {
            sink.lock().push(p.clone());
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
        let records = records.lock().clone();
        (result, records)
    }

    #[test]
    fn finds_a_move_from_startpos() {
        let (result, records) = go(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            SearchLimits::depth(4),
        );
        assert!(result.best_move.is_some());
        assert!(!records.is_empty());
        assert!(records.iter().any(|r| r.depth == 4));
        assert!(records.last().unwrap().finished);
    }

    #[test]
    fn mate_in_one_is_found_and_resolved() {
        // queen takes f7 is mate
        let (result, records) = go(
            "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
            SearchLimits::depth(5),
        );
        let best = result.best_move.expect("mate move found");
        assert_eq!(best.to_string(), "h5f7");
        let last_scored = records.iter().rev().find(|r| r.kind == ScoreKind::Mate);
        let record = last_scored.expect("mate score reported");
        assert_eq!(record.score, MATE_SCORE - 1);
        // mate in 1 resolves before the depth cap
        assert!(records.iter().all(|r| r.depth <= 3));
    }

    #[test]
    fn bare_king_mate_scores_in_mate_band() {
        let (result, records) = go("4k3/8/4K3/4Q3/8/8/8/8 w - - 0 1", SearchLimits::depth(3));
        let best = result.best_move.expect("move found");
        let record = records
            .iter()
            .rev()
            .find(|r| r.kind == ScoreKind::Mate)
            .expect("mate band score");
        assert!(record.score >= MATE_THRESHOLD);
        // verify the move actually mates
        let mut pos: Position = "4k3/8/4K3/4Q3/8/8/8/8 w - - 0 1".parse().unwrap();
        pos.make(best);
        assert!(pos.in_check());
        assert!(pos.all_moves().is_empty());
    }

    #[test]
    fn node_limit_promotes_to_cancellation() {
        let (result, _) = go(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            SearchLimits {
                nodes: Some(2_000),
                depth: Some(30),
                ..Default::default()
            },
        );
        assert!(result.best_move.is_some());
    }

    #[test]
    fn restricted_root_moves_are_respected() {
        let mut pos = Position::new();
        let only = pos.parse_move("a2a3").unwrap();
        let evaluator = Evaluator::default();
        let mut caches = Caches::new(CacheConfig::with_megabytes(2));
        let mut state = SearchState::new();
        let stop = AtomicBool::new(false);
        let result = search(
            &mut pos,
            &evaluator,
            &mut caches,
            &mut state,
            &SearchLimits {
                depth: Some(3),
                root_moves: vec![only],
                ..Default::default()
            },
            &stop,
            None,
        );
        assert_eq!(result.best_move, Some(only));
    }

    #[test]
    fn stalemate_root_returns_no_move() {
        let (result, records) = go("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", SearchLimits::depth(3));
        assert!(result.best_move.is_none());
        assert_eq!(records.last().unwrap().score, DRAW_SCORE);
    }

    #[test]
    fn checkmated_root_returns_no_move() {
        let (result, records) = go(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
            SearchLimits::depth(3),
        );
        assert!(result.best_move.is_none());
        assert_eq!(records.last().unwrap().kind, ScoreKind::Mate);
    }

    #[test]
    fn repeated_root_position_is_adjudicated_drawn() {
        let mut pos = Position::new();
        for _ in 0..2 {
            for mv in ["g1f3", "g8f6", "f3g1", "f6g8"] {
                pos.play_uci(mv).unwrap();
            }
        }
        // the start position has now occurred three times
        assert!(pos.is_draw());
        let evaluator = Evaluator::default();
        let mut caches = Caches::new(CacheConfig::with_megabytes(2));
        let mut state = SearchState::new();
        let stop = AtomicBool::new(false);
        let records = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&records);
        let cb: ProgressCallback = Arc::new(move |p: &SearchProgress| {
            sink.lock().push(p.clone());
        });
        let result = search(
            &mut pos,
            &evaluator,
            &mut caches,
            &mut state,
            &SearchLimits::depth(4),
            &stop,
            Some(cb),
        );
        assert!(result.best_move.is_some());
        assert_eq!(records.lock().last().unwrap().score, DRAW_SCORE);
    }

    #[test]
    fn deeper_search_does_not_blunder_material() {
        // white to move can win a free rook
        let (result, _) = go("4k3/8/8/3r4/8/8/3Q4/4K3 w - - 0 1", SearchLimits::depth(4));
        let best = result.best_move.unwrap();
        assert_eq!(best.to_string(), "d2d5");
    }

    #[test]
    fn cancelled_search_reports_final_false() {
        let mut pos = Position::new();
        let evaluator = Evaluator::default();
        let mut caches = Caches::new(CacheConfig::with_megabytes(2));
        let mut state = SearchState::new();
        let stop = AtomicBool::new(true); // cancelled before it starts deepening
        let records = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&records);
        let cb: ProgressCallback = Arc::new(move |p: &SearchProgress| {
            sink.lock().push(p.clone());
        });
        let result = search(
            &mut pos,
            &evaluator,
            &mut caches,
            &mut state,
            &SearchLimits::depth(10),
            &stop,
            Some(cb),
        );
        // still yields a legal move, flagged as unfinished
        assert!(result.best_move.is_some());
        let records = records.lock();
        assert!(!records.last().unwrap().finished);
    }
}
