//! Principal-variation search.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::board::{Move, Position, Square, MAX_PLY};
use crate::cache::{BoundType, Caches, TtEntry};
use crate::eval::Evaluator;

use super::constants::{
    score_from_tt, score_to_tt, DRAW_SCORE, MATE_SCORE, MATE_THRESHOLD, ONE_PLY, SCORE_INFINITE,
    TIME_CHECK_MASK,
};
use super::move_order::score_moves;
use super::time::SearchClock;
use super::SearchState;

/// Late-move reduction table in half-plies, indexed by nominal remaining
/// plies and move index.
fn lmr_table() -> &'static [[i32; 64]; 32] {
    use std::sync::OnceLock;
    static TABLE: OnceLock<[[i32; 64]; 32]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [[0i32; 64]; 32];
        for (depth, row) in t.iter_mut().enumerate().skip(1) {
            for (idx, cell) in row.iter_mut().enumerate().skip(1) {
                let r = 0.4 + (depth as f64).ln() * (idx as f64).ln() / 2.6;
                *cell = (r.max(0.0) * ONE_PLY as f64) as i32;
            }
        }
        t
    })
}

/// One search invocation: the position, its collaborators, and the running
/// counters. Borrowed mutably for the duration of a `go`.
pub(crate) struct SearchContext<'a> {
    pub(crate) pos: &'a mut Position,
    pub(crate) evaluator: &'a Evaluator,
    pub(crate) caches: &'a mut Caches,
    pub(crate) state: &'a mut SearchState,
    pub(crate) stop: &'a AtomicBool,
    pub(crate) clock: SearchClock,
    pub(crate) node_limit: u64,
    pub(crate) nodes: u64,
    pub(crate) seldepth: u32,
}

impl SearchContext<'_> {
    /// Cooperative cancellation, checked at node entry. Expired time and
    /// node budgets promote themselves to the shared stop flag.
    #[inline]
    pub(crate) fn should_stop(&mut self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return true;
        }
        if self.node_limit > 0 && self.nodes >= self.node_limit {
            self.stop.store(true, Ordering::Relaxed);
            return true;
        }
        if self.nodes & TIME_CHECK_MASK == 0 && self.clock.hard_expired() {
            self.stop.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }

    #[inline]
    pub(crate) fn evaluate(&mut self) -> i32 {
        self.evaluator.evaluate(self.pos, self.caches)
    }

    #[inline]
    pub(crate) fn has_non_pawn_material(&self) -> bool {
        use crate::board::Piece;
        let us = self.pos.side_to_move();
        (self.pos.pieces(us, Piece::Knight)
            | self.pos.pieces(us, Piece::Bishop)
            | self.pos.pieces(us, Piece::Rook)
            | self.pos.pieces(us, Piece::Queen))
        .any()
    }

    fn store_tt(&mut self, depth: i32, score: i32, bound: BoundType, best: Move, ply: i32) {
        if best == Move::NULL {
            return;
        }
        let generation = self.caches.generation;
        let entry = TtEntry::new(
            self.pos.key(),
            depth.clamp(0, 255) as u8,
            score_to_tt(score, ply).clamp(-SCORE_INFINITE, SCORE_INFINITE) as i16,
            bound,
            if best == Move::NULL { None } else { Some(best) },
            generation,
        );
        self.caches.tt.insert(entry, generation);
    }

    /// Alpha-beta with principal-variation scouting. `depth` is in
    /// half-plies; at and below zero the node drops into quiescence.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn alphabeta(
        &mut self,
        depth: i32,
        mut alpha: i32,
        mut beta: i32,
        ply: i32,
        allow_null: bool,
    ) -> i32 {
        let is_pv = beta > alpha + 1;
        let params = self.state.params.clone();

        self.nodes += 1;
        self.seldepth = self.seldepth.max(ply as u32);
        if self.should_stop() {
            return 0;
        }

        // repetition and fifty-move draws
        if self.pos.has_repeated(2) || self.pos.halfmove_clock() >= 100 {
            return DRAW_SCORE;
        }
        if ply >= MAX_PLY as i32 - 1 {
            return self.evaluate();
        }

        // mate-distance pruning: neither bound can beat the closest
        // conceivable mate from here
        alpha = alpha.max(-MATE_SCORE + ply);
        beta = beta.min(MATE_SCORE - ply - 1);
        if alpha >= beta {
            return alpha;
        }

        let in_check = self.pos.in_check();
        let mut depth = depth;
        if in_check {
            depth += params.check_extension;
        }

        if depth <= 0 {
            return self.quiesce(alpha, beta, ply, 0);
        }

        // transposition probe: cutoff on sufficient depth and compatible
        // bound, hash move otherwise
        let mut tt_move = Move::NULL;
        if let Some(entry) = self.caches.tt.probe(self.pos.key()) {
            self.state.stats.tt_hits += 1;
            tt_move = entry.best_move().unwrap_or(Move::NULL);
            if !is_pv && i32::from(entry.depth()) >= depth {
                let score = score_from_tt(entry.score(), ply);
                match entry.bound() {
                    BoundType::Exact => return score,
                    BoundType::FailHigh if score >= beta => return score,
                    BoundType::FailLow if score <= alpha => return score,
                    _ => {}
                }
            }
        }

        let eval = if in_check {
            -SCORE_INFINITE
        } else {
            self.evaluate()
        };

        // null-move pruning: hand the opponent a free move; a reduced
        // zero-window search that still fails high means this node is
        // already winning enough to prune
        if allow_null
            && !is_pv
            && !in_check
            && depth >= params.null_move_min_depth as i32 * ONE_PLY
            && eval >= beta
            && beta.abs() < MATE_THRESHOLD
            && self.has_non_pawn_material()
        {
            let r = params.null_move_reduction as i32 * ONE_PLY + depth / 6;
            self.pos.make_null();
            let null_score =
                -self.alphabeta(depth - r - ONE_PLY, -beta, -beta + 1, ply + 1, false);
            self.pos.unmake_null();
            if self.should_stop() {
                return 0;
            }
            if null_score >= beta {
                // verify at shallow depths where zugzwang is plausible
                if depth <= params.null_verify_depth as i32 * ONE_PLY {
                    let verified =
                        self.alphabeta(depth - r - ONE_PLY, beta - 1, beta, ply, false);
                    if verified >= beta {
                        return beta;
                    }
                } else {
                    return beta;
                }
            } else if null_score <= -MATE_THRESHOLD {
                // passing loses to a forced mate: look deeper here
                depth += params.mate_threat_extension;
            }
        }

        // internal iterative deepening: a PV node without a hash move runs
        // a reduced search first just to seed the table
        if is_pv && tt_move == Move::NULL && depth >= params.iid_min_depth as i32 * ONE_PLY {
            self.alphabeta(
                depth - params.iid_reduction as i32 * ONE_PLY,
                alpha,
                beta,
                ply,
                false,
            );
            if let Some(entry) = self.caches.tt.probe(self.pos.key()) {
                tt_move = entry.best_move().unwrap_or(Move::NULL);
            }
        }

        let moves = self.pos.all_moves();
        if moves.is_empty() {
            return if in_check {
                -MATE_SCORE + ply
            } else {
                DRAW_SCORE
            };
        }
        if moves.len() == 1 {
            depth += params.single_reply_extension;
        }

        let recapture_sq: Option<Square> = self
            .pos
            .last_move()
            .filter(|m| m.is_capture())
            .map(Move::to);

        let mut scored = score_moves(
            self.pos,
            &moves,
            tt_move,
            &self.state.killers,
            &self.state.history,
            ply as usize,
        );

        let mut best_score = -SCORE_INFINITE;
        let mut best_move = Move::NULL;
        let mut raised_alpha = false;
        let mut tried_quiets = [Move::NULL; 64];
        let mut tried_quiet_count = 0usize;
        let mut idx = 0usize;
        let mut searched = 0usize;

        while let Some(entry) = scored.pick_best(idx) {
            let m = entry.mv;
            idx += 1;
            if self.should_stop() {
                break;
            }

            let is_quiet = !m.is_tactical();
            let gives_check = self.pos.gives_check(m);

            let mut extension = 0;
            if m.is_capture() && recapture_sq == Some(m.to()) {
                extension += params.recapture_extension;
            }

            let mut reduction = 0;
            if searched > 0
                && !is_pv
                && !in_check
                && is_quiet
                && !gives_check
                && extension == 0
                && alpha.abs() < MATE_THRESHOLD
            {
                let rem_plies = depth / ONE_PLY;
                if (1..=2).contains(&rem_plies) {
                    let margin_idx = (rem_plies - 1) as usize;
                    // frontier futility: a quiet move cannot lift a hopeless
                    // static eval back above alpha
                    if eval + params.futility_margins[margin_idx] <= alpha {
                        continue;
                    }
                    // razoring band: keep the move but dock it a ply
                    if eval + params.razor_margins[margin_idx] <= alpha {
                        reduction += ONE_PLY;
                    }
                }
                if searched >= params.lmr_move_threshold
                    && depth >= params.lmr_min_depth as i32 * ONE_PLY
                {
                    let d = (depth / ONE_PLY).clamp(0, 31) as usize;
                    let i = searched.min(63);
                    reduction += lmr_table()[d][i];
                }
                reduction = reduction.clamp(0, (depth - ONE_PLY).max(0));
            }

            self.pos.make(m);
            let new_depth = depth - ONE_PLY + extension;
            let mut score;
            if searched == 0 {
                score = -self.alphabeta(new_depth, -beta, -alpha, ply + 1, true);
            } else {
                score = -self.alphabeta(
                    new_depth - reduction,
                    -alpha - 1,
                    -alpha,
                    ply + 1,
                    true,
                );
                if score > alpha && reduction > 0 {
                    score = -self.alphabeta(new_depth, -alpha - 1, -alpha, ply + 1, true);
                }
                if score > alpha && score < beta {
                    score = -self.alphabeta(new_depth, -beta, -alpha, ply + 1, true);
                }
            }
            self.pos.unmake();
            searched += 1;

            if self.should_stop() {
                break;
            }

            if is_quiet && tried_quiet_count < tried_quiets.len() {
                tried_quiets[tried_quiet_count] = m;
                tried_quiet_count += 1;
            }

            if score > best_score {
                best_score = score;
                best_move = m;
                if score > alpha {
                    if score >= beta {
                        self.record_cutoff(
                            m,
                            ply,
                            depth,
                            &tried_quiets[..tried_quiet_count],
                        );
                        self.store_tt(depth, score, BoundType::FailHigh, m, ply);
                        return score;
                    }
                    alpha = score;
                    raised_alpha = true;
                }
            }
        }

        if self.should_stop() && best_move == Move::NULL {
            return 0;
        }
        if best_move == Move::NULL {
            // every move was pruned away; report a conservative fail-low
            return alpha;
        }

        let depth_plies = (depth / ONE_PLY).max(1) as u32;
        for &q in &tried_quiets[..tried_quiet_count] {
            self.state
                .history
                .add_butterfly(q.piece(), q.to().index(), depth_plies);
        }

        let bound = if raised_alpha {
            BoundType::Exact
        } else {
            BoundType::FailLow
        };
        self.store_tt(depth, best_score, bound, best_move, ply);
        best_score
    }

    fn record_cutoff(&mut self, m: Move, ply: i32, depth: i32, tried_quiets: &[Move]) {
        let depth_plies = (depth / ONE_PLY).max(1) as u32;
        if !m.is_tactical() {
            self.state.killers.insert(ply as usize, m);
            self.state
                .history
                .add_success(m.piece(), m.to().index(), depth_plies);
        }
        for &q in tried_quiets {
            self.state
                .history
                .add_butterfly(q.piece(), q.to().index(), depth_plies);
        }
    }

    /// Root move loop: like an interior PV node, but iterating a fixed,
    /// possibly restricted move set and reporting the best move alongside
    /// the score.
    pub(crate) fn search_root(
        &mut self,
        depth: i32,
        mut alpha: i32,
        beta: i32,
        root_moves: &[Move],
        prefer: Move,
    ) -> (i32, Move) {
        let tt_move = if prefer != Move::NULL {
            prefer
        } else {
            self.caches
                .tt
                .probe(self.pos.key())
                .and_then(|e| e.best_move())
                .unwrap_or(Move::NULL)
        };

        let mut list = crate::board::MoveList::new();
        for &m in root_moves {
            list.push(m);
        }
        let mut scored = score_moves(
            self.pos,
            &list,
            tt_move,
            &self.state.killers,
            &self.state.history,
            0,
        );

        let mut best_score = -SCORE_INFINITE;
        let mut best_move = Move::NULL;
        let mut idx = 0usize;
        let mut searched = 0usize;

        while let Some(entry) = scored.pick_best(idx) {
            let m = entry.mv;
            idx += 1;
            if self.should_stop() && searched > 0 {
                break;
            }

            self.pos.make(m);
            let new_depth = depth - ONE_PLY;
            let mut score;
            if searched == 0 {
                score = -self.alphabeta(new_depth, -beta, -alpha, 1, true);
            } else {
                score = -self.alphabeta(new_depth, -alpha - 1, -alpha, 1, true);
                if score > alpha && score < beta {
                    score = -self.alphabeta(new_depth, -beta, -alpha, 1, true);
                }
            }
            self.pos.unmake();
            searched += 1;

            if score > best_score {
                best_score = score;
                best_move = m;
                if score > alpha {
                    alpha = score;
                    if score >= beta {
                        break;
                    }
                }
            }

            if self.stop.load(Ordering::Relaxed) {
                break;
            }
        }

        if best_move != Move::NULL {
            let bound = if best_score >= beta {
                BoundType::FailHigh
            } else {
                BoundType::Exact
            };
            self.store_tt(depth, best_score, bound, best_move, 0);
        }
        (best_score, best_move)
    }

    /// Read the principal variation out of the transposition table, probing
    /// and replaying hash moves until the chain breaks or repeats.
    pub(crate) fn extract_pv(&mut self, max_len: usize) -> Vec<Move> {
        let mut pv = Vec::with_capacity(max_len);
        let mut seen = [0u64; MAX_PLY];
        let mut made = 0usize;

        while pv.len() < max_len && made < MAX_PLY {
            let key = self.pos.key();
            if seen[..made].contains(&key) {
                break;
            }
            seen[made] = key;

            let Some(mv) = self.caches.tt.probe(key).and_then(|e| e.best_move()) else {
                break;
            };
            if !self.pos.is_legal(mv) {
                break;
            }
            pv.push(mv);
            self.pos.make(mv);
            made += 1;
        }

        for _ in 0..made {
            self.pos.unmake();
        }
        pv
    }
}
