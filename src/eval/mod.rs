//! Static evaluation.
//!
//! Produces a centipawn score from the side-to-move's point of view by
//! computing separate opening and endgame scores and interpolating them by
//! the material phase. Whole-position results are cached in the eval table;
//! the pawn-structure term is cached separately under the pawn subkey.

mod pawns;
mod pst;

use crate::board::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attack_set, queen_attacks, rook_attacks,
    Bitboard, Color, Piece, Position,
};
use crate::cache::{Caches, EvalEntry, PawnEntry};

use pst::{
    phase_factor, pst_index, taper, MATERIAL_EG, MATERIAL_MG, PHASE_WEIGHTS, PST_EG, PST_MG,
};

/// Score returned for drawn positions.
pub const DRAW_SCORE: i32 = 0;

/// Tunable evaluation parameters. Constructed once and passed to the
/// evaluator; the tuning driver overrides individual fields.
#[derive(Clone, Debug)]
pub struct EvalParams {
    /// Constant bonus for having the move.
    pub tempo: i32,
    /// Bonus for owning both bishops.
    pub bishop_pair: (i32, i32),
    /// Per-square mobility weight for knight, bishop, rook, queen.
    pub mobility_mg: [i32; 4],
    pub mobility_eg: [i32; 4],
    /// Bonus per own pawn in the shield zone ahead of the king.
    pub king_shield: i32,
    /// Penalty scale for enemy pieces bearing on the king ring.
    pub king_ring_attack: i32,
}

impl Default for EvalParams {
    fn default() -> Self {
        EvalParams {
            tempo: 15,
            bishop_pair: (22, 40),
            mobility_mg: [5, 4, 2, 1],
            mobility_eg: [3, 4, 3, 3],
            king_shield: 11,
            king_ring_attack: 8,
        }
    }
}

/// The static evaluator.
#[derive(Clone, Debug, Default)]
pub struct Evaluator {
    pub params: EvalParams,
}

impl Evaluator {
    #[must_use]
    pub fn new(params: EvalParams) -> Self {
        Evaluator { params }
    }

    /// Evaluate the position from the side-to-move's point of view, going
    /// through the eval and pawn caches.
    pub fn evaluate(&self, pos: &Position, caches: &mut Caches) -> i32 {
        if pos.insufficient_material() {
            return DRAW_SCORE;
        }
        if let Some(entry) = caches.eval.probe(pos.key()) {
            return entry.score();
        }

        let score = self.evaluate_uncached(pos, caches);
        let generation = caches.generation;
        caches
            .eval
            .insert(EvalEntry::new(pos.key(), clamp_i16(score), generation), generation);
        score
    }

    /// Evaluate without touching the eval cache (the pawn cache is still
    /// used). Exposed for tuning and tests.
    #[must_use]
    pub fn evaluate_uncached(&self, pos: &Position, caches: &mut Caches) -> i32 {
        let (mut mg, mut eg) = self.material_and_pst(pos);

        let (pawn_mg, pawn_eg) = self.pawn_structure(pos, caches);
        mg += pawn_mg;
        eg += pawn_eg;

        let (mob_mg, mob_eg) = self.mobility(pos);
        mg += mob_mg;
        eg += mob_eg;

        mg += self.king_safety(pos, Color::White) - self.king_safety(pos, Color::Black);

        let pair = self.bishop_pair_term(pos);
        mg += pair.0;
        eg += pair.1;

        let factor = phase_factor(remaining_phase(pos));
        let white_score = taper(mg, eg, factor);

        let mut score = match pos.side_to_move() {
            Color::White => white_score,
            Color::Black => -white_score,
        };
        score += self.params.tempo;
        score
    }

    fn material_and_pst(&self, pos: &Position) -> (i32, i32) {
        let mut mg = 0;
        let mut eg = 0;
        for color in [Color::White, Color::Black] {
            let sign = if color == Color::White { 1 } else { -1 };
            for piece_idx in 0..6 {
                let piece = Piece::from_index(piece_idx);
                for sq in pos.pieces(color, piece).iter() {
                    let pst_sq = pst_index(color, sq);
                    mg += sign * (MATERIAL_MG[piece_idx] + PST_MG[piece_idx][pst_sq]);
                    eg += sign * (MATERIAL_EG[piece_idx] + PST_EG[piece_idx][pst_sq]);
                }
            }
        }
        (mg, eg)
    }

    fn pawn_structure(&self, pos: &Position, caches: &mut Caches) -> (i32, i32) {
        if let Some(entry) = caches.pawn.probe(pos.pawn_key()) {
            return entry.scores();
        }
        let (mg, eg) = pawns::evaluate_pawns(pos);
        let generation = caches.generation;
        caches.pawn.insert(
            PawnEntry::new(pos.pawn_key(), clamp_i16(mg), clamp_i16(eg), generation),
            generation,
        );
        (mg, eg)
    }

    fn mobility(&self, pos: &Position) -> (i32, i32) {
        let mut mg = 0;
        let mut eg = 0;
        let occ = pos.occupied;
        for color in [Color::White, Color::Black] {
            let sign = if color == Color::White { 1 } else { -1 };
            let own = pos.occupied_by(color);
            for (slot, piece) in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen]
                .into_iter()
                .enumerate()
            {
                for sq in pos.pieces(color, piece).iter() {
                    let attacks = match piece {
                        Piece::Knight => knight_attacks(sq),
                        Piece::Bishop => bishop_attacks(sq, occ),
                        Piece::Rook => rook_attacks(sq, occ),
                        _ => queen_attacks(sq, occ),
                    };
                    let count = (attacks & !own).popcount() as i32;
                    mg += sign * count * self.params.mobility_mg[slot];
                    eg += sign * count * self.params.mobility_eg[slot];
                }
            }
        }
        (mg, eg)
    }

    /// Middlegame-only king safety: pawn shield ahead of the king minus a
    /// quadratic penalty for enemy pieces bearing on the ring around it.
    fn king_safety(&self, pos: &Position, us: Color) -> i32 {
        let them = us.opponent();
        let ksq = pos.king_square(us);
        let ring = king_attacks(ksq) | Bitboard::from_square(ksq);

        // shield: own pawns on the king's and adjacent files, one or two
        // ranks ahead
        let shield_zone = shield_zone(us, ksq);
        let shield = (shield_zone & pos.pieces(us, Piece::Pawn)).popcount() as i32;

        let mut attack_units = 0;
        let occ = pos.occupied;
        for (piece, weight) in [
            (Piece::Knight, 2),
            (Piece::Bishop, 2),
            (Piece::Rook, 3),
            (Piece::Queen, 5),
        ] {
            for sq in pos.pieces(them, piece).iter() {
                let attacks = match piece {
                    Piece::Knight => knight_attacks(sq),
                    Piece::Bishop => bishop_attacks(sq, occ),
                    Piece::Rook => rook_attacks(sq, occ),
                    _ => queen_attacks(sq, occ),
                };
                if (attacks & ring).any() {
                    attack_units += weight;
                }
            }
        }
        attack_units += (pawn_attack_set(them, pos.pieces(them, Piece::Pawn)) & ring)
            .popcount() as i32;

        shield * self.params.king_shield
            - attack_units * attack_units * self.params.king_ring_attack / 4
    }

    fn bishop_pair_term(&self, pos: &Position) -> (i32, i32) {
        let mut mg = 0;
        let mut eg = 0;
        for color in [Color::White, Color::Black] {
            let sign = if color == Color::White { 1 } else { -1 };
            if pos.pieces(color, Piece::Bishop).popcount() >= 2 {
                mg += sign * self.params.bishop_pair.0;
                eg += sign * self.params.bishop_pair.1;
            }
        }
        (mg, eg)
    }
}

/// Phase remaining on the board, from each side's non-king, non-pawn pieces.
fn remaining_phase(pos: &Position) -> i32 {
    let mut phase = 0;
    for color in [Color::White, Color::Black] {
        for piece_idx in 1..5 {
            phase += PHASE_WEIGHTS[piece_idx]
                * pos.pieces(color, Piece::from_index(piece_idx)).popcount() as i32;
        }
    }
    phase
}

fn shield_zone(us: Color, ksq: crate::board::Square) -> Bitboard {
    let kb = Bitboard::from_square(ksq);
    let files = kb | kb.shift_east() | kb.shift_west();
    match us {
        Color::White => files.shift_north() | files.shift_north().shift_north(),
        Color::Black => files.shift_south() | files.shift_south().shift_south(),
    }
}

fn clamp_i16(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}
