//! Static Exchange Evaluation (SEE).
//!
//! Iteratively takes with the least-valued attacker from each side on a
//! single square, accumulating the swap score. Works on a simulated
//! occupancy; the position is never mutated.

use super::magics::{bishop_attacks, rook_attacks};
use super::state::Position;
use super::types::{Bitboard, Color, Move, Piece, Square};

/// Piece values for exchange evaluation.
pub(crate) const SEE_VALUES: [i32; 6] = [
    100,   // Pawn
    320,   // Knight
    330,   // Bishop
    500,   // Rook
    900,   // Queen
    20000, // King
];

impl Position {
    /// Material balance after all exchanges on the target square, from the
    /// perspective of the side making the initial capture. Positive wins
    /// material, zero is an even swap.
    #[must_use]
    pub fn see(&self, from: Square, to: Square) -> i32 {
        let Some((_, attacker)) = self.piece_at(from) else {
            return 0;
        };
        let victim = match self.piece_at(to) {
            Some((_, v)) => v,
            None => {
                if attacker == Piece::Pawn && self.ep_square() == Some(to) {
                    Piece::Pawn
                } else {
                    return 0;
                }
            }
        };
        self.see_exchange(from, to, attacker, victim)
    }

    /// SEE for a generated move, reading attacker and victim from the move.
    #[must_use]
    pub fn see_move(&self, m: Move) -> i32 {
        match m.captured() {
            Some(victim) => self.see_exchange(m.from(), m.to(), m.piece(), victim),
            None => 0,
        }
    }

    /// True when the swap on `to` wins at least `threshold` centipawns.
    #[inline]
    #[must_use]
    pub fn see_ge(&self, from: Square, to: Square, threshold: i32) -> bool {
        self.see(from, to) >= threshold
    }

    fn see_exchange(&self, from: Square, to: Square, attacker: Piece, victim: Piece) -> i32 {
        const MAX_SWAPS: usize = 32;

        let mut gain = [0i32; MAX_SWAPS];
        let mut depth = 0usize;
        let mut side = self.side_to_move;
        let mut occ = self.occupied;
        let mut attackers = self.attackers_to_both(to, occ);
        let mut current = attacker;
        let mut from_bb = Bitboard::from_square(from);

        gain[0] = SEE_VALUES[victim.index()];

        loop {
            // lift the capturer off the board, then look for x-ray attackers
            // its departure uncovers
            occ ^= from_bb;
            attackers &= !from_bb;

            if matches!(current, Piece::Pawn | Piece::Bishop | Piece::Queen) {
                let diag = self.diagonal_sliders(Color::White)
                    | self.diagonal_sliders(Color::Black);
                attackers |= bishop_attacks(to, occ) & diag & occ;
            }
            if matches!(current, Piece::Rook | Piece::Queen) {
                let straight = self.straight_sliders(Color::White)
                    | self.straight_sliders(Color::Black);
                attackers |= rook_attacks(to, occ) & straight & occ;
            }

            side = side.opponent();
            let side_attackers = attackers & self.occupied_by(side);
            if side_attackers.is_empty() {
                break;
            }

            depth += 1;
            if depth >= MAX_SWAPS {
                break;
            }

            let (lva, lva_bb) = self.least_valuable(side_attackers, side);
            gain[depth] = SEE_VALUES[current.index()] - gain[depth - 1];

            // neither side continues a sequence that is already lost for it
            if (-gain[depth - 1]).max(gain[depth]) < 0 {
                break;
            }

            // the king may only conclude the exchange when unopposed
            if lva == Piece::King && (attackers & self.occupied_by(side.opponent())).any() {
                break;
            }

            current = lva;
            from_bb = lva_bb;
        }

        while depth > 0 {
            depth -= 1;
            gain[depth] = -(-gain[depth]).max(gain[depth + 1]);
        }
        gain[0]
    }

    fn attackers_to_both(&self, sq: Square, occ: Bitboard) -> Bitboard {
        self.attackers_to(sq, occ, Color::White) | self.attackers_to(sq, occ, Color::Black)
    }

    fn least_valuable(&self, attackers: Bitboard, color: Color) -> (Piece, Bitboard) {
        for piece in [
            Piece::Pawn,
            Piece::Knight,
            Piece::Bishop,
            Piece::Rook,
            Piece::Queen,
            Piece::King,
        ] {
            let candidates = attackers & self.pieces(color, piece);
            if candidates.any() {
                let single = Bitboard(candidates.0 & candidates.0.wrapping_neg());
                return (piece, single);
            }
        }
        (Piece::Pawn, Bitboard::EMPTY)
    }
}
