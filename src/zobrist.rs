//! Zobrist hashing for chess positions.
//!
//! Four tables of random 64-bit values, generated once from a fixed seed:
//! per-(piece, square) components, a side-to-move component, one component
//! per combined castling-rights mask, and one per en-passant file (slot 8
//! meaning "none"). Position keys are the XOR of the applicable components,
//! which makes every make/unmake update an XOR of the touched components.

use once_cell::sync::Lazy;
use rand::prelude::*;

use crate::board::{Color, Piece, Square};

/// En-passant file value meaning "no en passant square".
pub(crate) const EP_NONE: usize = 8;

pub(crate) struct Zobrist {
    /// piece_sq[color * 6 + piece][square]
    piece_sq: [[u64; 64]; 12],
    /// XORed in when Black is to move.
    side: u64,
    /// Indexed by the combined castling-rights bitmask of both sides.
    castling: [u64; 16],
    /// Indexed by en-passant file; slot 8 is "none".
    ep: [u64; 9],
}

impl Zobrist {
    fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut piece_sq = [[0u64; 64]; 12];
        for table in &mut piece_sq {
            for key in table.iter_mut() {
                *key = rng.gen();
            }
        }
        let side = rng.gen();
        let mut castling = [0u64; 16];
        for key in &mut castling {
            *key = rng.gen();
        }
        let mut ep = [0u64; 9];
        for key in &mut ep {
            *key = rng.gen();
        }
        Zobrist {
            piece_sq,
            side,
            castling,
            ep,
        }
    }

    /// Component for one piece on one square.
    #[inline]
    pub(crate) fn piece(&self, color: Color, piece: Piece, sq: Square) -> u64 {
        self.piece_sq[color.index() * 6 + piece.index()][sq.index()]
    }

    /// Component for the side to move being Black.
    #[inline]
    pub(crate) fn side(&self) -> u64 {
        self.side
    }

    /// Component for a combined castling-rights mask (0..16).
    #[inline]
    pub(crate) fn castling(&self, combined: usize) -> u64 {
        self.castling[combined]
    }

    /// Delta between two combined castling-rights masks.
    #[inline]
    pub(crate) fn castling_delta(&self, old: usize, new: usize) -> u64 {
        if old == new {
            0
        } else {
            self.castling[old] ^ self.castling[new]
        }
    }

    /// Component for an en-passant file (8 = none).
    #[inline]
    pub(crate) fn ep(&self, file: usize) -> u64 {
        self.ep[file]
    }

    /// Delta between two en-passant files.
    #[inline]
    pub(crate) fn ep_delta(&self, old: usize, new: usize) -> u64 {
        if old == new {
            0
        } else {
            self.ep[old] ^ self.ep[new]
        }
    }

    /// Delta for a piece moving between two squares.
    #[inline]
    pub(crate) fn piece_move(&self, color: Color, piece: Piece, from: Square, to: Square) -> u64 {
        self.piece(color, piece, from) ^ self.piece(color, piece, to)
    }
}

/// Process-wide key tables; constructed once, immutable afterwards.
pub(crate) static ZOBRIST: Lazy<Zobrist> = Lazy::new(|| Zobrist::new(0x00d5_11ad_cafe_f00d));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_are_distinct() {
        let z = &*ZOBRIST;
        let a = z.piece(Color::White, Piece::Pawn, Square::from_index(0));
        let b = z.piece(Color::White, Piece::Pawn, Square::from_index(1));
        let c = z.piece(Color::Black, Piece::Pawn, Square::from_index(0));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(z.side(), 0);
    }

    #[test]
    fn deltas_compose() {
        let z = &*ZOBRIST;
        assert_eq!(z.castling_delta(15, 15), 0);
        assert_eq!(z.castling_delta(15, 0), z.castling(15) ^ z.castling(0));
        assert_eq!(z.ep_delta(EP_NONE, EP_NONE), 0);
        assert_eq!(z.ep_delta(3, EP_NONE), z.ep(3) ^ z.ep(EP_NONE));
    }

    #[test]
    fn generation_is_deterministic() {
        let a = Zobrist::new(42);
        let b = Zobrist::new(42);
        assert_eq!(
            a.piece(Color::White, Piece::King, Square::from_index(60)),
            b.piece(Color::White, Piece::King, Square::from_index(60))
        );
    }
}
