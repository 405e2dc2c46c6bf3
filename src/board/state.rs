//! Position state: bitboards, mailbox, histories.

use super::types::{combined_rights_index, Bitboard, CastlingRights, Color, Move, Piece, Square};
use crate::zobrist::{EP_NONE, ZOBRIST};

/// Reversible state saved before every make and restored on unmake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct StateRecord {
    pub(crate) castling: [CastlingRights; 2],
    pub(crate) ep_file: u8,
    pub(crate) halfmove_clock: u32,
    pub(crate) checkers: Bitboard,
    pub(crate) pawn_key: u64,
}

/// A chess position with incrementally maintained bitboards, mailbox,
/// Zobrist keys and move/state histories.
///
/// The twelve piece bitboards and the mailbox are kept in lockstep; the
/// aggregates (per-color occupancy, total occupancy, empty set) are updated
/// with every piece placement. One `Position` belongs to one logical
/// searcher; parallel search clones it per worker.
#[derive(Clone, PartialEq, Eq)]
pub struct Position {
    pub(crate) piece_bb: [[Bitboard; 6]; 2],
    pub(crate) by_color: [Bitboard; 2],
    pub(crate) occupied: Bitboard,
    pub(crate) empty: Bitboard,
    pub(crate) mailbox: [Option<(Color, Piece)>; 64],
    pub(crate) side_to_move: Color,
    pub(crate) castling: [CastlingRights; 2],
    /// En passant file 0..7, or 8 meaning none.
    pub(crate) ep_file: u8,
    pub(crate) halfmove_clock: u32,
    /// Half-move index from game start.
    pub(crate) ply: u32,
    pub(crate) root_ply: u32,
    pub(crate) key: u64,
    /// Zobrist subkey over pawns only, for the pawn cache.
    pub(crate) pawn_key: u64,
    /// Opposing pieces currently giving check to the side to move.
    pub(crate) checkers: Bitboard,
    pub(crate) key_history: Vec<u64>,
    pub(crate) state_history: Vec<StateRecord>,
    /// Moves made so far; `None` records a null move.
    pub(crate) move_history: Vec<Option<Move>>,
}

impl Position {
    /// The standard starting position.
    #[must_use]
    pub fn new() -> Self {
        const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        match Position::from_fen(STARTPOS) {
            Ok(pos) => pos,
            Err(_) => unreachable!("start position FEN is valid"),
        }
    }

    pub(crate) fn empty_board() -> Self {
        Position {
            piece_bb: [[Bitboard::EMPTY; 6]; 2],
            by_color: [Bitboard::EMPTY; 2],
            occupied: Bitboard::EMPTY,
            empty: Bitboard::ALL,
            mailbox: [None; 64],
            side_to_move: Color::White,
            castling: [CastlingRights::NONE; 2],
            ep_file: EP_NONE as u8,
            halfmove_clock: 0,
            ply: 0,
            root_ply: 0,
            key: 0,
            pawn_key: 0,
            checkers: Bitboard::EMPTY,
            key_history: Vec::with_capacity(64),
            state_history: Vec::with_capacity(64),
            move_history: Vec::with_capacity(64),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// The current Zobrist key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// The pawn-only Zobrist subkey.
    #[inline]
    #[must_use]
    pub fn pawn_key(&self) -> u64 {
        self.pawn_key
    }

    #[inline]
    #[must_use]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    /// Half-move index from game start.
    #[inline]
    #[must_use]
    pub fn ply(&self) -> u32 {
        self.ply
    }

    #[inline]
    #[must_use]
    pub fn in_check(&self) -> bool {
        self.checkers.any()
    }

    /// Opposing pieces giving check to the side to move.
    #[inline]
    #[must_use]
    pub fn checkers(&self) -> Bitboard {
        self.checkers
    }

    #[inline]
    #[must_use]
    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        self.mailbox[sq.index()]
    }

    #[inline]
    #[must_use]
    pub(crate) fn pieces(&self, color: Color, piece: Piece) -> Bitboard {
        self.piece_bb[color.index()][piece.index()]
    }

    #[inline]
    #[must_use]
    pub(crate) fn occupied_by(&self, color: Color) -> Bitboard {
        self.by_color[color.index()]
    }

    /// King square for a color. Every legal position has both kings.
    #[inline]
    #[must_use]
    pub(crate) fn king_square(&self, color: Color) -> Square {
        self.pieces(color, Piece::King).lsb()
    }

    #[inline]
    #[must_use]
    pub(crate) fn ep_square(&self) -> Option<Square> {
        if self.ep_file as usize == EP_NONE {
            None
        } else {
            let rank = match self.side_to_move {
                Color::White => 5,
                Color::Black => 2,
            };
            Some(Square::new(rank, self.ep_file as usize))
        }
    }

    /// The most recent non-null move made, if any.
    #[inline]
    #[must_use]
    pub fn last_move(&self) -> Option<Move> {
        self.move_history.last().copied().flatten()
    }

    /// Bishops and queens of a color.
    #[inline]
    #[must_use]
    pub(crate) fn diagonal_sliders(&self, color: Color) -> Bitboard {
        self.pieces(color, Piece::Bishop) | self.pieces(color, Piece::Queen)
    }

    /// Rooks and queens of a color.
    #[inline]
    #[must_use]
    pub(crate) fn straight_sliders(&self, color: Color) -> Bitboard {
        self.pieces(color, Piece::Rook) | self.pieces(color, Piece::Queen)
    }

    // =========================================================================
    // Piece placement
    // =========================================================================

    pub(crate) fn set_piece(&mut self, sq: Square, color: Color, piece: Piece) {
        let bit = Bitboard::from_square(sq);
        self.piece_bb[color.index()][piece.index()] |= bit;
        self.by_color[color.index()] |= bit;
        self.occupied |= bit;
        self.empty &= !bit;
        self.mailbox[sq.index()] = Some((color, piece));
    }

    pub(crate) fn remove_piece(&mut self, sq: Square, color: Color, piece: Piece) {
        let bit = Bitboard::from_square(sq);
        self.piece_bb[color.index()][piece.index()] &= !bit;
        self.by_color[color.index()] &= !bit;
        self.occupied &= !bit;
        self.empty |= bit;
        self.mailbox[sq.index()] = None;
    }

    // =========================================================================
    // Key recomputation
    // =========================================================================

    /// From-scratch Zobrist key over board, side, castling and ep file.
    #[must_use]
    pub(crate) fn compute_key(&self) -> u64 {
        let mut key = 0u64;
        for (idx, slot) in self.mailbox.iter().enumerate() {
            if let Some((color, piece)) = slot {
                key ^= ZOBRIST.piece(*color, *piece, Square::from_index(idx));
            }
        }
        if self.side_to_move == Color::Black {
            key ^= ZOBRIST.side();
        }
        key ^= ZOBRIST.castling(combined_rights_index(self.castling));
        key ^= ZOBRIST.ep(self.ep_file as usize);
        key
    }

    /// From-scratch pawn subkey over pawn placement only.
    #[must_use]
    pub(crate) fn compute_pawn_key(&self) -> u64 {
        let mut key = 0u64;
        for color in [Color::White, Color::Black] {
            for sq in self.pieces(color, Piece::Pawn).iter() {
                key ^= ZOBRIST.piece(color, Piece::Pawn, sq);
            }
        }
        key
    }

    // =========================================================================
    // Repetition and draw queries
    // =========================================================================

    /// Walk the key history backwards in strides of two plies, bounded by the
    /// fifty-move clock, and count positions equal to the current one.
    /// Returns true when at least `n` prior occurrences are found.
    #[must_use]
    pub fn has_repeated(&self, n: u32) -> bool {
        let len = self.key_history.len();
        if len < 5 {
            return false;
        }
        let mut count = 0u32;
        let current = self.key;
        let horizon = self.halfmove_clock as usize;
        let mut back = 2usize;
        while back <= horizon && back < len {
            if self.key_history[len - 1 - back] == current {
                count += 1;
                if count >= n {
                    return true;
                }
            }
            back += 2;
        }
        false
    }

    /// Draw by the fifty-move rule or threefold repetition.
    #[must_use]
    pub fn is_draw(&self) -> bool {
        self.halfmove_clock >= 100 || self.has_repeated(2)
    }

    /// Dead positions: K-K, K-minor-K, and K-same-color-bishops-K.
    #[must_use]
    pub fn insufficient_material(&self) -> bool {
        let majors_or_pawns = self.pieces(Color::White, Piece::Pawn)
            | self.pieces(Color::Black, Piece::Pawn)
            | self.straight_sliders(Color::White)
            | self.straight_sliders(Color::Black);
        if majors_or_pawns.any() {
            return false;
        }

        let knights = self.pieces(Color::White, Piece::Knight)
            | self.pieces(Color::Black, Piece::Knight);
        let bishops = self.pieces(Color::White, Piece::Bishop)
            | self.pieces(Color::Black, Piece::Bishop);
        let minors = knights.popcount() + bishops.popcount();

        if minors <= 1 {
            return true;
        }
        if knights.is_empty() {
            return (bishops & Bitboard::LIGHT_SQUARES).is_empty()
                || (bishops & Bitboard::DARK_SQUARES).is_empty();
        }
        false
    }

    // =========================================================================
    // Invariant validation
    // =========================================================================

    /// Check every structural invariant of the position. Panics on violation;
    /// a failure here means make/unmake corrupted state and the caches can no
    /// longer be trusted.
    pub fn validate(&self) {
        let mut white = Bitboard::EMPTY;
        let mut black = Bitboard::EMPTY;
        for piece_idx in 0..6 {
            white |= self.piece_bb[0][piece_idx];
            black |= self.piece_bb[1][piece_idx];
        }
        assert_eq!(self.by_color[0], white, "white aggregate out of sync");
        assert_eq!(self.by_color[1], black, "black aggregate out of sync");
        assert_eq!(self.occupied, white | black, "occupancy out of sync");
        assert_eq!(self.empty, !self.occupied, "empty set out of sync");
        assert!(
            (white & black).is_empty(),
            "square occupied by both colors"
        );

        for idx in 0..64 {
            let sq = Square::from_index(idx);
            let from_bb = (0..2)
                .flat_map(|c| (0..6).map(move |p| (c, p)))
                .find(|&(c, p)| self.piece_bb[c][p].contains(sq))
                .map(|(c, p)| {
                    (
                        if c == 0 { Color::White } else { Color::Black },
                        Piece::from_index(p),
                    )
                });
            assert_eq!(
                self.mailbox[idx], from_bb,
                "mailbox out of sync at {sq}"
            );
        }

        assert_eq!(
            self.checkers,
            self.attackers_to(
                self.king_square(self.side_to_move),
                self.occupied,
                self.side_to_move.opponent()
            ),
            "stale checkers bitboard"
        );
        assert_eq!(self.key, self.compute_key(), "stale zobrist key");
        assert_eq!(
            self.pawn_key,
            self.compute_pawn_key(),
            "stale pawn subkey"
        );
        assert_eq!(
            self.move_history.len(),
            self.state_history.len(),
            "history length mismatch"
        );
        assert_eq!(
            self.move_history.len() as u32,
            self.ply - self.root_ply,
            "ply does not match history length"
        );
        assert_eq!(
            self.key_history.len(),
            self.move_history.len() + 1,
            "key history length mismatch"
        );
        assert_eq!(
            self.key_history.last().copied(),
            Some(self.key),
            "key history head mismatch"
        );
    }

    #[inline]
    pub(crate) fn debug_validate(&self) {
        #[cfg(feature = "paranoid")]
        self.validate();
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::new()
    }
}

impl std::fmt::Debug for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Position {{ fen: {} }}", self.to_fen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_invariants() {
        let pos = Position::new();
        pos.validate();
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.occupied.popcount(), 32);
        assert!(!pos.in_check());
        assert_eq!(pos.king_square(Color::White), Square::new(0, 4));
        assert_eq!(pos.king_square(Color::Black), Square::new(7, 4));
    }

    #[test]
    fn clone_is_independent() {
        let mut pos = Position::new();
        let snapshot = pos.clone();
        let mv = pos.all_moves()[0];
        pos.make(mv);
        assert_ne!(pos.key(), snapshot.key());
        snapshot.validate();
    }

    #[test]
    fn insufficient_material_cases() {
        let kk: Position = "8/8/4k3/8/8/3K4/8/8 w - - 0 1".parse().unwrap();
        assert!(kk.insufficient_material());
        let kbk: Position = "8/8/4k3/8/2B5/3K4/8/8 w - - 0 1".parse().unwrap();
        assert!(kbk.insufficient_material());
        let knk: Position = "8/8/4k3/8/2N5/3K4/8/8 w - - 0 1".parse().unwrap();
        assert!(knk.insufficient_material());
        // same-color bishops (both on light squares)
        let same: Position = "8/8/4k3/8/1B1B4/3K4/8/8 w - - 0 1"
            .parse()
            .unwrap();
        assert!(same.insufficient_material());
        // opposite-color bishops can mate
        let opp: Position = "8/8/4k3/8/1BB5/3K4/8/8 w - - 0 1".parse().unwrap();
        assert!(!opp.insufficient_material());
        let kpk: Position = "8/8/4k3/8/4P3/3K4/8/8 w - - 0 1".parse().unwrap();
        assert!(!kpk.insufficient_material());
    }
}
