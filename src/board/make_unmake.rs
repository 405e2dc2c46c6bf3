//! Move making and unmaking.
//!
//! `make` pushes a reversible state record and applies the move to the
//! bitboards and mailbox with XOR updates; `unmake` pops and reverses. The
//! pair is all-or-nothing: if `make` completes, `unmake` restores every
//! position invariant.

use super::state::{Position, StateRecord};
use super::types::{combined_rights_index, CastlingRights, Color, Move, MoveKind, Piece, Square};
use crate::zobrist::{EP_NONE, ZOBRIST};

/// Rook from/to squares for a castling move of the given color and kind.
pub(crate) fn castling_rook_squares(color: Color, kind: MoveKind) -> (Square, Square) {
    let rank = match color {
        Color::White => 0,
        Color::Black => 7,
    };
    match kind {
        MoveKind::ShortCastle => (Square::new(rank, 7), Square::new(rank, 5)),
        _ => (Square::new(rank, 0), Square::new(rank, 3)),
    }
}

impl Position {
    fn push_state(&mut self, entry: Option<Move>) {
        self.state_history.push(StateRecord {
            castling: self.castling,
            ep_file: self.ep_file,
            halfmove_clock: self.halfmove_clock,
            checkers: self.checkers,
            pawn_key: self.pawn_key,
        });
        self.move_history.push(entry);
    }

    /// Revoke any castling right tied to a square a move touched. Touching a
    /// rook home square or a king home square is exactly the revocation
    /// condition: a rook leaving home, a rook captured on home, or the king
    /// moving.
    fn revoke_rights_for(&mut self, sq: Square) {
        let white = Color::White.index();
        let black = Color::Black.index();
        match sq.index() {
            0 => self.castling[white] = self.castling[white].without_long(),
            7 => self.castling[white] = self.castling[white].without_short(),
            4 => self.castling[white] = CastlingRights::NONE,
            56 => self.castling[black] = self.castling[black].without_long(),
            63 => self.castling[black] = self.castling[black].without_short(),
            60 => self.castling[black] = CastlingRights::NONE,
            _ => {}
        }
    }

    /// Make a move. The caller must pass a legal move for the current
    /// position; use [`Position::play`] for filtered input.
    pub fn make(&mut self, m: Move) {
        let us = self.side_to_move;
        let them = us.opponent();
        let from = m.from();
        let to = m.to();
        let piece = m.piece();
        let old_rights = combined_rights_index(self.castling);
        let old_ep = self.ep_file as usize;

        self.push_state(Some(m));

        let mut key = self.key;

        // Remove the captured piece first so the destination is free.
        if let Some(victim) = m.captured() {
            let cap_sq = if m.is_en_passant() {
                let rank = match us {
                    Color::White => to.rank() - 1,
                    Color::Black => to.rank() + 1,
                };
                Square::new(rank, to.file())
            } else {
                to
            };
            self.remove_piece(cap_sq, them, victim);
            key ^= ZOBRIST.piece(them, victim, cap_sq);
            if victim == Piece::Pawn {
                self.pawn_key ^= ZOBRIST.piece(them, Piece::Pawn, cap_sq);
            }
        }

        // Move the piece, materializing promotions at the destination.
        let placed = m.piece_after();
        self.remove_piece(from, us, piece);
        self.set_piece(to, us, placed);
        key ^= ZOBRIST.piece(us, piece, from) ^ ZOBRIST.piece(us, placed, to);
        if piece == Piece::Pawn {
            self.pawn_key ^= ZOBRIST.piece(us, Piece::Pawn, from);
            if placed == Piece::Pawn {
                self.pawn_key ^= ZOBRIST.piece(us, Piece::Pawn, to);
            }
        }

        // Castling moves the rook in the same step.
        if m.is_castling() {
            let (rook_from, rook_to) = castling_rook_squares(us, m.kind());
            self.remove_piece(rook_from, us, Piece::Rook);
            self.set_piece(rook_to, us, Piece::Rook);
            key ^= ZOBRIST.piece_move(us, Piece::Rook, rook_from, rook_to);
        }

        self.revoke_rights_for(from);
        self.revoke_rights_for(to);
        key ^= ZOBRIST.castling_delta(old_rights, combined_rights_index(self.castling));

        let new_ep = if m.is_double_push() {
            from.file()
        } else {
            EP_NONE
        };
        self.ep_file = new_ep as u8;
        key ^= ZOBRIST.ep_delta(old_ep, new_ep);

        if piece == Piece::Pawn || m.is_capture() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }

        self.side_to_move = them;
        key ^= ZOBRIST.side();

        self.key = key;
        self.ply += 1;
        self.key_history.push(key);

        self.checkers = self.attackers_to(self.king_square(them), self.occupied, us);
        self.debug_validate();
    }

    /// Make a null move: swap the side to move and clear the en passant
    /// file, leaving the board untouched. Recorded in the histories with a
    /// null sentinel so ply bookkeeping and repetition detection stay
    /// uniform.
    pub fn make_null(&mut self) {
        self.push_state(None);

        let old_ep = self.ep_file as usize;
        self.ep_file = EP_NONE as u8;
        self.key ^= ZOBRIST.ep_delta(old_ep, EP_NONE) ^ ZOBRIST.side();

        self.side_to_move = self.side_to_move.opponent();
        self.ply += 1;
        self.key_history.push(self.key);
        self.checkers = self.attackers_to(
            self.king_square(self.side_to_move),
            self.occupied,
            self.side_to_move.opponent(),
        );
        self.debug_validate();
    }

    /// Undo the most recent half-move (normal or null). Returns the undone
    /// move — `Move::NULL` for a null move — or `None` when the history is
    /// empty.
    pub fn unmake(&mut self) -> Option<Move> {
        let record = self.state_history.pop()?;
        let entry = self
            .move_history
            .pop()
            .unwrap_or_else(|| unreachable!("histories pushed in lockstep"));

        self.key_history.pop();
        self.key = self
            .key_history
            .last()
            .copied()
            .unwrap_or_else(|| unreachable!("key history holds the root key"));
        self.ply -= 1;
        self.side_to_move = self.side_to_move.opponent();
        self.castling = record.castling;
        self.ep_file = record.ep_file;
        self.halfmove_clock = record.halfmove_clock;
        self.checkers = record.checkers;
        self.pawn_key = record.pawn_key;

        let Some(m) = entry else {
            self.debug_validate();
            return Some(Move::NULL);
        };

        let us = self.side_to_move;
        let them = us.opponent();
        let to = m.to();

        self.remove_piece(to, us, m.piece_after());
        self.set_piece(m.from(), us, m.piece());

        if let Some(victim) = m.captured() {
            let cap_sq = if m.is_en_passant() {
                let rank = match us {
                    Color::White => to.rank() - 1,
                    Color::Black => to.rank() + 1,
                };
                Square::new(rank, to.file())
            } else {
                to
            };
            self.set_piece(cap_sq, them, victim);
        }

        if m.is_castling() {
            let (rook_from, rook_to) = castling_rook_squares(us, m.kind());
            self.remove_piece(rook_to, us, Piece::Rook);
            self.set_piece(rook_from, us, Piece::Rook);
        }

        self.debug_validate();
        Some(m)
    }

    /// Undo a null move made with [`Position::make_null`].
    pub fn unmake_null(&mut self) {
        debug_assert!(
            matches!(self.move_history.last(), Some(None)),
            "unmake_null without a null move on top"
        );
        self.unmake();
    }
}
