//! Fast per-move queries: the legality filter used for hash and killer move
//! probes, and the check-detection test used by search extensions.

use super::magics::{bishop_attacks, queen_attacks, rook_attacks};
use super::make_unmake::castling_rook_squares;
use super::masks::{between, king_attacks, knight_attacks, line, pawn_attacks, PAWN_PUSHES};
use super::state::Position;
use super::types::{Bitboard, Color, Move, MoveKind, Piece, Square};

impl Position {
    /// Structural and king-safety test for a single move, without touching
    /// the board. `is_legal(m)` holds exactly when `m` appears in
    /// [`Position::all_moves`]; it exists so transposition-table and killer
    /// probes can vet a move without generating the full list.
    #[must_use]
    pub fn is_legal(&self, m: Move) -> bool {
        if m == Move::NULL {
            return false;
        }
        let us = self.side_to_move;
        let them = us.opponent();
        let from = m.from();
        let to = m.to();
        let piece = m.piece();

        // the named piece must stand on the source square
        if self.piece_at(from) != Some((us, piece)) {
            return false;
        }

        // the named capture must match the destination occupant
        if m.is_en_passant() {
            if piece != Piece::Pawn
                || self.ep_square() != Some(to)
                || m.captured() != Some(Piece::Pawn)
                || !pawn_attacks(us, from).contains(to)
            {
                return false;
            }
            return self.en_passant_is_safe(from, to, us, them);
        }
        match m.captured() {
            Some(victim) => {
                if self.piece_at(to) != Some((them, victim)) {
                    return false;
                }
            }
            None => {
                if self.piece_at(to).is_some() {
                    return false;
                }
            }
        }

        if m.is_castling() {
            return self.castling_is_legal(m, us, them);
        }

        // destination must be reachable by the moving piece
        match piece {
            Piece::Pawn => {
                if !self.pawn_step_is_valid(m, us) {
                    return false;
                }
            }
            Piece::Knight => {
                if !knight_attacks(from).contains(to) {
                    return false;
                }
            }
            Piece::Bishop => {
                if !bishop_attacks(from, self.occupied).contains(to) {
                    return false;
                }
            }
            Piece::Rook => {
                if !rook_attacks(from, self.occupied).contains(to) {
                    return false;
                }
            }
            Piece::Queen => {
                if !queen_attacks(from, self.occupied).contains(to) {
                    return false;
                }
            }
            Piece::King => {
                if !king_attacks(from).contains(to) {
                    return false;
                }
                let occ_no_king = self.occupied ^ Bitboard::from_square(from);
                return !self.is_square_attacked(to, them, occ_no_king);
            }
        }

        // non-king moves: respect pins and any standing check
        let ksq = self.king_square(us);
        if self.pinned_pieces(us).contains(from) && !line(ksq, from).contains(to) {
            return false;
        }
        match self.checkers.popcount() {
            0 => true,
            1 => {
                let checker_sq = self.checkers.lsb();
                let block = match self.piece_at(checker_sq) {
                    Some((_, p)) if p.is_slider() => between(ksq, checker_sq),
                    _ => Bitboard::EMPTY,
                };
                to == checker_sq || block.contains(to)
            }
            _ => false, // double check: only king moves, handled above
        }
    }

    fn pawn_step_is_valid(&self, m: Move, us: Color) -> bool {
        let from = m.from();
        let to = m.to();
        let promo_rank = match us {
            Color::White => 7,
            Color::Black => 0,
        };
        // promotion kind and promotion rank must agree
        if (to.rank() == promo_rank) != m.is_promotion() {
            return false;
        }

        if m.is_capture() {
            return pawn_attacks(us, from).contains(to);
        }

        let single = Bitboard(PAWN_PUSHES[us.index()][from.index()]);
        if single.contains(to) {
            return true; // destination emptiness already checked
        }
        if m.is_double_push() {
            let start_rank = match us {
                Color::White => 1,
                Color::Black => 6,
            };
            let mid = Square::new(
                (from.rank() + to.rank()) / 2,
                from.file(),
            );
            return from.rank() == start_rank
                && Bitboard(PAWN_PUSHES[us.index()][mid.index()]).contains(to)
                && self.empty.contains(mid);
        }
        false
    }

    fn castling_is_legal(&self, m: Move, us: Color, them: Color) -> bool {
        if self.in_check() {
            return false;
        }
        let rank = match us {
            Color::White => 0,
            Color::Black => 7,
        };
        if m.from() != Square::new(rank, 4) {
            return false;
        }
        let rights = self.castling[us.index()];
        let occ = self.occupied;
        match m.kind() {
            MoveKind::ShortCastle => {
                m.to() == Square::new(rank, 6)
                    && rights.has_short()
                    && self.piece_at(Square::new(rank, 7)) == Some((us, Piece::Rook))
                    && !occ.contains(Square::new(rank, 5))
                    && !occ.contains(Square::new(rank, 6))
                    && !self.is_square_attacked(Square::new(rank, 5), them, occ)
                    && !self.is_square_attacked(Square::new(rank, 6), them, occ)
            }
            MoveKind::LongCastle => {
                m.to() == Square::new(rank, 2)
                    && rights.has_long()
                    && self.piece_at(Square::new(rank, 0)) == Some((us, Piece::Rook))
                    && !occ.contains(Square::new(rank, 1))
                    && !occ.contains(Square::new(rank, 2))
                    && !occ.contains(Square::new(rank, 3))
                    && !self.is_square_attacked(Square::new(rank, 3), them, occ)
                    && !self.is_square_attacked(Square::new(rank, 2), them, occ)
            }
            _ => false,
        }
    }

    /// Does this move give check to the opponent? Tested on a simulated
    /// occupancy; the position itself is left untouched.
    #[must_use]
    pub fn gives_check(&self, m: Move) -> bool {
        let us = self.side_to_move;
        let them = us.opponent();
        let enemy_ksq = self.king_square(them);
        let from = m.from();
        let to = m.to();
        let from_bb = Bitboard::from_square(from);
        let to_bb = Bitboard::from_square(to);

        let mut occ2 = (self.occupied ^ from_bb) | to_bb;
        if m.is_en_passant() {
            let victim_rank = match us {
                Color::White => to.rank() - 1,
                Color::Black => to.rank() + 1,
            };
            occ2 ^= Bitboard::from_square(Square::new(victim_rank, to.file()));
        }

        if m.is_castling() {
            let (rook_from, rook_to) = castling_rook_squares(us, m.kind());
            occ2 = (occ2 ^ Bitboard::from_square(rook_from)) | Bitboard::from_square(rook_to);
            return rook_attacks(rook_to, occ2).contains(enemy_ksq);
        }

        // direct check from the landed (possibly promoted) piece
        let direct = match m.piece_after() {
            Piece::Pawn => pawn_attacks(us, to),
            Piece::Knight => knight_attacks(to),
            Piece::Bishop => bishop_attacks(to, occ2),
            Piece::Rook => rook_attacks(to, occ2),
            Piece::Queen => queen_attacks(to, occ2),
            Piece::King => Bitboard::EMPTY,
        };
        if direct.contains(enemy_ksq) {
            return true;
        }

        // discovered check through the vacated square
        let diag = self.diagonal_sliders(us) & !from_bb & !to_bb;
        if (bishop_attacks(enemy_ksq, occ2) & diag).any() {
            return true;
        }
        let straight = self.straight_sliders(us) & !from_bb & !to_bb;
        (rook_attacks(enemy_ksq, occ2) & straight).any()
    }
}
