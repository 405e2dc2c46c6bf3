//! FEN parsing and emission, plus coordinate-move handling.

use std::str::FromStr;

use super::error::{ChessParseError, IllegalMoveError};
use super::state::Position;
use super::types::{file_to_index, rank_to_index, Color, Move, Piece, Square};
use crate::zobrist::EP_NONE;

impl Position {
    /// Parse a position from FEN: six space-separated fields, or four fields
    /// (board, side, castling, ep) with zeroed counters.
    pub fn from_fen(fen: &str) -> Result<Self, ChessParseError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() != 4 && parts.len() != 6 {
            return Err(ChessParseError::BadFieldCount { found: parts.len() });
        }

        let mut pos = Position::empty_board();

        // Board field, rank 8 down to rank 1.
        let ranks: Vec<&str> = parts[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(ChessParseError::BadRankCount { found: ranks.len() });
        }
        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_idx;
            let mut file = 0usize;
            for c in rank_str.chars() {
                if let Some(run) = c.to_digit(10) {
                    if !(1..=8).contains(&run) {
                        return Err(ChessParseError::InvalidPiece { ch: c });
                    }
                    file += run as usize;
                } else {
                    let piece =
                        Piece::from_char(c).ok_or(ChessParseError::InvalidPiece { ch: c })?;
                    let color = if c.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    if file >= 8 {
                        return Err(ChessParseError::TooManyFiles { rank });
                    }
                    pos.set_piece(Square::new(rank, file), color, piece);
                    file += 1;
                }
            }
            if file > 8 {
                return Err(ChessParseError::TooManyFiles { rank });
            }
        }

        for color in [Color::White, Color::Black] {
            if !pos.pieces(color, Piece::King).is_single() {
                return Err(ChessParseError::MissingKing { color });
            }
        }

        // Side to move.
        pos.side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(ChessParseError::InvalidSideToMove {
                    found: other.to_string(),
                })
            }
        };

        // Castling rights.
        if parts[2] != "-" {
            for c in parts[2].chars() {
                match c {
                    'K' => pos.castling[Color::White.index()].add_short(),
                    'Q' => pos.castling[Color::White.index()].add_long(),
                    'k' => pos.castling[Color::Black.index()].add_short(),
                    'q' => pos.castling[Color::Black.index()].add_long(),
                    _ => return Err(ChessParseError::InvalidCastling { ch: c }),
                }
            }
        }

        // En passant field.
        pos.ep_file = if parts[3] == "-" {
            EP_NONE as u8
        } else {
            let sq: Square =
                parts[3]
                    .parse()
                    .map_err(|_| ChessParseError::InvalidEnPassant {
                        found: parts[3].to_string(),
                    })?;
            let expected_rank = match pos.side_to_move {
                Color::White => 5,
                Color::Black => 2,
            };
            if sq.rank() != expected_rank {
                return Err(ChessParseError::InvalidEnPassant {
                    found: parts[3].to_string(),
                });
            }
            sq.file() as u8
        };

        // Counters.
        if parts.len() == 6 {
            pos.halfmove_clock =
                parts[4]
                    .parse()
                    .map_err(|_| ChessParseError::InvalidCounter {
                        found: parts[4].to_string(),
                    })?;
            let fullmove: u32 =
                parts[5]
                    .parse()
                    .map_err(|_| ChessParseError::InvalidCounter {
                        found: parts[5].to_string(),
                    })?;
            let fullmove = fullmove.max(1);
            pos.ply = (fullmove - 1) * 2
                + if pos.side_to_move == Color::Black { 1 } else { 0 };
        } else {
            pos.ply = if pos.side_to_move == Color::Black { 1 } else { 0 };
        }
        pos.root_ply = pos.ply;

        pos.key = pos.compute_key();
        pos.pawn_key = pos.compute_pawn_key();
        pos.key_history.push(pos.key);
        pos.checkers = pos.attackers_to(
            pos.king_square(pos.side_to_move),
            pos.occupied,
            pos.side_to_move.opponent(),
        );
        Ok(pos)
    }

    /// Emit the position as a six-field FEN string.
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut board = String::new();
        for rank in (0..8).rev() {
            let mut empty_run = 0;
            for file in 0..8 {
                match self.piece_at(Square::new(rank, file)) {
                    Some((color, piece)) => {
                        if empty_run > 0 {
                            board.push_str(&empty_run.to_string());
                            empty_run = 0;
                        }
                        board.push(piece.to_fen_char(color));
                    }
                    None => empty_run += 1,
                }
            }
            if empty_run > 0 {
                board.push_str(&empty_run.to_string());
            }
            if rank > 0 {
                board.push('/');
            }
        }

        let side = match self.side_to_move {
            Color::White => "w",
            Color::Black => "b",
        };

        let mut castling = String::new();
        if self.castling[Color::White.index()].has_short() {
            castling.push('K');
        }
        if self.castling[Color::White.index()].has_long() {
            castling.push('Q');
        }
        if self.castling[Color::Black.index()].has_short() {
            castling.push('k');
        }
        if self.castling[Color::Black.index()].has_long() {
            castling.push('q');
        }
        if castling.is_empty() {
            castling.push('-');
        }

        let ep = self
            .ep_square()
            .map_or_else(|| "-".to_string(), |sq| sq.to_string());

        format!(
            "{} {} {} {} {} {}",
            board,
            side,
            castling,
            ep,
            self.halfmove_clock,
            self.ply / 2 + 1
        )
    }

    /// Parse a move in pure coordinate notation (`e2e4`, `e7e8q`) against the
    /// current position, returning the matching legal move.
    pub fn parse_move(&self, notation: &str) -> Result<Move, ChessParseError> {
        if notation.len() < 4 || notation.len() > 5 {
            return Err(ChessParseError::InvalidMove {
                notation: notation.to_string(),
            });
        }
        let chars: Vec<char> = notation.chars().collect();
        for &(file, rank) in &[(chars[0], chars[1]), (chars[2], chars[3])] {
            if !('a'..='h').contains(&file) || !('1'..='8').contains(&rank) {
                return Err(ChessParseError::InvalidMove {
                    notation: notation.to_string(),
                });
            }
        }
        let from = Square::new(rank_to_index(chars[1]), file_to_index(chars[0]));
        let to = Square::new(rank_to_index(chars[3]), file_to_index(chars[2]));

        let promotion = if notation.len() == 5 {
            let piece = Piece::from_char(chars[4])
                .ok_or(ChessParseError::InvalidPromotion { ch: chars[4] })?;
            if matches!(piece, Piece::Pawn | Piece::King) {
                return Err(ChessParseError::InvalidPromotion { ch: chars[4] });
            }
            Some(piece)
        } else {
            None
        };

        let legal = self.all_moves();
        for mv in &legal {
            if mv.from() == from && mv.to() == to && mv.promotion() == promotion {
                return Ok(*mv);
            }
        }
        Err(ChessParseError::InvalidMove {
            notation: notation.to_string(),
        })
    }

    /// Make a move after running it through the legality filter.
    pub fn play(&mut self, mv: Move) -> Result<(), IllegalMoveError> {
        if !self.is_legal(mv) {
            return Err(IllegalMoveError {
                notation: mv.to_string(),
            });
        }
        self.make(mv);
        Ok(())
    }

    /// Parse and play a coordinate move in one call.
    pub fn play_uci(&mut self, notation: &str) -> Result<Move, ChessParseError> {
        let mv = self.parse_move(notation)?;
        self.make(mv);
        Ok(mv)
    }
}

impl FromStr for Position {
    type Err = ChessParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_fen(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_roundtrip() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn four_field_form_defaults_counters() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq -").unwrap();
        assert_eq!(pos.halfmove_clock(), 0);
        assert_eq!(pos.to_fen(), "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
    }

    #[test]
    fn ep_and_counters_roundtrip() {
        let fen = "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2";
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.ep_square(), Some("d6".parse().unwrap()));
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn black_to_move_roundtrip() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn rejects_malformed_fens() {
        assert!(matches!(
            Position::from_fen("8/8/8 w - -"),
            Err(ChessParseError::BadRankCount { .. })
        ));
        assert!(matches!(
            Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNX w KQkq - 0 1"),
            Err(ChessParseError::InvalidPiece { .. })
        ));
        assert!(matches!(
            Position::from_fen("8/8/8/8/8/8/8/4K2k x - - 0 1"),
            Err(ChessParseError::InvalidSideToMove { .. })
        ));
        assert!(matches!(
            Position::from_fen("8/8/8/8/8/8/8/4K2k w - e9 0 1"),
            Err(ChessParseError::InvalidEnPassant { .. })
        ));
        assert!(matches!(
            Position::from_fen("8/8/8/8/8/8/8/4K2k w - - 0"),
            Err(ChessParseError::BadFieldCount { .. })
        ));
        assert!(matches!(
            Position::from_fen("8/8/8/8/8/8/8/7K w - - 0 1"),
            Err(ChessParseError::MissingKing { .. })
        ));
        assert!(matches!(
            Position::from_fen("ppppppppp/8/8/8/8/8/8/4K2k w - - 0 1"),
            Err(ChessParseError::TooManyFiles { .. })
        ));
    }

    #[test]
    fn parse_move_rejects_illegal() {
        let pos = Position::new();
        assert!(pos.parse_move("e2e4").is_ok());
        assert!(matches!(
            pos.parse_move("e2e5"),
            Err(ChessParseError::InvalidMove { .. })
        ));
        assert!(matches!(
            pos.parse_move("e2"),
            Err(ChessParseError::InvalidMove { .. })
        ));
        assert!(matches!(
            pos.parse_move("e7e8x"),
            Err(ChessParseError::InvalidPromotion { .. })
        ));
    }

    #[test]
    fn play_uci_applies_moves() {
        let mut pos = Position::new();
        pos.play_uci("e2e4").unwrap();
        pos.play_uci("c7c5").unwrap();
        assert_eq!(
            pos.to_fen(),
            "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2"
        );
    }
}
