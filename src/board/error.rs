//! Error types for board operations.

use std::fmt;

/// Error type for malformed FEN or move strings.
///
/// Parsing failures are surfaced to the caller and never recovered
/// internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChessParseError {
    /// FEN string has the wrong number of fields (needs 4 or 6).
    BadFieldCount { found: usize },
    /// FEN board field has the wrong number of ranks.
    BadRankCount { found: usize },
    /// A rank in the board field describes more than eight files.
    TooManyFiles { rank: usize },
    /// Unrecognized piece character.
    InvalidPiece { ch: char },
    /// Side-to-move field is not `w` or `b`.
    InvalidSideToMove { found: String },
    /// Castling field contains a character outside `KQkq-`.
    InvalidCastling { ch: char },
    /// En passant field is not `-` or a square.
    InvalidEnPassant { found: String },
    /// A move counter field is not an unsigned integer.
    InvalidCounter { found: String },
    /// Square notation outside `a1`..`h8`.
    InvalidSquare { notation: String },
    /// Coordinate move string with bad length or characters.
    InvalidMove { notation: String },
    /// Invalid promotion piece suffix.
    InvalidPromotion { ch: char },
    /// The board field does not place exactly one king per side.
    MissingKing { color: crate::board::Color },
}

impl fmt::Display for ChessParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChessParseError::BadFieldCount { found } => {
                write!(f, "FEN must have 4 or 6 fields, found {found}")
            }
            ChessParseError::BadRankCount { found } => {
                write!(f, "FEN board must have 8 ranks, found {found}")
            }
            ChessParseError::TooManyFiles { rank } => {
                write!(f, "too many files in FEN rank {rank}")
            }
            ChessParseError::InvalidPiece { ch } => {
                write!(f, "invalid piece character '{ch}'")
            }
            ChessParseError::InvalidSideToMove { found } => {
                write!(f, "invalid side to move '{found}', expected 'w' or 'b'")
            }
            ChessParseError::InvalidCastling { ch } => {
                write!(f, "invalid castling character '{ch}'")
            }
            ChessParseError::InvalidEnPassant { found } => {
                write!(f, "invalid en passant field '{found}'")
            }
            ChessParseError::InvalidCounter { found } => {
                write!(f, "invalid move counter '{found}'")
            }
            ChessParseError::InvalidSquare { notation } => {
                write!(f, "invalid square '{notation}'")
            }
            ChessParseError::InvalidMove { notation } => {
                write!(f, "invalid move string '{notation}'")
            }
            ChessParseError::InvalidPromotion { ch } => {
                write!(f, "invalid promotion piece '{ch}'")
            }
            ChessParseError::MissingKing { color } => {
                write!(f, "board must have exactly one {color} king")
            }
        }
    }
}

impl std::error::Error for ChessParseError {}

/// Error returned when a caller attempts to play a move the legality filter
/// rejects. The caller decides whether to crash or retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalMoveError {
    /// Coordinate notation of the rejected move.
    pub notation: String,
}

impl fmt::Display for IllegalMoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal move '{}'", self.notation)
    }
}

impl std::error::Error for IllegalMoveError {}
