//! Errors raised while validating or applying a move.

use crate::{Color, PieceKind, Position};

/// Error that can occur when validating or applying a move.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// The game is already over.
    #[display("The game is over")]
    GameOver,

    /// No piece stands on the selected square.
    #[display("No piece on {}", _0)]
    InvalidSelection(Position),

    /// The selected piece does not belong to the side to move.
    #[display("It's {}'s turn", _0)]
    WrongTurn(Color),

    /// The move would leave the board.
    #[display("Move leaves the board")]
    OffBoard,

    /// The piece cannot move in that pattern.
    #[display("{} cannot move that way", _0)]
    IllegalPattern(PieceKind),

    /// Another piece stands in the way.
    #[display("Path is blocked")]
    PathBlocked,

    /// The destination holds a piece of the mover's own color.
    #[display("Cannot capture own piece")]
    OwnPieceAtTarget,

    /// Castling preconditions are not met.
    #[display("Cannot castle: {}", _0)]
    CastlingNotAllowed(&'static str),

    /// A pawn reached the far rank without a promotion kind.
    #[display("Promotion piece required")]
    PromotionRequired,

    /// The requested promotion kind is not allowed.
    #[display("Cannot promote to {}", _0)]
    InvalidPromotion(PieceKind),

    /// The move would leave the mover's king attacked.
    #[display("Move leaves the king in check")]
    KingInCheck,

    /// The position could not be encoded for repetition tracking.
    #[display("Position encoding failed: {}", _0)]
    Encoding(String),

    /// A prepared move no longer matches the game it was prepared against.
    #[display("Prepared move is stale")]
    Stale,

    /// A custom board setup is not playable.
    #[display("Invalid setup: {}", _0)]
    InvalidSetup(String),
}

impl std::error::Error for MoveError {}

impl From<std::io::Error> for MoveError {
    fn from(err: std::io::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}
