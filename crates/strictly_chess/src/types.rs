//! Core domain types for chess.

use serde::{Deserialize, Serialize};

use crate::MoveError;

/// Side in the game.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    strum::EnumIter,
)]
pub enum Color {
    /// White (moves first).
    White,
    /// Black.
    Black,
}

impl Color {
    /// Returns the opposing side.
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Rank direction pawns of this color advance in.
    pub(crate) fn forward(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    /// Rank the pieces of this color start on.
    pub(crate) fn home_rank(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }

    /// Rank pawns of this color start on.
    pub(crate) fn pawn_rank(self) -> u8 {
        match self {
            Color::White => 1,
            Color::Black => 6,
        }
    }

    /// Rank a pawn of this color promotes on.
    pub(crate) fn promotion_rank(self) -> u8 {
        self.opponent().home_rank()
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Color::White => 0,
            Color::Black => 1,
        }
    }
}

/// Kind of chess piece.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    strum::EnumIter,
)]
pub enum PieceKind {
    /// Pawn.
    Pawn,
    /// Knight.
    Knight,
    /// Bishop.
    Bishop,
    /// Rook.
    Rook,
    /// Queen.
    Queen,
    /// King.
    King,
}

impl PieceKind {
    /// Material value in pawns. The king has no material value.
    pub fn value(self) -> i16 {
        match self {
            PieceKind::Pawn => 1,
            PieceKind::Knight | PieceKind::Bishop => 3,
            PieceKind::Rook => 5,
            PieceKind::Queen => 9,
            PieceKind::King => 0,
        }
    }

    /// Whether a pawn may promote to this kind.
    pub fn is_promotion_target(self) -> bool {
        matches!(
            self,
            PieceKind::Knight | PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen
        )
    }

    /// Single-letter symbol, uppercase for white and lowercase for black.
    pub fn symbol(self, color: Color) -> char {
        let symbol = match self {
            PieceKind::Pawn => 'P',
            PieceKind::Knight => 'N',
            PieceKind::Bishop => 'B',
            PieceKind::Rook => 'R',
            PieceKind::Queen => 'Q',
            PieceKind::King => 'K',
        };
        match color {
            Color::White => symbol,
            Color::Black => symbol.to_ascii_lowercase(),
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            PieceKind::Pawn => 1,
            PieceKind::Knight => 2,
            PieceKind::Bishop => 3,
            PieceKind::Rook => 4,
            PieceKind::Queen => 5,
            PieceKind::King => 6,
        }
    }
}

/// A square on the board, addressed by file (a-h as 0-7) and rank (1-8 as 0-7).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(u8, u8)", into = "(u8, u8)")]
pub struct Position {
    file: u8,
    rank: u8,
}

impl Position {
    /// Creates a position, or `None` if either coordinate is off the board.
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        (file < 8 && rank < 8).then_some(Self { file, rank })
    }

    /// Parses algebraic square notation such as `"e4"`.
    pub fn parse(square: &str) -> Option<Self> {
        let mut chars = square.chars();
        let file = chars.next()?;
        let rank = chars.next()?;
        if chars.next().is_some() || !('a'..='h').contains(&file) || !('1'..='8').contains(&rank)
        {
            return None;
        }
        Self::new(file as u8 - b'a', rank as u8 - b'1')
    }

    /// File index (0 = a).
    pub fn file(self) -> u8 {
        self.file
    }

    /// Rank index (0 = rank 1).
    pub fn rank(self) -> u8 {
        self.rank
    }

    /// Applies a relative move, returning `None` if it leaves the board.
    pub fn offset(self, mv: Move) -> Option<Self> {
        let file = i16::from(self.file) + i16::from(mv.d_file);
        let rank = i16::from(self.rank) + i16::from(mv.d_rank);
        if !(0..8).contains(&file) || !(0..8).contains(&rank) {
            return None;
        }
        Self::new(file as u8, rank as u8)
    }
}

impl TryFrom<(u8, u8)> for Position {
    type Error = MoveError;

    fn try_from((file, rank): (u8, u8)) -> Result<Self, Self::Error> {
        Self::new(file, rank).ok_or(MoveError::OffBoard)
    }
}

impl From<Position> for (u8, u8) {
    fn from(position: Position) -> Self {
        (position.file, position.rank)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}

/// A relative displacement of a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// Change in file.
    pub d_file: i8,
    /// Change in rank.
    pub d_rank: i8,
}

impl Move {
    /// Creates a move from a file and rank delta.
    pub fn new(d_file: i8, d_rank: i8) -> Self {
        Self { d_file, d_rank }
    }

    /// The delta that carries a piece from `from` to `to`.
    pub fn between(from: Position, to: Position) -> Self {
        Self {
            d_file: to.file as i8 - from.file as i8,
            d_rank: to.rank as i8 - from.rank as i8,
        }
    }

    pub(crate) fn is_null(self) -> bool {
        self.d_file == 0 && self.d_rank == 0
    }
}

/// A request to move the piece on `position` by `mv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Square of the piece being moved.
    pub position: Position,
    /// Relative displacement.
    #[serde(rename = "move")]
    pub mv: Move,
    /// Piece kind a pawn promotes to when reaching the far rank.
    #[serde(default)]
    pub promote_to: Option<PieceKind>,
}

impl MoveRequest {
    /// Creates a request without promotion.
    pub fn new(position: Position, mv: Move) -> Self {
        Self {
            position,
            mv,
            promote_to: None,
        }
    }

    /// Creates a request moving a piece from one square to another.
    pub fn from_to(from: Position, to: Position) -> Self {
        Self::new(from, Move::between(from, to))
    }

    /// Sets the promotion kind.
    pub fn promoting_to(mut self, kind: PieceKind) -> Self {
        self.promote_to = Some(kind);
        self
    }

    /// Destination square, if on the board.
    pub fn target(&self) -> Option<Position> {
        self.position.offset(self.mv)
    }
}

impl std::fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.target() {
            Some(target) => write!(f, "{}{}", self.position, target)?,
            None => write!(f, "{}{:+}{:+}", self.position, self.mv.d_file, self.mv.d_rank)?,
        }
        if let Some(kind) = self.promote_to {
            write!(f, "={}", kind.symbol(Color::White))?;
        }
        Ok(())
    }
}

/// The most recently applied move, kept for en passant and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMove {
    /// Kind of the piece that moved (before any promotion).
    pub kind: PieceKind,
    /// Side that moved.
    pub color: Color,
    /// Origin square.
    pub from: Position,
    /// Destination square.
    pub to: Position,
}

impl LastMove {
    /// Whether this was a pawn advancing two squares.
    pub fn is_double_advance(&self) -> bool {
        self.kind == PieceKind::Pawn && self.from.rank.abs_diff(self.to.rank) == 2
    }
}

/// Outcome of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The given side won.
    Winner(Color),
    /// The game ended in a draw.
    Draw,
}

impl Outcome {
    /// Returns the winner if there is one.
    pub fn winner(&self) -> Option<Color> {
        match self {
            Outcome::Winner(color) => Some(*color),
            Outcome::Draw => None,
        }
    }

    /// Returns true if the game was a draw.
    pub fn is_draw(&self) -> bool {
        matches!(self, Outcome::Draw)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Winner(color) => write!(f, "{} wins", color),
            Outcome::Draw => write!(f, "Draw"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_parse_and_display() {
        let e4 = Position::parse("e4").expect("valid square");
        assert_eq!((e4.file(), e4.rank()), (4, 3));
        assert_eq!(e4.to_string(), "e4");
        assert!(Position::parse("i1").is_none());
        assert!(Position::parse("a9").is_none());
        assert!(Position::parse("a10").is_none());
    }

    #[test]
    fn test_offset_leaves_board() {
        let h8 = Position::parse("h8").expect("valid square");
        assert_eq!(h8.offset(Move::new(1, 0)), None);
        assert_eq!(h8.offset(Move::new(-7, -7)), Position::parse("a1"));
    }

    #[test]
    fn test_position_rejects_out_of_range_on_deserialize() {
        let ok: Result<Position, _> = serde_json::from_str("[4,3]");
        assert!(ok.is_ok());
        let bad: Result<Position, _> = serde_json::from_str("[8,0]");
        assert!(bad.is_err());
    }
}
