//! 8x8 board with piece ownership and attack queries.

use serde::{Deserialize, Serialize};

use crate::piece::Piece;
use crate::{Color, Move, MoveError, PieceKind, Position};

/// The chess board. Each square is owned by the board or empty.
///
/// Both kings are always present; their squares are tracked so check
/// detection does not need to search for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// Squares indexed `[file][rank]`.
    squares: [[Option<Piece>; 8]; 8],
    /// King squares indexed by color.
    kings: [Position; 2],
}

const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

impl Board {
    /// Standard starting position.
    pub fn standard() -> Self {
        Self::starting(true)
    }

    /// Starting position with every pawn removed.
    pub fn without_pawns() -> Self {
        Self::starting(false)
    }

    fn starting(with_pawns: bool) -> Self {
        let mut squares = [[None; 8]; 8];
        let mut kings = [Position::default(); 2];
        for color in [Color::White, Color::Black] {
            for (file, kind) in (0u8..).zip(BACK_RANK) {
                if let Some(position) = Position::new(file, color.home_rank()) {
                    squares[usize::from(file)][usize::from(position.rank())] =
                        Some(Piece::new(kind, color, position));
                    if kind == PieceKind::King {
                        kings[color.index()] = position;
                    }
                }
                if with_pawns && let Some(position) = Position::new(file, color.pawn_rank()) {
                    squares[usize::from(file)][usize::from(position.rank())] =
                        Some(Piece::new(PieceKind::Pawn, color, position));
                }
            }
        }
        Self { squares, kings }
    }

    /// Builds a board from arbitrary pieces.
    ///
    /// # Errors
    ///
    /// Returns [`MoveError::InvalidSetup`] unless each side has exactly one
    /// king and no two pieces share a square.
    pub fn from_pieces(pieces: impl IntoIterator<Item = Piece>) -> Result<Self, MoveError> {
        let mut squares = [[None; 8]; 8];
        let mut kings: [Option<Position>; 2] = [None, None];
        for piece in pieces {
            let position = piece.position();
            let slot = &mut squares[usize::from(position.file())][usize::from(position.rank())];
            if slot.is_some() {
                return Err(MoveError::InvalidSetup(format!("two pieces on {}", position)));
            }
            *slot = Some(piece);
            if piece.kind() == PieceKind::King {
                let king = &mut kings[piece.color().index()];
                if king.is_some() {
                    return Err(MoveError::InvalidSetup(format!(
                        "{} has more than one king",
                        piece.color()
                    )));
                }
                *king = Some(position);
            }
        }
        match kings {
            [Some(white), Some(black)] => Ok(Self {
                squares,
                kings: [white, black],
            }),
            _ => Err(MoveError::InvalidSetup("each side needs a king".to_string())),
        }
    }

    /// Piece on the given square.
    pub fn get(&self, position: Position) -> Option<Piece> {
        self.squares[usize::from(position.file())][usize::from(position.rank())]
    }

    /// Square of the given side's king.
    pub fn king(&self, color: Color) -> Position {
        self.kings[color.index()]
    }

    /// Iterates all pieces, file-major from a1.
    pub fn pieces(&self) -> impl Iterator<Item = Piece> + '_ {
        self.squares.iter().flatten().filter_map(|square| *square)
    }

    /// Iterates the pieces of one side.
    pub fn pieces_of(&self, color: Color) -> impl Iterator<Item = Piece> + '_ {
        self.pieces().filter(move |piece| piece.color() == color)
    }

    /// Whether any piece of color `by` attacks `target`.
    pub fn is_attacked(&self, target: Position, by: Color) -> bool {
        self.pieces_of(by).any(|piece| piece.threatens(self, target))
    }

    /// Whether every square strictly between `from` and `to` is empty.
    ///
    /// Only meaningful for squares on a shared file, rank, or diagonal.
    pub(crate) fn path_clear(&self, from: Position, to: Position) -> bool {
        let delta = Move::between(from, to);
        let step = Move::new(delta.d_file.signum(), delta.d_rank.signum());
        let mut current = from;
        loop {
            current = match current.offset(step) {
                Some(next) if next != to => next,
                _ => return true,
            };
            if self.get(current).is_some() {
                return false;
            }
        }
    }

    /// Moves the piece on `from` to `to`, capturing whatever stood there.
    pub(crate) fn relocate(&mut self, from: Position, to: Position) {
        if let Some(piece) = self.take(from) {
            let piece = piece.relocated(to);
            if piece.kind() == PieceKind::King {
                self.kings[piece.color().index()] = to;
            }
            self.squares[usize::from(to.file())][usize::from(to.rank())] = Some(piece);
        }
    }

    /// Removes and returns the piece on `position`.
    pub(crate) fn take(&mut self, position: Position) -> Option<Piece> {
        self.squares[usize::from(position.file())][usize::from(position.rank())].take()
    }

    /// Changes the kind of the piece on `position`.
    pub(crate) fn promote(&mut self, position: Position, kind: PieceKind) {
        let square = &mut self.squares[usize::from(position.file())][usize::from(position.rank())];
        if let Some(piece) = square {
            *piece = piece.promoted(kind);
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for rank in (0..8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8 {
                let symbol = Position::new(file, rank)
                    .and_then(|position| self.get(position))
                    .map_or('.', |piece| piece.kind().symbol(piece.color()));
                write!(f, "{}", symbol)?;
            }
            writeln!(f)?;
        }
        write!(f, "  abcdefgh")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Position {
        Position::parse(name).expect("valid square")
    }

    #[test]
    fn test_standard_layout() {
        let board = Board::standard();
        assert_eq!(board.pieces().count(), 32);
        assert_eq!(board.king(Color::White), sq("e1"));
        assert_eq!(board.king(Color::Black), sq("e8"));
        let queen = board.get(sq("d8")).expect("black queen");
        assert_eq!((queen.kind(), queen.color()), (PieceKind::Queen, Color::Black));
    }

    #[test]
    fn test_without_pawns() {
        let board = Board::without_pawns();
        assert_eq!(board.pieces().count(), 16);
        assert!(board.pieces().all(|piece| piece.kind() != PieceKind::Pawn));
    }

    #[test]
    fn test_from_pieces_requires_both_kings() {
        let lone = Piece::new(PieceKind::King, Color::White, sq("e1"));
        assert!(matches!(
            Board::from_pieces([lone]),
            Err(MoveError::InvalidSetup(_))
        ));
    }

    #[test]
    fn test_from_pieces_rejects_shared_square() {
        let pieces = [
            Piece::new(PieceKind::King, Color::White, sq("e1")),
            Piece::new(PieceKind::King, Color::Black, sq("e8")),
            Piece::new(PieceKind::Rook, Color::Black, sq("e1")),
        ];
        assert!(Board::from_pieces(pieces).is_err());
    }

    #[test]
    fn test_path_clear() {
        let board = Board::standard();
        assert!(board.path_clear(sq("e2"), sq("e7")));
        assert!(!board.path_clear(sq("e1"), sq("e3")));
        assert!(board.path_clear(sq("e1"), sq("e2")));
    }

    #[test]
    fn test_display_renders_ranks() {
        let rendered = Board::standard().to_string();
        assert!(rendered.starts_with("8 rnbqkbnr"));
        assert!(rendered.ends_with("  abcdefgh"));
    }
}
