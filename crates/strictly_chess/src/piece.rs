//! Per-kind movement and capture patterns.

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::{Color, LastMove, Move, MoveError, PieceKind, Position};

/// A piece on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    kind: PieceKind,
    color: Color,
    position: Position,
    moved: bool,
}

/// Side effects a pattern-valid move carries beyond relocating the piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Special {
    /// Plain move or capture on the target square.
    Normal,
    /// Pawn captures the pawn standing on the given square.
    EnPassant(Position),
    /// King castles; the rook travels between the given squares.
    Castle { rook_from: Position, rook_to: Position },
    /// Pawn reaches the far rank.
    Promotion,
}

impl Piece {
    /// Creates an unmoved piece.
    pub fn new(kind: PieceKind, color: Color, position: Position) -> Self {
        Self {
            kind,
            color,
            position,
            moved: false,
        }
    }

    /// Marks the piece as having moved, forfeiting castling rights.
    pub fn with_moved(mut self) -> Self {
        self.moved = true;
        self
    }

    /// Piece kind.
    pub fn kind(&self) -> PieceKind {
        self.kind
    }

    /// Piece color.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Current square.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Whether the piece has moved since the game started.
    pub fn has_moved(&self) -> bool {
        self.moved
    }

    pub(crate) fn relocated(self, to: Position) -> Self {
        Self {
            position: to,
            moved: true,
            ..self
        }
    }

    pub(crate) fn promoted(self, kind: PieceKind) -> Self {
        Self { kind, ..self }
    }

    /// Whether this piece attacks `target`.
    ///
    /// Pawns attack diagonally only; castling never attacks.
    pub fn threatens(&self, board: &Board, target: Position) -> bool {
        let mv = Move::between(self.position, target);
        if mv.is_null() {
            return false;
        }
        match self.kind {
            PieceKind::Pawn => mv.d_rank == self.color.forward() && mv.d_file.abs() == 1,
            kind => shape_matches(kind, mv) && (!slides(kind) || board.path_clear(self.position, target)),
        }
    }

    /// Checks pattern, path, and special-move rules, ignoring own-king safety.
    pub(crate) fn pattern(
        &self,
        board: &Board,
        mv: Move,
        last: Option<&LastMove>,
    ) -> Result<Special, MoveError> {
        if mv.is_null() {
            return Err(MoveError::IllegalPattern(self.kind));
        }
        let target = self.position.offset(mv).ok_or(MoveError::OffBoard)?;
        if board
            .get(target)
            .is_some_and(|occupant| occupant.color == self.color)
        {
            return Err(MoveError::OwnPieceAtTarget);
        }

        match self.kind {
            PieceKind::Pawn => self.pawn_pattern(board, mv, target, last),
            PieceKind::King if mv.d_rank == 0 && mv.d_file.abs() == 2 => {
                self.castle_pattern(board, mv)
            }
            kind => {
                if !shape_matches(kind, mv) {
                    return Err(MoveError::IllegalPattern(kind));
                }
                if slides(kind) && !board.path_clear(self.position, target) {
                    return Err(MoveError::PathBlocked);
                }
                Ok(Special::Normal)
            }
        }
    }

    fn pawn_pattern(
        &self,
        board: &Board,
        mv: Move,
        target: Position,
        last: Option<&LastMove>,
    ) -> Result<Special, MoveError> {
        let forward = self.color.forward();
        let advance = if target.rank() == self.color.promotion_rank() {
            Special::Promotion
        } else {
            Special::Normal
        };

        match (mv.d_file, mv.d_rank) {
            (0, d) if d == forward => {
                if board.get(target).is_some() {
                    return Err(MoveError::PathBlocked);
                }
                Ok(advance)
            }
            (0, d) if d == 2 * forward => {
                if self.position.rank() != self.color.pawn_rank() {
                    return Err(MoveError::IllegalPattern(self.kind));
                }
                if board.get(target).is_some() || !board.path_clear(self.position, target) {
                    return Err(MoveError::PathBlocked);
                }
                Ok(Special::Normal)
            }
            (-1 | 1, d) if d == forward => {
                if board.get(target).is_some() {
                    return Ok(advance);
                }
                // En passant: the enemy pawn that just advanced two squares
                // must stand beside this pawn on the target file.
                let beside = Position::new(target.file(), self.position.rank());
                match last {
                    Some(last)
                        if last.is_double_advance()
                            && last.color != self.color
                            && Some(last.to) == beside =>
                    {
                        Ok(Special::EnPassant(last.to))
                    }
                    _ => Err(MoveError::IllegalPattern(self.kind)),
                }
            }
            _ => Err(MoveError::IllegalPattern(self.kind)),
        }
    }

    fn castle_pattern(&self, board: &Board, mv: Move) -> Result<Special, MoveError> {
        if self.moved || self.position.file() != 4 || self.position.rank() != self.color.home_rank()
        {
            return Err(MoveError::CastlingNotAllowed("king has moved"));
        }
        let step = Move::new(mv.d_file.signum(), 0);
        let rook_file = if mv.d_file > 0 { 7 } else { 0 };
        let rook_from = Position::new(rook_file, self.position.rank()).ok_or(MoveError::OffBoard)?;
        let rook_ready = board.get(rook_from).is_some_and(|rook| {
            rook.kind == PieceKind::Rook && rook.color == self.color && !rook.moved
        });
        if !rook_ready {
            return Err(MoveError::CastlingNotAllowed("rook unavailable"));
        }
        if !board.path_clear(self.position, rook_from) {
            return Err(MoveError::PathBlocked);
        }

        let enemy = self.color.opponent();
        if board.is_attacked(self.position, enemy) {
            return Err(MoveError::CastlingNotAllowed("king is in check"));
        }
        let crossing = self.position.offset(step).ok_or(MoveError::OffBoard)?;
        if board.is_attacked(crossing, enemy) {
            return Err(MoveError::CastlingNotAllowed("king passes through check"));
        }

        Ok(Special::Castle {
            rook_from,
            rook_to: crossing,
        })
    }

    /// Relative moves worth testing for this piece, before legality checks.
    pub(crate) fn candidate_moves(&self) -> Vec<Move> {
        let moves: Vec<Move> = match self.kind {
            PieceKind::Pawn => {
                let f = self.color.forward();
                vec![
                    Move::new(0, f),
                    Move::new(0, 2 * f),
                    Move::new(-1, f),
                    Move::new(1, f),
                ]
            }
            PieceKind::Knight => KNIGHT_JUMPS
                .iter()
                .map(|&(df, dr)| Move::new(df, dr))
                .collect(),
            PieceKind::King => KING_STEPS
                .iter()
                .map(|&(df, dr)| Move::new(df, dr))
                .chain([Move::new(2, 0), Move::new(-2, 0)])
                .collect(),
            kind => {
                let directions: &[(i8, i8)] = match kind {
                    PieceKind::Bishop => &KING_STEPS[4..],
                    PieceKind::Rook => &KING_STEPS[..4],
                    _ => &KING_STEPS,
                };
                directions
                    .iter()
                    .flat_map(|&(df, dr)| (1..8).map(move |n| Move::new(df * n, dr * n)))
                    .collect()
            }
        };
        moves
            .into_iter()
            .filter(|&mv| self.position.offset(mv).is_some())
            .collect()
    }
}

/// Orthogonal steps first, then diagonal.
const KING_STEPS: [(i8, i8); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

fn shape_matches(kind: PieceKind, mv: Move) -> bool {
    let (df, dr) = (mv.d_file.abs(), mv.d_rank.abs());
    let straight = (df == 0) != (dr == 0);
    let diagonal = df == dr && df != 0;
    match kind {
        PieceKind::Knight => matches!((df, dr), (1, 2) | (2, 1)),
        PieceKind::Bishop => diagonal,
        PieceKind::Rook => straight,
        PieceKind::Queen => straight || diagonal,
        PieceKind::King => df.max(dr) == 1,
        PieceKind::Pawn => false,
    }
}

fn slides(kind: PieceKind) -> bool {
    matches!(kind, PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Position {
        Position::parse(name).expect("valid square")
    }

    #[test]
    fn test_knight_jumps_over_pieces() {
        let board = Board::standard();
        let knight = board.get(sq("g1")).expect("knight on g1");
        assert_eq!(
            knight.pattern(&board, Move::between(sq("g1"), sq("f3")), None),
            Ok(Special::Normal)
        );
    }

    #[test]
    fn test_rook_blocked_by_own_pawn() {
        let board = Board::standard();
        let rook = board.get(sq("a1")).expect("rook on a1");
        assert_eq!(
            rook.pattern(&board, Move::between(sq("a1"), sq("a4")), None),
            Err(MoveError::PathBlocked)
        );
    }

    #[test]
    fn test_pawn_does_not_threaten_forward() {
        let board = Board::standard();
        let pawn = board.get(sq("e2")).expect("pawn on e2");
        assert!(!pawn.threatens(&board, sq("e3")));
        assert!(pawn.threatens(&board, sq("d3")));
        assert!(pawn.threatens(&board, sq("f3")));
    }

    #[test]
    fn test_candidate_moves_stay_on_board() {
        let board = Board::standard();
        let rook = board.get(sq("a1")).expect("rook on a1");
        // 7 up the file plus 7 along the rank.
        assert_eq!(rook.candidate_moves().len(), 14);
    }
}
