//! Legality checks shared by move application and reply enumeration.

use std::io::Write;

use strum::IntoEnumIterator;
use tracing::instrument;

use crate::board::Board;
use crate::piece::Special;
use crate::{Color, LastMove, Move, MoveError, MoveRequest, PieceKind, Position};

/// Applies `request` to a copy of `board`, enforcing every rule including
/// own-king safety. The original board is never touched.
pub(crate) fn simulate(
    board: &Board,
    last: Option<&LastMove>,
    request: &MoveRequest,
) -> Result<(Board, LastMove), MoveError> {
    let from = request.position;
    let piece = board.get(from).ok_or(MoveError::InvalidSelection(from))?;
    let special = piece.pattern(board, request.mv, last)?;
    let to = request.target().ok_or(MoveError::OffBoard)?;

    let mut next = board.clone();
    match special {
        Special::Normal => next.relocate(from, to),
        Special::EnPassant(captured) => {
            next.take(captured);
            next.relocate(from, to);
        }
        Special::Castle { rook_from, rook_to } => {
            next.relocate(from, to);
            next.relocate(rook_from, rook_to);
        }
        Special::Promotion => {
            let kind = request.promote_to.ok_or(MoveError::PromotionRequired)?;
            if !kind.is_promotion_target() {
                return Err(MoveError::InvalidPromotion(kind));
            }
            next.relocate(from, to);
            next.promote(to, kind);
        }
    }

    let color = piece.color();
    if next.is_attacked(next.king(color), color.opponent()) {
        return Err(MoveError::KingInCheck);
    }

    Ok((
        next,
        LastMove {
            kind: piece.kind(),
            color,
            from,
            to,
        },
    ))
}

/// Every request worth testing for `color`, with all promotion choices
/// expanded for pawns reaching the far rank.
pub(crate) fn candidates(board: &Board, color: Color) -> Vec<MoveRequest> {
    let mut requests = Vec::new();
    for piece in board.pieces_of(color) {
        for mv in piece.candidate_moves() {
            let request = MoveRequest::new(piece.position(), mv);
            let promotes = piece.kind() == PieceKind::Pawn
                && request
                    .target()
                    .is_some_and(|target| target.rank() == color.promotion_rank());
            if promotes {
                requests.extend(
                    PieceKind::iter()
                        .filter(|kind| kind.is_promotion_target())
                        .map(|kind| request.promoting_to(kind)),
                );
            } else {
                requests.push(request);
            }
        }
    }
    requests
}

/// All legal requests for `color`.
pub(crate) fn legal_moves(board: &Board, color: Color, last: Option<&LastMove>) -> Vec<MoveRequest> {
    candidates(board, color)
        .into_iter()
        .filter(|request| simulate(board, last, request).is_ok())
        .collect()
}

/// Whether `color` has at least one legal request.
#[instrument(level = "trace", skip(board, last))]
pub(crate) fn has_legal_move(board: &Board, color: Color, last: Option<&LastMove>) -> bool {
    candidates(board, color)
        .iter()
        .any(|request| simulate(board, last, request).is_ok())
}

const NO_EN_PASSANT: u8 = 0xFF;

/// Canonical encoding of a position for repetition detection.
///
/// Layout: side-to-move byte, castling-rights byte, en passant file byte
/// (`NO_EN_PASSANT` unless a capture is actually legal), then one four-byte
/// record per occupied square (file, rank, kind, color). Only rights that
/// change the set of legal moves are encoded.
pub(crate) fn encode(
    board: &Board,
    turn: Color,
    last: Option<&LastMove>,
) -> Result<Vec<u8>, MoveError> {
    let mut buf = Vec::with_capacity(3 + 32 * 4);
    buf.write_all(&[
        color_code(turn),
        castling_rights(board),
        en_passant_file(board, turn, last),
    ])?;
    for piece in board.pieces() {
        let position = piece.position();
        buf.write_all(&[
            position.file(),
            position.rank(),
            piece.kind().code(),
            color_code(piece.color()),
        ])?;
    }
    Ok(buf)
}

/// One bit per side and wing, set while the king and that corner rook are
/// both unmoved.
fn castling_rights(board: &Board) -> u8 {
    let mut rights = 0;
    for color in [Color::White, Color::Black] {
        let king = board.king(color);
        let king_ready = king.rank() == color.home_rank()
            && board.get(king).is_some_and(|piece| !piece.has_moved());
        if !king_ready {
            continue;
        }
        for (wing, rook_file) in [(0, 7), (1, 0)] {
            let rook_ready = Position::new(rook_file, king.rank())
                .and_then(|corner| board.get(corner))
                .is_some_and(|piece| {
                    piece.kind() == PieceKind::Rook
                        && piece.color() == color
                        && !piece.has_moved()
                });
            if rook_ready {
                rights |= 1 << (color.index() * 2 + wing);
            }
        }
    }
    rights
}

/// File of a pawn `turn` can legally capture en passant right now.
fn en_passant_file(board: &Board, turn: Color, last: Option<&LastMove>) -> u8 {
    let Some(last) = last.filter(|last| last.is_double_advance() && last.color != turn) else {
        return NO_EN_PASSANT;
    };
    let passed = Position::new(last.to.file(), (last.from.rank() + last.to.rank()) / 2);
    let capturable = [-1i8, 1].into_iter().any(|d_file| {
        let Some(beside) = last.to.offset(Move::new(d_file, 0)) else {
            return false;
        };
        let is_capturer = board
            .get(beside)
            .is_some_and(|piece| piece.kind() == PieceKind::Pawn && piece.color() == turn);
        is_capturer
            && passed.is_some_and(|passed| {
                simulate(board, Some(last), &MoveRequest::from_to(beside, passed)).is_ok()
            })
    });
    if capturable {
        last.to.file()
    } else {
        NO_EN_PASSANT
    }
}

fn color_code(color: Color) -> u8 {
    match color {
        Color::White => 0,
        Color::Black => 1,
    }
}
