//! Game state machine: turn order, legality, and end-of-game detection.

use std::collections::HashMap;

use tracing::{debug, info, instrument, warn};

use crate::board::Board;
use crate::piece::Piece;
use crate::rules;
use crate::{Color, LastMove, MoveError, MoveRequest, Outcome, PieceKind, Position};

/// Complete state of one chess game.
#[derive(Debug, Clone)]
pub struct GameState {
    board: Board,
    turn: Color,
    game_over: bool,
    result: Option<Outcome>,
    last_move: Option<LastMove>,
    /// Occurrence count per canonical position encoding.
    position_history: HashMap<Vec<u8>, u32>,
    /// Applied requests in order.
    history: Vec<MoveRequest>,
}

/// A validated move, encoded and evaluated but not yet committed.
///
/// Produced by [`GameState::prepare`] and consumed by
/// [`GameState::commit`]. Preparing never mutates the game, so a caller can
/// abandon a prepared move (for example after losing a race with a clock)
/// without any rollback.
#[derive(Debug, Clone)]
pub struct PreparedMove {
    request: MoveRequest,
    board: Board,
    last_move: LastMove,
    key: Vec<u8>,
    outcome: Option<Outcome>,
    ply: usize,
}

impl PreparedMove {
    /// The request this move was prepared from.
    pub fn request(&self) -> &MoveRequest {
        &self.request
    }

    /// Outcome the move produces once committed, if it ends the game.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }
}

impl GameState {
    /// Creates a game from the standard starting position.
    #[instrument]
    pub fn new() -> Self {
        Self::with_board(Board::standard(), Color::White)
    }

    /// Creates a game from the starting position without pawns.
    #[instrument]
    pub fn without_pawns() -> Self {
        Self::with_board(Board::without_pawns(), Color::White)
    }

    /// Creates a game from arbitrary pieces with `turn` to move.
    ///
    /// # Errors
    ///
    /// Returns [`MoveError::InvalidSetup`] if the pieces do not form a
    /// playable board.
    pub fn from_pieces(
        pieces: impl IntoIterator<Item = Piece>,
        turn: Color,
    ) -> Result<Self, MoveError> {
        Ok(Self::with_board(Board::from_pieces(pieces)?, turn))
    }

    fn with_board(board: Board, turn: Color) -> Self {
        let mut game = Self {
            board,
            turn,
            game_over: false,
            result: None,
            last_move: None,
            position_history: HashMap::new(),
            history: Vec::new(),
        };
        match game.encode() {
            Ok(key) => {
                game.position_history.insert(key, 1);
            }
            Err(e) => warn!(error = %e, "Could not record starting position"),
        }
        game
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the side to move.
    pub fn turn(&self) -> Color {
        self.turn
    }

    /// Whether the game has ended.
    pub fn is_over(&self) -> bool {
        self.game_over
    }

    /// Outcome of the game, once over.
    pub fn result(&self) -> Option<Outcome> {
        self.result
    }

    /// The most recently applied move.
    pub fn last_move(&self) -> Option<&LastMove> {
        self.last_move.as_ref()
    }

    /// Applied requests in order.
    pub fn history(&self) -> &[MoveRequest] {
        &self.history
    }

    /// Piece on the given square.
    pub fn piece_at(&self, position: Position) -> Option<Piece> {
        self.board.get(position)
    }

    /// Square of the given side's king.
    pub fn king_position(&self, color: Color) -> Position {
        self.board.king(color)
    }

    /// Whether `color`'s king is attacked.
    pub fn is_in_check(&self, color: Color) -> bool {
        self.board
            .is_attacked(self.board.king(color), color.opponent())
    }

    /// Whether `color` has nothing left but its king.
    pub fn only_king(&self, color: Color) -> bool {
        self.board
            .pieces_of(color)
            .all(|piece| piece.kind() == PieceKind::King)
    }

    /// Material balance from `color`'s point of view.
    pub fn point_advantage(&self, color: Color) -> i16 {
        self.board
            .pieces()
            .map(|piece| {
                let value = piece.kind().value();
                if piece.color() == color { value } else { -value }
            })
            .sum()
    }

    /// Canonical encoding of the current position.
    pub fn encode(&self) -> Result<Vec<u8>, MoveError> {
        rules::encode(&self.board, self.turn, self.last_move.as_ref())
    }

    /// How many times the current position has occurred.
    pub fn repetitions(&self) -> u32 {
        self.encode()
            .ok()
            .and_then(|key| self.position_history.get(&key).copied())
            .unwrap_or(0)
    }

    /// All legal requests for `color` in the current position.
    pub fn legal_moves(&self, color: Color) -> Vec<MoveRequest> {
        rules::legal_moves(&self.board, color, self.last_move.as_ref())
    }

    /// Whether `color` has at least one legal request.
    pub fn has_legal_move(&self, color: Color) -> bool {
        rules::has_legal_move(&self.board, color, self.last_move.as_ref())
    }

    /// Validates, applies, and evaluates a move.
    ///
    /// # Errors
    ///
    /// Returns [`MoveError::GameOver`] after the game has ended,
    /// [`MoveError::InvalidSelection`] for an empty square,
    /// [`MoveError::WrongTurn`] for the opponent's piece, or the specific
    /// rule the move breaks. On error the game is unchanged.
    #[instrument(skip(self), fields(turn = %self.turn, ply = self.history.len()))]
    pub fn make_move(&mut self, request: &MoveRequest) -> Result<(), MoveError> {
        let prepared = self.prepare(request)?;
        self.commit(prepared)?;
        Ok(())
    }

    /// Validates a move and computes its consequences without applying it.
    ///
    /// The resulting position is encoded here, so an encoding failure
    /// rejects the move before any state is touched.
    ///
    /// # Errors
    ///
    /// Same as [`GameState::make_move`].
    #[instrument(skip(self), fields(turn = %self.turn))]
    pub fn prepare(&self, request: &MoveRequest) -> Result<PreparedMove, MoveError> {
        if self.game_over {
            return Err(MoveError::GameOver);
        }
        let piece = self
            .board
            .get(request.position)
            .ok_or(MoveError::InvalidSelection(request.position))?;
        if piece.color() != self.turn {
            return Err(MoveError::WrongTurn(self.turn));
        }

        let (board, last_move) = rules::simulate(&self.board, self.last_move.as_ref(), request)
            .inspect_err(|e| debug!(%request, error = %e, "Rejected move"))?;

        let mover = self.turn;
        let next = mover.opponent();
        let key = rules::encode(&board, next, Some(&last_move))?;
        let occurrences = self.position_history.get(&key).copied().unwrap_or(0) + 1;

        let outcome = if !rules::has_legal_move(&board, next, Some(&last_move)) {
            if board.is_attacked(board.king(next), mover) {
                Some(Outcome::Winner(mover))
            } else {
                Some(Outcome::Draw)
            }
        } else if occurrences > 2 {
            Some(Outcome::Draw)
        } else {
            None
        };

        Ok(PreparedMove {
            request: *request,
            board,
            last_move,
            key,
            outcome,
            ply: self.history.len(),
        })
    }

    /// Applies a move produced by [`GameState::prepare`] on this game.
    ///
    /// Returns the outcome if the move ended the game.
    ///
    /// # Errors
    ///
    /// Returns [`MoveError::Stale`] if another move was applied since the
    /// move was prepared, or [`MoveError::GameOver`] if the game ended.
    pub fn commit(&mut self, prepared: PreparedMove) -> Result<Option<Outcome>, MoveError> {
        if self.game_over {
            return Err(MoveError::GameOver);
        }
        if prepared.ply != self.history.len() {
            return Err(MoveError::Stale);
        }

        self.board = prepared.board;
        self.last_move = Some(prepared.last_move);
        *self.position_history.entry(prepared.key).or_insert(0) += 1;
        self.history.push(prepared.request);
        self.turn = self.turn.opponent();
        debug!(request = %prepared.request, next = %self.turn, "Move applied");

        if let Some(outcome) = prepared.outcome {
            self.game_over = true;
            self.result = Some(outcome);
            info!(%outcome, plies = self.history.len(), "Game decided on the board");
        }
        Ok(prepared.outcome)
    }

    /// Ends the game with an externally decided outcome such as a
    /// resignation, agreed draw, or flag fall.
    ///
    /// Returns `false` and changes nothing if the game is already over.
    #[instrument(skip(self))]
    pub fn conclude(&mut self, outcome: Outcome) -> bool {
        if self.game_over {
            return false;
        }
        self.game_over = true;
        self.result = Some(outcome);
        true
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.board)?;
        write!(f, "{} to move", self.turn)
    }
}
