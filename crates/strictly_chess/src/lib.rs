//! Strictly Chess - pure chess rules.
//!
//! Board representation, per-piece legality (including castling, en passant,
//! and promotion), check/checkmate/stalemate detection, and threefold
//! repetition tracking. No I/O and no async: the match server drives a
//! [`GameState`] one request at a time.
//!
//! # Example
//!
//! ```
//! use strictly_chess::{GameState, MoveRequest, Position};
//!
//! let mut game = GameState::new();
//! let e2 = Position::parse("e2").unwrap();
//! let e4 = Position::parse("e4").unwrap();
//! game.make_move(&MoveRequest::from_to(e2, e4)).unwrap();
//! assert!(!game.is_over());
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod board;
mod error;
mod game;
mod piece;
mod rules;
mod types;

pub use board::Board;
pub use error::MoveError;
pub use game::{GameState, PreparedMove};
pub use piece::Piece;
pub use types::{Color, LastMove, Move, MoveRequest, Outcome, PieceKind, Position};
