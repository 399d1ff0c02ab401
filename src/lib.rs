//! Strictly Arena - real-time chess matches between remote players
//!
//! Pairs waiting players, runs each game under per-player clocks, and
//! resolves checkmate, stalemate, repetition, resignation, agreed draws,
//! and timeouts. Transport is left to the caller: a client talks to the
//! arena only through its [`Player`] handle.
//!
//! # Architecture
//!
//! - **Player**: channel endpoints for moves, resign/draw requests, and updates
//! - **Match**: the per-game state machine (turn loop, side channel, clock)
//! - **MatchmakingPool**: FIFO pairing into a bounded number of match slots
//! - **Sessions**: TTL key-value store a transport can use to find players
//! - **Bots**: scripted clients for simulations and tests
//!
//! # Example
//!
//! ```no_run
//! use strictly_arena::{ArenaConfig, MatchmakingPool, Player};
//!
//! # async fn example() {
//! let pool = MatchmakingPool::new(ArenaConfig::default().pool_config());
//! pool.start();
//!
//! let alice = Player::new("alice");
//! pool.match_player(alice.clone());
//! alice.wait_for_match_start().await.ok();
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod bot;
mod config;
mod orchestrator;
mod player;
mod pool;
mod session;

// Crate-level exports - Configuration
pub use config::{ArenaConfig, BoardSetup, ColorPolicy, ConfigError};

// Crate-level exports - Players
pub use player::{
    ASYNC_REQUEST_CAPACITY, ASYNC_RESPONSE_CAPACITY, AsyncRequest, AsyncResponse,
    OPPONENT_MOVE_CAPACITY, Player, PlayerError, SYNC_REQUEST_CAPACITY, SYNC_RESPONSE_CAPACITY,
    SyncResponse,
};

// Crate-level exports - Matches
pub use orchestrator::{
    DEFAULT_BROADCAST_TIMEOUT, DEFAULT_PLAYER_TIME, DEFAULT_RELEASE_TIMEOUT, Match, MatchError,
    MatchId, MatchResult, MatchSettings, Termination,
};

// Crate-level exports - Matchmaking
pub use pool::{MatchmakingPool, PoolConfig};

// Crate-level exports - Sessions
pub use session::{SessionError, SessionStore, TtlSessionStore};

// Crate-level exports - Bots
pub use bot::{BotReport, FirstLegalMove, RandomMover, Strategy, run_bot};

// Crate-level exports - Rules
pub use strictly_chess::{Color, GameState, MoveRequest, Outcome, PieceKind, Position};
