//! Participant endpoints for move exchange and side-channel requests.
//!
//! A [`Player`] is a cheap cloneable handle. The transport side uses the
//! public methods to submit moves and read updates; the match drives the
//! crate-private half of each channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use strictly_chess::{Color, MoveRequest};
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tracing::{debug, instrument, trace};

/// Capacity of the synchronous move request channel.
pub const SYNC_REQUEST_CAPACITY: usize = 1;
/// Capacity of the synchronous move response channel.
pub const SYNC_RESPONSE_CAPACITY: usize = 10;
/// Capacity of the side-channel request queue.
pub const ASYNC_REQUEST_CAPACITY: usize = 1;
/// Capacity of the side-channel update queue.
pub const ASYNC_RESPONSE_CAPACITY: usize = 1;
/// Capacity of the opponent move notification queue.
pub const OPPONENT_MOVE_CAPACITY: usize = 10;

/// Reply to a submitted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Whether the move was applied.
    pub success: bool,
    /// Mover's cumulative thinking time, in milliseconds.
    pub elapsed_ms: u64,
    /// Opponent's cumulative thinking time, in milliseconds.
    pub opponent_elapsed_ms: u64,
}

impl SyncResponse {
    /// Response for an applied move.
    pub fn applied(elapsed: Duration, opponent_elapsed: Duration) -> Self {
        Self {
            success: true,
            elapsed_ms: millis(elapsed),
            opponent_elapsed_ms: millis(opponent_elapsed),
        }
    }

    /// Response for a rejected move.
    pub fn rejected() -> Self {
        Self {
            success: false,
            elapsed_ms: 0,
            opponent_elapsed_ms: 0,
        }
    }
}

/// Resignation or draw request sent outside the move exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncRequest {
    /// Concede the match.
    #[serde(default)]
    pub resign: bool,
    /// Offer, rescind, or accept a draw.
    #[serde(default)]
    pub request_to_draw: bool,
}

impl AsyncRequest {
    /// A resignation.
    pub fn resign() -> Self {
        Self {
            resign: true,
            request_to_draw: false,
        }
    }

    /// A draw offer (or acceptance, if the opponent already offered).
    pub fn offer_draw() -> Self {
        Self {
            resign: false,
            request_to_draw: true,
        }
    }
}

/// Update pushed to a player outside the move exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncResponse {
    /// The match has ended.
    pub game_over: bool,
    /// The opponent is offering a draw.
    pub draw_offered: bool,
    /// The match ended in a draw.
    pub draw: bool,
    /// The match ended by resignation.
    pub resignation: bool,
    /// The match ended on time.
    pub timeout: bool,
    /// Display name of the winner; empty on a draw.
    pub winner_name: String,
}

impl AsyncResponse {
    /// Notification of a standing draw offer from the opponent.
    pub fn draw_offer() -> Self {
        Self {
            draw_offered: true,
            ..Self::default()
        }
    }
}

/// Failure talking to the other side of a player endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PlayerError {
    /// The channel's other end is gone.
    #[display("player endpoint disconnected")]
    Disconnected,
    /// The player has not been bound to a match.
    #[display("player is not in a match")]
    Unmatched,
}

impl std::error::Error for PlayerError {}

#[derive(Debug, Default)]
struct Seat {
    color: Option<Color>,
    elapsed: Duration,
    matched_opponent: Option<String>,
}

#[derive(Debug)]
struct Channel<T> {
    tx: mpsc::Sender<T>,
    rx: AsyncMutex<mpsc::Receiver<T>>,
}

impl<T> Channel<T> {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: AsyncMutex::new(rx),
        }
    }

    async fn send(&self, value: T) -> Result<(), PlayerError> {
        self.tx.send(value).await.map_err(|_| PlayerError::Disconnected)
    }

    async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Discards queued values. Skipped if a receiver is mid-wait.
    fn drain(&self) -> usize {
        let Ok(mut rx) = self.rx.try_lock() else {
            return 0;
        };
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

#[derive(Debug)]
struct Endpoints {
    name: String,
    seat: Mutex<Seat>,
    moves: Channel<MoveRequest>,
    replies: Channel<SyncResponse>,
    requests: Channel<AsyncRequest>,
    updates: Channel<AsyncResponse>,
    opponent_moves: Channel<MoveRequest>,
    match_start: watch::Sender<bool>,
    done: watch::Sender<bool>,
}

/// One participant, shared between its transport session and its match.
#[derive(Debug, Clone)]
pub struct Player {
    inner: Arc<Endpoints>,
}

impl Player {
    /// Creates an unmatched player.
    #[instrument(skip(name), fields(player = %name.as_ref()))]
    pub fn new(name: impl AsRef<str>) -> Self {
        debug!("Creating player");
        Self {
            inner: Arc::new(Endpoints {
                name: name.as_ref().to_string(),
                seat: Mutex::new(Seat::default()),
                moves: Channel::new(SYNC_REQUEST_CAPACITY),
                replies: Channel::new(SYNC_RESPONSE_CAPACITY),
                requests: Channel::new(ASYNC_REQUEST_CAPACITY),
                updates: Channel::new(ASYNC_RESPONSE_CAPACITY),
                opponent_moves: Channel::new(OPPONENT_MOVE_CAPACITY),
                match_start: watch::Sender::new(false),
                done: watch::Sender::new(false),
            }),
        }
    }

    /// Identity supplied at join time.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Color in the current match, once paired.
    pub fn color(&self) -> Option<Color> {
        self.seat().color
    }

    /// Cumulative thinking time in the current match.
    pub fn elapsed(&self) -> Duration {
        self.seat().elapsed
    }

    /// Name of the opponent in the current match, once paired.
    pub fn matched_opponent(&self) -> Option<String> {
        self.seat().matched_opponent.clone()
    }

    /// Whether two handles refer to the same participant.
    pub fn same_as(&self, other: &Player) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Submits a move and waits for the match to judge it.
    ///
    /// Only one move may be outstanding at a time. Moves that reach a
    /// finished match are answered with [`SyncResponse::rejected`].
    ///
    /// # Errors
    ///
    /// [`PlayerError::Unmatched`] if the player is not in a match.
    #[instrument(skip(self), fields(player = %self.inner.name))]
    pub async fn make_move(&self, request: MoveRequest) -> Result<SyncResponse, PlayerError> {
        if self.color().is_none() {
            return Err(PlayerError::Unmatched);
        }
        self.inner.moves.send(request).await?;
        let response = self
            .inner
            .replies
            .recv()
            .await
            .ok_or(PlayerError::Disconnected)?;
        debug!(success = response.success, "Move judged");
        Ok(response)
    }

    /// Sends a resignation or draw request.
    #[instrument(skip(self), fields(player = %self.inner.name))]
    pub async fn request_async(&self, request: AsyncRequest) -> Result<(), PlayerError> {
        self.inner.requests.send(request).await
    }

    /// Waits for the next draw offer or end-of-match notice.
    pub async fn next_async_update(&self) -> Result<AsyncResponse, PlayerError> {
        self.inner
            .updates
            .recv()
            .await
            .ok_or(PlayerError::Disconnected)
    }

    /// Waits for the opponent's next applied move.
    pub async fn next_opponent_move(&self) -> Result<MoveRequest, PlayerError> {
        self.inner
            .opponent_moves
            .recv()
            .await
            .ok_or(PlayerError::Disconnected)
    }

    /// Waits until the pool pairs this player into a match.
    #[instrument(skip(self), fields(player = %self.inner.name))]
    pub async fn wait_for_match_start(&self) -> Result<(), PlayerError> {
        let mut started = self.inner.match_start.subscribe();
        started
            .wait_for(|started| *started)
            .await
            .map_err(|_| PlayerError::Disconnected)?;
        Ok(())
    }

    /// Tells the match this client has consumed its final update.
    #[instrument(skip(self), fields(player = %self.inner.name))]
    pub fn done_with_match(&self) {
        self.inner.done.send_replace(true);
    }

    fn seat(&self) -> MutexGuard<'_, Seat> {
        self.inner
            .seat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn bind(&self, color: Color, opponent: &str) {
        let mut seat = self.seat();
        seat.color = Some(color);
        seat.elapsed = Duration::ZERO;
        seat.matched_opponent = Some(opponent.to_string());
        debug!(player = %self.inner.name, %color, opponent, "Bound to match");
    }

    pub(crate) fn add_elapsed(&self, spent: Duration) -> Duration {
        let mut seat = self.seat();
        seat.elapsed += spent;
        seat.elapsed
    }

    pub(crate) fn open_match_start(&self) {
        self.inner.match_start.send_replace(true);
    }

    pub(crate) async fn next_move(&self) -> Option<MoveRequest> {
        self.inner.moves.recv().await
    }

    pub(crate) async fn reply(&self, response: SyncResponse) -> Result<(), PlayerError> {
        self.inner.replies.send(response).await
    }

    pub(crate) async fn next_request(&self) -> Option<AsyncRequest> {
        self.inner.requests.recv().await
    }

    pub(crate) async fn push_update(&self, update: AsyncResponse) -> Result<(), PlayerError> {
        self.inner.updates.send(update).await
    }

    pub(crate) async fn notify_opponent_move(
        &self,
        request: MoveRequest,
    ) -> Result<(), PlayerError> {
        self.inner.opponent_moves.send(request).await
    }

    pub(crate) async fn wait_until_done(&self) {
        let mut done = self.inner.done.subscribe();
        // The sender lives as long as `self`, so this only returns once set.
        let _ = done.wait_for(|done| *done).await;
    }

    /// Returns the player to its unmatched state for another round of
    /// matchmaking.
    #[instrument(skip(self), fields(player = %self.inner.name))]
    pub(crate) fn reset(&self) {
        *self.seat() = Seat::default();
        self.inner.match_start.send_replace(false);
        self.inner.done.send_replace(false);
        let dropped = self.inner.replies.drain()
            + self.inner.requests.drain()
            + self.inner.updates.drain()
            + self.inner.opponent_moves.drain();
        // A client may still be waiting on a move it queued.
        let unanswered = self.inner.moves.drain();
        for _ in 0..unanswered {
            if self.inner.replies.tx.try_send(SyncResponse::rejected()).is_err() {
                break;
            }
        }
        trace!(dropped, unanswered, "Player reset");
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
