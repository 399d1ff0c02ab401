//! Per-match state machine.
//!
//! A match runs two cooperating tasks over one guarded block: the turn loop
//! pulls moves from the side to move under a per-turn clock, and the side
//! channel listener handles resignations and draw offers from either side.
//! Every way a match can end goes through one first-writer-wins gate that
//! publishes the result on a watch channel; every wait in the match also
//! watches that channel, so nothing blocks past the end of the game.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use derive_getters::Getters;
use derive_more::Display;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use strictly_chess::{Color, GameState, MoveError, MoveRequest, Outcome};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::BoardSetup;
use crate::player::{AsyncRequest, AsyncResponse, Player, PlayerError, SyncResponse};

/// Default per-player thinking budget.
pub const DEFAULT_PLAYER_TIME: Duration = Duration::from_secs(1200);
/// Default bound on delivering the final outcome to one player.
pub const DEFAULT_BROADCAST_TIMEOUT: Duration = Duration::from_secs(5);
/// Default bound on waiting for players to release a finished match.
pub const DEFAULT_RELEASE_TIMEOUT: Duration = Duration::from_secs(60);

static NEXT_MATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique match identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize)]
#[display("match-{}", _0)]
pub struct MatchId(u64);

impl MatchId {
    fn next() -> Self {
        Self(NEXT_MATCH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Termination {
    /// Checkmate, stalemate, or repetition.
    #[display("board")]
    Board,
    /// One side resigned.
    #[display("resignation")]
    Resignation,
    /// Both sides agreed to a draw.
    #[display("agreement")]
    Agreement,
    /// A clock ran out.
    #[display("timeout")]
    Timeout,
}

/// Final result of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[display("{} by {}", outcome, termination)]
pub struct MatchResult {
    /// Winner or draw.
    pub outcome: Outcome,
    /// Cause of the end.
    pub termination: Termination,
}

/// Failure to run a match to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MatchError {
    /// The terminal signal closed without a recorded result.
    #[display("match ended without a recorded result")]
    Unresolved,
}

impl std::error::Error for MatchError {}

/// Timing and setup for one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Setters)]
#[setters(prefix = "with_")]
pub struct MatchSettings {
    /// Thinking budget per player.
    max_time: Duration,
    /// Bound on delivering the final outcome to each player.
    broadcast_timeout: Duration,
    /// Bound on waiting for both players to release the match.
    release_timeout: Duration,
    /// Starting position.
    setup: BoardSetup,
}

impl MatchSettings {
    /// Settings with the given budget and default timeouts.
    pub fn new(max_time: Duration) -> Self {
        Self {
            max_time,
            ..Self::default()
        }
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            max_time: DEFAULT_PLAYER_TIME,
            broadcast_timeout: DEFAULT_BROADCAST_TIMEOUT,
            release_timeout: DEFAULT_RELEASE_TIMEOUT,
            setup: BoardSetup::Standard,
        }
    }
}

/// State shared by the turn loop, the side channel, and the clock.
#[derive(Debug, Default)]
struct Control {
    /// Side holding a standing draw offer.
    requested_draw: Option<Color>,
}

/// Why a submitted move was not applied.
enum Rejection {
    /// The move breaks a rule; the player may retry.
    Illegal(MoveError),
    /// The match ended first; the move is discarded.
    Terminal,
}

const ARMED: u8 = 0;
const DISARMED: u8 = 1;
const FIRED: u8 = 2;

/// Clock for a single turn. Exactly one of disarm and fire wins.
struct TurnTimer {
    state: Arc<AtomicU8>,
    task: JoinHandle<()>,
}

impl TurnTimer {
    fn arm(after: Duration, on_fire: impl FnOnce() + Send + 'static) -> Self {
        let state = Arc::new(AtomicU8::new(ARMED));
        let fired = Arc::clone(&state);
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if fired
                .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                on_fire();
            }
        });
        Self { state, task }
    }

    /// Returns false if the clock already fired.
    fn disarm(&self) -> bool {
        self.state
            .compare_exchange(ARMED, DISARMED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A live game between two players.
#[derive(Debug)]
pub struct Match {
    id: MatchId,
    black: Player,
    white: Player,
    /// Display names indexed black, white.
    names: [String; 2],
    settings: MatchSettings,
    game: Mutex<GameState>,
    control: Mutex<Control>,
    terminal: watch::Sender<Option<MatchResult>>,
}

impl Match {
    /// Pairs two players in a fresh game from the configured setup.
    pub fn new(black: Player, white: Player, settings: MatchSettings) -> Self {
        let game = match settings.setup {
            BoardSetup::Standard => GameState::new(),
            BoardSetup::NoPawns => GameState::without_pawns(),
        };
        Self::with_game(black, white, settings, game)
    }

    /// Pairs two players in an arbitrary position.
    #[instrument(skip_all, fields(black = %black.name(), white = %white.name()))]
    pub fn with_game(black: Player, white: Player, settings: MatchSettings, game: GameState) -> Self {
        let names = if black.name() == white.name() {
            [
                format!("{}_black", black.name()),
                format!("{}_white", white.name()),
            ]
        } else {
            [black.name().to_string(), white.name().to_string()]
        };
        black.bind(Color::Black, &names[1]);
        white.bind(Color::White, &names[0]);

        let id = MatchId::next();
        info!(match_id = %id, max_time = ?settings.max_time, "Match created");
        Self {
            id,
            black,
            white,
            names,
            settings,
            game: Mutex::new(game),
            control: Mutex::new(Control::default()),
            terminal: watch::Sender::new(None),
        }
    }

    /// Process-unique identifier.
    pub fn id(&self) -> MatchId {
        self.id
    }

    /// Display name of the given side.
    pub fn player_name(&self, color: Color) -> &str {
        match color {
            Color::Black => &self.names[0],
            Color::White => &self.names[1],
        }
    }

    /// Endpoint of the given side.
    pub fn player(&self, color: Color) -> &Player {
        match color {
            Color::Black => &self.black,
            Color::White => &self.white,
        }
    }

    /// Per-player thinking budget.
    pub fn max_time(&self) -> Duration {
        self.settings.max_time
    }

    /// Side to move.
    pub fn turn(&self) -> Color {
        self.game().turn()
    }

    /// Snapshot of the game.
    pub fn game_snapshot(&self) -> GameState {
        self.game().clone()
    }

    /// Whether a terminal result has been recorded.
    pub fn is_over(&self) -> bool {
        self.terminal.borrow().is_some()
    }

    /// Final result, once recorded.
    pub fn result(&self) -> Option<MatchResult> {
        self.terminal.borrow().clone()
    }

    /// Side holding a standing draw offer.
    pub fn requested_draw(&self) -> Option<Color> {
        self.control().requested_draw
    }

    fn game(&self) -> MutexGuard<'_, GameState> {
        self.game.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs the match to its end, delivers the outcome, waits for both
    /// players to let go, and resets them.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Unresolved`] if the match stops without a
    /// recorded result.
    #[instrument(skip(self), fields(match_id = %self.id))]
    pub async fn play(self: Arc<Self>) -> Result<MatchResult, MatchError> {
        info!(
            black = %self.names[0],
            white = %self.names[1],
            "Match started"
        );
        let listener = tokio::spawn({
            let this = Arc::clone(&self);
            async move { this.listen_side_channel().await }
        });

        self.run_turns().await;

        let result = self
            .terminal
            .subscribe()
            .wait_for(Option::is_some)
            .await
            .map_err(|_| MatchError::Unresolved)?
            .clone()
            .ok_or(MatchError::Unresolved)?;
        if let Err(e) = listener.await {
            warn!(error = %e, "Side channel listener failed");
        }

        tokio::select! {
            _ = self.wind_down(&result) => {}
            _ = self.reject_late_moves() => {}
        }
        self.black.reset();
        self.white.reset();
        info!(%result, "Match finished");
        Ok(result)
    }

    async fn run_turns(self: &Arc<Self>) {
        let mut terminal = self.terminal.subscribe();
        while terminal.borrow().is_none() {
            let color = self.turn();
            let player = self.player(color);
            let opponent = self.player(color.opponent());

            let started = Instant::now();
            let remaining = self.settings.max_time.saturating_sub(player.elapsed());
            let timer = TurnTimer::arm(remaining, {
                let this = Arc::clone(self);
                move || this.handle_timeout(color)
            });
            debug!(state = "awaiting_move", %color, ?remaining);

            let Some((request, outcome)) = self.await_legal_move(color, &timer, &mut terminal).await
            else {
                return;
            };
            drop(timer);

            debug!(state = "notifying", %color, %request);
            let elapsed = player.add_elapsed(started.elapsed());
            let response = SyncResponse::applied(elapsed, opponent.elapsed());
            self.bounded("move reply", player, player.reply(response)).await;
            self.bounded("opponent move", opponent, opponent.notify_opponent_move(request))
                .await;

            if let Some(outcome) = outcome {
                debug!(state = "terminal", %outcome);
                return;
            }
        }
    }

    /// Pulls requests from the side to move until one is applied.
    ///
    /// Returns `None` once the match is over.
    async fn await_legal_move(
        &self,
        color: Color,
        timer: &TurnTimer,
        terminal: &mut watch::Receiver<Option<MatchResult>>,
    ) -> Option<(MoveRequest, Option<Outcome>)> {
        let player = self.player(color);
        loop {
            let request = tokio::select! {
                biased;
                _ = terminal.wait_for(Option::is_some) => return None,
                request = player.next_move() => request,
            };
            let Some(request) = request else {
                // Nothing more will arrive; let the clock decide.
                let _ = terminal.wait_for(Option::is_some).await;
                return None;
            };

            debug!(state = "validating", %color, %request);
            match self.apply(color, &request, timer) {
                Ok(outcome) => return Some((request, outcome)),
                Err(Rejection::Terminal) => {
                    debug!(%request, "Move arrived after the match ended; discarded");
                    self.bounded("late move reply", player, player.reply(SyncResponse::rejected()))
                        .await;
                    return None;
                }
                Err(Rejection::Illegal(e)) => {
                    warn!(%color, %request, error = %e, "Illegal move");
                    self.bounded("move reply", player, player.reply(SyncResponse::rejected()))
                        .await;
                }
            }
        }
    }

    /// Validates, disarms the clock, and commits as one step under the guard.
    fn apply(
        &self,
        color: Color,
        request: &MoveRequest,
        timer: &TurnTimer,
    ) -> Result<Option<Outcome>, Rejection> {
        let mut control = self.control();
        if self.is_over() {
            return Err(Rejection::Terminal);
        }

        let mut game = self.game();
        if game.turn() != color {
            return Err(Rejection::Illegal(MoveError::WrongTurn(game.turn())));
        }
        let prepared = game.prepare(request).map_err(Rejection::Illegal)?;
        if !timer.disarm() {
            return Err(Rejection::Terminal);
        }
        debug!(state = "applying", %color, %request);
        // The game lock has been held since prepare, so commit cannot be stale.
        let outcome = game.commit(prepared).map_err(Rejection::Illegal)?;
        control.requested_draw = None;
        drop(game);

        if let Some(outcome) = outcome {
            self.settle(
                &mut control,
                MatchResult {
                    outcome,
                    termination: Termination::Board,
                },
            );
        }
        Ok(outcome)
    }

    /// Runs when the side to move runs out of time.
    #[instrument(skip(self), fields(match_id = %self.id))]
    fn handle_timeout(&self, timed_out: Color) {
        let opponent = timed_out.opponent();
        let bare_king = self.game().only_king(opponent);
        let outcome = if bare_king {
            Outcome::Draw
        } else {
            Outcome::Winner(opponent)
        };
        warn!(%timed_out, bare_king, "Clock expired");
        self.conclude(MatchResult {
            outcome,
            termination: Termination::Timeout,
        });
    }

    async fn listen_side_channel(&self) {
        let mut terminal = self.terminal.subscribe();
        loop {
            let (color, request) = tokio::select! {
                biased;
                _ = terminal.wait_for(Option::is_some) => return,
                Some(request) = self.black.next_request() => (Color::Black, request),
                Some(request) = self.white.next_request() => (Color::White, request),
            };
            self.handle_request(color, request);
        }
    }

    #[instrument(skip(self), fields(match_id = %self.id))]
    fn handle_request(&self, color: Color, request: AsyncRequest) {
        if request.resign {
            info!(%color, "Resignation");
            self.conclude(MatchResult {
                outcome: Outcome::Winner(color.opponent()),
                termination: Termination::Resignation,
            });
            return;
        }
        if !request.request_to_draw {
            return;
        }

        let mut control = self.control();
        if self.is_over() {
            return;
        }
        match control.requested_draw {
            None => {
                control.requested_draw = Some(color);
                drop(control);
                debug!(%color, "Draw offered");
                self.forward_draw_offer(color.opponent());
            }
            Some(offerer) if offerer == color => {
                control.requested_draw = None;
                debug!(%color, "Draw offer rescinded");
            }
            Some(_) => {
                info!(%color, "Draw accepted");
                self.settle(
                    &mut control,
                    MatchResult {
                        outcome: Outcome::Draw,
                        termination: Termination::Agreement,
                    },
                );
            }
        }
    }

    /// Tells `to` about a pending offer without blocking the listener.
    fn forward_draw_offer(&self, to: Color) {
        let player = self.player(to).clone();
        let mut terminal = self.terminal.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = terminal.wait_for(Option::is_some) => {}
                _ = player.push_update(AsyncResponse::draw_offer()) => {}
            }
        });
    }

    /// Records `result` unless the match already ended. Returns whether
    /// this call decided the match.
    fn conclude(&self, result: MatchResult) -> bool {
        let mut control = self.control();
        self.settle(&mut control, result)
    }

    /// The terminal gate. The caller holds the control guard.
    fn settle(&self, control: &mut Control, result: MatchResult) -> bool {
        if self.is_over() {
            debug!(ignored = %result, "Match already decided");
            return false;
        }
        control.requested_draw = None;
        self.game().conclude(result.outcome);
        info!(match_id = %self.id, %result, "Match decided");
        self.terminal.send_replace(Some(result));
        true
    }

    fn outcome_update(&self, result: &MatchResult) -> AsyncResponse {
        AsyncResponse {
            game_over: true,
            draw_offered: false,
            draw: result.outcome.is_draw(),
            resignation: result.termination == Termination::Resignation,
            timeout: result.termination == Termination::Timeout,
            winner_name: result
                .outcome
                .winner()
                .map(|color| self.player_name(color).to_string())
                .unwrap_or_default(),
        }
    }

    async fn broadcast(&self, result: &MatchResult) {
        let update = self.outcome_update(result);
        tokio::join!(
            self.bounded("outcome", &self.black, self.black.push_update(update.clone())),
            self.bounded("outcome", &self.white, self.white.push_update(update)),
        );
    }

    /// Delivers the outcome, then waits for both players to let go.
    async fn wind_down(&self, result: &MatchResult) {
        self.broadcast(result).await;
        let both = async {
            tokio::join!(self.black.wait_until_done(), self.white.wait_until_done());
        };
        if tokio::time::timeout(self.settings.release_timeout, both)
            .await
            .is_err()
        {
            warn!(match_id = %self.id, "Players did not release the match in time");
        }
    }

    /// Answers every move submitted after the end with a rejection.
    async fn reject_late_moves(&self) {
        loop {
            let (color, request) = tokio::select! {
                Some(request) = self.black.next_move() => (Color::Black, request),
                Some(request) = self.white.next_move() => (Color::White, request),
                else => return std::future::pending().await,
            };
            debug!(%color, %request, "Move arrived after the match ended; discarded");
            let player = self.player(color);
            self.bounded("late move reply", player, player.reply(SyncResponse::rejected()))
                .await;
        }
    }

    /// Delivers to one player, giving up after the broadcast timeout.
    async fn bounded<F>(&self, what: &str, player: &Player, delivery: F)
    where
        F: Future<Output = Result<(), PlayerError>>,
    {
        match tokio::time::timeout(self.settings.broadcast_timeout, delivery).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(player = %player.name(), what, error = %e, "Delivery failed"),
            Err(_) => warn!(player = %player.name(), what, "Delivery timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use strictly_chess::Position;

    fn flag() -> (Arc<AtomicBool>, impl FnOnce() + Send + 'static) {
        let fired = Arc::new(AtomicBool::new(false));
        let setter = Arc::clone(&fired);
        (fired, move || setter.store(true, Ordering::SeqCst))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_timer_cannot_be_disarmed() {
        let (fired, on_fire) = flag();
        let timer = TurnTimer::arm(Duration::from_secs(1), on_fire);

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(fired.load(Ordering::SeqCst));
        assert!(!timer.disarm());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_timer_never_fires() {
        let (fired, on_fire) = flag();
        let timer = TurnTimer::arm(Duration::from_secs(1), on_fire);

        assert!(timer.disarm());
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(!fired.load(Ordering::SeqCst));
    }

    fn fresh_match() -> Match {
        Match::new(Player::new("b"), Player::new("w"), MatchSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_at_deadline_loses_to_fired_clock() {
        let game = fresh_match();
        // Fired, but the timeout has not been recorded yet.
        let timer = TurnTimer::arm(Duration::from_secs(1), || {});
        tokio::time::sleep(Duration::from_secs(2)).await;

        let request = MoveRequest::from_to(
            Position::parse("e2").expect("square"),
            Position::parse("e4").expect("square"),
        );
        let applied = game.apply(Color::White, &request, &timer);

        assert!(matches!(applied, Err(Rejection::Terminal)));
        assert!(game.game_snapshot().history().is_empty());
        assert_eq!(game.turn(), Color::White);
    }

    #[test]
    fn test_timeout_after_resignation_changes_nothing() {
        let game = fresh_match();
        game.handle_request(Color::White, AsyncRequest::resign());
        game.handle_timeout(Color::Black);

        assert_eq!(
            game.result(),
            Some(MatchResult {
                outcome: Outcome::Winner(Color::Black),
                termination: Termination::Resignation,
            })
        );
        assert_eq!(
            game.game_snapshot().result(),
            Some(Outcome::Winner(Color::Black))
        );
    }

    #[test]
    fn test_resignation_after_timeout_changes_nothing() {
        let game = fresh_match();
        game.handle_timeout(Color::White);
        game.handle_request(Color::Black, AsyncRequest::resign());

        assert_eq!(
            game.result(),
            Some(MatchResult {
                outcome: Outcome::Winner(Color::Black),
                termination: Termination::Timeout,
            })
        );
    }

    #[test]
    fn test_result_display() {
        let result = MatchResult {
            outcome: Outcome::Winner(Color::White),
            termination: Termination::Resignation,
        };
        assert!(result.to_string().ends_with("by resignation"));
        assert_eq!(MatchId(7).to_string(), "match-7");
    }
}
