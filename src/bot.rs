//! Scripted clients that play through a [`Player`] handle.
//!
//! Bots keep a mirror of the game from their own applied moves and the
//! opponent's echoed moves, exactly as a remote client would.

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use strictly_chess::{Color, GameState, MoveRequest};
use tracing::{debug, info, instrument, warn};

use crate::config::BoardSetup;
use crate::player::{AsyncRequest, AsyncResponse, Player, PlayerError};

/// Move selection for a bot.
#[async_trait::async_trait]
pub trait Strategy: Send {
    /// Picks a move for the side to move, or `None` if there is none.
    async fn choose(&mut self, game: &GameState) -> Option<MoveRequest>;

    /// Returns the strategy's display name.
    fn name(&self) -> &str;
}

/// Plays the first legal move it finds.
#[derive(Debug, Clone)]
pub struct FirstLegalMove {
    name: String,
}

impl FirstLegalMove {
    /// Creates the strategy.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait::async_trait]
impl Strategy for FirstLegalMove {
    async fn choose(&mut self, game: &GameState) -> Option<MoveRequest> {
        game.legal_moves(game.turn()).into_iter().next()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Plays a uniformly random legal move after an optional pause.
#[derive(Debug, Clone)]
pub struct RandomMover {
    name: String,
    rng: StdRng,
    think_time: Duration,
}

impl RandomMover {
    /// Creates the strategy with an entropy-seeded generator.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rng: StdRng::from_entropy(),
            think_time: Duration::ZERO,
        }
    }

    /// Creates the strategy with a fixed seed.
    pub fn seeded(name: impl Into<String>, seed: u64) -> Self {
        Self {
            name: name.into(),
            rng: StdRng::seed_from_u64(seed),
            think_time: Duration::ZERO,
        }
    }

    /// Pauses this long before every move.
    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }
}

#[async_trait::async_trait]
impl Strategy for RandomMover {
    async fn choose(&mut self, game: &GameState) -> Option<MoveRequest> {
        if !self.think_time.is_zero() {
            tokio::time::sleep(self.think_time).await;
        }
        let moves = game.legal_moves(game.turn());
        let choice = moves.choose(&mut self.rng).copied();
        debug!(bot = %self.name, choice = ?choice, "Bot chose move");
        choice
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// How one bot's match went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotReport {
    /// Player identity.
    pub name: String,
    /// Color played.
    pub color: Color,
    /// Plies seen by the bot's mirror.
    pub plies: usize,
    /// Final update from the match.
    pub outcome: AsyncResponse,
}

enum Event {
    Applied(bool),
    OpponentMoved(MoveRequest),
    Update(AsyncResponse),
}

/// Waits for a match, plays it with `strategy`, and releases it.
///
/// The bot resigns once `resign_after` plies have been played on its turn.
#[instrument(skip(player, strategy), fields(player = %player.name(), bot = %strategy.name()))]
pub async fn run_bot<S: Strategy>(
    player: Player,
    mut strategy: S,
    setup: BoardSetup,
    resign_after: usize,
) -> Result<BotReport, PlayerError> {
    player.wait_for_match_start().await?;
    let color = player.color().ok_or(PlayerError::Unmatched)?;
    let mut mirror = match setup {
        BoardSetup::Standard => GameState::new(),
        BoardSetup::NoPawns => GameState::without_pawns(),
    };
    let mut resigned = false;
    info!(%color, "Bot joined match");

    let outcome = loop {
        let my_move = if mirror.turn() == color && !mirror.is_over() && !resigned {
            if mirror.history().len() >= resign_after {
                player.request_async(AsyncRequest::resign()).await?;
                resigned = true;
                None
            } else {
                strategy.choose(&mirror).await
            }
        } else {
            None
        };

        let event = match my_move {
            Some(request) => {
                let reply = player.make_move(request);
                tokio::pin!(reply);
                let event = loop {
                    tokio::select! {
                        judged = &mut reply => break Event::Applied(judged?.success),
                        update = player.next_async_update() => {
                            let update = update?;
                            if update.game_over {
                                break Event::Update(update);
                            }
                        }
                    }
                };
                event.then_apply(&mut mirror, request)
            }
            None => tokio::select! {
                update = player.next_async_update() => Event::Update(update?),
                moved = player.next_opponent_move() => Event::OpponentMoved(moved?),
            },
        };

        match event {
            Event::Update(update) if update.game_over => break update,
            Event::Update(_) => debug!("Ignoring draw offer"),
            Event::OpponentMoved(request) => {
                if let Err(e) = mirror.make_move(&request) {
                    warn!(%request, error = %e, "Mirror rejected opponent move");
                }
            }
            Event::Applied(_) => {}
        }
    };

    player.done_with_match();
    info!(plies = mirror.history().len(), "Bot finished match");
    Ok(BotReport {
        name: player.name().to_string(),
        color,
        plies: mirror.history().len(),
        outcome,
    })
}

impl Event {
    /// Mirrors our own move once the match has accepted it.
    fn then_apply(self, mirror: &mut GameState, request: MoveRequest) -> Self {
        if let Event::Applied(true) = self
            && let Err(e) = mirror.make_move(&request)
        {
            warn!(%request, error = %e, "Mirror rejected accepted move");
        }
        self
    }
}
