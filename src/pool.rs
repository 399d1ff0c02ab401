//! Concurrency-bounded matchmaking.
//!
//! Waiting players queue in arrival order. Each of N slot tasks claims two
//! players inside a single pairing section, plays their match to completion,
//! and loops. The slot count is the only backpressure: excess players wait.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use derive_getters::Getters;
use strictly_chess::Color;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::config::ColorPolicy;
use crate::orchestrator::{Match, MatchSettings};
use crate::player::Player;

/// Pool sizing and per-match settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters)]
pub struct PoolConfig {
    /// Maximum simultaneous matches.
    slots: usize,
    /// Settings for every match the pool starts.
    settings: MatchSettings,
    /// Color assignment for new pairs.
    color_policy: ColorPolicy,
}

impl PoolConfig {
    /// Random colors with the given slot count and match settings.
    pub fn new(slots: usize, settings: MatchSettings) -> Self {
        Self {
            slots,
            settings,
            color_policy: ColorPolicy::Random,
        }
    }

    /// Sets the color policy.
    pub fn with_color_policy(mut self, color_policy: ColorPolicy) -> Self {
        self.color_policy = color_policy;
        self
    }
}

/// Intake receiver plus a player claimed by a slot that has not yet found
/// a partner. Keeping the half-claimed player here means a cancelled claim
/// never loses them.
struct Pairing {
    intake: mpsc::UnboundedReceiver<Player>,
    pending: Option<Player>,
}

struct Shared {
    config: PoolConfig,
    intake: mpsc::UnboundedSender<Player>,
    pairing: AsyncMutex<Pairing>,
    registry: RwLock<Vec<Arc<Match>>>,
    waiting: AtomicUsize,
    played: AtomicUsize,
    shutdown: watch::Sender<bool>,
    slots: Mutex<JoinSet<()>>,
}

/// Pairs waiting players into matches and tracks the live ones.
#[derive(Clone)]
pub struct MatchmakingPool {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MatchmakingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchmakingPool")
            .field("config", &self.shared.config)
            .field("waiting", &self.waiting_players())
            .field("live", &self.registry().len())
            .finish()
    }
}

impl MatchmakingPool {
    /// Creates an idle pool. Call [`MatchmakingPool::start`] to begin pairing.
    #[instrument]
    pub fn new(config: PoolConfig) -> Self {
        info!(slots = config.slots, "Creating matchmaking pool");
        let (intake, rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                config,
                intake,
                pairing: AsyncMutex::new(Pairing {
                    intake: rx,
                    pending: None,
                }),
                registry: RwLock::new(Vec::new()),
                waiting: AtomicUsize::new(0),
                played: AtomicUsize::new(0),
                shutdown: watch::Sender::new(false),
                slots: Mutex::new(JoinSet::new()),
            }),
        }
    }

    /// Queues a player for pairing.
    #[instrument(skip(self, player), fields(player = %player.name()))]
    pub fn match_player(&self, player: Player) {
        self.shared.waiting.fetch_add(1, Ordering::SeqCst);
        if self.shared.intake.send(player).is_err() {
            // The receiver lives in `shared`, so this cannot happen while
            // the pool exists.
            self.shared.waiting.fetch_sub(1, Ordering::SeqCst);
            warn!("Intake closed");
            return;
        }
        debug!("Player queued");
    }

    /// Spawns the slot tasks.
    #[instrument(skip(self))]
    pub fn start(&self) {
        let mut slots = self.slots();
        for slot in 0..self.shared.config.slots {
            let pool = self.clone();
            slots.spawn(async move { pool.run_slot(slot).await });
        }
        info!(slots = slots.len(), "Matchmaking started");
    }

    /// Stops slots from claiming new pairs. Running matches finish.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        info!("Matchmaking shutting down");
        self.shared.shutdown.send_replace(true);
    }

    /// Waits until every slot task has exited, which happens after
    /// [`MatchmakingPool::shutdown`] once their current matches end.
    pub async fn run_until_shutdown(&self) {
        let mut slots = std::mem::take(&mut *self.slots());
        while let Some(joined) = slots.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Slot task failed");
            }
        }
        info!(
            matches_played = self.matches_played(),
            "Matchmaking stopped"
        );
    }

    /// Snapshot of the matches currently being played.
    pub fn live_matches(&self) -> Vec<Arc<Match>> {
        self.registry().clone()
    }

    /// Players queued but not yet paired.
    pub fn waiting_players(&self) -> usize {
        self.shared.waiting.load(Ordering::SeqCst)
    }

    /// Matches started since the pool was created.
    pub fn matches_played(&self) -> usize {
        self.shared.played.load(Ordering::SeqCst)
    }

    fn slots(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.shared
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<Match>>> {
        self.shared
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[instrument(skip(self))]
    async fn run_slot(self, slot: usize) {
        let mut shutdown = self.shared.shutdown.subscribe();
        loop {
            let pair = tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => break,
                pair = self.claim_pair() => pair,
            };
            let Some((first, second)) = pair else {
                break;
            };

            let (black, white) = self.assign_colors(first, second);
            let game = Arc::new(Match::new(black, white, self.shared.config.settings));
            self.register(Arc::clone(&game));
            self.shared.played.fetch_add(1, Ordering::SeqCst);
            game.player(Color::Black).open_match_start();
            game.player(Color::White).open_match_start();

            match Arc::clone(&game).play().await {
                Ok(result) => debug!(match_id = %game.id(), %result, "Slot finished match"),
                Err(e) => warn!(match_id = %game.id(), error = %e, "Match failed"),
            }
            self.deregister(&game);
        }
        debug!("Slot stopped");
    }

    /// Claims two players in arrival order inside the pairing section.
    async fn claim_pair(&self) -> Option<(Player, Player)> {
        let mut pairing = self.shared.pairing.lock().await;
        if pairing.pending.is_none() {
            let first = pairing.intake.recv().await?;
            pairing.pending = Some(first);
        }
        let second = pairing.intake.recv().await?;
        let first = pairing.pending.take()?;
        self.shared.waiting.fetch_sub(2, Ordering::SeqCst);
        debug!(first = %first.name(), second = %second.name(), "Players paired");
        Some((first, second))
    }

    /// Returns `(black, white)`.
    fn assign_colors(&self, first: Player, second: Player) -> (Player, Player) {
        match self.shared.config.color_policy {
            ColorPolicy::FirstArrivalWhite => (second, first),
            ColorPolicy::Random => {
                if rand::random::<bool>() {
                    (second, first)
                } else {
                    (first, second)
                }
            }
        }
    }

    fn register(&self, game: Arc<Match>) {
        let mut registry = self
            .shared
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        registry.push(game);
    }

    fn deregister(&self, game: &Arc<Match>) {
        let mut registry = self
            .shared
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = registry.iter().position(|live| Arc::ptr_eq(live, game)) {
            registry.swap_remove(index);
        }
    }
}
