//! Strictly Arena - CLI
//!
//! Runs the matchmaking pool, or a bot simulation through it.

#![warn(missing_docs)]

mod cli;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use strictly_arena::{
    ArenaConfig, BoardSetup, MatchmakingPool, Player, RandomMover, SessionStore, TtlSessionStore,
    run_bot,
};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config } => serve(&config).await,
        Command::Simulate {
            players,
            slots,
            resign_after,
            no_pawns,
            seed,
            config,
        } => {
            let mut arena = match config {
                Some(path) => ArenaConfig::from_file(path)?,
                None => ArenaConfig::default(),
            }
            .with_slots(slots);
            if no_pawns {
                arena = arena.with_board_setup(BoardSetup::NoPawns);
            }
            simulate(arena, players, resign_after, seed).await
        }
    }
}

#[instrument(skip_all)]
fn load_config(path: &Path) -> Result<ArenaConfig> {
    if path.exists() {
        Ok(ArenaConfig::from_file(path)?)
    } else {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Ok(ArenaConfig::default())
    }
}

/// Run the pool until Ctrl-C, reporting its status periodically.
#[instrument(skip_all, fields(config_path = %config_path.display()))]
async fn serve(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let pool = MatchmakingPool::new(config.pool_config());
    let sessions: TtlSessionStore<Player> =
        TtlSessionStore::new(config.session_ttl(), config.session_sweep());
    pool.start();
    info!(slots = config.slots(), "Arena ready. Press Ctrl+C to exit.");

    let mut status = tokio::time::interval(config.session_sweep());
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Could not listen for Ctrl+C");
                }
                break;
            }
            _ = status.tick() => {
                info!(
                    live_matches = pool.live_matches().len(),
                    waiting = pool.waiting_players(),
                    played = pool.matches_played(),
                    sessions = sessions.len(),
                    "Arena status"
                );
            }
        }
    }

    pool.shutdown();
    pool.run_until_shutdown().await;
    Ok(())
}

/// Queue `players` bots and wait for every pairable one to finish.
#[instrument(skip(config))]
async fn simulate(
    config: ArenaConfig,
    players: usize,
    resign_after: usize,
    seed: Option<u64>,
) -> Result<()> {
    let pool = MatchmakingPool::new(config.pool_config());
    pool.start();

    let setup = *config.board_setup();
    let mut bots = FuturesUnordered::new();
    for index in 0..players {
        let name = format!("bot-{}", index);
        let strategy = match seed {
            Some(seed) => RandomMover::seeded(&name, seed.wrapping_add(index as u64)),
            None => RandomMover::new(&name),
        };
        let player = Player::new(&name);
        pool.match_player(player.clone());
        bots.push(tokio::spawn(run_bot(player, strategy, setup, resign_after)));
    }

    let pairable = players - players % 2;
    let mut finished = 0;
    while finished < pairable {
        let Some(joined) = bots.next().await else {
            break;
        };
        finished += 1;
        match joined? {
            Ok(report) => info!(report = %serde_json::to_string(&report)?, "Bot finished"),
            Err(e) => warn!(error = %e, "Bot failed"),
        }
    }

    pool.shutdown();
    pool.run_until_shutdown().await;
    info!(
        matches = pool.matches_played(),
        still_waiting = pool.waiting_players(),
        "Simulation complete"
    );
    for bot in bots.iter() {
        bot.abort();
    }
    Ok(())
}
