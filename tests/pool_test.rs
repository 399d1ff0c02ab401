//! Matchmaking pool tests: FIFO pairing, slot limits, and the live registry.

use std::time::Duration;

use strictly_arena::{
    AsyncRequest, Color, ColorPolicy, MatchSettings, MatchmakingPool, Player, PoolConfig,
};

fn pool(slots: usize) -> MatchmakingPool {
    let settings = MatchSettings::new(Duration::from_secs(60))
        .with_release_timeout(Duration::from_secs(1));
    MatchmakingPool::new(
        PoolConfig::new(slots, settings).with_color_policy(ColorPolicy::FirstArrivalWhite),
    )
}

/// What a client saw of its match.
#[derive(Debug)]
struct Seen {
    name: String,
    color: Color,
    opponent: String,
}

/// Waits for a match, notes the pairing, and ends it by resigning as white.
async fn resigning_client(player: Player) -> Seen {
    player.wait_for_match_start().await.expect("matched");
    let seen = Seen {
        name: player.name().to_string(),
        color: player.color().expect("color assigned"),
        opponent: player.matched_opponent().expect("opponent assigned"),
    };
    if seen.color == Color::White {
        player
            .request_async(AsyncRequest::resign())
            .await
            .expect("sent");
    }
    let update = player.next_async_update().await.expect("final update");
    assert!(update.game_over && update.resignation);
    player.done_with_match();
    seen
}

#[tokio::test]
async fn test_pairs_in_arrival_order_and_leaves_odd_player_waiting() {
    let pool = pool(2);
    pool.start();

    let players: Vec<Player> = (0..5).map(|i| Player::new(format!("p{}", i))).collect();
    let mut clients = Vec::new();
    for player in &players[..4] {
        pool.match_player(player.clone());
        clients.push(tokio::spawn(resigning_client(player.clone())));
    }
    pool.match_player(players[4].clone());

    let mut seen = Vec::new();
    for client in clients {
        seen.push(
            tokio::time::timeout(Duration::from_secs(5), client)
                .await
                .expect("client finished")
                .expect("client task"),
        );
    }

    let opponent_of = |name: &str| {
        seen.iter()
            .find(|s| s.name == name)
            .map(|s| s.opponent.clone())
            .expect("player was matched")
    };
    assert_eq!(opponent_of("p0"), "p1");
    assert_eq!(opponent_of("p1"), "p0");
    assert_eq!(opponent_of("p2"), "p3");
    assert_eq!(opponent_of("p3"), "p2");
    for s in &seen {
        let expected = if s.name == "p0" || s.name == "p2" {
            Color::White
        } else {
            Color::Black
        };
        assert_eq!(s.color, expected, "{} arrived first in its pair", s.name);
    }

    assert_eq!(pool.matches_played(), 2);
    assert_eq!(pool.waiting_players(), 1);
    let unmatched =
        tokio::time::timeout(Duration::from_millis(100), players[4].wait_for_match_start()).await;
    assert!(unmatched.is_err(), "odd player stays queued");

    pool.shutdown();
    tokio::time::timeout(Duration::from_secs(5), pool.run_until_shutdown())
        .await
        .expect("slots stop after shutdown");
}

#[tokio::test]
async fn test_live_registry_tracks_running_match() {
    let pool = pool(1);
    pool.start();

    let white = Player::new("first");
    let black = Player::new("second");
    let waiting = [Player::new("third"), Player::new("fourth")];
    pool.match_player(white.clone());
    pool.match_player(black.clone());
    for player in &waiting {
        pool.match_player(player.clone());
    }

    white.wait_for_match_start().await.expect("matched");
    let live = pool.live_matches();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].player_name(Color::White), "first");
    assert_eq!(live[0].player_name(Color::Black), "second");
    assert_eq!(pool.waiting_players(), 2);

    // One slot: the second pair waits for the first match to end.
    let blocked =
        tokio::time::timeout(Duration::from_millis(100), waiting[0].wait_for_match_start()).await;
    assert!(blocked.is_err());

    white
        .request_async(AsyncRequest::resign())
        .await
        .expect("sent");
    for player in [&white, &black] {
        player.next_async_update().await.expect("final update");
        player.done_with_match();
    }

    tokio::time::timeout(Duration::from_secs(5), waiting[0].wait_for_match_start())
        .await
        .expect("second pair started")
        .expect("matched");
    assert_eq!(pool.matches_played(), 2);
    assert_eq!(pool.waiting_players(), 0);
    let live = pool.live_matches();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].player_name(Color::White), "third");
    assert!(white.color().is_none(), "released players are reset");

    waiting[1]
        .request_async(AsyncRequest::resign())
        .await
        .expect("sent");
    for player in &waiting {
        player.next_async_update().await.expect("final update");
        player.done_with_match();
    }
    while !pool.live_matches().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    pool.shutdown();
    pool.run_until_shutdown().await;
}

#[tokio::test]
async fn test_shutdown_with_empty_queue() {
    let pool = pool(3);
    pool.start();
    pool.shutdown();
    tokio::time::timeout(Duration::from_secs(1), pool.run_until_shutdown())
        .await
        .expect("idle slots stop");
    assert_eq!(pool.matches_played(), 0);
}
