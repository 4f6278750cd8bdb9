//! Lifecycle scenarios: under-subscription cancellation, check-in
//! expiry, and chain-event replay.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use alloy::primitives::U256;
use assassin_coordinator::error::{AppError, DomainError};
use assassin_coordinator::ports::Clock;
use assassin_coordinator::ports::store::{CursorStore, PlayerStore};
use assassin_coordinator::types::enums::GamePhase;
use assassin_coordinator::types::messages::ServerMessage;
use assassin_coordinator::types::primitives::GameId;
use common::{Harness, count_where, default_rules, default_setup, drain};
use settlement_client::{ChainEvent, OperatorCall};

#[tokio::test]
async fn under_subscription_cancels_exactly_once() {
    let h = Harness::new(default_rules());
    let game = GameId::new(1);

    // min_players = 5, but only two register.
    let mut setup = default_setup();
    setup.min_players = 5;
    let addrs = h.create_game_with(1, 2, setup).await;
    let mut conn = h.attach(game, addrs[0]);

    // Past the registration deadline.
    h.advance(150);
    h.coordinator.check_auto_start().await.unwrap();

    // A second attempt in the same window is suppressed in flight.
    let err = h.coordinator.trigger_cancellation(game).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::DuplicateCancellationSuppressed(_))
    ));

    h.settle().await;
    h.sync().await;

    assert_eq!(h.game(game).await.phase, GamePhase::Cancelled);
    let cancellations = h
        .sim
        .calls()
        .into_iter()
        .filter(|c| matches!(c, OperatorCall::TriggerCancellation(1)))
        .count();
    assert_eq!(cancellations, 1, "exactly one cancellation transaction");

    let messages = drain(&mut conn);
    assert_eq!(
        count_where(&messages, |m| matches!(m, ServerMessage::GameCancelled { .. })),
        1
    );

    // The refund path: claim events mark each player as claimed.
    for a in &addrs {
        h.sim.emit(ChainEvent::RefundClaimed {
            game_id: 1,
            player: (*a).into(),
            amount: U256::from(10_000_000_000_000_000_u128),
        });
    }
    h.sync().await;
    for a in &addrs {
        assert!(h.store.player(game, *a).await.unwrap().unwrap().has_claimed);
    }
}

#[tokio::test]
async fn checkin_expiry_cancels_the_game() {
    let h = Harness::new(default_rules());
    let game = GameId::new(1);

    let _addrs = h.create_game(1, 3).await;
    h.advance(250);
    h.coordinator.check_auto_start().await.unwrap();
    h.settle().await;
    h.sync().await;
    assert_eq!(h.game(game).await.phase, GamePhase::Active);

    // Nobody completes check-in before the expiry deadline.
    h.advance(4000);
    assert!(h.coordinator.run_checkin_monitor_once(game).await.unwrap());
    // A second monitor pass must not double-submit.
    assert!(h.coordinator.run_checkin_monitor_once(game).await.unwrap());
    h.settle().await;
    h.sync().await;

    assert_eq!(h.game(game).await.phase, GamePhase::Cancelled);
    let expiries = h
        .sim
        .calls()
        .into_iter()
        .filter(|c| matches!(c, OperatorCall::TriggerExpiry(1)))
        .count();
    assert_eq!(expiries, 1, "exactly one expiry transaction");
}

#[tokio::test]
async fn replaying_the_event_log_reproduces_the_snapshot() {
    let h = Harness::new(default_rules());
    let game = GameId::new(1);

    // Live processing: create, register, cancel (under-subscribed).
    let mut setup = default_setup();
    setup.min_players = 5;
    let addrs = h.create_game_with(1, 2, setup).await;
    h.advance(150);
    h.coordinator.check_auto_start().await.unwrap();
    h.settle().await;
    h.sync().await;
    let live = h.game(game).await;
    assert_eq!(live.phase, GamePhase::Cancelled);

    // Replay against an empty store.
    let replayed = h.fork();
    replayed.sync().await;
    let replay = replayed.game(game).await;

    assert_eq!(replay.phase, live.phase);
    assert_eq!(replay.player_count, live.player_count);
    assert_eq!(replay.total_collected, live.total_collected);
    assert_eq!(replay.title, live.title);
    assert_eq!(replay.prize_split, live.prize_split);
    for a in &addrs {
        let live_player = h.store.player(game, *a).await.unwrap().unwrap();
        let replay_player = replayed.store.player(game, *a).await.unwrap().unwrap();
        assert_eq!(replay_player.number, live_player.number);
        assert_eq!(replay_player.is_alive, live_player.is_alive);
    }

    // Both consumed the full log.
    assert_eq!(
        h.store.sync_cursor().await.unwrap(),
        replayed.store.sync_cursor().await.unwrap()
    );
}

#[tokio::test]
async fn failed_check_ins_cull_before_pregame() {
    let h = Harness::new(default_rules());
    let game = GameId::new(1);

    // Six registered, required check-ins = 3 (funded 2nd and 3rd slots).
    let addrs = h.create_game(1, 6).await;
    h.advance(250);
    h.coordinator.check_auto_start().await.unwrap();
    h.settle().await;
    h.sync().await;

    // Only three check in (pings for three, one seed, two viral scans).
    for a in &addrs[..3] {
        h.coordinator
            .record_location(game, *a, 0.0, 0.0, h.clock.timestamp())
            .await
            .unwrap();
    }
    h.coordinator.run_auto_seed_once(game).await.unwrap();
    let players = h.players(game).await;
    let seed = players.iter().find(|p| p.checked_in).unwrap().clone();
    h.coordinator
        .client_checkin(
            game,
            seed.address,
            assassin_coordinator::game::CheckinRequest {
                lat: 0.0,
                lng: 0.0,
                bluetooth_token: Some(common::token(seed.number.get())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let payload = assassin_coordinator::qr::encode(game, seed.number);
    for p in players
        .iter()
        .filter(|p| !p.checked_in && addrs[..3].contains(&p.address))
    {
        h.coordinator
            .client_checkin(
                game,
                p.address,
                assassin_coordinator::game::CheckinRequest {
                    lat: 0.0,
                    lng: 0.0,
                    qr_payload: Some(payload.clone()),
                    bluetooth_token: Some(common::token(p.number.get())),
                    ble_nearby: vec![common::token(seed.number.get())],
                },
            )
            .await
            .unwrap();
    }

    // Monitor completes check-in and culls the other three.
    assert!(!h.coordinator.run_checkin_monitor_once(game).await.unwrap());
    h.settle().await;

    assert_eq!(h.store.alive_count(game).await.unwrap(), 3);
    for p in h.players(game).await.iter().filter(|p| !p.is_alive) {
        assert_eq!(p.eliminated_by.as_deref(), Some("no_checkin"));
        assert!(p.eliminated_at.is_some());
    }
    let game_row = h.game(game).await;
    assert_eq!(
        game_row.sub_phase,
        Some(assassin_coordinator::types::enums::SubPhase::Pregame)
    );
}
