//! End-to-end hunt scenarios: the six-player happy path, zone
//! elimination, and heartbeat refresh semantics.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use assassin_coordinator::error::{AppError, DomainError, VerifyError};
use assassin_coordinator::ports::Clock;
use assassin_coordinator::ports::store::{HeartbeatStore, KillStore, PlayerStore};
use assassin_coordinator::qr;
use assassin_coordinator::types::enums::GamePhase;
use assassin_coordinator::types::messages::ServerMessage;
use assassin_coordinator::types::primitives::GameId;
use common::{Harness, count_where, default_rules, drain, token};
use settlement_client::OperatorCall;

#[tokio::test]
async fn six_player_happy_path() {
    let h = Harness::new(default_rules());
    let game = GameId::new(1);

    // Register six players and watch the whole game from every socket.
    let addrs = h.create_game(1, 6).await;
    let mut conns: Vec<_> = addrs.iter().map(|a| h.attach(game, *a)).collect();
    let mut spectator = h.rooms.attach_spectator(game);

    // Drive through auto-start, check-in, and pregame.
    h.advance(250);
    h.coordinator.check_auto_start().await.unwrap();
    h.settle().await;
    h.sync().await;
    for a in &addrs {
        h.coordinator
            .record_location(game, *a, 0.0, 0.0, h.clock.timestamp())
            .await
            .unwrap();
    }
    h.coordinator.run_auto_seed_once(game).await.unwrap();

    let players = h.players(game).await;
    let seeded: Vec<_> = players.iter().filter(|p| p.checked_in).collect();
    assert_eq!(seeded.len(), 1, "exactly one auto-seeded player");
    let seed = seeded[0].clone();

    h.coordinator
        .client_checkin(
            game,
            seed.address,
            assassin_coordinator::game::CheckinRequest {
                lat: 0.0,
                lng: 0.0,
                bluetooth_token: Some(token(seed.number.get())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let seed_payload = qr::encode(game, seed.number);
    for p in players.iter().filter(|p| !p.checked_in) {
        h.coordinator
            .client_checkin(
                game,
                p.address,
                assassin_coordinator::game::CheckinRequest {
                    lat: 0.0,
                    lng: 0.0,
                    qr_payload: Some(seed_payload.clone()),
                    bluetooth_token: Some(token(p.number.get())),
                    ble_nearby: vec![token(seed.number.get())],
                },
            )
            .await
            .unwrap();
    }

    // All six checked in: the monitor completes check-in without culls.
    assert!(!h.coordinator.run_checkin_monitor_once(game).await.unwrap());
    assert_eq!(h.store.alive_count(game).await.unwrap(), 6);
    h.coordinator.begin_game(game).await.unwrap();

    // A couple of ticks so spectators get a positions frame.
    assert!(h.coordinator.run_game_tick_once(game).await.unwrap());
    assert!(h.coordinator.run_game_tick_once(game).await.unwrap());

    // One hunter walks the entire chain: five kills in target order.
    let hunter = addrs[0];
    for _ in 0..5 {
        let target = h.target_of(game, hunter).await;
        let target_number = h.number_of(game, target).await;
        h.coordinator
            .submit_kill(
                game,
                hunter,
                &qr::encode(game, target_number),
                0.0,
                0.0,
                vec![token(target_number.get())],
            )
            .await
            .unwrap();
    }
    h.settle().await;
    h.sync().await;

    // The last player standing takes first place and the kill prize.
    let ended = h.game(game).await;
    assert_eq!(ended.phase, GamePhase::Ended);
    assert_eq!(ended.winner1, Some(hunter));
    assert_eq!(ended.top_killer, Some(hunter));
    let hunter_row = h.store.player(game, hunter).await.unwrap().unwrap();
    assert_eq!(hunter_row.kills, 5);

    // Kill count equals the number of kill records.
    assert_eq!(h.store.kills(game).await.unwrap().len(), 5);

    // Every player socket saw the full story, exactly once each.
    for conn in &mut conns {
        let messages = drain(conn);
        assert_eq!(
            count_where(&messages, |m| matches!(m, ServerMessage::KillRecorded { .. })),
            5
        );
        assert_eq!(
            count_where(&messages, |m| matches!(
                m,
                ServerMessage::PlayerEliminated { .. }
            )),
            5
        );
        assert_eq!(
            count_where(&messages, |m| matches!(
                m,
                ServerMessage::LeaderboardUpdate { .. }
            )),
            5
        );
        assert_eq!(
            count_where(&messages, |m| matches!(m, ServerMessage::GameStarted { .. })),
            1
        );
        assert_eq!(
            count_where(&messages, |m| matches!(m, ServerMessage::GameEnded { .. })),
            1
        );
    }

    let spectator_messages = drain(&mut spectator);
    assert!(
        count_where(&spectator_messages, |m| matches!(
            m,
            ServerMessage::SpectatorPositions { .. }
        )) >= 1
    );

    // Operator surface: one start, five kills, one end.
    let calls = h.sim.calls();
    assert!(matches!(calls.first(), Some(OperatorCall::StartGame(1))));
    assert_eq!(
        calls
            .iter()
            .filter(|c| matches!(c, OperatorCall::RecordKill(..)))
            .count(),
        5
    );
    assert_eq!(
        calls
            .iter()
            .filter(|c| matches!(c, OperatorCall::EndGame(..)))
            .count(),
        1
    );

    // Every kill row carries its confirmed settlement hash.
    assert!(
        h.store
            .kills(game)
            .await
            .unwrap()
            .iter()
            .all(|k| k.tx_hash.is_some())
    );
}

#[tokio::test]
async fn zone_violation_eliminates_after_grace() {
    let mut rules = default_rules();
    rules.heartbeat_interval_seconds = 6000;
    let h = Harness::new(rules);
    let game = GameId::new(1);

    let addrs = h.start_hunt(1, 3).await;

    // Pick a victim and learn their place in the chain.
    let victim = addrs[1];
    let hunter = h.hunter_of(game, victim).await;
    let old_target = h.target_of(game, victim).await;
    let victim_number = h.number_of(game, victim).await;
    let hunter_number = h.number_of(game, hunter).await;
    let old_target_number = h.number_of(game, old_target).await;

    let mut victim_conn = h.attach(game, victim);
    let mut hunter_conn = h.attach(game, hunter);
    let mut target_conn = h.attach(game, old_target);

    // Outside the 2 km ring at t=0, t=30, t=59.
    let outside = 0.05_f64;
    h.coordinator
        .record_location(game, victim, 0.0, outside, h.clock.timestamp())
        .await
        .unwrap();
    h.advance(30);
    h.coordinator
        .record_location(game, victim, 0.0, outside, h.clock.timestamp())
        .await
        .unwrap();
    h.advance(29);
    h.coordinator
        .record_location(game, victim, 0.0, outside, h.clock.timestamp())
        .await
        .unwrap();

    // The countdown is monotone: 60, 30, 1.
    let warnings: Vec<u64> = drain(&mut victim_conn)
        .into_iter()
        .filter_map(|m| match m {
            ServerMessage::ZoneWarning {
                seconds_remaining, ..
            } => Some(seconds_remaining),
            _ => None,
        })
        .collect();
    assert_eq!(warnings, vec![60, 30, 1]);

    // Grace expires at t=60.
    h.advance(1);
    h.coordinator.run_game_tick_once(game).await.unwrap();
    h.settle().await;

    let victim_row = h.store.player(game, victim).await.unwrap().unwrap();
    assert!(!victim_row.is_alive);
    assert_eq!(victim_row.eliminated_by.as_deref(), Some("zone_violation"));
    assert_eq!(h.store.alive_count(game).await.unwrap(), 2);

    // The hunter inherits the victim's old target...
    let hunter_messages = drain(&mut hunter_conn);
    assert!(hunter_messages.iter().any(|m| matches!(
        m,
        ServerMessage::TargetAssigned { target, .. } if target.player_number == old_target_number
    )));
    // ...and the old target learns about their new hunter.
    let target_messages = drain(&mut target_conn);
    assert!(target_messages.iter().any(|m| matches!(
        m,
        ServerMessage::HunterUpdated {
            hunter_player_number
        } if *hunter_player_number == hunter_number
    )));

    // The elimination is broadcast with the zone reason, no eliminator.
    assert!(target_messages.iter().any(|m| matches!(
        m,
        ServerMessage::PlayerEliminated {
            player_number,
            eliminator_number: None,
            reason,
        } if *player_number == victim_number && reason == "zone_violation"
    )));

    // No on-chain kill is attributed.
    let calls = h.sim.calls();
    assert!(!calls.iter().any(|c| matches!(c, OperatorCall::RecordKill(..))));
    assert!(calls.iter().any(|c| matches!(
        c,
        OperatorCall::EliminatePlayer(1, n, 2) if *n == victim_number.get()
    )));
}

#[tokio::test]
async fn heartbeat_refreshes_the_scanned_player_only() {
    let mut rules = default_rules();
    rules.heartbeat_interval_seconds = 60;
    let h = Harness::new(rules);
    let game = GameId::new(1);

    let addrs = h.start_hunt(1, 4).await;

    // In a 4-cycle the two-hops-away player is neither the scanner's
    // target nor their hunter.
    let scanner = addrs[0];
    let scanner_target = h.target_of(game, scanner).await;
    let scanned = h.target_of(game, scanner_target).await;
    let scanned_number = h.number_of(game, scanned).await;

    let mut scanner_conn = h.attach(game, scanner);
    let mut scanned_conn = h.attach(game, scanned);

    let before = h.store.player(game, scanner).await.unwrap().unwrap();
    h.advance(10);

    let result = h
        .coordinator
        .submit_heartbeat(
            game,
            scanner,
            &qr::encode(game, scanned_number),
            0.0,
            0.0,
            vec![token(scanned_number.get())],
        )
        .await
        .unwrap();
    assert_eq!(result, scanned_number);

    // Only the scanned player's heartbeat moved.
    let scanned_row = h.store.player(game, scanned).await.unwrap().unwrap();
    assert_eq!(scanned_row.last_heartbeat_at.unwrap(), h.clock.now());
    let scanner_row = h.store.player(game, scanner).await.unwrap().unwrap();
    assert_eq!(scanner_row.last_heartbeat_at, before.last_heartbeat_at);

    assert!(drain(&mut scanned_conn).iter().any(|m| matches!(
        m,
        ServerMessage::HeartbeatRefreshed { .. }
    )));
    assert!(drain(&mut scanner_conn).iter().any(|m| matches!(
        m,
        ServerMessage::HeartbeatScanSuccess {
            scanned_player_number
        } if *scanned_player_number == scanned_number
    )));

    // The scan record is on file.
    assert_eq!(h.store.heartbeat_scans(game).await.unwrap().len(), 1);

    // Two kills drop the alive count to the disable threshold.
    for _ in 0..2 {
        let target = h.target_of(game, scanner).await;
        let target_number = h.number_of(game, target).await;
        h.coordinator
            .submit_kill(
                game,
                scanner,
                &qr::encode(game, target_number),
                0.0,
                0.0,
                vec![token(target_number.get())],
            )
            .await
            .unwrap();
    }
    assert_eq!(h.store.alive_count(game).await.unwrap(), 2);

    let survivor_target = h.target_of(game, scanner).await;
    let survivor_number = h.number_of(game, survivor_target).await;
    let err = h
        .coordinator
        .submit_heartbeat(
            game,
            scanner,
            &qr::encode(game, survivor_number),
            0.0,
            0.0,
            vec![token(survivor_number.get())],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::Verify(VerifyError::HeartbeatDisabled))
    ));
}
