//! Crash-recovery scenarios: rescheduling a mid-pregame countdown and
//! resuming zone-grace countdowns from persisted pings.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use chrono::Duration as ChronoDuration;
use tokio::time::Duration;

use assassin_coordinator::ports::Clock;
use assassin_coordinator::ports::store::{AssignmentStore, GameStore, PlayerStore};
use assassin_coordinator::types::entities::TargetAssignment;
use assassin_coordinator::types::enums::{GamePhase, SubPhase};
use assassin_coordinator::types::primitives::GameId;
use common::{Harness, addr, default_rules, make_game, make_player, seed_ping, seed_shrinks};

#[tokio::test(start_paused = true)]
async fn recovery_mid_pregame_reschedules_the_countdown() {
    let mut rules = default_rules();
    rules.pregame_duration_seconds = 10;
    let h = Harness::new(rules);
    let game = GameId::new(1);
    h.coordinator.register_simulated(game);

    // The process died 8 s into a 10 s pregame.
    let started = h.clock.now() - ChronoDuration::seconds(8);
    let mut row = make_game(game);
    row.phase = GamePhase::Active;
    row.sub_phase = Some(SubPhase::Pregame);
    row.started_at = Some(started - ChronoDuration::seconds(60));
    row.sub_phase_started_at = Some(started);
    row.player_count = 3;
    h.store.insert_game(&row).await.unwrap();
    seed_shrinks(&h.store, game).await;
    for n in 1..=3 {
        h.store.insert_player(&make_player(game, n)).await.unwrap();
    }

    h.coordinator.recover().await.unwrap();

    // Status reports the original countdown end.
    let status = h.coordinator.game_status(game).await.unwrap();
    assert_eq!(
        status.pregame_ends_at,
        Some((started + ChronoDuration::seconds(10)).timestamp())
    );

    // One second later the countdown is still running...
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        h.game(game).await.sub_phase,
        Some(SubPhase::Pregame),
        "timer must not fire early"
    );

    // ...and roughly two seconds after recovery the hunt begins.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let recovered = h.game(game).await;
    assert_eq!(recovered.sub_phase, Some(SubPhase::Game));

    // The chain was built over the three alive players.
    assert_eq!(h.store.assignments(game).await.unwrap().len(), 3);
}

#[tokio::test]
async fn recovery_resumes_zone_grace_from_persisted_pings() {
    let h = Harness::new(default_rules());
    let game = GameId::new(1);
    h.coordinator.register_simulated(game);

    // Mid-hunt: three alive players, chain 1→2→3→1, hunt started 200 s
    // ago.
    let hunt_started = h.clock.now() - ChronoDuration::seconds(200);
    let mut row = make_game(game);
    row.phase = GamePhase::Active;
    row.sub_phase = Some(SubPhase::Game);
    row.started_at = Some(hunt_started - ChronoDuration::seconds(120));
    row.sub_phase_started_at = Some(hunt_started);
    row.player_count = 3;
    h.store.insert_game(&row).await.unwrap();
    seed_shrinks(&h.store, game).await;
    for n in 1..=3_u16 {
        let mut player = make_player(game, n);
        player.last_heartbeat_at = Some(h.clock.now());
        h.store.insert_player(&player).await.unwrap();
    }
    let cycle = [addr(1), addr(2), addr(3)];
    for (i, hunter) in cycle.iter().enumerate() {
        h.store
            .upsert_assignment(&TargetAssignment {
                game_id: game,
                hunter: *hunter,
                target: cycle[(i + 1) % 3],
                assigned_at: hunt_started,
            })
            .await
            .unwrap();
    }

    // P1's latest ping is 70 s old and outside the zone (grace is 60 s);
    // the others pinged recently from the center.
    seed_ping(
        &h.store,
        game,
        addr(1),
        0.05,
        h.clock.now() - ChronoDuration::seconds(70),
        false,
    )
    .await;
    for n in 2..=3 {
        seed_ping(
            &h.store,
            game,
            addr(n),
            0.0,
            h.clock.now() - ChronoDuration::seconds(5),
            true,
        )
        .await;
    }

    h.coordinator.recover().await.unwrap();

    // The first tick eliminates the player whose grace ran out before
    // the restart.
    h.coordinator.run_game_tick_once(game).await.unwrap();

    let p1 = h.store.player(game, addr(1)).await.unwrap().unwrap();
    assert!(!p1.is_alive);
    assert_eq!(p1.eliminated_by.as_deref(), Some("zone_violation"));
    assert_eq!(h.store.alive_count(game).await.unwrap(), 2);

    // The survivors were rewired into a mutual pair.
    let assignments = h.store.assignments(game).await.unwrap();
    assert_eq!(assignments.len(), 2);
    assert!(
        assignments
            .iter()
            .any(|a| a.hunter == addr(3) && a.target == addr(2))
    );
    assert!(
        assignments
            .iter()
            .any(|a| a.hunter == addr(2) && a.target == addr(3))
    );
}
