use std::{sync::Arc, time::Duration};

use tokio::sync::RwLock;
use touchline_back::{
    config::SyncConfig,
    dao::fixture_store::{FixtureStore, memory::InMemoryFixtureStore},
    services::sync_coordinator::{ScoreReconciliation, SyncCoordinator, SyncOutcome, SyncTrigger},
    state::{
        clock::ManualClock,
        events::{CardInput, CardType, GoalInput, PlayerSlot, TeamSide},
        local_buffer::LocalBuffer,
        match_store::{Fixture, MatchEventStore, SyncScope},
        score::{Score, TeamIdentity},
    },
};

const KICK_OFF: u64 = 1_700_000_000_000;

fn home() -> TeamIdentity {
    TeamIdentity::new(Some("h".into()), "Harbour FC")
}

fn away() -> TeamIdentity {
    TeamIdentity::new(Some("a".into()), "Athletic")
}

fn goal(side: TeamSide, player: &str, match_time_seconds: u32, is_own_goal: bool) -> GoalInput {
    let team = match side {
        TeamSide::Home => home(),
        TeamSide::Away => away(),
    };
    GoalInput {
        player_id: Some(player.into()),
        player_name: player.to_uppercase(),
        team_id: team.id,
        team_name: team.name,
        side,
        match_time_seconds,
        is_own_goal,
        assisted_by: None,
    }
}

fn harness() -> (
    Arc<ManualClock>,
    RwLock<MatchEventStore>,
    SyncCoordinator,
    InMemoryFixtureStore,
) {
    let clock = ManualClock::new(KICK_OFF);
    let mut store = MatchEventStore::new(clock.clone());
    store.setup_match(Fixture {
        id: "derby".into(),
        home: home(),
        away: away(),
    });
    let config = SyncConfig {
        chunk_delay: Duration::ZERO,
        ..SyncConfig::default()
    };
    let coordinator = SyncCoordinator::new(config, clock.clone());
    (clock, RwLock::new(store), coordinator, InMemoryFixtureStore::new())
}

#[tokio::test]
async fn a_full_half_reaches_storage_and_survives_an_outage() {
    let (clock, store, coordinator, backend) = harness();

    {
        let mut guard = store.write().await;
        guard.add_goal(goal(TeamSide::Home, "h9", 600, false)).unwrap();
        // An own goal by an away player counts for home.
        guard.add_goal(goal(TeamSide::Away, "a4", 1_200, true)).unwrap();
        guard.add_card(CardInput {
            player_id: "a4".into(),
            player_name: "A4".into(),
            team_id: Some("a".into()),
            team_name: "Athletic".into(),
            side: TeamSide::Away,
            card_type: CardType::Yellow,
            match_time_seconds: 1_250,
        });
        guard.start_player_time(PlayerSlot {
            player_id: "h9".into(),
            player_name: "H9".into(),
            team_id: Some("h".into()),
            team_name: "Harbour FC".into(),
            side: TeamSide::Home,
        });
        guard.add_event("kick_off", "first half", 0);
        assert_eq!(guard.session().score, Score { home: 2, away: 0 });
    }
    clock.advance(Duration::from_secs(45 * 60));

    let boundary: Arc<dyn FixtureStore> = Arc::new(backend.clone());
    let SyncOutcome::Completed(report) = coordinator
        .sync(SyncTrigger::Explicit, &store, Some(boundary.clone()))
        .await
    else {
        panic!("expected a completed cycle");
    };

    assert!(report.is_success());
    assert!(report.clean);
    assert_eq!((report.goals, report.cards, report.timeline), (2, 1, 1));
    assert!(matches!(
        report.score,
        Some(ScoreReconciliation::Corrected { previous: None, .. })
    ));
    let stored = backend.fixture_score("derby").await.unwrap();
    assert_eq!((stored.home_score, stored.away_score), (2, 0));
    assert_eq!(backend.player_times().await[0].total_time, 45 * 60);

    // Storage drops out; the referee keeps recording.
    backend.set_available(false);
    let late = store
        .write()
        .await
        .add_goal(goal(TeamSide::Away, "a10", 2_900, false))
        .unwrap();

    let SyncOutcome::Completed(report) = coordinator
        .sync(SyncTrigger::Explicit, &store, Some(boundary.clone()))
        .await
    else {
        panic!("expected a completed cycle");
    };
    assert!(!report.is_success());
    assert!(store.read().await.session().has_unsaved_changes);
    assert_eq!(store.read().await.unsaved_items_count().goals, 1);

    backend.set_available(true);
    let outcome = coordinator
        .sync(SyncTrigger::Explicit, &store, Some(boundary))
        .await;
    assert!(matches!(outcome, SyncOutcome::Completed(ref report) if report.is_success()));
    assert!(backend.goals().await.iter().any(|stored| stored.id == late.id));
    let stored = backend.fixture_score("derby").await.unwrap();
    assert_eq!((stored.home_score, stored.away_score), (2, 1));
}

#[tokio::test]
async fn periodic_cycles_are_throttled_but_explicit_saves_are_not() {
    let (clock, store, coordinator, backend) = harness();
    let boundary: Arc<dyn FixtureStore> = Arc::new(backend.clone());
    store
        .write()
        .await
        .add_goal(goal(TeamSide::Home, "h9", 60, false))
        .unwrap();

    let first = coordinator
        .sync(
            SyncTrigger::Periodic(SyncScope::Events),
            &store,
            Some(boundary.clone()),
        )
        .await;
    assert!(matches!(first, SyncOutcome::Completed(_)));

    clock.advance(Duration::from_secs(3));
    store
        .write()
        .await
        .add_goal(goal(TeamSide::Home, "h9", 120, false))
        .unwrap();
    let second = coordinator
        .sync(
            SyncTrigger::Periodic(SyncScope::Events),
            &store,
            Some(boundary.clone()),
        )
        .await;
    assert!(matches!(second, SyncOutcome::Throttled { .. }));

    let explicit = coordinator
        .sync(SyncTrigger::Explicit, &store, Some(boundary))
        .await;
    assert!(matches!(explicit, SyncOutcome::Completed(_)));
    assert_eq!(backend.goals().await.len(), 2);
}

#[tokio::test]
async fn buffered_offline_entries_merge_into_the_shared_store() {
    let (clock, store, coordinator, backend) = harness();
    store
        .write()
        .await
        .add_goal(goal(TeamSide::Home, "h9", 600, false))
        .unwrap();

    // A second device recorded the same goal plus one of its own while offline.
    let mut buffer = LocalBuffer::new(home(), away(), clock.clone());
    buffer.add_goal(goal(TeamSide::Home, "h9", 600, false)).unwrap();
    buffer.add_goal(goal(TeamSide::Away, "a7", 900, false)).unwrap();
    assert_eq!(buffer.pending(), 2);

    let report = store.write().await.absorb(buffer.flush());
    assert_eq!((report.applied, report.rejected), (1, 1));
    assert!(!buffer.has_unsaved_changes());
    assert_eq!(
        store.read().await.session().score,
        Score { home: 1, away: 1 }
    );

    let boundary: Arc<dyn FixtureStore> = Arc::new(backend.clone());
    let outcome = coordinator
        .sync(SyncTrigger::Explicit, &store, Some(boundary))
        .await;
    assert!(matches!(outcome, SyncOutcome::Completed(ref report) if report.clean));
    assert_eq!(backend.goals().await.len(), 2);
}
