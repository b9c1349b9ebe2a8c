//! Countdown, start, drawing, and the no-winner ending.

use std::collections::BTreeSet;
use std::time::Duration;

use futures::StreamExt;

use bingo_core::config::GameConfig;
use bingo_core::events::OutboundEvent;
use bingo_core::types::{GameStatus, PlayerId};
use bingo_service::game::NO_WINNER;

use crate::helpers::{ENTRY_FEE, TestEngine, fast_config};

#[tokio::test(start_paused = true)]
async fn test_threshold_starts_countdown_then_game() {
    let config = GameConfig {
        draw_interval_ms: 1_000,
        ..fast_config()
    };
    let engine = TestEngine::new(config, 2).await;
    let (p1, p2) = (PlayerId::new(), PlayerId::new());

    engine.seat(p1, 1).await;
    assert_eq!(engine.game().await.status, GameStatus::Ready);

    engine.seat(p2, 2).await;
    let state = engine.game().await;
    assert_eq!(state.status, GameStatus::Countdown);
    assert!(state.countdown_end_time.is_some());

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    let state = engine.game().await;
    assert_eq!(state.status, GameStatus::Playing);
    assert!(state.started);
    assert!(state.countdown_end_time.is_none());
    assert_eq!(state.player_count(), 2);
    assert_eq!(
        engine.fakes.payments.charged(p1, state.game_id).await,
        Some(ENTRY_FEE)
    );
}

#[tokio::test(start_paused = true)]
async fn test_countdown_aborts_when_player_leaves() {
    let engine = TestEngine::new(fast_config(), 2).await;
    let (p1, p2) = (PlayerId::new(), PlayerId::new());
    engine.seat(p1, 1).await;
    engine.seat(p2, 2).await;
    assert_eq!(engine.game().await.status, GameStatus::Countdown);

    engine.orchestrator.leave(engine.room_id, p2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_100)).await;

    let state = engine.game().await;
    assert_eq!(state.status, GameStatus::Ready);
    assert!(!state.started);
}

#[tokio::test(start_paused = true)]
async fn test_all_numbers_drawn_ends_without_winner() {
    let engine = TestEngine::new(fast_config(), 1).await;
    let player = PlayerId::new();
    let mut events = engine
        .orchestrator
        .context()
        .bus
        .subscribe_room(engine.room_id)
        .await
        .unwrap();

    engine.seat(player, 1).await;
    let state = engine.wait_for_status(GameStatus::Completed).await;

    assert!(state.ended);
    assert!(state.winner.is_none());
    assert_eq!(state.drawn_numbers.len(), 75);
    let unique: BTreeSet<u8> = state.drawn_numbers.iter().copied().collect();
    assert_eq!(unique, (1..=75).collect::<BTreeSet<u8>>());

    let mut result = None;
    while let Some(event) = events.next().await {
        if let OutboundEvent::Ended {
            has_winner,
            result: text,
            ..
        } = event
        {
            assert!(!has_winner);
            result = Some(text);
            break;
        }
    }
    assert_eq!(result.as_deref(), Some(NO_WINNER));

    // Let the finalizer write its summary.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(engine.fakes.payouts.payouts().await.is_empty());
    let record = engine.fakes.rooms.game(state.game_id).await.unwrap();
    assert_eq!(record.status, GameStatus::Completed);
    assert_eq!(record.winner_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_completed_game_stays_terminal() {
    let engine = TestEngine::new(fast_config(), 1).await;
    let player = PlayerId::new();
    engine.seat(player, 1).await;
    let completed = engine.wait_for_status(GameStatus::Completed).await;

    let again = engine
        .orchestrator
        .finalizer()
        .finish_without_winner(engine.room_id, completed.game_id)
        .await
        .unwrap();
    assert!(again.is_none());

    assert_eq!(
        engine
            .orchestrator
            .complete_countdown(engine.room_id, completed.game_id)
            .await
            .unwrap(),
        None
    );

    let state = engine.game().await;
    assert_eq!(state.game_id, completed.game_id);
    assert_eq!(state.status, GameStatus::Completed);
    assert_eq!(state.drawn_numbers, completed.drawn_numbers);
}

#[tokio::test(start_paused = true)]
async fn test_next_game_replaces_completed_one() {
    let engine = TestEngine::new(fast_config(), 1).await;
    engine.seat(PlayerId::new(), 1).await;
    let completed = engine.wait_for_status(GameStatus::Completed).await;

    engine
        .orchestrator
        .select_card(engine.room_id, PlayerId::new(), bingo_core::types::CardId(1))
        .await
        .unwrap();

    let next = engine.game().await;
    assert_ne!(next.game_id, completed.game_id);
    assert_eq!(next.status, GameStatus::Ready);
    assert!(next.drawn_numbers.is_empty());
}
