//! Joining, paying, and leaving.

use std::time::Duration;

use bingo_cache::{LockToken, keys};
use bingo_core::config::GameConfig;
use bingo_core::types::{CardId, GameStatus, PlayerId};
use bingo_service::{JoinOutcome, JoinRequest, LeaveOutcome};

use crate::helpers::{ENTRY_FEE, TestEngine, fast_config};

#[tokio::test(start_paused = true)]
async fn test_repeated_join_charges_once() {
    let engine = TestEngine::new(fast_config(), 3).await;
    let player = PlayerId::new();

    assert!(matches!(engine.seat(player, 1).await, JoinOutcome::Joined(_)));
    let again = engine
        .orchestrator
        .join(engine.room_id, JoinRequest::new(player))
        .await
        .unwrap();
    assert!(matches!(again, JoinOutcome::AlreadyJoined(_)));

    let state = engine.game().await;
    assert_eq!(state.player_count(), 1);
    assert_eq!(engine.fakes.payments.charge_calls().await, 1);
    assert_eq!(
        engine.fakes.payments.charged(player, state.game_id).await,
        Some(ENTRY_FEE)
    );
}

#[tokio::test(start_paused = true)]
async fn test_join_requires_an_owned_card() {
    let engine = TestEngine::new(fast_config(), 3).await;
    let player = PlayerId::new();
    engine.orchestrator.get_state(engine.room_id, None).await.unwrap();

    let err = engine
        .orchestrator
        .join(engine.room_id, JoinRequest::new(player))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NO_CARDS_SELECTED");

    engine
        .orchestrator
        .select_card(engine.room_id, player, CardId(4))
        .await
        .unwrap();
    let request = JoinRequest {
        selected_card_ids: vec![CardId(4), CardId(5)],
        ..JoinRequest::new(player)
    };
    let err = engine.orchestrator.join(engine.room_id, request).await.unwrap_err();
    assert_eq!(err.code(), "CARD_NOT_OWNED");
    assert_eq!(engine.fakes.payments.charge_calls().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_declined_payment_leaves_no_membership() {
    let engine = TestEngine::new(fast_config(), 1).await;
    let player = PlayerId::new();
    engine.fakes.payments.decline(player).await;
    engine
        .orchestrator
        .select_card(engine.room_id, player, CardId(1))
        .await
        .unwrap();

    let err = engine
        .orchestrator
        .join(engine.room_id, JoinRequest::new(player))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PAYMENT_FAILED");

    let state = engine.game().await;
    assert!(!state.is_member(&player));
    assert_eq!(state.status, GameStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_failing_gateway_reports_payment_error() {
    let engine = TestEngine::new(fast_config(), 1).await;
    let player = PlayerId::new();
    engine.fakes.payments.fail(player).await;
    engine
        .orchestrator
        .select_card(engine.room_id, player, CardId(1))
        .await
        .unwrap();

    let err = engine
        .orchestrator
        .join(engine.room_id, JoinRequest::new(player))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PAYMENT_ERROR");
    assert!(!engine.game().await.is_member(&player));
}

#[tokio::test(start_paused = true)]
async fn test_leave_refunds_and_releases_cards() {
    let engine = TestEngine::new(fast_config(), 3).await;
    let player = PlayerId::new();
    engine.seat(player, 1).await;
    engine
        .orchestrator
        .select_card(engine.room_id, player, CardId(2))
        .await
        .unwrap();
    let game_id = engine.game().await.game_id;

    let outcome = engine.orchestrator.leave(engine.room_id, player).await.unwrap();
    assert_eq!(outcome, LeaveOutcome::Left { refunded: true });

    let state = engine.game().await;
    assert!(!state.is_member(&player));
    assert!(state.selected_card_ids.is_empty());
    assert_eq!(engine.fakes.payments.charged(player, game_id).await, None);
    assert!(
        engine
            .orchestrator
            .owned_cards(engine.room_id, player)
            .await
            .unwrap()
            .is_empty()
    );

    let err = engine.orchestrator.leave(engine.room_id, player).await.unwrap_err();
    assert_eq!(err.code(), "NOT_IN_GAME");
}

#[tokio::test(start_paused = true)]
async fn test_join_and_leave_after_start() {
    let engine = TestEngine::new(
        GameConfig {
            draw_interval_ms: 60_000,
            ..fast_config()
        },
        1,
    )
    .await;
    let player = PlayerId::new();
    engine.seat(player, 1).await;
    engine.wait_for_status(GameStatus::Playing).await;

    let late = PlayerId::new();
    let err = engine
        .orchestrator
        .select_card(engine.room_id, late, CardId(3))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "GAME_ALREADY_STARTED");
    let err = engine
        .orchestrator
        .join(engine.room_id, JoinRequest::new(late))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "GAME_ALREADY_STARTED");

    let outcome = engine.orchestrator.leave(engine.room_id, player).await.unwrap();
    assert_eq!(outcome, LeaveOutcome::AfterStart);
    assert!(engine.game().await.is_member(&player));
    assert_eq!(engine.fakes.payments.refund_calls().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unpaid_join_does_not_count_towards_start() {
    let engine = TestEngine::new(fast_config(), 2).await;
    let (slow, other) = (PlayerId::new(), PlayerId::new());
    engine.fakes.payments.decline(slow).await;
    let gate = engine.fakes.payments.pause(slow).await;
    let join = engine.spawn_join(slow, 1).await;
    engine.wait_pending(slow).await;

    engine.seat(other, 2).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    let state = engine.game().await;
    assert_eq!(state.status, GameStatus::Ready);
    assert_eq!(state.player_count(), 1);

    gate.notify_one();
    let err = join.await.unwrap().unwrap_err();
    assert_eq!(err.code(), "PAYMENT_FAILED");
    assert!(!engine.game().await.is_member(&slow));
    assert!(!engine.is_pending(slow).await);
}

#[tokio::test(start_paused = true)]
async fn test_pending_seat_counts_against_capacity() {
    let engine = TestEngine::new(fast_config(), 20).await;
    let players: Vec<PlayerId> = (0..10).map(|_| PlayerId::new()).collect();
    for (i, player) in players[..9].iter().enumerate() {
        engine.seat(*player, i as u32 + 1).await;
    }
    let last = players[9];
    let gate = engine.fakes.payments.pause(last).await;
    let join = engine.spawn_join(last, 10).await;
    engine.wait_pending(last).await;

    let extra = PlayerId::new();
    engine
        .orchestrator
        .select_card(engine.room_id, extra, CardId(11))
        .await
        .unwrap();
    let err = engine
        .orchestrator
        .join(engine.room_id, JoinRequest::new(extra))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "GAME_FULL");

    gate.notify_one();
    assert!(matches!(join.await.unwrap().unwrap(), JoinOutcome::Joined(_)));
    assert_eq!(engine.game().await.player_count(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_paid_join_after_start_is_refunded() {
    let engine = TestEngine::new(
        GameConfig {
            draw_interval_ms: 60_000,
            ..fast_config()
        },
        2,
    )
    .await;
    let slow = PlayerId::new();
    let gate = engine.fakes.payments.pause(slow).await;
    let join = engine.spawn_join(slow, 1).await;
    engine.wait_pending(slow).await;

    engine.seat(PlayerId::new(), 2).await;
    engine.seat(PlayerId::new(), 3).await;
    let started = engine.wait_for_status(GameStatus::Playing).await;

    gate.notify_one();
    let err = join.await.unwrap().unwrap_err();
    assert_eq!(err.code(), "GAME_ALREADY_STARTED");
    assert_eq!(engine.fakes.payments.refund_calls().await, 1);
    assert_eq!(engine.fakes.payments.charged(slow, started.game_id).await, None);

    let state = engine.game().await;
    assert!(!state.is_member(&slow));
    assert_eq!(state.player_count(), 2);
    assert!(!engine.is_pending(slow).await);
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_paid_join_is_refunded() {
    let engine = TestEngine::new(fast_config(), 3).await;
    let slow = PlayerId::new();
    let gate = engine.fakes.payments.pause(slow).await;
    let join = engine.spawn_join(slow, 1).await;
    engine.wait_pending(slow).await;

    // Another instance sits on the state lock past every retry.
    let game_id = engine.game().await.game_id;
    let ctx = engine.orchestrator.context();
    assert!(
        ctx.locks
            .acquire(&keys::locks::state(game_id), &LockToken::new(), Duration::from_secs(60))
            .await
            .unwrap()
    );

    gate.notify_one();
    let err = join.await.unwrap().unwrap_err();
    assert_eq!(err.code(), "LOCK_BUSY");
    assert_eq!(engine.fakes.payments.refund_calls().await, 1);
    assert_eq!(engine.fakes.payments.charged(slow, game_id).await, None);
    assert!(!engine.game().await.is_member(&slow));
    assert!(!engine.is_pending(slow).await);
}
