//! Bingo claims: validation order, single winner, payout.

use std::collections::BTreeSet;
use std::time::Duration;

use bingo_cache::{LockToken, keys};
use bingo_core::config::GameConfig;
use bingo_core::types::{ClaimOutcome, GameStatus, PlayerId};
use bingo_service::ClaimRequest;

use crate::helpers::{ENTRY_FEE, TestEngine, fast_config};

/// Draws every number quickly, then waits long enough for claims.
fn claim_window_config() -> GameConfig {
    GameConfig {
        no_winner_grace_ms: 60_000,
        ..fast_config()
    }
}

fn request(player_id: PlayerId, card_id: bingo_core::types::CardId, marked: BTreeSet<u8>) -> ClaimRequest {
    ClaimRequest {
        player_id,
        player_name: format!("player-{}", &player_id.to_string()[..4]),
        card_id,
        marked_numbers: marked,
        pattern: "FULL_HOUSE".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_claim_missing_server_marks_is_rejected() {
    let engine = TestEngine::new(claim_window_config(), 1).await;
    let player = PlayerId::new();
    engine.seat(player, 1).await;
    let (card_id, numbers) = engine.card_numbers(player).await;
    let marked = *numbers.iter().next().unwrap();
    engine
        .orchestrator
        .mark_number(engine.room_id, player, card_id, i64::from(marked))
        .await
        .unwrap();
    engine.wait_for_status(GameStatus::Playing).await;

    let err = engine
        .orchestrator
        .claim_bingo(engine.room_id, request(player, card_id, BTreeSet::new()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "MARKED_NUMBERS_MISMATCH");

    let claims = engine.fakes.claims.claims().await;
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].outcome, ClaimOutcome::Rejected);
    assert_eq!(claims[0].error.as_deref(), Some("MARKED_NUMBERS_MISMATCH"));
    assert_eq!(engine.game().await.status, GameStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_claim_before_start_and_by_outsider() {
    let engine = TestEngine::new(claim_window_config(), 2).await;
    let player = PlayerId::new();
    engine.seat(player, 1).await;
    let (card_id, numbers) = engine.card_numbers(player).await;

    let err = engine
        .orchestrator
        .claim_bingo(engine.room_id, request(player, card_id, numbers.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "GAME_NOT_STARTED");

    engine.seat(PlayerId::new(), 2).await;
    engine.wait_for_status(GameStatus::Playing).await;

    let outsider = PlayerId::new();
    let err = engine
        .orchestrator
        .claim_bingo(engine.room_id, request(outsider, card_id, numbers))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_A_PLAYER");
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_claim_is_invalid_bingo() {
    let engine = TestEngine::new(claim_window_config(), 1).await;
    let player = PlayerId::new();
    engine.seat(player, 1).await;
    let (card_id, numbers) = engine.card_numbers(player).await;
    engine.wait_for_status(GameStatus::Playing).await;

    // Far fewer than 24 numbers are drawn this early.
    let err = engine
        .orchestrator
        .claim_bingo(engine.room_id, request(player, card_id, numbers))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_BINGO");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_valid_claims_pay_once() {
    let engine = TestEngine::new(claim_window_config(), 2).await;
    let (p1, p2) = (PlayerId::new(), PlayerId::new());
    engine.seat(p1, 1).await;
    engine.seat(p2, 2).await;
    let (c1, n1) = engine.card_numbers(p1).await;
    let (c2, n2) = engine.card_numbers(p2).await;

    engine.wait_until(|s| s.drawn_numbers.len() == 75).await;

    let (r1, r2) = tokio::join!(
        engine.orchestrator.claim_bingo(engine.room_id, request(p1, c1, n1)),
        engine.orchestrator.claim_bingo(engine.room_id, request(p2, c2, n2)),
    );
    let winners: Vec<_> = [&r1, &r2].into_iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "exactly one claim wins: {r1:?} / {r2:?}");
    let winner = winners[0].clone();

    let loser = [r1, r2].into_iter().find_map(|r| r.err()).unwrap();
    assert!(
        matches!(
            loser.code(),
            "GAME_ALREADY_COMPLETED" | "GAME_ENDED_BY_ANOTHER_INSTANCE" | "LOCK_BUSY"
        ),
        "unexpected loser code {}",
        loser.code()
    );

    // Pot of two entries minus ten percent commission.
    let expected_prize = (2 * ENTRY_FEE) * 9 / 10;
    assert_eq!(winner.prize, expected_prize);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let payouts = engine.fakes.payouts.payouts().await;
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].1, winner.player_id);
    assert_eq!(payouts[0].2, expected_prize);

    let state = engine.game().await;
    assert_eq!(state.status, GameStatus::Completed);
    assert_eq!(state.winner.as_ref().map(|w| w.player_id), Some(winner.player_id));

    let won = engine
        .fakes
        .claims
        .claims()
        .await
        .into_iter()
        .filter(|c| c.outcome == ClaimOutcome::Won)
        .count();
    assert_eq!(won, 1);

    // The grace window expiring later must not end the game a second time.
    tokio::time::sleep(Duration::from_secs(61)).await;
    let state = engine.game().await;
    assert_eq!(state.winner.map(|w| w.player_id), Some(winner.player_id));
    assert_eq!(engine.fakes.payouts.payouts().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_claim_after_completion_is_rejected() {
    let engine = TestEngine::new(claim_window_config(), 1).await;
    let player = PlayerId::new();
    engine.seat(player, 1).await;
    let (card_id, numbers) = engine.card_numbers(player).await;
    engine.wait_until(|s| s.drawn_numbers.len() == 75).await;

    engine
        .orchestrator
        .claim_bingo(engine.room_id, request(player, card_id, numbers.clone()))
        .await
        .unwrap();
    let err = engine
        .orchestrator
        .claim_bingo(engine.room_id, request(player, card_id, numbers))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "GAME_ALREADY_COMPLETED");
}

#[tokio::test(start_paused = true)]
async fn test_claim_while_game_is_being_ended_elsewhere() {
    let engine = TestEngine::new(claim_window_config(), 1).await;
    let player = PlayerId::new();
    engine.seat(player, 1).await;
    let (card_id, numbers) = engine.card_numbers(player).await;
    let game = engine.wait_until(|s| s.drawn_numbers.len() == 75).await;

    let ctx = engine.orchestrator.context();
    assert!(
        ctx.locks
            .acquire(&keys::locks::end(game.game_id), &LockToken::new(), Duration::from_secs(30))
            .await
            .unwrap()
    );

    let err = engine
        .orchestrator
        .claim_bingo(engine.room_id, request(player, card_id, numbers))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "GAME_ENDED_BY_ANOTHER_INSTANCE");

    let claims = engine.fakes.claims.claims().await;
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].outcome, ClaimOutcome::Rejected);
    assert_eq!(claims[0].error.as_deref(), Some("GAME_ENDED_BY_ANOTHER_INSTANCE"));
    assert!(engine.fakes.payouts.payouts().await.is_empty());
    let state = engine.game().await;
    assert_eq!(state.status, GameStatus::Playing);
    assert!(state.winner.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_payout_is_reported_and_settled_later() {
    let engine = TestEngine::new(claim_window_config(), 1).await;
    engine.fakes.payouts.fail_next(u32::MAX).await;
    let player = PlayerId::new();
    engine.seat(player, 1).await;
    let (card_id, numbers) = engine.card_numbers(player).await;
    let game = engine.wait_until(|s| s.drawn_numbers.len() == 75).await;

    let err = engine
        .orchestrator
        .claim_bingo(engine.room_id, request(player, card_id, numbers))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PAYOUT_FAILED");
    let attempts = engine.orchestrator.context().retry.attempts();
    assert_eq!(engine.fakes.payouts.payout_calls().await, attempts);

    // The win stands; only the prize is outstanding.
    let state = engine.game().await;
    assert_eq!(state.status, GameStatus::Completed);
    assert_eq!(state.winner.as_ref().map(|w| w.player_id), Some(player));
    assert!(state.payout_pending);
    let claims = engine.fakes.claims.claims().await;
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].outcome, ClaimOutcome::Won);
    assert_eq!(claims[0].error.as_deref(), Some("PAYOUT_FAILED"));
    let record = engine.fakes.rooms.game(game.game_id).await.unwrap();
    assert!(record.payout_pending);

    engine.fakes.payouts.fail_next(0).await;
    assert!(
        engine
            .orchestrator
            .settle_payout(engine.room_id, game.game_id)
            .await
            .unwrap()
    );
    let payouts = engine.fakes.payouts.payouts().await;
    assert_eq!(payouts, vec![(game.game_id, player, ENTRY_FEE * 9 / 10)]);
    assert!(!engine.game().await.payout_pending);
    let record = engine.fakes.rooms.game(game.game_id).await.unwrap();
    assert!(!record.payout_pending);

    assert!(
        !engine
            .orchestrator
            .settle_payout(engine.room_id, game.game_id)
            .await
            .unwrap()
    );
}
