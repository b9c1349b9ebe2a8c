//! Card selection and release across competing players.

use std::collections::BTreeSet;

use bingo_core::types::{CardId, PlayerId};

use crate::helpers::{TestEngine, fast_config};

#[tokio::test(start_paused = true)]
async fn test_out_of_range_card_is_rejected() {
    let engine = TestEngine::new(fast_config(), 2).await;
    let player = PlayerId::new();
    let pool_size = fast_config().card_pool_size;

    let err = engine
        .orchestrator
        .select_card(engine.room_id, player, CardId(pool_size + 1))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CARD_DOES_NOT_EXIST");

    let err = engine
        .orchestrator
        .select_card(engine.room_id, player, CardId(0))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_CARD_ID");

    assert!(engine.game().await.selected_card_ids.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_card_has_a_single_owner() {
    let engine = TestEngine::new(fast_config(), 2).await;
    let players: Vec<PlayerId> = (0..8).map(|_| PlayerId::new()).collect();
    engine.orchestrator.get_state(engine.room_id, None).await.unwrap();

    let mut handles = Vec::new();
    for player in players.clone() {
        let orchestrator = engine.orchestrator.clone();
        let room_id = engine.room_id;
        handles.push(tokio::spawn(async move {
            orchestrator.select_card(room_id, player, CardId(7)).await
        }));
    }
    let mut winners = Vec::new();
    for (player, handle) in players.iter().zip(handles) {
        match handle.await.unwrap() {
            Ok(true) => winners.push(*player),
            Ok(false) => panic!("nobody owned the card before"),
            Err(e) => assert!(
                matches!(e.code(), "CARD_TAKEN" | "CARD_LOCKED"),
                "unexpected code {}",
                e.code()
            ),
        }
    }
    assert_eq!(winners.len(), 1);
    let state = engine.game().await;
    assert_eq!(state.selected_card_ids, BTreeSet::from([CardId(7)]));
    assert_eq!(
        engine.orchestrator.cards().owner_of(state.game_id, CardId(7)).await.unwrap(),
        Some(winners[0])
    );
}

#[tokio::test(start_paused = true)]
async fn test_release_frees_card_for_others() {
    let engine = TestEngine::new(fast_config(), 2).await;
    let (owner, other) = (PlayerId::new(), PlayerId::new());
    let room = engine.room_id;

    assert!(engine.orchestrator.select_card(room, owner, CardId(3)).await.unwrap());
    assert!(!engine.orchestrator.select_card(room, owner, CardId(3)).await.unwrap());

    let err = engine.orchestrator.release_card(room, other, CardId(3)).await.unwrap_err();
    assert_eq!(err.code(), "NOT_OWNER");
    let err = engine.orchestrator.release_card(room, other, CardId(4)).await.unwrap_err();
    assert_eq!(err.code(), "CARD_NOT_OWNED");

    engine.orchestrator.release_card(room, owner, CardId(3)).await.unwrap();
    assert!(engine.orchestrator.owned_cards(room, owner).await.unwrap().is_empty());
    assert!(engine.orchestrator.select_card(room, other, CardId(3)).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_card_limit_per_player() {
    let engine = TestEngine::new(fast_config(), 2).await;
    let player = PlayerId::new();
    let room = engine.room_id;
    let limit = fast_config().max_cards_per_player;

    for card in 1..=limit {
        engine.orchestrator.select_card(room, player, CardId(card)).await.unwrap();
    }
    let err = engine
        .orchestrator
        .select_card(room, player, CardId(limit + 1))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "USER_LIMIT");
}
