//! A player driving a game through raw session messages.

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;

use bingo_core::events::OutboundEvent;
use bingo_core::types::{GameStatus, PlayerId};
use bingo_realtime::{Session, SessionHandler, SessionRelay};

use crate::helpers::{TestEngine, fast_config};

#[tokio::test(start_paused = true)]
async fn test_session_messages_drive_the_game() {
    let engine = TestEngine::new(
        bingo_core::config::GameConfig {
            draw_interval_ms: 60_000,
            ..fast_config()
        },
        1,
    )
    .await;
    let handler = SessionHandler::new(engine.orchestrator.clone());
    let relay = SessionRelay::new(engine.orchestrator.context().bus.clone());
    let session = Session {
        room_id: engine.room_id,
        player_id: PlayerId::new(),
    };
    let mut outbound = relay.open(session.room_id, session.player_id).await.unwrap();

    let select = json!({"type": "card.cardSelectRequest", "payload": {"cardId": 5}});
    assert!(handler.handle_text(&session, &select.to_string()).await.is_none());

    let join = json!({
        "type": "game.playerJoinRequest",
        "payload": {"fee": 10, "selectedCardIds": [5]}
    });
    assert!(handler.handle_text(&session, &join.to_string()).await.is_none());

    let mark = json!({"type": "card.markNumberRequest", "payload": {"cardId": 5, "number": 80}});
    match handler.handle_text(&session, &mark.to_string()).await {
        Some(OutboundEvent::Error { error_type, .. }) => assert_eq!(error_type, "INVALID_NUMBER"),
        other => panic!("unexpected reply {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(engine.game().await.status, GameStatus::Playing);

    let mut seen = Vec::new();
    while let Some(event) = outbound.next().await {
        let started = matches!(event, OutboundEvent::Started { .. });
        seen.push(event);
        if started {
            break;
        }
    }
    assert!(seen.iter().any(|e| matches!(e, OutboundEvent::CardSelected { .. })));
    assert!(seen.iter().any(|e| matches!(e, OutboundEvent::PlayerJoined { .. })));
    assert!(seen.iter().any(|e| matches!(e, OutboundEvent::Countdown { .. })));
    assert!(
        seen.iter()
            .any(|e| matches!(e, OutboundEvent::Error { error_type, .. } if error_type == "INVALID_NUMBER"))
    );

    let state = json!({"type": "room.getGameStateRequest"});
    match handler.handle_text(&session, &state.to_string()).await {
        Some(OutboundEvent::ServerGameState(snapshot)) => {
            assert_eq!(snapshot.game.status, GameStatus::Playing);
            let player = snapshot.player.unwrap();
            assert!(player.joined);
            assert_eq!(player.cards.len(), 1);
        }
        other => panic!("unexpected reply {other:?}"),
    }
}
