//! Dispatch of inbound session messages to the orchestrator.
//!
//! Structural changes (joins, card selections, draws, endings) are broadcast
//! to the room by the engine itself. The handler only answers the requester:
//! state snapshots, mark echoes, and `error` events for rejections.

use tracing::{debug, error, warn};

use bingo_core::events::OutboundEvent;
use bingo_core::types::{PlayerId, RoomId};
use bingo_service::{
    ClaimRequest, GameError, GameOrchestrator, JoinOutcome, JoinRequest, LeaveOutcome,
};

use crate::message::{InboundMessage, decode_inbound};

/// Identity of one connected player, established by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Room the connection is bound to.
    pub room_id: RoomId,
    /// Authenticated player.
    pub player_id: PlayerId,
}

/// Routes inbound messages to the engine and replies to the requester.
#[derive(Debug, Clone)]
pub struct SessionHandler {
    orchestrator: GameOrchestrator,
}

impl SessionHandler {
    /// Create a handler over `orchestrator`.
    pub fn new(orchestrator: GameOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Decode and handle raw inbound text.
    pub async fn handle_text(&self, session: &Session, raw: &str) -> Option<OutboundEvent> {
        match decode_inbound(raw) {
            Ok(msg) => self.handle(session, msg).await,
            Err(e) => Some(self.reject(session, "unknown", e).await),
        }
    }

    /// Handle one message. Returns the reply sent to the requester, if any.
    pub async fn handle(&self, session: &Session, msg: InboundMessage) -> Option<OutboundEvent> {
        if msg
            .claimed_player()
            .is_some_and(|claimed| claimed != session.player_id)
        {
            warn!(
                room_id = %session.room_id,
                player_id = %session.player_id,
                "Ignoring payload player id that differs from the session"
            );
        }

        let message_type = msg.message_type();
        debug!(room_id = %session.room_id, player_id = %session.player_id, message_type, "Inbound message");
        match self.dispatch(session, msg).await {
            Ok(Some(reply)) => {
                self.orchestrator
                    .context()
                    .bus
                    .notify(session.player_id, reply.clone())
                    .await;
                Some(reply)
            }
            Ok(None) => None,
            Err(e) => Some(self.reject(session, message_type, e).await),
        }
    }

    async fn dispatch(
        &self,
        session: &Session,
        msg: InboundMessage,
    ) -> Result<Option<OutboundEvent>, GameError> {
        let Session { room_id, player_id } = *session;
        let engine = &self.orchestrator;
        match msg {
            InboundMessage::GetGameState => {
                let snapshot = engine.get_state(room_id, Some(player_id)).await?;
                Ok(Some(OutboundEvent::ServerGameState(snapshot)))
            }
            InboundMessage::CardSelect { card_id } => {
                engine.select_card(room_id, player_id, card_id).await?;
                Ok(None)
            }
            InboundMessage::CardRelease { card_id } => {
                engine.release_card(room_id, player_id, card_id).await?;
                Ok(None)
            }
            InboundMessage::PlayerJoin {
                fee,
                capacity,
                selected_card_ids,
                ..
            } => {
                let request = JoinRequest {
                    player_id,
                    fee,
                    capacity,
                    selected_card_ids,
                };
                match engine.join(room_id, request).await? {
                    JoinOutcome::Joined(_) => Ok(None),
                    JoinOutcome::AlreadyJoined(state) => {
                        let snapshot = engine.snapshot(state, Some(player_id)).await?;
                        Ok(Some(OutboundEvent::ServerGameState(snapshot)))
                    }
                }
            }
            InboundMessage::PlayerLeave { .. } => match engine.leave(room_id, player_id).await? {
                LeaveOutcome::Left { .. } => Ok(None),
                LeaveOutcome::AfterStart => {
                    let snapshot = engine.get_state(room_id, Some(player_id)).await?;
                    Ok(Some(OutboundEvent::ServerGameState(snapshot)))
                }
            },
            InboundMessage::MarkNumber { card_id, number } => {
                let marks = engine.mark_number(room_id, player_id, card_id, number).await?;
                Ok(Some(OutboundEvent::MarkNumberResponse {
                    game_id: marks.game_id,
                    card_id: marks.card_id,
                    number: marks.number,
                    marked_numbers: marks.marked_numbers,
                }))
            }
            InboundMessage::UnmarkNumber { card_id, number } => {
                let marks = engine.unmark_number(room_id, player_id, card_id, number).await?;
                Ok(Some(OutboundEvent::UnmarkNumberResponse {
                    game_id: marks.game_id,
                    card_id: marks.card_id,
                    number: marks.number,
                    marked_numbers: marks.marked_numbers,
                }))
            }
            InboundMessage::BingoClaim {
                card_id,
                marked_numbers,
                pattern,
                player_name,
            } => {
                let request = ClaimRequest {
                    player_id,
                    player_name,
                    card_id,
                    marked_numbers,
                    pattern,
                };
                engine.claim_bingo(room_id, request).await?;
                Ok(None)
            }
        }
    }

    async fn reject(&self, session: &Session, message_type: &str, err: GameError) -> OutboundEvent {
        match &err {
            GameError::Store(e) => {
                error!(room_id = %session.room_id, player_id = %session.player_id, message_type, error = %e, "Request failed");
            }
            _ => {
                debug!(room_id = %session.room_id, player_id = %session.player_id, message_type, code = err.code(), "Request rejected");
            }
        }
        let event = OutboundEvent::error(err.code(), err.public_message());
        self.orchestrator
            .context()
            .bus
            .notify(session.player_id, event.clone())
            .await;
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bingo_cache::memory::MemoryStateStore;
    use bingo_core::config::GameConfig;
    use bingo_core::config::cache::MemoryCacheConfig;
    use bingo_core::types::{CardId, RoomConfig};
    use bingo_service::EngineContext;
    use bingo_service::testing::MemoryCollaborators;

    async fn handler() -> (SessionHandler, Session) {
        let store = Arc::new(MemoryStateStore::new(&MemoryCacheConfig::default()));
        let ctx = EngineContext::new(GameConfig::default(), store);
        let fakes = MemoryCollaborators::default();
        let room_id = RoomId::new();
        fakes
            .rooms
            .insert_room(RoomConfig {
                room_id,
                name: "Lobby".to_string(),
                min_players: 2,
                capacity: 10,
                entry_fee: 10,
                commission_rate: 0.1,
            })
            .await;
        let orchestrator = GameOrchestrator::new(ctx, fakes.collaborators());
        let session = Session {
            room_id,
            player_id: PlayerId::new(),
        };
        (SessionHandler::new(orchestrator), session)
    }

    #[tokio::test]
    async fn test_state_request_replies_with_snapshot() {
        let (handler, session) = handler().await;
        let reply = handler
            .handle_text(&session, r#"{"type":"room.getGameStateRequest"}"#)
            .await;
        match reply {
            Some(OutboundEvent::ServerGameState(snapshot)) => {
                assert_eq!(snapshot.game.room_id, session.room_id);
                assert!(snapshot.player.is_some());
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mark_echoes_marked_set() {
        let (handler, session) = handler().await;
        assert!(
            handler
                .handle(&session, InboundMessage::CardSelect { card_id: CardId(1) })
                .await
                .is_none()
        );
        let reply = handler
            .handle(
                &session,
                InboundMessage::MarkNumber {
                    card_id: CardId(1),
                    number: 12,
                },
            )
            .await;
        match reply {
            Some(OutboundEvent::MarkNumberResponse { marked_numbers, .. }) => {
                assert_eq!(marked_numbers.into_iter().collect::<Vec<_>>(), vec![12]);
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejections_become_error_events() {
        let (handler, session) = handler().await;
        handler.handle(&session, InboundMessage::GetGameState).await;
        let reply = handler
            .handle(
                &session,
                InboundMessage::MarkNumber {
                    card_id: CardId(1),
                    number: 99,
                },
            )
            .await;
        assert_eq!(
            reply,
            Some(OutboundEvent::error("INVALID_NUMBER", "Number 99 is outside 1..=75"))
        );

        let reply = handler.handle_text(&session, "{not json").await;
        match reply {
            Some(OutboundEvent::Error { error_type, .. }) => assert_eq!(error_type, "INVALID_MESSAGE"),
            other => panic!("unexpected reply {other:?}"),
        }
    }
}
