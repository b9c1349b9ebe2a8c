//! Decoding of raw inbound text.

use bingo_service::GameError;

use super::types::InboundMessage;

/// Maximum accepted message size in bytes.
const MAX_MESSAGE_SIZE: usize = 16_384;

/// Decode one inbound message, rejecting oversized or malformed text.
pub fn decode_inbound(raw: &str) -> Result<InboundMessage, GameError> {
    if raw.len() > MAX_MESSAGE_SIZE {
        return Err(GameError::InvalidMessage(format!(
            "Message exceeds maximum size of {MAX_MESSAGE_SIZE} bytes"
        )));
    }
    if raw.trim().is_empty() {
        return Err(GameError::InvalidMessage("Empty message".to_string()));
    }
    serde_json::from_str(raw).map_err(|e| GameError::InvalidMessage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bingo_core::types::CardId;

    #[test]
    fn test_decode_card_select() {
        let msg = decode_inbound(r#"{"type":"card.cardSelectRequest","payload":{"cardId":7}}"#).unwrap();
        assert_eq!(msg, InboundMessage::CardSelect { card_id: CardId(7) });
    }

    #[test]
    fn test_decode_state_request_without_payload() {
        let msg = decode_inbound(r#"{"type":"room.getGameStateRequest"}"#).unwrap();
        assert_eq!(msg, InboundMessage::GetGameState);
    }

    #[test]
    fn test_decode_claim() {
        let raw = r#"{"type":"game.bingoClaimRequest","payload":{"cardId":3,"markedNumbers":[1,5,61,65],"pattern":"CORNERS","playerName":"Ana"}}"#;
        match decode_inbound(raw).unwrap() {
            InboundMessage::BingoClaim {
                card_id,
                marked_numbers,
                pattern,
                player_name,
            } => {
                assert_eq!(card_id, CardId(3));
                assert_eq!(marked_numbers.len(), 4);
                assert_eq!(pattern, "CORNERS");
                assert_eq!(player_name, "Ana");
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_and_empty() {
        let err = decode_inbound(r#"{"type":"room.teleport","payload":{}}"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_MESSAGE");
        assert_eq!(decode_inbound("  ").unwrap_err().code(), "INVALID_MESSAGE");
        let huge = "x".repeat(MAX_MESSAGE_SIZE + 1);
        assert_eq!(decode_inbound(&huge).unwrap_err().code(), "INVALID_MESSAGE");
    }
}
