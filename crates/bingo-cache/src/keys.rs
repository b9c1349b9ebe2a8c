//! Key and channel builders for every shared-store entry of the engine.
//!
//! Centralising key construction prevents typos and makes it easy to find
//! every key a game owns when it is purged. Backend-level prefixes (for
//! example `bingo:` on Redis) are applied by the store, not here.

use bingo_core::types::{CardId, GameId, PlayerId, RoomId};

// ── Game state keys ────────────────────────────────────────

/// Hash holding the canonical GameState of a room's current game.
pub fn game_state(room_id: RoomId) -> String {
    format!("room:{room_id}:game")
}

/// Set of rooms that currently have a live game.
pub fn active_rooms() -> String {
    "rooms:active".to_string()
}

/// Card-pool snapshot of a game.
pub fn card_pool(game_id: GameId) -> String {
    format!("game:{game_id}:pool")
}

/// Sorted set of drawn numbers, scored by draw sequence.
pub fn drawn_numbers(game_id: GameId) -> String {
    format!("game:{game_id}:drawn")
}

/// Set of joined player ids.
pub fn joined_players(game_id: GameId) -> String {
    format!("game:{game_id}:players")
}

/// Set of players whose entry fee is being charged.
pub fn pending_players(game_id: GameId) -> String {
    format!("game:{game_id}:pending")
}

/// Set of every currently owned card id.
pub fn selected_cards(game_id: GameId) -> String {
    format!("game:{game_id}:selected")
}

// ── Card ownership keys ────────────────────────────────────

/// Ownership record of one card: the owner's player id.
pub fn card_owner(game_id: GameId, card_id: CardId) -> String {
    format!("game:{game_id}:card:{card_id}:owner")
}

/// Set of card ids owned by a player.
pub fn player_cards(game_id: GameId, player_id: PlayerId) -> String {
    format!("game:{game_id}:player:{player_id}:cards")
}

/// Set of numbers a player marked on one card.
pub fn marked_numbers(game_id: GameId, player_id: PlayerId, card_id: CardId) -> String {
    format!("game:{game_id}:player:{player_id}:card:{card_id}:marked")
}

// ── Lock keys ──────────────────────────────────────────────

/// Lock key builders, one per lock family.
pub mod locks {
    use super::*;

    /// Per-room game initialization lock.
    pub fn init(room_id: RoomId) -> String {
        format!("lock:init:{room_id}")
    }

    /// Per-game state mutation lock.
    pub fn state(game_id: GameId) -> String {
        format!("lock:state:{game_id}")
    }

    /// Per-game drawing ownership lock.
    pub fn drawing(game_id: GameId) -> String {
        format!("lock:drawing:{game_id}")
    }

    /// Per-game countdown lock.
    pub fn countdown(game_id: GameId) -> String {
        format!("lock:countdown:{game_id}")
    }

    /// Per-card claim lock.
    pub fn card(game_id: GameId, card_id: CardId) -> String {
        format!("lock:card:{game_id}:{card_id}")
    }

    /// Per-player claim lock.
    pub fn user(game_id: GameId, player_id: PlayerId) -> String {
        format!("lock:user:{game_id}:{player_id}")
    }

    /// Per-game bingo claim lock.
    pub fn claim(game_id: GameId) -> String {
        format!("lock:claim:{game_id}")
    }

    /// Per-game end-finalization lock.
    pub fn end(game_id: GameId) -> String {
        format!("lock:end:{game_id}")
    }
}

// ── Pub/sub channels ───────────────────────────────────────

/// Channel names for the event bus.
pub mod channels {
    use super::*;

    /// Events for every player in a room.
    pub fn room(room_id: RoomId) -> String {
        format!("channel:room:{room_id}")
    }

    /// Events targeted at one player.
    pub fn player(player_id: PlayerId) -> String {
        format!("channel:player:{player_id}")
    }

    /// Engine control signals for one game.
    pub fn control(game_id: GameId) -> String {
        format!("channel:game:{game_id}:control")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bingo_core::types::CardId;
    use uuid::Uuid;

    #[test]
    fn test_card_owner_key() {
        let game = GameId::from_uuid(Uuid::nil());
        assert_eq!(
            card_owner(game, CardId(7)),
            "game:00000000-0000-0000-0000-000000000000:card:7:owner"
        );
    }

    #[test]
    fn test_lock_families_do_not_collide() {
        let game = GameId::from_uuid(Uuid::nil());
        let keys = [
            locks::state(game),
            locks::drawing(game),
            locks::countdown(game),
            locks::claim(game),
            locks::end(game),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
