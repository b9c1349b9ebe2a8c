//! Room configuration reads and game summary writes.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use bingo_core::result::AppResult;
use bingo_core::traits::RoomRepository;
use bingo_core::types::{GameRecord, RoomConfig, RoomId};

use super::{amount_to_sql, count_to_sql, db_error};

/// `rooms` and `games` tables.
#[derive(Debug, Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct RoomRow {
    id: Uuid,
    name: String,
    min_players: i32,
    capacity: i32,
    entry_fee: i64,
    commission_rate: f64,
}

impl From<RoomRow> for RoomConfig {
    fn from(row: RoomRow) -> Self {
        Self {
            room_id: RoomId::from_uuid(row.id),
            name: row.name,
            min_players: u32::try_from(row.min_players).unwrap_or(0),
            capacity: u32::try_from(row.capacity).unwrap_or(0),
            entry_fee: u64::try_from(row.entry_fee).unwrap_or(0),
            commission_rate: row.commission_rate.clamp(0.0, 1.0),
        }
    }
}

impl PgRoomRepository {
    /// Create a new room repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update a room.
    pub async fn save_room(&self, room: &RoomConfig) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO rooms (id, name, min_players, capacity, entry_fee, commission_rate) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET \
                name = EXCLUDED.name, \
                min_players = EXCLUDED.min_players, \
                capacity = EXCLUDED.capacity, \
                entry_fee = EXCLUDED.entry_fee, \
                commission_rate = EXCLUDED.commission_rate, \
                updated_at = NOW()",
        )
        .bind(room.room_id.into_uuid())
        .bind(&room.name)
        .bind(count_to_sql(room.min_players))
        .bind(count_to_sql(room.capacity))
        .bind(amount_to_sql(room.entry_fee)?)
        .bind(room.commission_rate)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to save room"))?;
        Ok(())
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn find_room(&self, room_id: RoomId) -> AppResult<Option<RoomConfig>> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT id, name, min_players, capacity, entry_fee, commission_rate \
             FROM rooms WHERE id = $1",
        )
        .bind(room_id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to find room"))?;
        Ok(row.map(RoomConfig::from))
    }

    async fn upsert_game(&self, record: &GameRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO games \
                (id, room_id, status, player_count, pot, prize, winner_id, drawn_count, payout_pending, created_at, ended_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (id) DO UPDATE SET \
                status = EXCLUDED.status, \
                player_count = EXCLUDED.player_count, \
                pot = EXCLUDED.pot, \
                prize = EXCLUDED.prize, \
                winner_id = EXCLUDED.winner_id, \
                drawn_count = EXCLUDED.drawn_count, \
                payout_pending = EXCLUDED.payout_pending, \
                ended_at = EXCLUDED.ended_at, \
                updated_at = NOW()",
        )
        .bind(record.game_id.into_uuid())
        .bind(record.room_id.into_uuid())
        .bind(record.status.as_str())
        .bind(count_to_sql(record.player_count))
        .bind(amount_to_sql(record.pot)?)
        .bind(amount_to_sql(record.prize)?)
        .bind(record.winner_id.map(|p| p.into_uuid()))
        .bind(count_to_sql(record.drawn_count))
        .bind(record.payout_pending)
        .bind(record.created_at)
        .bind(record.ended_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to upsert game summary"))?;
        Ok(())
    }
}
