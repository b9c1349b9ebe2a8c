//! Append-only claim audit log.

use async_trait::async_trait;
use sqlx::PgPool;

use bingo_core::result::AppResult;
use bingo_core::traits::ClaimRepository;
use bingo_core::types::ClaimRecord;

use super::db_error;

/// `bingo_claims` table.
#[derive(Debug, Clone)]
pub struct PgClaimRepository {
    pool: PgPool,
}

impl PgClaimRepository {
    /// Create a new claim repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClaimRepository for PgClaimRepository {
    async fn record(&self, claim: &ClaimRecord) -> AppResult<()> {
        let marked: Vec<i16> = claim.marked_numbers.iter().map(|n| i16::from(*n)).collect();
        sqlx::query(
            "INSERT INTO bingo_claims \
                (id, game_id, room_id, card_id, player_id, player_name, pattern, marked_numbers, outcome, error, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(claim.id)
        .bind(claim.game_id.into_uuid())
        .bind(claim.room_id.into_uuid())
        .bind(i32::try_from(claim.card_id.0).unwrap_or(i32::MAX))
        .bind(claim.player_id.into_uuid())
        .bind(&claim.player_name)
        .bind(&claim.pattern)
        .bind(marked)
        .bind(claim.outcome.as_str())
        .bind(claim.error.as_deref())
        .bind(claim.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to record claim"))?;
        Ok(())
    }
}
