//! Entry fees, refunds, and prizes against player wallets.
//!
//! Each operation is one transaction that moves the balance and writes the
//! matching `wallet_transactions` row. Partial unique indexes keep at most
//! one open charge per player and game and one payout per game, so retried
//! calls are harmless.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use bingo_core::result::AppResult;
use bingo_core::traits::{PaymentGateway, PayoutGateway};
use bingo_core::types::{GameId, PlayerId};

use super::{amount_to_sql, db_error};

/// `wallets` and `wallet_transactions` tables.
#[derive(Debug, Clone)]
pub struct PgWallet {
    pool: PgPool,
}

impl PgWallet {
    /// Create a new wallet adapter.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Current balance of a player, `0` without a wallet.
    pub async fn balance(&self, player_id: PlayerId) -> AppResult<u64> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM wallets WHERE player_id = $1")
                .bind(player_id.into_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Failed to read balance"))?;
        Ok(balance.and_then(|b| u64::try_from(b).ok()).unwrap_or(0))
    }
}

#[async_trait]
impl PaymentGateway for PgWallet {
    async fn charge(&self, player_id: PlayerId, amount: u64, game_id: GameId) -> AppResult<bool> {
        let amount = amount_to_sql(amount)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin charge"))?;

        let open: Option<i64> = sqlx::query_scalar(
            "SELECT amount FROM wallet_transactions \
             WHERE player_id = $1 AND game_id = $2 AND kind = 'CHARGE' AND reversed_at IS NULL",
        )
        .bind(player_id.into_uuid())
        .bind(game_id.into_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to look up charge"))?;
        if open.is_some() {
            debug!(player_id = %player_id, game_id = %game_id, "Entry fee already charged");
            return Ok(true);
        }

        let debited = sqlx::query(
            "UPDATE wallets SET balance = balance - $2, updated_at = NOW() \
             WHERE player_id = $1 AND balance >= $2",
        )
        .bind(player_id.into_uuid())
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to debit wallet"))?
        .rows_affected();
        if debited == 0 {
            info!(player_id = %player_id, game_id = %game_id, amount, "Insufficient balance");
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO wallet_transactions (id, player_id, game_id, kind, amount) \
             VALUES ($1, $2, $3, 'CHARGE', $4)",
        )
        .bind(Uuid::new_v4())
        .bind(player_id.into_uuid())
        .bind(game_id.into_uuid())
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to record charge"))?;

        tx.commit().await.map_err(db_error("Failed to commit charge"))?;
        Ok(true)
    }

    async fn refund(&self, player_id: PlayerId, game_id: GameId) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin refund"))?;

        let reversed: Option<i64> = sqlx::query_scalar(
            "UPDATE wallet_transactions SET reversed_at = NOW() \
             WHERE player_id = $1 AND game_id = $2 AND kind = 'CHARGE' AND reversed_at IS NULL \
             RETURNING amount",
        )
        .bind(player_id.into_uuid())
        .bind(game_id.into_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to reverse charge"))?;
        let Some(amount) = reversed else {
            return Ok(false);
        };

        sqlx::query("UPDATE wallets SET balance = balance + $2, updated_at = NOW() WHERE player_id = $1")
            .bind(player_id.into_uuid())
            .bind(amount)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to credit refund"))?;
        sqlx::query(
            "INSERT INTO wallet_transactions (id, player_id, game_id, kind, amount) \
             VALUES ($1, $2, $3, 'REFUND', $4)",
        )
        .bind(Uuid::new_v4())
        .bind(player_id.into_uuid())
        .bind(game_id.into_uuid())
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to record refund"))?;

        tx.commit().await.map_err(db_error("Failed to commit refund"))?;
        Ok(true)
    }
}

#[async_trait]
impl PayoutGateway for PgWallet {
    async fn payout(&self, game_id: GameId, winner_id: PlayerId, amount: u64) -> AppResult<()> {
        let amount = amount_to_sql(amount)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin payout"))?;

        sqlx::query(
            "INSERT INTO wallets (player_id, balance) VALUES ($1, 0) ON CONFLICT (player_id) DO NOTHING",
        )
        .bind(winner_id.into_uuid())
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to open wallet"))?;

        let inserted = sqlx::query(
            "INSERT INTO wallet_transactions (id, player_id, game_id, kind, amount) \
             VALUES ($1, $2, $3, 'PAYOUT', $4) \
             ON CONFLICT DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(winner_id.into_uuid())
        .bind(game_id.into_uuid())
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to record payout"))?
        .rows_affected();
        if inserted == 0 {
            debug!(game_id = %game_id, "Prize already paid");
            return Ok(());
        }

        sqlx::query("UPDATE wallets SET balance = balance + $2, updated_at = NOW() WHERE player_id = $1")
            .bind(winner_id.into_uuid())
            .bind(amount)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to credit prize"))?;

        tx.commit().await.map_err(db_error("Failed to commit payout"))?;
        info!(game_id = %game_id, player_id = %winner_id, amount, "Prize paid");
        Ok(())
    }
}
