//! SQL adapters for the engine's collaborator traits.

pub mod claim;
pub mod room;
pub mod wallet;

pub use claim::PgClaimRepository;
pub use room::PgRoomRepository;
pub use wallet::PgWallet;

use bingo_core::error::{AppError, ErrorKind};
use bingo_core::result::AppResult;

/// Wrap a sqlx failure with the operation that hit it.
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, context, e)
}

/// Currency amounts are `BIGINT` columns.
pub(crate) fn amount_to_sql(amount: u64) -> AppResult<i64> {
    i64::try_from(amount)
        .map_err(|_| AppError::validation(format!("Amount {amount} exceeds the storable range")))
}

/// Counts are `INTEGER` columns.
pub(crate) fn count_to_sql(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_conversion() {
        assert_eq!(amount_to_sql(1_500).unwrap(), 1_500);
        let err = amount_to_sql(u64::MAX).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_count_saturates() {
        assert_eq!(count_to_sql(75), 75);
        assert_eq!(count_to_sql(u32::MAX), i32::MAX);
    }
}
