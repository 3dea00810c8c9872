//! Classification of database failures.
//!
//! Every `DbErr` crossing into the domain goes through [`db_err`], so the
//! retry loop and the API see one consistent notion of "transient".

use kinko_core::ledger::LedgerError;
use sea_orm::{DbErr, RuntimeErr, SqlErr};

/// SQLSTATE codes that mean "try the whole unit of work again".
const TRANSIENT_SQLSTATES: [&str; 4] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available (lock_timeout)
    "57014", // query_canceled (statement_timeout)
];

/// Maps a database error onto the ledger error taxonomy.
#[must_use]
pub fn db_err(err: DbErr) -> LedgerError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        return LedgerError::DuplicateOperation(detail);
    }
    if is_transient(&err) {
        tracing::warn!(error = %err, "transient database failure");
        return LedgerError::ExternalSystemUnavailable(err.to_string());
    }
    tracing::error!(error = %err, "database failure");
    LedgerError::Internal(err.to_string())
}

/// SQLSTATE of the underlying database error, if any.
#[must_use]
pub fn sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db))) => {
            db.code().map(std::borrow::Cow::into_owned)
        }
        _ => None,
    }
}

/// Returns true for lock timeouts, deadlocks, serialization failures and
/// lost connections.
#[must_use]
pub fn is_transient(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => {
            sqlx_is_transient(e)
        }
        _ => false,
    }
}

fn sqlx_is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref())),
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_errors_are_transient() {
        let err = DbErr::Conn(RuntimeErr::Internal("connection reset".into()));
        assert!(is_transient(&err));
        assert!(matches!(db_err(err), LedgerError::ExternalSystemUnavailable(_)));
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let err = DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::PoolTimedOut));
        assert!(is_transient(&err));
    }

    #[test]
    fn test_other_errors_are_internal() {
        let err = DbErr::RecordNotFound("accounts".into());
        assert!(!is_transient(&err));
        assert!(matches!(db_err(err), LedgerError::Internal(_)));

        let err = DbErr::Custom("boom".into());
        assert!(matches!(db_err(err), LedgerError::Internal(_)));
    }
}
