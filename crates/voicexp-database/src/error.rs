//! Classification of sqlx errors into application error kinds.

use voicexp_core::error::{AppError, ErrorKind};

/// SQLSTATE for a detected deadlock.
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE for a serialization failure.
const SERIALIZATION_FAILURE: &str = "40001";

/// Map a sqlx error onto the kind that drives retry behavior.
pub fn kind_of(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(DEADLOCK_DETECTED) | Some(SERIALIZATION_FAILURE) => ErrorKind::Contention,
            // Class 08: connection exception; 57P01..57P03: admin shutdown.
            Some(code) if code.starts_with("08") || code.starts_with("57P0") => {
                ErrorKind::ConnectionLost
            }
            Some("57014") => ErrorKind::Timeout,
            _ => ErrorKind::Database,
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => ErrorKind::ConnectionLost,
        sqlx::Error::RowNotFound => ErrorKind::NotFound,
        _ => ErrorKind::Database,
    }
}

/// Wrap a sqlx error with context, classified by [`kind_of`].
pub fn classify(err: sqlx::Error, context: &str) -> AppError {
    let kind = kind_of(&err);
    AppError::with_source(kind, format!("{context}: {err}"), err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_connection_loss() {
        assert_eq!(kind_of(&sqlx::Error::PoolTimedOut), ErrorKind::ConnectionLost);
        assert_eq!(kind_of(&sqlx::Error::PoolClosed), ErrorKind::ConnectionLost);
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(classify(sqlx::Error::Io(io), "upsert").is_retryable());
    }

    #[test]
    fn test_row_not_found_is_terminal() {
        let err = classify(sqlx::Error::RowNotFound, "find");
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(!err.is_retryable());
    }
}
