// sqlx error mapping
//
// Orphan rules prevent `From<sqlx::Error>` for the core error types, so the
// adapter converts explicitly.

use bulkgen_core::error::AppError;
use bulkgen_core::port::PortError;

/// SQLite result codes this adapter treats specially
/// (https://www.sqlite.org/rescode.html)
const SQLITE_BUSY: &str = "5";
const SQLITE_FULL: &str = "13";

fn describe(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => match code.as_ref() {
                "2067" | "1555" => format!("Unique constraint violation: {}", db_err.message()),
                SQLITE_BUSY => format!("Database locked (SQLITE_BUSY): {}", db_err.message()),
                SQLITE_FULL => format!("Database full: {}", db_err.message()),
                other => format!("Database error [{}]: {}", other, db_err.message()),
            },
            None => format!("Database error: {}", db_err.message()),
        },
        sqlx::Error::RowNotFound => "Row not found".to_string(),
        sqlx::Error::ColumnNotFound(col) => format!("Column not found: {}", col),
        // Connection, pool, protocol errors
        other => other.to_string(),
    }
}

fn code_of(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Errors on the read/admin paths
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    AppError::Database(describe(&err))
}

/// Errors while persisting an artifact
///
/// A locked database clears up on its own and is retried with backoff; a
/// full disk fails every later job too. Anything else fails the job.
pub(crate) fn classify_persist_error(err: &sqlx::Error) -> PortError {
    let message = describe(err);
    match code_of(err).as_deref() {
        Some(SQLITE_BUSY) => PortError::RateLimited(message),
        Some(SQLITE_FULL) => PortError::Fatal(message),
        _ => PortError::Transient(message),
    }
}
