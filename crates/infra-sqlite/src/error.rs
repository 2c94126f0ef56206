// sqlx::Error -> AppError
//
// Conversion lives here because of the orphan rule: core cannot depend on sqlx.

use fieldops_core::error::AppError;

/// Map a sqlx error onto the application taxonomy.
///
/// Unique violations and lock contention mean another writer won the race,
/// so they surface as `Conflict` for the caller to re-fetch and retry.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            // SQLite result codes: https://www.sqlite.org/rescode.html
            match db_err.code().as_deref() {
                Some(code @ ("2067" | "1555")) => AppError::Conflict(format!(
                    "Unique constraint violation: {} ({})",
                    db_err.message(),
                    code
                )),
                Some(code @ ("5" | "517" | "6")) => AppError::Conflict(format!(
                    "Database busy, concurrent write in progress: {} ({})",
                    db_err.message(),
                    code
                )),
                Some(code @ ("787" | "3850")) => AppError::Database(format!(
                    "Foreign key constraint violation: {} ({})",
                    db_err.message(),
                    code
                )),
                Some("13") => AppError::Database(format!("Database full: {}", db_err.message())),
                Some(code) => AppError::Database(format!(
                    "Database error [{}]: {}",
                    code,
                    db_err.message()
                )),
                None => AppError::Database(format!("Database error: {}", db_err.message())),
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        sqlx::Error::PoolTimedOut => {
            AppError::Timeout("timed out waiting for a database connection".to_string())
        }
        _ => AppError::Database(err.to_string()),
    }
}

/// A stored value that no longer decodes into the domain model
pub(crate) fn corrupt(table: &str, id: &str, detail: impl std::fmt::Display) -> AppError {
    AppError::Database(format!("corrupt {} row {}: {}", table, id, detail))
}
