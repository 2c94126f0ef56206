//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use fieldops_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const THROTTLED: i32 = 4003;
    pub const FORBIDDEN: i32 = 4004;
    pub const TIMEOUT: i32 = 4008;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = error_code(&err);
    let message = match err {
        AppError::Validation(msg)
        | AppError::NotFound(msg)
        | AppError::Forbidden(msg)
        | AppError::Conflict(msg)
        | AppError::Timeout(msg) => msg,
        // storage and internal details stay in the daemon log
        AppError::Database(_) => "database error".to_string(),
        AppError::Serialization(_) | AppError::Config(_) | AppError::Internal(_) => {
            "internal error".to_string()
        }
    };
    ErrorObjectOwned::owned(code, message, None::<()>)
}

pub fn error_code(err: &AppError) -> i32 {
    match err {
        AppError::Validation(_) => code::VALIDATION_ERROR,
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::Forbidden(_) => code::FORBIDDEN,
        AppError::Conflict(_) => code::CONFLICT,
        AppError::Timeout(_) => code::TIMEOUT,
        AppError::Database(_) => code::DB_ERROR,
        AppError::Serialization(_) | AppError::Config(_) | AppError::Internal(_) => {
            code::INTERNAL_ERROR
        }
    }
}

pub fn throttled() -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        code::THROTTLED,
        "Rate limit exceeded. Please slow down.",
        None::<()>,
    )
}
