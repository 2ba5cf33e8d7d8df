pub mod assignment;
pub mod auth;
pub mod listing;
pub mod records;
pub mod validate;

use shared::{
    error::{ApiError, ErrorCode},
    protocol::HomeSummary,
};
use storage::{Storage, StorageError, CAR_LIST, DRIVER_LIST, MANUFACTURER_LIST};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

/// Fleet-wide counts plus this session's visit counter.
///
/// The counter lives on the session row: zero at login, bumped once per
/// call here, so the first home view reports 1.
pub async fn home_summary(ctx: &ApiContext, session_token: &str) -> Result<HomeSummary, ApiError> {
    let num_visits = ctx
        .storage
        .bump_session_visits(session_token)
        .await
        .map_err(storage_err)?
        .ok_or_else(unauthenticated)?;
    let num_drivers = ctx
        .storage
        .count_collection(&DRIVER_LIST, None)
        .await
        .map_err(storage_err)?;
    let num_cars = ctx
        .storage
        .count_collection(&CAR_LIST, None)
        .await
        .map_err(storage_err)?;
    let num_manufacturers = ctx
        .storage
        .count_collection(&MANUFACTURER_LIST, None)
        .await
        .map_err(storage_err)?;

    Ok(HomeSummary {
        num_drivers,
        num_cars,
        num_manufacturers,
        num_visits,
    })
}

pub(crate) fn storage_err(err: StorageError) -> ApiError {
    match err {
        StorageError::NotFound => ApiError::new(ErrorCode::NotFound, "record not found"),
        StorageError::Duplicate(message) => ApiError::new(ErrorCode::DuplicateKey, message),
        other => {
            tracing::error!(error = %other, "storage operation failed");
            ApiError::new(ErrorCode::Internal, other.to_string())
        }
    }
}

pub(crate) fn not_found(what: &str) -> ApiError {
    ApiError::new(ErrorCode::NotFound, format!("{what} not found"))
}

pub(crate) fn unauthenticated() -> ApiError {
    ApiError::new(ErrorCode::Unauthenticated, "authentication required")
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
