use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use shared::{
    domain::DriverId,
    error::{ApiError, ErrorCode},
    protocol::{DriverSummary, RegisterDriver, SessionInfo},
};
use uuid::Uuid;

use crate::{
    listing::driver_summary,
    storage_err, unauthenticated,
    validate::{require_license_format, require_non_blank},
    ApiContext,
};

pub async fn register(ctx: &ApiContext, req: RegisterDriver) -> Result<DriverSummary, ApiError> {
    require_non_blank("username", &req.username)?;
    require_non_blank("password", &req.password)?;
    require_license_format(&req.license_number)?;

    let salt = Uuid::new_v4().simple().to_string();
    let digest = password_digest(&salt, &req.password);
    let driver = ctx
        .storage
        .create_driver(
            &req.username,
            &salt,
            &digest,
            &req.first_name,
            &req.last_name,
            &req.license_number,
        )
        .await
        .map_err(storage_err)?;
    Ok(driver_summary(driver))
}

/// Verifies the credentials and opens a fresh session with its visit
/// counter at zero.
pub async fn login(
    ctx: &ApiContext,
    username: &str,
    password: &str,
) -> Result<SessionInfo, ApiError> {
    let credentials = ctx
        .storage
        .credentials_for_username(username)
        .await
        .map_err(storage_err)?
        .ok_or_else(invalid_credentials)?;
    if password_digest(&credentials.password_salt, password) != credentials.password_digest {
        return Err(invalid_credentials());
    }

    let token = Uuid::new_v4().simple().to_string();
    ctx.storage
        .create_session(&token, credentials.driver_id)
        .await
        .map_err(storage_err)?;
    tracing::debug!(driver_id = credentials.driver_id.0, "session opened");
    Ok(SessionInfo {
        token,
        driver_id: credentials.driver_id,
    })
}

/// Idempotent: logging out an already-dead token is fine.
pub async fn logout(ctx: &ApiContext, token: &str) -> Result<(), ApiError> {
    ctx.storage.delete_session(token).await.map_err(storage_err)?;
    Ok(())
}

/// Resolves a bearer token to the driver who owns the session.
pub async fn authenticate(ctx: &ApiContext, token: &str) -> Result<DriverId, ApiError> {
    ctx.storage
        .session_driver(token)
        .await
        .map_err(storage_err)?
        .ok_or_else(unauthenticated)
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

// Same code for a missing user and a wrong password.
fn invalid_credentials() -> ApiError {
    ApiError::new(ErrorCode::Unauthenticated, "invalid username or password")
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
