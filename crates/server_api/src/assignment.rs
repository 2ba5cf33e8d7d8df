use shared::{
    domain::{CarId, DriverId},
    error::ApiError,
};

use crate::{not_found, storage_err, ApiContext};

/// Flips the car's membership in the acting driver's assigned set and
/// returns the new state (true = now assigned).
///
/// `acting_driver_id` comes from the authenticated session at the HTTP
/// boundary; nothing in here reads ambient identity. Both lookups run
/// before any mutation, and the flip itself is a single storage
/// transaction, so a failed toggle leaves the relation untouched.
pub async fn toggle_assignment(
    ctx: &ApiContext,
    acting_driver_id: DriverId,
    car_id: CarId,
) -> Result<bool, ApiError> {
    ctx.storage
        .get_driver(acting_driver_id)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| not_found("driver"))?;
    ctx.storage
        .get_car(car_id)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| not_found("car"))?;

    ctx.storage
        .toggle_assignment(acting_driver_id, car_id)
        .await
        .map_err(storage_err)
}

#[cfg(test)]
#[path = "tests/assignment_tests.rs"]
mod tests;
