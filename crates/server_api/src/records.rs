use shared::{
    domain::{CarId, DriverId, ManufacturerId},
    error::ApiError,
    protocol::{CarDetail, CarSummary, DriverDetail, DriverSummary, ManufacturerSummary},
};
use storage::StorageError;

use crate::{
    listing::{car_summary, driver_summary, manufacturer_summary},
    not_found, storage_err,
    validate::{require_license_format, require_non_blank},
    ApiContext,
};

// ---- manufacturers ----

pub async fn create_manufacturer(
    ctx: &ApiContext,
    name: &str,
    country: &str,
) -> Result<ManufacturerSummary, ApiError> {
    require_non_blank("name", name)?;
    let record = ctx
        .storage
        .create_manufacturer(name, country)
        .await
        .map_err(storage_err)?;
    Ok(manufacturer_summary(record))
}

pub async fn get_manufacturer(
    ctx: &ApiContext,
    id: ManufacturerId,
) -> Result<ManufacturerSummary, ApiError> {
    ctx.storage
        .get_manufacturer(id)
        .await
        .map_err(storage_err)?
        .map(manufacturer_summary)
        .ok_or_else(|| not_found("manufacturer"))
}

pub async fn update_manufacturer(
    ctx: &ApiContext,
    id: ManufacturerId,
    name: &str,
    country: &str,
) -> Result<ManufacturerSummary, ApiError> {
    require_non_blank("name", name)?;
    let record = ctx
        .storage
        .update_manufacturer(id, name, country)
        .await
        .map_err(storage_err)?;
    Ok(manufacturer_summary(record))
}

/// Deleting a manufacturer cascades: its cars go too, along with any
/// assignment rows pointing at them.
pub async fn delete_manufacturer(ctx: &ApiContext, id: ManufacturerId) -> Result<(), ApiError> {
    ctx.storage
        .delete_manufacturer(id)
        .await
        .map_err(|err| match err {
            StorageError::NotFound => not_found("manufacturer"),
            other => storage_err(other),
        })
}

// ---- cars ----

pub async fn create_car(
    ctx: &ApiContext,
    model: &str,
    manufacturer_id: ManufacturerId,
) -> Result<CarSummary, ApiError> {
    require_non_blank("model", model)?;
    let record = ctx
        .storage
        .create_car(model, manufacturer_id)
        .await
        .map_err(|err| match err {
            StorageError::NotFound => not_found("manufacturer"),
            other => storage_err(other),
        })?;
    Ok(car_summary(record))
}

pub async fn car_detail(ctx: &ApiContext, id: CarId) -> Result<CarDetail, ApiError> {
    let car = ctx
        .storage
        .car_with_manufacturer(id)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| not_found("car"))?;
    let drivers = ctx
        .storage
        .drivers_for_car(id)
        .await
        .map_err(storage_err)?;
    Ok(CarDetail {
        car: car_summary(car),
        drivers: drivers.into_iter().map(driver_summary).collect(),
    })
}

pub async fn update_car(
    ctx: &ApiContext,
    id: CarId,
    model: &str,
    manufacturer_id: ManufacturerId,
) -> Result<CarSummary, ApiError> {
    require_non_blank("model", model)?;
    let record = ctx
        .storage
        .update_car(id, model, manufacturer_id)
        .await
        .map_err(storage_err)?;
    Ok(car_summary(record))
}

pub async fn delete_car(ctx: &ApiContext, id: CarId) -> Result<(), ApiError> {
    ctx.storage.delete_car(id).await.map_err(|err| match err {
        StorageError::NotFound => not_found("car"),
        other => storage_err(other),
    })
}

// ---- drivers ----

pub async fn driver_detail(ctx: &ApiContext, id: DriverId) -> Result<DriverDetail, ApiError> {
    let driver = ctx
        .storage
        .get_driver(id)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| not_found("driver"))?;
    let cars = ctx
        .storage
        .cars_for_driver(id)
        .await
        .map_err(storage_err)?;
    Ok(DriverDetail {
        driver: driver_summary(driver),
        cars: cars.into_iter().map(car_summary).collect(),
    })
}

/// The only mutable driver field after registration.
pub async fn update_driver_license(
    ctx: &ApiContext,
    id: DriverId,
    license_number: &str,
) -> Result<DriverSummary, ApiError> {
    require_license_format(license_number)?;
    let record = ctx
        .storage
        .update_driver_license(id, license_number)
        .await
        .map_err(|err| match err {
            StorageError::NotFound => not_found("driver"),
            other => storage_err(other),
        })?;
    Ok(driver_summary(record))
}

pub async fn delete_driver(ctx: &ApiContext, id: DriverId) -> Result<(), ApiError> {
    ctx.storage
        .delete_driver(id)
        .await
        .map_err(|err| match err {
            StorageError::NotFound => not_found("driver"),
            other => storage_err(other),
        })
}

#[cfg(test)]
#[path = "tests/records_tests.rs"]
mod tests;
