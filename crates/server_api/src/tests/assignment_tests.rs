use super::*;
use shared::error::ErrorCode;
use storage::Storage;

async fn setup() -> (ApiContext, DriverId, CarId) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ctx = ApiContext { storage };
    let driver = ctx
        .storage
        .create_driver("driver1", "salt", "digest", "John", "Doe", "ABC12345")
        .await
        .expect("driver");
    let make = ctx
        .storage
        .create_manufacturer("Tesla", "USA")
        .await
        .expect("manufacturer");
    let car = ctx
        .storage
        .create_car("Model S", make.id)
        .await
        .expect("car");
    (ctx, driver.id, car.id)
}

#[tokio::test]
async fn toggling_twice_returns_to_the_original_state() {
    let (ctx, driver, car) = setup().await;

    assert!(toggle_assignment(&ctx, driver, car).await.expect("assign"));
    assert!(ctx.storage.is_assigned(driver, car).await.expect("check"));

    assert!(!toggle_assignment(&ctx, driver, car).await.expect("unassign"));
    assert!(!ctx.storage.is_assigned(driver, car).await.expect("check"));
}

#[tokio::test]
async fn missing_driver_aborts_before_any_mutation() {
    let (ctx, _driver, car) = setup().await;
    let err = toggle_assignment(&ctx, DriverId(999), car)
        .await
        .expect_err("should fail");
    assert!(matches!(err.code, ErrorCode::NotFound));
    assert!(!ctx
        .storage
        .is_assigned(DriverId(999), car)
        .await
        .expect("check"));
}

#[tokio::test]
async fn missing_car_aborts_before_any_mutation() {
    let (ctx, driver, _car) = setup().await;
    let err = toggle_assignment(&ctx, driver, CarId(999))
        .await
        .expect_err("should fail");
    assert!(matches!(err.code, ErrorCode::NotFound));
    assert!(!ctx
        .storage
        .is_assigned(driver, CarId(999))
        .await
        .expect("check"));
}

#[tokio::test]
async fn toggle_only_touches_the_acting_driver() {
    let (ctx, driver, car) = setup().await;
    let other = ctx
        .storage
        .create_driver("driver2", "salt", "digest", "Jane", "Smith", "DEF12345")
        .await
        .expect("driver");

    assert!(toggle_assignment(&ctx, other.id, car).await.expect("assign"));
    assert!(!ctx.storage.is_assigned(driver, car).await.expect("check"));
    assert!(ctx.storage.is_assigned(other.id, car).await.expect("check"));
}
