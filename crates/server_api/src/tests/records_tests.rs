use super::*;
use shared::error::ErrorCode;
use storage::Storage;

async fn setup() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext { storage }
}

async fn add_driver(ctx: &ApiContext, username: &str, license: &str) -> DriverId {
    ctx.storage
        .create_driver(username, "salt", "digest", "Test", "Driver", license)
        .await
        .expect("driver")
        .id
}

#[tokio::test]
async fn manufacturer_crud_round_trip() {
    let ctx = setup().await;
    let tesla = create_manufacturer(&ctx, "Tesla", "USA")
        .await
        .expect("create");

    let fetched = get_manufacturer(&ctx, tesla.id).await.expect("get");
    assert_eq!(fetched.name, "Tesla");

    let updated = update_manufacturer(&ctx, tesla.id, "Tesla Inc", "USA")
        .await
        .expect("update");
    assert_eq!(updated.name, "Tesla Inc");

    delete_manufacturer(&ctx, tesla.id).await.expect("delete");
    let err = get_manufacturer(&ctx, tesla.id)
        .await
        .expect_err("gone");
    assert!(matches!(err.code, ErrorCode::NotFound));
}

#[tokio::test]
async fn duplicate_manufacturer_name_fails_with_duplicate_key() {
    let ctx = setup().await;
    create_manufacturer(&ctx, "Tesla", "USA").await.expect("create");
    let err = create_manufacturer(&ctx, "Tesla", "Germany")
        .await
        .expect_err("should fail");
    assert!(matches!(err.code, ErrorCode::DuplicateKey));
}

#[tokio::test]
async fn creating_car_under_missing_manufacturer_fails_not_found() {
    let ctx = setup().await;
    let err = create_car(&ctx, "Model S", ManufacturerId(999))
        .await
        .expect_err("should fail");
    assert!(matches!(err.code, ErrorCode::NotFound));
}

#[tokio::test]
async fn deleting_a_manufacturer_cascades_to_its_cars() {
    let ctx = setup().await;
    let tesla = create_manufacturer(&ctx, "Tesla", "USA")
        .await
        .expect("create");
    let car = create_car(&ctx, "Model S", tesla.id).await.expect("car");
    let driver = add_driver(&ctx, "driver1", "ABC12345").await;
    ctx.storage
        .toggle_assignment(driver, car.id)
        .await
        .expect("assign");

    delete_manufacturer(&ctx, tesla.id).await.expect("delete");

    let err = car_detail(&ctx, car.id).await.expect_err("car gone");
    assert!(matches!(err.code, ErrorCode::NotFound));

    let detail = driver_detail(&ctx, driver).await.expect("driver");
    assert!(detail.cars.is_empty());
}

#[tokio::test]
async fn car_detail_lists_assigned_drivers() {
    let ctx = setup().await;
    let bmw = create_manufacturer(&ctx, "BMW", "Germany")
        .await
        .expect("create");
    let car = create_car(&ctx, "M3", bmw.id).await.expect("car");
    let alice = add_driver(&ctx, "alice", "ALC00001").await;
    let bob = add_driver(&ctx, "bob", "BOB00001").await;
    ctx.storage.toggle_assignment(alice, car.id).await.expect("assign");
    ctx.storage.toggle_assignment(bob, car.id).await.expect("assign");

    let detail = car_detail(&ctx, car.id).await.expect("detail");
    assert_eq!(detail.car.manufacturer_name, "BMW");
    let usernames: Vec<&str> = detail.drivers.iter().map(|d| d.username.as_str()).collect();
    assert_eq!(usernames, ["alice", "bob"]);
}

#[tokio::test]
async fn update_car_can_move_it_to_another_manufacturer() {
    let ctx = setup().await;
    let bmw = create_manufacturer(&ctx, "BMW", "Germany")
        .await
        .expect("create");
    let audi = create_manufacturer(&ctx, "Audi", "Germany")
        .await
        .expect("create");
    let car = create_car(&ctx, "M3", bmw.id).await.expect("car");

    let updated = update_car(&ctx, car.id, "RS4", audi.id).await.expect("update");
    assert_eq!(updated.model, "RS4");
    assert_eq!(updated.manufacturer_name, "Audi");

    let err = update_car(&ctx, car.id, "RS4", ManufacturerId(999))
        .await
        .expect_err("dangling manufacturer");
    assert!(matches!(err.code, ErrorCode::NotFound));
}

#[tokio::test]
async fn license_update_validates_before_touching_the_store() {
    let ctx = setup().await;
    let driver = add_driver(&ctx, "driver1", "ABC12345").await;

    let err = update_driver_license(&ctx, driver, "ab123456")
        .await
        .expect_err("bad format");
    assert!(matches!(err.code, ErrorCode::InvalidFormat));
    let detail = driver_detail(&ctx, driver).await.expect("detail");
    assert_eq!(detail.driver.license_number, "ABC12345");

    let updated = update_driver_license(&ctx, driver, "XYZ98765")
        .await
        .expect("update");
    assert_eq!(updated.license_number, "XYZ98765");
}

#[tokio::test]
async fn license_update_enforces_uniqueness() {
    let ctx = setup().await;
    let driver = add_driver(&ctx, "driver1", "ABC12345").await;
    add_driver(&ctx, "driver2", "DEF12345").await;

    let err = update_driver_license(&ctx, driver, "DEF12345")
        .await
        .expect_err("duplicate");
    assert!(matches!(err.code, ErrorCode::DuplicateKey));
}

#[tokio::test]
async fn deleting_a_driver_removes_the_record_and_its_assignments() {
    let ctx = setup().await;
    let tesla = create_manufacturer(&ctx, "Tesla", "USA")
        .await
        .expect("create");
    let car = create_car(&ctx, "Model 3", tesla.id).await.expect("car");
    let driver = add_driver(&ctx, "driver1", "ABC12345").await;
    ctx.storage.toggle_assignment(driver, car.id).await.expect("assign");

    delete_driver(&ctx, driver).await.expect("delete");

    let err = driver_detail(&ctx, driver).await.expect_err("gone");
    assert!(matches!(err.code, ErrorCode::NotFound));
    let detail = car_detail(&ctx, car.id).await.expect("car");
    assert!(detail.drivers.is_empty());

    let err = delete_driver(&ctx, driver).await.expect_err("already gone");
    assert!(matches!(err.code, ErrorCode::NotFound));
}
