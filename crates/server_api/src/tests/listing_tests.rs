use super::*;
use shared::protocol::ListPage;
use storage::Storage;

async fn setup() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext { storage }
}

async fn add_driver(ctx: &ApiContext, username: &str, license: &str) {
    ctx.storage
        .create_driver(username, "salt", "digest", "Test", "Driver", license)
        .await
        .expect("driver");
}

fn driver_usernames(page: &ListPage) -> Vec<String> {
    let PageItems::Drivers(items) = &page.items else {
        panic!("expected driver items");
    };
    items.iter().map(|d| d.username.clone()).collect()
}

#[tokio::test]
async fn query_filters_to_case_insensitive_substring_matches() {
    let ctx = setup().await;
    add_driver(&ctx, "driver1", "AAA11111").await;
    add_driver(&ctx, "driver2", "BBB22222").await;
    add_driver(&ctx, "MainDriver", "CCC33333").await;
    add_driver(&ctx, "someone", "DDD44444").await;

    let page = list_page(&ctx, "drivers", Some("driver1"), 1, None)
        .await
        .expect("page");
    assert_eq!(driver_usernames(&page), ["driver1"]);
    assert_eq!(page.total_count, 1);

    let page = list_page(&ctx, "drivers", Some("DRIVER"), 1, None)
        .await
        .expect("page");
    assert_eq!(driver_usernames(&page), ["MainDriver", "driver1", "driver2"]);
}

#[tokio::test]
async fn absent_or_blank_query_applies_no_filter() {
    let ctx = setup().await;
    add_driver(&ctx, "driver1", "AAA11111").await;
    add_driver(&ctx, "driver2", "BBB22222").await;

    let unfiltered = list_page(&ctx, "drivers", None, 1, None)
        .await
        .expect("page");
    assert_eq!(unfiltered.total_count, 2);

    let blank = list_page(&ctx, "drivers", Some("   "), 1, None)
        .await
        .expect("page");
    assert_eq!(blank.total_count, 2);
}

#[tokio::test]
async fn car_search_matches_model_and_carries_manufacturer_name() {
    let ctx = setup().await;
    let tesla = ctx
        .storage
        .create_manufacturer("Tesla", "USA")
        .await
        .expect("manufacturer");
    ctx.storage
        .create_car("Model S", tesla.id)
        .await
        .expect("car");
    ctx.storage
        .create_car("Roadster", tesla.id)
        .await
        .expect("car");

    let page = list_page(&ctx, "cars", Some("Model S"), 1, None)
        .await
        .expect("page");
    let PageItems::Cars(cars) = &page.items else {
        panic!("expected car items");
    };
    assert_eq!(cars.len(), 1);
    assert_eq!(cars[0].model, "Model S");
    assert_eq!(cars[0].manufacturer_name, "Tesla");
}

#[tokio::test]
async fn manufacturer_search_matches_name() {
    let ctx = setup().await;
    ctx.storage
        .create_manufacturer("Tesla", "USA")
        .await
        .expect("manufacturer");
    ctx.storage
        .create_manufacturer("Toyota", "Japan")
        .await
        .expect("manufacturer");

    let page = list_page(&ctx, "manufacturers", Some("Tesla"), 1, None)
        .await
        .expect("page");
    let PageItems::Manufacturers(makes) = &page.items else {
        panic!("expected manufacturer items");
    };
    assert_eq!(makes.len(), 1);
    assert_eq!(makes[0].name, "Tesla");
    assert_eq!(page.total_count, 1);
}

#[tokio::test]
async fn pages_partition_the_filtered_set_without_gaps_or_duplicates() {
    let ctx = setup().await;
    for i in 0..12 {
        add_driver(&ctx, &format!("drv{i:02}"), &format!("DRV{i:05}")).await;
    }

    let first = list_page(&ctx, "drivers", None, 1, Some(5))
        .await
        .expect("page");
    assert_eq!(first.total_count, 12);
    assert_eq!(first.page_count, 3);

    let mut seen = Vec::new();
    for page in 1..=first.page_count {
        let page = list_page(&ctx, "drivers", None, page as u32, Some(5))
            .await
            .expect("page");
        seen.extend(driver_usernames(&page));
    }
    let expected: Vec<String> = (0..12).map(|i| format!("drv{i:02}")).collect();
    assert_eq!(seen, expected, "union of pages is the full ordered set");
}

#[tokio::test]
async fn page_beyond_the_last_yields_an_empty_slice() {
    let ctx = setup().await;
    add_driver(&ctx, "driver1", "AAA11111").await;

    let page = list_page(&ctx, "drivers", None, 7, None).await.expect("page");
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 1);
    assert_eq!(page.page_count, 1);
    assert_eq!(page.page, 7);
}

#[tokio::test]
async fn empty_collection_has_zero_pages() {
    let ctx = setup().await;
    let page = list_page(&ctx, "drivers", None, 1, None).await.expect("page");
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
    assert_eq!(page.page_count, 0);
}

#[tokio::test]
async fn cars_default_to_five_per_page() {
    let ctx = setup().await;
    let make = ctx
        .storage
        .create_manufacturer("Fiat", "Italy")
        .await
        .expect("manufacturer");
    for i in 0..6 {
        ctx.storage
            .create_car(&format!("Punto {i}"), make.id)
            .await
            .expect("car");
    }

    let page = list_page(&ctx, "cars", None, 1, None).await.expect("page");
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.page_count, 2);
}

#[tokio::test]
async fn unknown_collection_is_rejected() {
    let ctx = setup().await;
    let err = list_page(&ctx, "buses", None, 1, None)
        .await
        .expect_err("should fail");
    assert!(matches!(err.code, ErrorCode::UnknownCollection));
}

#[tokio::test]
async fn non_positive_pagination_parameters_are_rejected() {
    let ctx = setup().await;
    let err = list_page(&ctx, "drivers", None, 0, None)
        .await
        .expect_err("page 0");
    assert!(matches!(err.code, ErrorCode::InvalidPagination));

    let err = list_page(&ctx, "drivers", None, 1, Some(0))
        .await
        .expect_err("page size 0");
    assert!(matches!(err.code, ErrorCode::InvalidPagination));
}
