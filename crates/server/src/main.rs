use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use server_api::{assignment, auth, home_summary, listing, records, ApiContext};
use shared::{
    domain::{CarId, DriverId, ManufacturerId},
    error::{ApiError, ErrorCode},
    protocol::{
        CarDetail, CarSummary, DriverDetail, DriverSummary, HomeSummary, ListPage,
        ManufacturerSummary, RegisterDriver, ToggleOutcome,
    },
};
use storage::Storage;
use tracing::{error, info};

mod config;

use config::{load_settings, normalize_database_url};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    q: Option<String>,
    page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LoginResponse {
    token: String,
    driver_id: i64,
}

#[derive(Debug, Deserialize)]
struct ManufacturerUpsert {
    name: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct CarUpsert {
    model: String,
    manufacturer_id: i64,
}

#[derive(Debug, Deserialize)]
struct LicenseUpdate {
    license_number: String,
}

type HandlerError = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open the fleet database; verify the path and its permissions"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "fleet server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/", get(home))
        .route("/drivers", get(list_drivers))
        .route("/drivers/:id", get(driver_detail).delete(delete_driver))
        .route("/drivers/:id/license", put(update_license))
        .route("/cars", get(list_cars).post(create_car))
        .route(
            "/cars/:id",
            get(car_detail).put(update_car).delete(delete_car),
        )
        .route("/cars/:id/toggle-assign", post(toggle_assign))
        .route(
            "/manufacturers",
            get(list_manufacturers).post(create_manufacturer),
        )
        .route(
            "/manufacturers/:id",
            get(manufacturer_detail)
                .put(update_manufacturer)
                .delete(delete_manufacturer),
        )
        .with_state(state)
}

fn reject(err: ApiError) -> HandlerError {
    let status = match err.code {
        ErrorCode::NotFound | ErrorCode::UnknownCollection => StatusCode::NOT_FOUND,
        ErrorCode::DuplicateKey => StatusCode::CONFLICT,
        ErrorCode::InvalidFormat | ErrorCode::InvalidPagination => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, HandlerError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            reject(ApiError::new(
                ErrorCode::Unauthenticated,
                "missing bearer token",
            ))
        })
}

/// The acting driver, resolved from the request's session token. Everything
/// past the login surface goes through here except the public manufacturer
/// listing.
async fn acting_driver(state: &AppState, headers: &HeaderMap) -> Result<DriverId, HandlerError> {
    let token = bearer_token(headers)?;
    auth::authenticate(&state.api, token).await.map_err(reject)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HandlerError> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|e| reject(ApiError::new(ErrorCode::Internal, e.to_string())))?;
    Ok("ok")
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterDriver>,
) -> Result<Json<DriverSummary>, HandlerError> {
    auth::register(&state.api, req).await.map(Json).map_err(reject)
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, HandlerError> {
    let session = auth::login(&state.api, &req.username, &req.password)
        .await
        .map_err(reject)?;
    Ok(Json(LoginResponse {
        token: session.token,
        driver_id: session.driver_id.0,
    }))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, HandlerError> {
    let token = bearer_token(&headers)?;
    auth::logout(&state.api, token).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn home(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<HomeSummary>, HandlerError> {
    let token = bearer_token(&headers)?;
    home_summary(&state.api, token).await.map(Json).map_err(reject)
}

async fn list_collection(
    state: &AppState,
    collection: &str,
    params: ListQuery,
) -> Result<Json<ListPage>, HandlerError> {
    listing::list_page(
        &state.api,
        collection,
        params.q.as_deref(),
        params.page.unwrap_or(1),
        None,
    )
    .await
    .map(Json)
    .map_err(reject)
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListQuery>,
) -> Result<Json<ListPage>, HandlerError> {
    acting_driver(&state, &headers).await?;
    list_collection(&state, "drivers", params).await
}

async fn list_cars(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListQuery>,
) -> Result<Json<ListPage>, HandlerError> {
    acting_driver(&state, &headers).await?;
    list_collection(&state, "cars", params).await
}

// The manufacturer listing has no login gate.
async fn list_manufacturers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ListPage>, HandlerError> {
    list_collection(&state, "manufacturers", params).await
}

async fn driver_detail(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<DriverDetail>, HandlerError> {
    acting_driver(&state, &headers).await?;
    records::driver_detail(&state.api, DriverId(id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_license(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<LicenseUpdate>,
) -> Result<Json<DriverSummary>, HandlerError> {
    acting_driver(&state, &headers).await?;
    records::update_driver_license(&state.api, DriverId(id), &req.license_number)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_driver(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, HandlerError> {
    acting_driver(&state, &headers).await?;
    records::delete_driver(&state.api, DriverId(id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn car_detail(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<CarDetail>, HandlerError> {
    acting_driver(&state, &headers).await?;
    records::car_detail(&state.api, CarId(id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn create_car(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CarUpsert>,
) -> Result<Json<CarSummary>, HandlerError> {
    acting_driver(&state, &headers).await?;
    records::create_car(&state.api, &req.model, ManufacturerId(req.manufacturer_id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_car(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<CarUpsert>,
) -> Result<Json<CarSummary>, HandlerError> {
    acting_driver(&state, &headers).await?;
    records::update_car(
        &state.api,
        CarId(id),
        &req.model,
        ManufacturerId(req.manufacturer_id),
    )
    .await
    .map(Json)
    .map_err(reject)
}

async fn delete_car(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, HandlerError> {
    acting_driver(&state, &headers).await?;
    records::delete_car(&state.api, CarId(id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Assignment always acts on the session's own driver record; the request
/// names only the car.
async fn toggle_assign(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ToggleOutcome>, HandlerError> {
    let acting_driver_id = acting_driver(&state, &headers).await?;
    let assigned = assignment::toggle_assignment(&state.api, acting_driver_id, CarId(id))
        .await
        .map_err(reject)?;
    Ok(Json(ToggleOutcome { assigned }))
}

async fn manufacturer_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ManufacturerSummary>, HandlerError> {
    records::get_manufacturer(&state.api, ManufacturerId(id))
        .await
        .map(Json)
        .map_err(reject)
}

async fn create_manufacturer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ManufacturerUpsert>,
) -> Result<Json<ManufacturerSummary>, HandlerError> {
    acting_driver(&state, &headers).await?;
    records::create_manufacturer(&state.api, &req.name, &req.country)
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_manufacturer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<ManufacturerUpsert>,
) -> Result<Json<ManufacturerSummary>, HandlerError> {
    acting_driver(&state, &headers).await?;
    records::update_manufacturer(&state.api, ManufacturerId(id), &req.name, &req.country)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_manufacturer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, HandlerError> {
    acting_driver(&state, &headers).await?;
    records::delete_manufacturer(&state.api, ManufacturerId(id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
