use crate::config::Listener;
use crate::errors::{ApiError, GatewayError};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::responses::{CheckResponse, HealthResponse, ListResponse, OwnedResponse};
use axum::{
    Router,
    extract::{
        MatchedPath, Path, Query, Request, State,
        rejection::{PathRejection, QueryRejection},
    },
    http::Method,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use catalog::{Catalog, GamepassId, IdError, UserId};
use serde::Deserialize;
use shared::{gauge, histogram};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Binds the public listener and serves the API until the process exits.
/// `ready` is flipped once the socket is bound.
pub async fn serve(
    listener: &Listener,
    catalog: Catalog,
    ready: Arc<AtomicBool>,
) -> Result<(), GatewayError> {
    let app = router(catalog);
    let addr = format!("{}:{}", listener.host, listener.port);

    let tcp_listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gateway listening");
    ready.store(true, Ordering::Relaxed);

    axum::serve(tcp_listener, app).await?;
    Ok(())
}

pub fn router(catalog: Catalog) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/", get(health))
        .route("/api/gamepasses", get(list_by_query))
        .route("/api/gamepasses/{user_id}", get(list_by_path))
        .route("/check", get(check))
        .route("/owned", get(owned))
        .route_layer(middleware::from_fn(track_requests))
        .layer(cors)
        .with_state(catalog)
}

async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_default();
    let start = Instant::now();

    let _inflight = InflightGuard::new();
    let response = next.run(request).await;

    histogram!(
        REQUEST_DURATION,
        "route" => route,
        "status" => response.status().as_u16().to_string()
    )
    .record(start.elapsed().as_secs_f64());

    response
}

/// Counts a request as in flight until dropped, including when the client
/// goes away and the handler future is cancelled.
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        InflightGuard
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

#[derive(Deserialize, Debug)]
struct UserParams {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CheckParams {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    #[serde(rename = "gamepassId")]
    gamepass_id: Option<String>,
}

fn parse_id<T>(field: &'static str, raw: Option<&str>) -> Result<T, ApiError>
where
    T: FromStr<Err = IdError>,
{
    raw.unwrap_or_default()
        .parse()
        .map_err(|error| ApiError::Validation { field, error })
}

async fn health() -> HealthResponse {
    HealthResponse::default()
}

async fn list_by_query(
    State(catalog): State<Catalog>,
    params: Result<Query<UserParams>, QueryRejection>,
) -> Result<ListResponse, ApiError> {
    let Query(params) = params?;
    list(&catalog, params.user_id.as_deref()).await
}

async fn list_by_path(
    State(catalog): State<Catalog>,
    user_id: Result<Path<String>, PathRejection>,
) -> Result<ListResponse, ApiError> {
    let Path(user_id) = user_id?;
    list(&catalog, Some(&user_id)).await
}

async fn list(catalog: &Catalog, user_id: Option<&str>) -> Result<ListResponse, ApiError> {
    let user: UserId = parse_id("userId", user_id)?;
    tracing::info!(user_id = %user, "listing gamepasses");

    let aggregate = catalog.list_gamepasses(user).await?;
    Ok(aggregate.into())
}

async fn check(
    State(catalog): State<Catalog>,
    params: Result<Query<CheckParams>, QueryRejection>,
) -> Result<CheckResponse, ApiError> {
    let Query(params) = params?;
    let user: UserId = parse_id("userId", params.user_id.as_deref())?;
    let gamepass: GamepassId = parse_id("gamepassId", params.gamepass_id.as_deref())?;

    let owns = catalog.owns_gamepass(user, gamepass).await?;
    Ok(CheckResponse { owns })
}

async fn owned(
    State(catalog): State<Catalog>,
    params: Result<Query<UserParams>, QueryRejection>,
) -> Result<OwnedResponse, ApiError> {
    let Query(params) = params?;
    let user: UserId = parse_id("userId", params.user_id.as_deref())?;
    Ok(catalog.owned_gamepasses(user).await.into())
}
