//! JSON bodies returned by the public API.
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use catalog::{Aggregate, AggregateEntry, GamepassRef, OwnedGamepasses, Summary};
use serde::Serialize;

pub const HEALTH_MESSAGE: &str =
    "Gamepass API is up. Use /api/gamepasses/{userId} to list the gamepasses of a user.";
pub const USAGE: &str = "GET /api/gamepasses/261";

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub ok: bool,
    pub message: &'static str,
    pub usage: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        HealthResponse {
            ok: true,
            message: HEALTH_MESSAGE,
            usage: USAGE,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ListResponse {
    pub ok: bool,
    pub count: usize,
    pub items: Vec<AggregateEntry>,
    pub summary: Summary,
}

impl From<Aggregate> for ListResponse {
    fn from(aggregate: Aggregate) -> Self {
        ListResponse {
            ok: true,
            count: aggregate.entries.len(),
            items: aggregate.entries,
            summary: aggregate.summary,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct CheckResponse {
    pub owns: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OwnedResponse {
    pub ok: bool,
    pub count: usize,
    pub gamepasses: Vec<GamepassRef>,
    pub failed_lookups: usize,
}

impl From<OwnedGamepasses> for OwnedResponse {
    fn from(owned: OwnedGamepasses) -> Self {
        OwnedResponse {
            ok: true,
            count: owned.gamepasses.len(),
            gamepasses: owned.gamepasses,
            failed_lookups: owned.failed_lookups,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

macro_rules! json_ok {
    ($($ty:ty),+) => {
        $(
            impl IntoResponse for $ty {
                fn into_response(self) -> Response {
                    (StatusCode::OK, Json(self)).into_response()
                }
            }
        )+
    };
}

json_ok!(HealthResponse, ListResponse, CheckResponse, OwnedResponse);
