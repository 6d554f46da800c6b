//! Public HTTP API in front of the gamepass catalog.
mod api;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod responses;

pub use api::{router, serve};
pub use config::Listener;
pub use errors::{ApiError, GatewayError};
