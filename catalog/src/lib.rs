//! Gamepass catalog aggregation.
//!
//! A list query walks every configured listing source for the experiences
//! of a user, merges them, fans out to the gamepass listing of each
//! experience and joins the results into a flat list:
//!
//! ```text
//! sources ──paginate──▶ merge_sources ──▶ resolve_names ──▶ fan-out ──▶ aggregate
//! ```
//!
//! Only listing failures fail a query. Gamepass and name lookups that fail
//! degrade to empty results and placeholder names.
pub mod aggregator;
pub mod config;
pub mod errors;
pub mod fanout;
pub mod fetch;
pub mod metrics_defs;
pub mod names;
pub mod ownership;
pub mod paginator;
mod pipeline;
pub mod records;
pub mod types;

#[cfg(test)]
mod testutils;

pub use config::PipelineConfig;
pub use errors::{CatalogError, UpstreamError};
pub use pipeline::Catalog;
pub use types::{
    Aggregate, AggregateEntry, GamepassId, GamepassRef, IdError, OwnedGamepasses, Summary,
    UserId,
};
