//! Metrics definitions for the catalog pipeline.

use shared::metrics_defs::{MetricDef, MetricType};

pub const UPSTREAM_REQUESTS: MetricDef = MetricDef {
    name: "upstream.requests",
    metric_type: MetricType::Counter,
    description: "Upstream calls issued. Tagged with outcome: ok, status, timeout, error.",
};

pub const UPSTREAM_REQUEST_DURATION: MetricDef = MetricDef {
    name: "upstream.request.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of a single upstream call in seconds",
};

pub const LISTING_PAGES: MetricDef = MetricDef {
    name: "listing.pages",
    metric_type: MetricType::Counter,
    description: "Listing pages fetched across all paginated listings",
};

pub const LISTING_PAGE_CEILING: MetricDef = MetricDef {
    name: "listing.page_ceiling",
    metric_type: MetricType::Counter,
    description: "Paginated listings cut short by the page ceiling",
};

pub const FANOUT_FAILURES: MetricDef = MetricDef {
    name: "fanout.failures",
    metric_type: MetricType::Counter,
    description: "Gamepass lookups that failed and were treated as empty",
};

pub const NAME_LOOKUP_FAILURES: MetricDef = MetricDef {
    name: "names.failures",
    metric_type: MetricType::Counter,
    description: "Name lookup batches that failed",
};

pub const OWNERSHIP_CHECK_FAILURES: MetricDef = MetricDef {
    name: "ownership.failures",
    metric_type: MetricType::Counter,
    description: "Inventory lookups that failed",
};

pub const ALL_METRICS: &[MetricDef] = &[
    UPSTREAM_REQUESTS,
    UPSTREAM_REQUEST_DURATION,
    LISTING_PAGES,
    LISTING_PAGE_CEILING,
    FANOUT_FAILURES,
    NAME_LOOKUP_FAILURES,
    OWNERSHIP_CHECK_FAILURES,
];
