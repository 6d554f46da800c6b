use crate::config::{LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use shared::metrics_defs::describe_all;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const METRICS_PREFIX: &str = "passport";

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("could not build statsd recorder: {0}")]
    Statsd(#[from] metrics_exporter_statsd::StatsdError),
    #[error("could not install metrics recorder: {0}")]
    Recorder(String),
}

/// Installs the global subscriber. Logs go to stderr so one-shot commands
/// can print their result on stdout. Errors are forwarded to Sentry when a
/// DSN is configured; the returned guard must be held until exit.
pub fn init_logging(config: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = config.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(sentry_layer)
        .init();

    guard
}

/// Installs the statsd recorder and describes every metric of the service.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), TelemetryError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(METRICS_PREFIX))?;
    metrics::set_global_recorder(recorder).map_err(|e| TelemetryError::Recorder(e.to_string()))?;

    describe_all(catalog::metrics_defs::ALL_METRICS);
    describe_all(gateway::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "statsd metrics enabled"
    );
    Ok(())
}
