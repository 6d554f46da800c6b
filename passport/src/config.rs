use catalog::PipelineConfig;
use gateway::Listener;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

pub const PORT_ENV: &str = "PORT";
pub const SESSION_COOKIE_ENV: &str = "UPSTREAM_SESSION_COOKIE";

#[derive(Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    /// Serves `/health` and `/ready` on a separate port when set.
    pub admin_listener: Option<Listener>,
    #[serde(default)]
    pub upstream: PipelineConfig,
    /// Sent verbatim as the `Cookie` header of authenticated upstream calls.
    pub session_cookie: Option<String>,
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Applies `PORT` and `UPSTREAM_SESSION_COOKIE` on top of the file.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(PORT_ENV) {
            self.listener.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{PORT_ENV} is not a port: `{port}`")))?;
        }

        if let Some(cookie) = lookup(SESSION_COOKIE_ENV).filter(|cookie| !cookie.is_empty()) {
            self.session_cookie = Some(cookie);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.upstream
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("upstream: {e}")))?;

        if let Some(admin) = &self.admin_listener
            && admin.port == self.listener.port
            && admin.host == self.listener.host
        {
            return Err(ConfigError::Invalid(
                "admin_listener must not share the public listener address".into(),
            ));
        }

        Ok(())
    }
}

/// Reads the optional config file, then the environment, then validates.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;

    Ok(config)
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
