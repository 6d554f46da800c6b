use reqwest::StatusCode;

/// Result type alias for catalog operations
pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

/// A single upstream call failed.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("upstream returned {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid upstream url: {0}")]
    InvalidUrl(#[from] TemplateError),
}

/// A url template could not be turned into a url.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TemplateError {
    #[error("no value for placeholder `{{{0}}}`")]
    Unbound(String),

    #[error("unterminated placeholder in `{0}`")]
    Unterminated(String),

    #[error("{0}")]
    Parse(#[from] url::ParseError),
}

/// Failures that terminate a catalog query.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("listing `{source_name}` failed: {error}")]
    Listing {
        source_name: String,
        #[source]
        error: UpstreamError,
    },

    #[error("ownership check failed: {0}")]
    Ownership(#[source] UpstreamError),

    #[error("could not build http client: {0}")]
    Client(#[from] reqwest::Error),
}
