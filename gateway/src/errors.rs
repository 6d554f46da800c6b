use crate::responses::ErrorBody;
use axum::{
    Json,
    extract::rejection::{PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use catalog::{CatalogError, IdError};

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A request that could not be answered with a 200.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("`{field}` {error}")]
    Validation { field: &'static str, error: IdError },

    #[error("{0}")]
    BadRequest(String),

    #[error("{message}")]
    Upstream { message: String, detail: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(error: CatalogError) -> Self {
        let message = match &error {
            CatalogError::Listing { .. } => "could not list the experiences of this user",
            CatalogError::Ownership(_) => "could not check the inventory of this user",
            CatalogError::Client(_) => "upstream client unavailable",
        };
        ApiError::Upstream {
            message: message.to_string(),
            detail: error.to_string(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation { field, error } => ErrorBody {
                ok: false,
                message: format!("`{field}` {error}"),
                detail: None,
            },
            ApiError::BadRequest(message) => ErrorBody {
                ok: false,
                message,
                detail: None,
            },
            ApiError::Upstream { message, detail } => ErrorBody {
                ok: false,
                message,
                detail: Some(detail),
            },
        };

        (status, Json(body)).into_response()
    }
}
