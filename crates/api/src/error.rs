use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use serac_avalanche::utxo::QueryError;
use serac_core::{IndexError, StoreError};

pub enum Error {
    NotFound,
    BadRequest(&'static str),
    Internal,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "status_code": 404,
                    "error": "Not Found",
                    "message": "The requested resource has not been found."
                })),
            )
                .into_response(),

            Error::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "status_code": 400,
                    "error": "Bad Request",
                    "message": message,
                })),
            )
                .into_response(),

            Error::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "status_code": 500,
                    "error": "Internal Server Error",
                    "message": "Internal consistency error."
                })),
            )
                .into_response(),
        }
    }
}

impl From<StoreError> for Error {
    fn from(_: StoreError) -> Self {
        Error::Internal
    }
}

impl From<IndexError> for Error {
    fn from(_: IndexError) -> Self {
        Error::Internal
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        match value {
            QueryError::InvalidPageToken => Error::BadRequest("invalid pageToken"),
            QueryError::InvalidAmount => Error::BadRequest("invalid minUtxoAmount"),
            _ => Error::Internal,
        }
    }
}
