use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::types::ErrorBody;
use service::counter::CounterError;

/// JSON error response: `{"error": ..., "code": ..., "details": ...}`.
#[derive(Debug)]
pub struct JsonApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl JsonApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, details: Option<String>) -> Self {
        Self { status, body: ErrorBody { error: error.into(), code: None, details } }
    }

    fn with_code(mut self, code: u16) -> Self {
        self.body.code = Some(code);
        self
    }
}

impl From<CounterError> for JsonApiError {
    fn from(e: CounterError) -> Self {
        let code = e.code();
        let details = Some(e.to_string());
        let err = match e {
            CounterError::InvalidKey => JsonApiError::new(StatusCode::BAD_REQUEST, "Missing key value", details),
            CounterError::KeyNotFound(_) => JsonApiError::new(StatusCode::NOT_FOUND, "key could not be found", details),
            CounterError::Overflow { .. } => JsonApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "Counter overflow", details),
            CounterError::Conflict(_) => JsonApiError::new(StatusCode::CONFLICT, "Concurrent creation conflict", details),
            CounterError::StoreBusy(_) => JsonApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Store busy", details),
            CounterError::Store(_) => JsonApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Store error", details),
        };
        err.with_code(code)
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
