use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
  /// A required argument was missing or empty. Never retried.
  #[error("{0}")]
  InvalidArgument(String),
  /// The extraction runtime or one of the handles could not be built.
  #[error("failed to initialize extractors: {0}")]
  Initialization(String),
  /// A handle was requested before the pool finished initializing.
  #[error("extractor pool is not ready: {0}")]
  NotReady(String),
  /// The platform returned nothing usable.
  #[error("{0}")]
  Extraction(String),
  #[error("timed out: {0}")]
  Timeout(String),
}

impl Error {
  pub fn code(&self) -> &'static str {
    match self {
      Error::InvalidArgument(_) => "INVALID_ARGUMENT",
      Error::Initialization(_) => "INITIALIZATION_ERROR",
      Error::NotReady(_) => "NOT_READY",
      Error::Extraction(_) => "EXTRACTION_ERROR",
      Error::Timeout(_) => "TIMEOUT",
    }
  }

  /// Whether the caller may reasonably issue the same request again.
  pub fn retryable(&self) -> bool {
    matches!(self, Error::Extraction(_) | Error::Timeout(_))
  }

  fn status(&self) -> StatusCode {
    match self {
      Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
      Error::Initialization(_) => StatusCode::SERVICE_UNAVAILABLE,
      Error::NotReady(_) => StatusCode::INTERNAL_SERVER_ERROR,
      Error::Extraction(_) => StatusCode::BAD_GATEWAY,
      Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let body = json!({ "code": self.code(), "message": self.to_string() });
    (self.status(), Json(body)).into_response()
  }
}

impl From<serde_json::Error> for Error {
  fn from(err: serde_json::Error) -> Self {
    Error::Extraction(format!("invalid extractor output: {err}"))
  }
}

impl From<reqwest::Error> for Error {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      Error::Timeout(err.to_string())
    } else {
      Error::Extraction(err.to_string())
    }
  }
}
