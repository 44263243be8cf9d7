use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Weather lookup for '{city}' failed: {source}")]
    UpstreamLookupFailure {
        city: String,
        #[source]
        source: LookupError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("apiKey is required (--apiKey, API_KEY or config file)")]
    MissingApiKey,

    #[error("Unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidValue(String),

    #[error("Unable to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("upstream returned HTTP {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("unable to decode weather response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("lookup cancelled")]
    Cancelled,

    #[error("lookup task failed: {0}")]
    Worker(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::UpstreamLookupFailure { city, source } => {
                // Upstream detail stays in the logs; the client only sees the status.
                tracing::error!(city = %city, error = %source, "Weather lookup failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
