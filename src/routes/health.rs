use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::weather::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the process is serving
    pub status: String,
    /// API version
    pub version: String,
    /// Git commit the binary was built from ("unknown" if not stamped)
    pub commit: String,
    /// Whether the in-memory weather cache is enabled
    pub cache: bool,
}

/// Health check endpoint.
///
/// Returns the API status and build information. Does not call the
/// upstream weather provider.
#[utoipa::path(
    get,
    path = "/api/v1alpha1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        commit: crate::COMMIT.to_string(),
        cache: state.cache_enabled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aggregator::WeatherAggregator;
    use crate::services::openweather::{OpenWeatherClient, OPENWEATHER_API_URL};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_reports_build_info() {
        let client = OpenWeatherClient::new("key", OPENWEATHER_API_URL).unwrap();
        let state = AppState {
            aggregator: WeatherAggregator::new(Arc::new(client)),
            cache_enabled: true,
        };

        let Json(health) = health_check(State(state)).await;

        assert_eq!(health.status, "ok");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
        assert!(!health.commit.is_empty());
        assert!(health.cache);
    }
}
