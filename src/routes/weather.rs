//! Weather HTTP endpoint.
//!
//! - GET /api/v1alpha1/weather?city=NAME&city=NAME...

use axum::extract::{RawQuery, State};
use axum::Json;

use crate::errors::AppError;
use crate::models::WeatherRecord;
use crate::services::aggregator::WeatherAggregator;

/// Shared application state for the weather and health endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) aggregator: WeatherAggregator,
    pub(crate) cache_enabled: bool,
}

/// Current weather for one or more cities.
///
/// Cities are resolved concurrently, from the cache when possible. The
/// response array follows the order of the `city` parameters. If any lookup
/// fails the whole request fails with an empty 500 response.
#[utoipa::path(
    get,
    path = "/api/v1alpha1/weather",
    tag = "Weather",
    params(
        ("city" = Vec<String>, Query, description = "City name; repeat the parameter for several cities"),
    ),
    responses(
        (status = 200, description = "Weather for every requested city, in request order", body = [WeatherRecord]),
        (status = 400, description = "Missing or empty city parameter", body = String, content_type = "text/plain"),
        (status = 500, description = "An upstream lookup failed (empty body)"),
    )
)]
pub async fn get_weather(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<WeatherRecord>>, AppError> {
    let cities = parse_cities(query.as_deref())?;
    tracing::debug!(cities = ?cities, "Requested cities");

    let records = state.aggregator.resolve(&cities).await?;
    Ok(Json(records))
}

/// Collect every `city` value from the raw query string, in order.
///
/// `Query<T>` cannot express repeated keys, so the string is decoded directly.
fn parse_cities(query: Option<&str>) -> Result<Vec<String>, AppError> {
    let cities: Vec<String> = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .filter(|(key, _)| key == "city")
        .map(|(_, value)| value.into_owned())
        .collect();

    if cities.is_empty() {
        return Err(AppError::InvalidInput(
            "Unable to find required city query parameters".to_string(),
        ));
    }
    if cities.iter().any(|city| city.trim().is_empty()) {
        return Err(AppError::InvalidInput(
            "city query parameters must not be empty".to_string(),
        ));
    }

    Ok(cities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LookupError;
    use crate::services::openweather::WeatherLookup;
    use async_trait::async_trait;
    use axum::http::{header, StatusCode};
    use axum::response::{IntoResponse, Response};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct MockLookup {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl WeatherLookup for MockLookup {
        async fn fetch(
            &self,
            _cancel: &CancellationToken,
            city: &str,
        ) -> Result<WeatherRecord, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LookupError::Status {
                    status: reqwest::StatusCode::UNAUTHORIZED,
                    message: "Invalid API key".to_string(),
                });
            }
            Ok(WeatherRecord {
                name: city.to_string(),
                ..WeatherRecord::default()
            })
        }
    }

    fn state(lookup: Arc<MockLookup>) -> AppState {
        AppState {
            aggregator: WeatherAggregator::new(lookup),
            cache_enabled: false,
        }
    }

    async fn call(lookup: Arc<MockLookup>, query: Option<&str>) -> Response {
        get_weather(State(state(lookup)), RawQuery(query.map(str::to_string)))
            .await
            .into_response()
    }

    async fn body_of(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_missing_city_is_bad_request() {
        let lookup = Arc::new(MockLookup::default());
        let response = call(lookup.clone(), None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!body_of(response).await.is_empty());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_other_params_only_is_bad_request() {
        let response = call(Arc::new(MockLookup::default()), Some("units=metric")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_city_is_bad_request() {
        let response = call(Arc::new(MockLookup::default()), Some("city=")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_one_city() {
        let lookup = Arc::new(MockLookup::default());
        let response = call(lookup.clone(), Some("city=Some")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let records: Vec<WeatherRecord> = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_many_cities_in_request_order() {
        let lookup = Arc::new(MockLookup::default());
        let response = call(lookup.clone(), Some("city=Some&city=Other&city=NewCity")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let records: Vec<WeatherRecord> = serde_json::from_slice(&body_of(response).await).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Some", "Other", "NewCity"]);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_empty_server_error() {
        let lookup = Arc::new(MockLookup {
            fail: true,
            ..MockLookup::default()
        });
        let response = call(lookup, Some("city=Some")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_of(response).await.is_empty());
    }

    #[test]
    fn test_parse_cities_decodes_and_keeps_order() {
        let cities =
            parse_cities(Some("city=New%20York&units=metric&city=S%C3%A3o+Paulo&city=Oslo"))
                .unwrap();
        assert_eq!(cities, vec!["New York", "São Paulo", "Oslo"]);
    }

    #[test]
    fn test_parse_cities_keeps_duplicates() {
        let cities = parse_cities(Some("city=Bern&city=Bern")).unwrap();
        assert_eq!(cities, vec!["Bern", "Bern"]);
    }
}
