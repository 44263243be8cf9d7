//! OpenWeatherMap current-weather client.
//!
//! Fetches the current conditions for a city by name.
//! See: https://openweathermap.org/current

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::{ConfigError, LookupError};
use crate::models::WeatherRecord;

pub const OPENWEATHER_API_URL: &str = "http://api.openweathermap.org/data/2.5/weather";

/// Upper bound on establishing a TCP/TLS connection to the upstream.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on a whole upstream request, body included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(14);
/// Longest slice of a non-JSON error body kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Port over the upstream weather provider.
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    /// Fetch current weather for `city`.
    ///
    /// Must return [`LookupError::Cancelled`] promptly once `cancel` fires,
    /// abandoning any request still in flight.
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        city: &str,
    ) -> Result<WeatherRecord, LookupError>;
}

/// Client for the OpenWeatherMap current-weather endpoint.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    /// Client for the current-weather endpoint at `base_url`
    /// (normally [`OPENWEATHER_API_URL`]).
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn request(&self, city: &str) -> Result<WeatherRecord, LookupError> {
        // The URL carries the API key, so it is stripped from every error.
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", city), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| LookupError::Request(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Status {
                status,
                message: upstream_message(&body),
            });
        }

        response
            .json::<WeatherRecord>()
            .await
            .map_err(|e| LookupError::Decode(e.without_url()))
    }
}

#[async_trait]
impl WeatherLookup for OpenWeatherClient {
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        city: &str,
    ) -> Result<WeatherRecord, LookupError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LookupError::Cancelled),
            result = self.request(city) => result,
        }
    }
}

/// Pull the human-readable reason out of an upstream error body.
///
/// OpenWeatherMap answers errors with `{"cod": "404", "message": "city not found"}`;
/// anything else is passed through, truncated.
fn upstream_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    if let Some(message) = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(|m| m.as_str())
    {
        return message.to_string();
    }

    if body.trim().is_empty() {
        return "no details".to_string();
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WEATHER_PATH: &str = "/data/2.5/weather";

    fn client_for(server: &MockServer) -> OpenWeatherClient {
        OpenWeatherClient::new("secret", &format!("{}{}", server.uri(), WEATHER_PATH)).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_api_key() {
        assert!(matches!(
            OpenWeatherClient::new("", OPENWEATHER_API_URL),
            Err(ConfigError::MissingApiKey)
        ));
        assert!(matches!(
            OpenWeatherClient::new("   ", OPENWEATHER_API_URL),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn test_upstream_message_from_json() {
        let body = r#"{"cod":"404","message":"city not found"}"#;
        assert_eq!(upstream_message(body), "city not found");
    }

    #[test]
    fn test_upstream_message_plain_text() {
        assert_eq!(upstream_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(upstream_message(""), "no details");
        assert_eq!(upstream_message(&"x".repeat(500)).len(), MAX_ERROR_BODY_CHARS);
    }

    #[tokio::test]
    async fn test_fetch_sends_city_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WEATHER_PATH))
            .and(query_param("q", "Sankt Gallen"))
            .and(query_param("appid", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Sankt Gallen",
                "id": 2658822,
                "main": { "temp": 278.5, "humidity": 81 },
                "cod": 200
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let record = client
            .fetch(&CancellationToken::new(), "Sankt Gallen")
            .await
            .unwrap();

        assert_eq!(record.name, "Sankt Gallen");
        assert_eq!(record.id, 2658822);
        assert_eq!(record.main.humidity, 81);
    }

    #[tokio::test]
    async fn test_fetch_surfaces_upstream_error_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WEATHER_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404",
                "message": "city not found"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .fetch(&CancellationToken::new(), "Atlantis")
            .await
            .unwrap_err();

        match err {
            LookupError::Status { status, message } => {
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert_eq!(message, "city not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_rejects_undecodable_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WEATHER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .fetch(&CancellationToken::new(), "Zurich")
            .await
            .unwrap_err();

        assert!(matches!(err, LookupError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_aborts_when_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WEATHER_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "name": "Slow" }))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(Duration::from_secs(2), client.fetch(&cancel, "Slow"))
            .await
            .expect("fetch ignored cancellation")
            .unwrap_err();

        assert!(matches!(err, LookupError::Cancelled));
    }

    #[tokio::test]
    async fn test_fetch_reports_unreachable_upstream() {
        // Nothing listens on port 9 (discard) in the test environment.
        let client =
            OpenWeatherClient::new("secret", "http://127.0.0.1:9/data/2.5/weather").unwrap();
        let err = client
            .fetch(&CancellationToken::new(), "Zurich")
            .await
            .unwrap_err();

        assert!(matches!(err, LookupError::Request(_)));
        assert!(!err.to_string().contains("secret"));
    }
}
