// Weather Proxy API v0.1
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod errors;
mod models;
mod routes;
mod services;

use config::AppConfig;
use routes::weather::AppState;
use services::aggregator::WeatherAggregator;
use services::cache::InMemoryCache;
use services::openweather::OpenWeatherClient;

/// Crate version, reported at startup and by the health endpoint.
pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Git commit stamped at build time via the `GIT_COMMIT` environment variable.
pub(crate) const COMMIT: &str = match option_env!("GIT_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

/// Upper bound on handling one inbound request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Weather Proxy API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Proxy API",
        version = "0.1.0",
        description = "Current weather for one or more cities, fetched concurrently \
            from OpenWeatherMap and served from a short-lived in-memory cache when possible.",
        license(name = "Apache-2.0"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Weather", description = "Aggregated current weather"),
    ),
    paths(
        routes::health::health_check,
        routes::weather::get_weather,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            models::WeatherRecord,
            models::Coord,
            models::Condition,
            models::MainMeasures,
            models::Wind,
            models::Clouds,
            models::Sys,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // Logging depends on the config, so report straight to stderr.
            eprintln!("weather-proxy-api: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.debug);

    tracing::info!(version = VERSION, commit = COMMIT, "Starting Weather Proxy API");
    match &config.config_file {
        Some(path) => tracing::info!("Loaded config file {}", path.display()),
        None => tracing::info!(
            "No config file at {}, using flags, environment and defaults",
            config.config_candidate.display()
        ),
    }

    let client = match OpenWeatherClient::new(&config.api_key, &config.upstream_url) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Unable to create OpenWeatherMap client: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();

    let mut aggregator = WeatherAggregator::new(Arc::new(client));
    if config.cache_enabled {
        let cache = Arc::new(InMemoryCache::with_ttl(config.cache_ttl));
        tracing::info!(ttl_secs = cache.ttl().as_secs(), "Weather cache enabled");
        cache.clone().spawn_sweeper(shutdown.clone());
        aggregator = aggregator.with_cache(cache);
    } else {
        tracing::info!("Weather cache disabled, every city is fetched upstream");
    }

    let app_state = AppState {
        aggregator,
        cache_enabled: config.cache_enabled,
    };

    // CORS — read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/v1alpha1/weather", get(routes::weather::get_weather))
        .route("/api/v1alpha1/health", get(routes::health::health_check))
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .expect("Failed to bind TCP listener");
    tracing::info!("API server listening on {}:{}", config.host, config.port);
    tracing::info!(
        "Swagger UI available at http://{}:{}/swagger-ui/",
        config.host,
        config.port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("Server terminated unexpectedly");

    tracing::info!("Server stopped");
}

/// Pretty debug output when `debug` is set, JSON lines otherwise.
/// `RUST_LOG` overrides the default filter either way.
fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "weather_proxy_api=debug,tower_http=debug"
    } else {
        "weather_proxy_api=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if debug {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    }
}

/// Resolve on Ctrl-C or SIGTERM and cancel background work.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Unable to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Unable to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
    shutdown.cancel();
}
