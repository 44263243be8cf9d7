//! Concurrent multi-city weather resolution.
//!
//! Every requested city is resolved on its own task: cache first, then the
//! upstream lookup on a miss. The first failing lookup cancels its siblings
//! and fails the whole request; partial results are never returned.

use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::errors::{AppError, LookupError};
use crate::models::WeatherRecord;
use crate::services::cache::{NoOpCache, WeatherCache};
use crate::services::openweather::WeatherLookup;

/// Resolves ordered city lists into ordered weather records.
#[derive(Clone)]
pub struct WeatherAggregator {
    lookup: Arc<dyn WeatherLookup>,
    cache: Arc<dyn WeatherCache>,
}

impl WeatherAggregator {
    /// Aggregator without caching; every city goes upstream.
    pub fn new(lookup: Arc<dyn WeatherLookup>) -> Self {
        Self {
            lookup,
            cache: Arc::new(NoOpCache),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn WeatherCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Resolve weather for `cities`, preserving input order.
    ///
    /// Returns `InvalidInput` for an empty list and the first observed
    /// `UpstreamLookupFailure` if any lookup fails. Dropping the returned
    /// future aborts all outstanding lookups.
    pub async fn resolve(&self, cities: &[String]) -> Result<Vec<WeatherRecord>, AppError> {
        if cities.is_empty() {
            return Err(AppError::InvalidInput(
                "at least one city is required".to_string(),
            ));
        }

        let cancel = CancellationToken::new();
        let mut workers = JoinSet::new();

        for (index, city) in cities.iter().enumerate() {
            let lookup = self.lookup.clone();
            let cache = self.cache.clone();
            let cancel = cancel.clone();
            let city = city.clone();

            workers.spawn(async move {
                let result = resolve_city(lookup.as_ref(), cache.as_ref(), &cancel, &city).await;
                (index, city, result)
            });
        }

        let mut results: Vec<Option<WeatherRecord>> = vec![None; cities.len()];
        let mut first_error: Option<AppError> = None;

        while let Some(joined) = workers.join_next().await {
            let failure = match joined {
                Ok((index, _, Ok(record))) => {
                    results[index] = Some(record);
                    continue;
                }
                Ok((_, city, Err(source))) => AppError::UpstreamLookupFailure { city, source },
                Err(join_err) => AppError::UpstreamLookupFailure {
                    city: "<unknown>".to_string(),
                    source: LookupError::Worker(join_err.to_string()),
                },
            };

            if first_error.is_none() {
                cancel.cancel();
                first_error = Some(failure);
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        let records: Vec<WeatherRecord> = results.into_iter().flatten().collect();
        debug_assert_eq!(records.len(), cities.len());
        Ok(records)
    }
}

/// Cache-then-upstream resolution for a single city.
async fn resolve_city(
    lookup: &dyn WeatherLookup,
    cache: &dyn WeatherCache,
    cancel: &CancellationToken,
    city: &str,
) -> Result<WeatherRecord, LookupError> {
    if let Some(record) = cache.check(city) {
        tracing::debug!(city, "Weather cache hit");
        return Ok(record);
    }

    tracing::debug!(city, "Weather cache miss, querying upstream");
    let record = lookup.fetch(cancel, city).await?;
    cache.save(city, record.clone());
    Ok(record)
}
