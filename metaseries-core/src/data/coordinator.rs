//! Per-request fetch coordination: cache hit, or adapter call plus cache refresh.
//!
//! Failure policy:
//! - Store failures are logged and degrade to a miss (on read) or a no-op
//!   (on write)
//! - Adapter failures are neither retried nor swallowed
//! - An empty adapter result is an error and is never cached

use super::provider::SourceRegistry;
use super::store::RangeStore;
use crate::domain::{FetchRequest, Series, SeriesResult};
use crate::error::FetchError;
use std::sync::Arc;

/// Resolves single fetch requests against the store and the source registry.
#[derive(Debug, Clone)]
pub struct FetchCoordinator {
    registry: SourceRegistry,
    store: Option<Arc<RangeStore>>,
}

impl FetchCoordinator {
    /// Coordinator backed by `store`. Pass `None` to run without a cache.
    pub fn new(registry: SourceRegistry, store: Option<Arc<RangeStore>>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn store(&self) -> Option<&Arc<RangeStore>> {
        self.store.as_ref()
    }

    /// Resolve one request.
    ///
    /// With `bypass_cache` the lookup is skipped, but the fresh result still
    /// refreshes the cache for the exact requested range.
    pub fn resolve(
        &self,
        request: &FetchRequest,
        bypass_cache: bool,
    ) -> Result<SeriesResult, FetchError> {
        if !bypass_cache {
            if let Some(series) = self.cached(request) {
                return Ok(SeriesResult {
                    request: request.clone(),
                    series,
                    from_cache: true,
                });
            }
        }

        let series = self.fetch_from_source(request)?;
        self.refresh(request, &series);

        Ok(SeriesResult {
            request: request.clone(),
            series,
            from_cache: false,
        })
    }

    fn cached(&self, request: &FetchRequest) -> Option<Series> {
        let store = self.store.as_ref()?;
        let key = request.cache_key();
        match store.lookup(&key) {
            Ok(Some(hit)) => {
                tracing::debug!(
                    key = %key,
                    stored_start = %hit.key.start,
                    stored_end = %hit.key.end,
                    rows = hit.series.len(),
                    "cache_hit"
                );
                Some(hit.series)
            }
            Ok(None) => {
                tracing::debug!(key = %key, "cache_miss");
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache_lookup_failed");
                None
            }
        }
    }

    fn fetch_from_source(&self, request: &FetchRequest) -> Result<Series, FetchError> {
        let adapter =
            self.registry
                .get(&request.source)
                .ok_or_else(|| FetchError::UnknownSource {
                    source_name: request.source.clone(),
                    symbol: request.symbol.clone(),
                    available: self.registry.names().join(", "),
                })?;

        tracing::debug!(
            source = %request.source,
            symbol = %request.symbol,
            field = ?request.field,
            start = %request.start,
            end = %request.end,
            "fetch_from_source"
        );

        let points = adapter
            .fetch(
                &request.symbol,
                request.field.as_deref(),
                request.start,
                request.end,
            )
            .map_err(|e| {
                tracing::error!(
                    source = %request.source,
                    symbol = %request.symbol,
                    error = %e,
                    "fetch_failed"
                );
                FetchError::Adapter {
                    symbol: request.symbol.clone(),
                    source_name: request.source.clone(),
                    source: e,
                }
            })?;

        // Adapters may return unordered or out-of-range points; the store
        // only accepts points inside the key's range.
        let series = Series::from_points(points).slice(request.start, request.end);
        if series.is_empty() {
            tracing::warn!(
                source = %request.source,
                symbol = %request.symbol,
                "fetch_empty"
            );
            return Err(FetchError::NoData {
                symbol: request.symbol.clone(),
                start: request.start,
                end: request.end,
            });
        }

        tracing::info!(
            source = %request.source,
            symbol = %request.symbol,
            rows = series.len(),
            "fetch_complete"
        );
        Ok(series)
    }

    fn refresh(&self, request: &FetchRequest, series: &Series) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let key = request.cache_key();
        if let Err(e) = store.upsert(&key, series) {
            tracing::warn!(key = %key, error = %e, "cache_put_failed");
        }
    }
}
