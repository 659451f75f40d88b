//! Source adapter trait, its error type, and the registry that maps source
//! names to adapters.
//!
//! The SourceAdapter trait abstracts over upstream providers (vendor APIs,
//! local files) so the cache and assembly layers never depend on a concrete
//! binding, and so tests can plug in mocks.

use crate::domain::Observation;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Typed failure from an upstream adapter.
///
/// The coordinator treats every variant the same way: no retry, immediate
/// propagation. The distinction exists for the caller's benefit.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("symbol not found: {symbol}")]
    NotFound { symbol: String },

    #[error("transient error: {0}")]
    TransientError(String),
}

/// Trait for upstream data sources.
///
/// Implementations fetch raw points for one symbol over one inclusive date
/// range. They know nothing about the cache layer above them.
pub trait SourceAdapter: Send + Sync {
    /// Registry name of this source (e.g. `bloomberg`, `localfile`).
    fn name(&self) -> &str;

    /// Fetch `(date, value)` points for `symbol` over `[start, end]`.
    fn fetch(
        &self,
        symbol: &str,
        field: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, AdapterError>;
}

/// Name → adapter map shared by every coordinator built from it.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own `name()`. Replaces any previous
    /// adapter with that name.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.register_as(adapter.name().to_string(), adapter);
    }

    /// Register an adapter under an explicit name.
    pub fn register_as(&mut self, name: impl Into<String>, adapter: Arc<dyn SourceAdapter>) {
        let name = name.into();
        tracing::debug!(source = %name, "source_registered");
        self.sources.insert(name, adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.sources.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.sources.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl SourceAdapter for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn fetch(
            &self,
            _symbol: &str,
            _field: Option<&str>,
            start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<Observation>, AdapterError> {
            Ok(vec![Observation::new(start, 1.0)])
        }
    }

    #[test]
    fn register_uses_adapter_name() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(Fixed("bloomberg")));
        registry.register_as("alias", Arc::new(Fixed("macrobond")));

        assert!(registry.contains("bloomberg"));
        assert!(registry.contains("alias"));
        assert!(!registry.contains("macrobond"));
        assert_eq!(registry.names(), vec!["alias", "bloomberg"]);
    }

    #[test]
    fn registered_adapter_is_callable() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(Fixed("bloomberg")));
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let points = registry
            .get("bloomberg")
            .unwrap()
            .fetch("SPX Index", Some("PX_LAST"), start, start)
            .unwrap();
        assert_eq!(points, vec![Observation::new(start, 1.0)]);
    }
}
