//! High-level client: catalog names in, assembled tables out.
//!
//! The client owns the catalog, the field rules, the optional range store
//! and the assembly pipeline built from a [`Config`]. Dropping the client
//! (or calling [`Client::close`]) releases the store.

use crate::catalog::{Catalog, CatalogEntry, CatalogError, FieldRule, SourceRules};
use crate::config::{Config, ConfigError};
use crate::data::assemble::{AssembleOptions, AssemblyPipeline};
use crate::data::coordinator::FetchCoordinator;
use crate::data::provider::SourceRegistry;
use crate::data::store::{ClearFilter, EntrySummary, RangeStore, StoreError};
use crate::domain::{AssembledTable, FetchRequest, Frequency, SeriesResult};
use crate::error::{AssemblyError, FetchError};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cache error: {0}")]
    Store(#[from] StoreError),

    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

/// Options for [`Client::get`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Align every series to this frequency.
    pub frequency: Option<Frequency>,
    /// Skip cache lookups; fresh results still refresh the cache.
    pub bypass_cache: bool,
}

/// Catalog entry plus what the client knows about it at runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesMetadata {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    /// Whether an adapter is registered for the entry's source.
    pub source_registered: bool,
    /// Cached `(start, end)` ranges for the entry's exact series.
    pub cached_ranges: Vec<(NaiveDate, NaiveDate)>,
}

pub struct Client {
    catalog: Catalog,
    rules: SourceRules,
    pipeline: AssemblyPipeline,
    store: Option<Arc<RangeStore>>,
}

impl Client {
    /// Build a client, opening the store at the configured location unless
    /// `config.store.enabled` is false. Local file sources from the config
    /// are registered alongside `registry`.
    pub fn new(
        catalog: Catalog,
        registry: SourceRegistry,
        config: &Config,
    ) -> Result<Self, ClientError> {
        let store = if config.store.enabled {
            Some(RangeStore::open(config.store_path())?)
        } else {
            None
        };
        Self::with_store(catalog, registry, config, store)
    }

    /// Build a client around an already opened store (or none).
    ///
    /// A configured file source may not reuse the name of an adapter already
    /// in `registry`.
    pub fn with_store(
        catalog: Catalog,
        mut registry: SourceRegistry,
        config: &Config,
        store: Option<RangeStore>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        for source in &config.sources {
            if registry.contains(&source.name) {
                return Err(ConfigError::Invalid(format!(
                    "configured source '{}' collides with a registered adapter",
                    source.name
                ))
                .into());
            }
            registry.register(Arc::new(source.to_source()));
        }

        let rules = source_rules(config);
        for entry in catalog.entries() {
            rules.check(&entry.name, &entry.source, entry.field.as_deref())?;
        }

        let store = store.map(Arc::new);
        let coordinator = FetchCoordinator::new(registry, store.clone());
        let pipeline = AssemblyPipeline::new(coordinator, config.fetch.parallelism);

        tracing::info!(
            catalog_entries = catalog.len(),
            sources = pipeline.coordinator().registry().len(),
            cache_enabled = store.is_some(),
            parallelism = pipeline.parallelism(),
            "client_initialized"
        );

        Ok(Self {
            catalog,
            rules,
            pipeline,
            store,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn rules(&self) -> &SourceRules {
        &self.rules
    }

    pub fn store(&self) -> Option<&RangeStore> {
        self.store.as_deref()
    }

    /// Fetch catalog names over `[start, end]` into one wide table, columns
    /// in the order of `names`.
    pub fn get<S: AsRef<str>>(
        &self,
        names: &[S],
        start: NaiveDate,
        end: NaiveDate,
        options: &GetOptions,
    ) -> Result<AssembledTable, ClientError> {
        check_range(start, end)?;
        let requests = names
            .iter()
            .map(|name| Ok(self.catalog.get(name.as_ref())?.request(start, end)))
            .collect::<Result<Vec<_>, CatalogError>>()?;

        let assemble = AssembleOptions {
            target: options.frequency,
            bypass_cache: options.bypass_cache,
        };
        Ok(self.pipeline.assemble(&requests, &assemble)?)
    }

    /// Fetch one series straight from a source, without the catalog.
    ///
    /// The field is checked against the source's rule before anything is
    /// fetched.
    pub fn get_raw(
        &self,
        request: &FetchRequest,
        bypass_cache: bool,
    ) -> Result<SeriesResult, ClientError> {
        check_range(request.start, request.end)?;
        self.rules
            .check(&request.symbol, &request.source, request.field.as_deref())?;
        Ok(self.pipeline.coordinator().resolve(request, bypass_cache)?)
    }

    /// Catalog details for `name`, plus registration and cache state.
    pub fn metadata(&self, name: &str) -> Result<SeriesMetadata, ClientError> {
        let entry = self.catalog.get(name)?;
        let cached_ranges = self
            .list_cached()?
            .into_iter()
            .filter(|e| e.source == entry.source && e.symbol == entry.symbol && e.field == entry.field)
            .map(|e| (e.start, e.end))
            .collect();

        Ok(SeriesMetadata {
            entry: entry.clone(),
            source_registered: self.pipeline.coordinator().registry().contains(&entry.source),
            cached_ranges,
        })
    }

    /// Every cached range. Empty when the store is disabled.
    pub fn list_cached(&self) -> Result<Vec<EntrySummary>, ClientError> {
        match &self.store {
            Some(store) => Ok(store.list_entries()?),
            None => Ok(Vec::new()),
        }
    }

    /// Remove cached ranges. Returns the number of entries removed.
    pub fn clear_cache(&self, filter: &ClearFilter) -> Result<usize, ClientError> {
        match &self.store {
            Some(store) => Ok(store.clear(filter)?),
            None => Ok(0),
        }
    }

    /// Release the store. Idempotent.
    pub fn close(&self) {
        if let Some(store) = &self.store {
            store.close();
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("catalog_entries", &self.catalog.len())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

/// Default rules plus a `Forbidden` rule for every configured file source.
pub fn source_rules(config: &Config) -> SourceRules {
    config
        .sources
        .iter()
        .fold(SourceRules::default(), |rules, source| {
            rules.with(&source.name, FieldRule::Forbidden)
        })
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), ClientError> {
    if start > end {
        return Err(ClientError::InvalidRange { start, end });
    }
    Ok(())
}
