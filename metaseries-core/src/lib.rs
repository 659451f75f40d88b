//! Metaseries Core: named time series from heterogeneous sources, cached by range.
//!
//! This crate contains:
//! - Domain types (observations, series, requests, frequencies, tables)
//! - The SQLite range store with superset-or-miss lookup
//! - The fetch coordinator (cache hit, or adapter call plus cache refresh)
//! - Frequency alignment and multi-series assembly
//! - The TOML catalog, field rules and runtime configuration
//! - A local CSV / Parquet source and table export
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod catalog;
pub mod client;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;

pub use catalog::{Catalog, CatalogEntry, CatalogError, FieldRule, SourceRules};
pub use client::{Client, ClientError, GetOptions, SeriesMetadata};
pub use config::{Config, ConfigError, StoreLocation};
pub use error::{AssemblyError, FetchError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared across fetch threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Series>();
        require_sync::<domain::Series>();
        require_send::<domain::FetchRequest>();
        require_sync::<domain::FetchRequest>();
        require_send::<domain::AssembledTable>();
        require_sync::<domain::AssembledTable>();

        require_send::<data::RangeStore>();
        require_sync::<data::RangeStore>();
        require_send::<data::SourceRegistry>();
        require_sync::<data::SourceRegistry>();
        require_send::<data::FetchCoordinator>();
        require_sync::<data::FetchCoordinator>();
        require_send::<data::AssemblyPipeline>();
        require_sync::<data::AssemblyPipeline>();
        require_send::<Client>();
        require_sync::<Client>();

        require_send::<FetchError>();
        require_sync::<FetchError>();
        require_send::<AssemblyError>();
        require_sync::<AssemblyError>();
    }
}
