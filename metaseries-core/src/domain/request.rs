//! Request and key types passed between the assembly, coordinator and store layers.

use super::frequency::Frequency;
use super::series::Series;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One contiguous fetched range for a `(source, symbol, field)` triple.
///
/// `field: None` is distinct from `Some("")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub source: String,
    pub symbol: String,
    pub field: Option<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CacheKey {
    /// True if `self` and `other` name the same series, regardless of range.
    pub fn same_series(&self, other: &CacheKey) -> bool {
        self.source == other.source && self.symbol == other.symbol && self.field == other.field
    }

    /// True if this range fully contains `other`'s range.
    pub fn covers(&self, other: &CacheKey) -> bool {
        self.same_series(other) && self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(
                f,
                "{}:{}[{}] {}..{}",
                self.source, self.symbol, field, self.start, self.end
            ),
            None => write!(f, "{}:{} {}..{}", self.source, self.symbol, self.start, self.end),
        }
    }
}

/// Unit of work handed to a source adapter and to the cache lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchRequest {
    pub source: String,
    pub symbol: String,
    pub field: Option<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchRequest {
    pub fn new(
        source: impl Into<String>,
        symbol: impl Into<String>,
        field: Option<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            source: source.into(),
            symbol: symbol.into(),
            field,
            start,
            end,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            source: self.source.clone(),
            symbol: self.symbol.clone(),
            field: self.field.clone(),
            start: self.start,
            end: self.end,
        }
    }
}

/// A display name paired with the request that produces its column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRequest {
    pub name: String,
    pub request: FetchRequest,
    /// Native frequency as declared by the catalog.
    pub frequency: Frequency,
}

impl SeriesRequest {
    pub fn new(name: impl Into<String>, request: FetchRequest, frequency: Frequency) -> Self {
        Self {
            name: name.into(),
            request,
            frequency,
        }
    }
}

/// In-memory outcome of resolving one [`FetchRequest`].
#[derive(Debug, Clone)]
pub struct SeriesResult {
    pub request: FetchRequest,
    pub series: Series,
    pub from_cache: bool,
}
