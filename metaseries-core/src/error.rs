//! Errors surfaced to callers of the fetch and assembly layers.
//!
//! Cache failures (`StoreError`) are absent here: the
//! coordinator logs them and degrades to a miss, so they never reach a
//! caller of `resolve` or `assemble`.

use crate::data::provider::AdapterError;
use crate::domain::Frequency;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Failure to resolve one fetch request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch failed for symbol '{symbol}' from source '{source_name}': {source}")]
    Adapter {
        symbol: String,
        source_name: String,
        #[source]
        source: AdapterError,
    },

    #[error("no data returned for symbol '{symbol}' between {start} and {end}")]
    NoData {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("unknown source '{source_name}' for symbol '{symbol}' (registered: {available})")]
    UnknownSource {
        source_name: String,
        symbol: String,
        available: String,
    },
}

impl FetchError {
    /// Symbol the failure belongs to.
    pub fn symbol(&self) -> &str {
        match self {
            FetchError::Adapter { symbol, .. }
            | FetchError::NoData { symbol, .. }
            | FetchError::UnknownSource { symbol, .. } => symbol,
        }
    }
}

/// One series named in a frequency mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchEntry {
    pub name: String,
    pub symbol: String,
    pub frequency: Frequency,
}

/// Newtype so the mismatch list can be rendered inside an error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchList(pub Vec<MismatchEntry>);

impl fmt::Display for MismatchList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(
                f,
                "{} (symbol '{}') is {}",
                entry.name, entry.symbol, entry.frequency
            )?;
        }
        Ok(())
    }
}

/// Failure to assemble a table. No partial table accompanies any variant.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(
        "frequency mismatch: {0}; pass an explicit target frequency to align the series"
    )]
    FrequencyMismatch(MismatchList),

    #[error("duplicate display name '{0}' in request")]
    DuplicateName(String),

    #[error("display name '{0}' is reserved for the date axis")]
    ReservedName(String),

    #[error("failed to resolve '{name}': {source}")]
    Fetch {
        name: String,
        #[source]
        source: FetchError,
    },

    #[error("assembly aborted: '{name}' failed with up to {in_flight} fetches in flight: {source}")]
    Aborted {
        name: String,
        /// Concurrency bound of the batch, `min(parallelism, requests)`.
        /// Not a count of fetches running at the moment of failure.
        in_flight: usize,
        #[source]
        source: FetchError,
    },
}

impl AssemblyError {
    /// The underlying fetch failure, if the assembly got as far as fetching.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            AssemblyError::Fetch { source, .. } | AssemblyError::Aborted { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_message_names_every_symbol_and_remedy() {
        let err = AssemblyError::FrequencyMismatch(MismatchList(vec![
            MismatchEntry {
                name: "GDP_US".into(),
                symbol: "usgdp".into(),
                frequency: Frequency::Quarterly,
            },
            MismatchEntry {
                name: "SPX".into(),
                symbol: "SPX Index".into(),
                frequency: Frequency::Daily,
            },
        ]));
        let msg = err.to_string();
        assert!(msg.contains("GDP_US (symbol 'usgdp') is quarterly"));
        assert!(msg.contains("SPX (symbol 'SPX Index') is daily"));
        assert!(msg.contains("explicit target frequency"));
    }

    #[test]
    fn fetch_error_reports_symbol() {
        let err = FetchError::Adapter {
            symbol: "BROKEN_SYM".into(),
            source_name: "bloomberg".into(),
            source: AdapterError::NotFound {
                symbol: "BROKEN_SYM".into(),
            },
        };
        assert_eq!(err.symbol(), "BROKEN_SYM");
        assert!(err.to_string().contains("BROKEN_SYM"));
    }
}
