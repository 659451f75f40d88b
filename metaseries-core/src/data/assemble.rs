//! Assembly of several named series into one wide table.
//!
//! Order of operations: validate names and frequencies, resolve every
//! request through the coordinator, align each series on its own, then
//! outer-merge on date. Any failure yields an error and no partial table.

use super::align;
use super::coordinator::FetchCoordinator;
use crate::domain::{AssembledTable, Frequency, Series, SeriesRequest, TableColumn, DATE_COLUMN};
use crate::error::{AssemblyError, MismatchEntry, MismatchList};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};

/// Per-call options for [`AssemblyPipeline::assemble`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembleOptions {
    /// Resample every series to this frequency. When absent all native
    /// frequencies must agree.
    pub target: Option<Frequency>,
    /// Skip cache lookups (fresh results are still written back).
    pub bypass_cache: bool,
}

impl AssembleOptions {
    pub fn with_target(mut self, target: Frequency) -> Self {
        self.target = Some(target);
        self
    }

    pub fn bypassing_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}

/// Drives the coordinator for a batch of requests.
pub struct AssemblyPipeline {
    coordinator: FetchCoordinator,
    parallelism: usize,
    pool: Option<rayon::ThreadPool>,
}

impl AssemblyPipeline {
    /// Pipeline resolving up to `parallelism` requests at once.
    ///
    /// `parallelism <= 1` resolves sequentially on the calling thread.
    pub fn new(coordinator: FetchCoordinator, parallelism: usize) -> Self {
        let pool = if parallelism > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(parallelism)
                .thread_name(|i| format!("metaseries-fetch-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    tracing::warn!(error = %e, "fetch_pool_unavailable");
                    None
                }
            }
        } else {
            None
        };
        let parallelism = if pool.is_some() { parallelism } else { 1 };
        Self {
            coordinator,
            parallelism,
            pool,
        }
    }

    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    /// Effective number of concurrent fetches.
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Fetch, align and merge `requests` into one table, columns in input order.
    pub fn assemble(
        &self,
        requests: &[SeriesRequest],
        options: &AssembleOptions,
    ) -> Result<AssembledTable, AssemblyError> {
        if requests.is_empty() {
            return Ok(AssembledTable::default());
        }
        check_unique_names(requests)?;
        if options.target.is_none() {
            check_common_frequency(requests)?;
        }

        let resolved = self.resolve_all(requests, options.bypass_cache)?;

        let hits = resolved.iter().filter(|(_, from_cache)| *from_cache).count();
        let aligned: Vec<Series> = requests
            .iter()
            .zip(resolved)
            .map(|(req, (series, _))| align::align(&series, req.frequency, options.target, &req.name))
            .collect();

        let table = outer_merge(requests, &aligned);
        tracing::info!(
            columns = table.columns.len(),
            rows = table.row_count(),
            cache_hits = hits,
            target = ?options.target,
            "assembly_complete"
        );
        Ok(table)
    }

    /// Resolve every request, returning `(series, from_cache)` in input order.
    fn resolve_all(
        &self,
        requests: &[SeriesRequest],
        bypass_cache: bool,
    ) -> Result<Vec<(Series, bool)>, AssemblyError> {
        // Upper bound on concurrent fetches for this batch.
        let in_flight = self.parallelism.min(requests.len());
        let resolve_one = |req: &SeriesRequest| -> Result<(Series, bool), AssemblyError> {
            self.coordinator
                .resolve(&req.request, bypass_cache)
                .map(|result| (result.series, result.from_cache))
                .map_err(|source| {
                    if in_flight > 1 {
                        AssemblyError::Aborted {
                            name: req.name.clone(),
                            in_flight,
                            source,
                        }
                    } else {
                        AssemblyError::Fetch {
                            name: req.name.clone(),
                            source,
                        }
                    }
                })
        };

        match (&self.pool, in_flight > 1) {
            // Short-circuiting collect stops handing out new requests after
            // the first error; requests already running finish and are dropped.
            (Some(pool), true) => pool.install(|| requests.par_iter().map(resolve_one).collect()),
            _ => requests.iter().map(resolve_one).collect(),
        }
    }
}

impl std::fmt::Debug for AssemblyPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyPipeline")
            .field("coordinator", &self.coordinator)
            .field("parallelism", &self.parallelism)
            .finish()
    }
}

fn check_unique_names(requests: &[SeriesRequest]) -> Result<(), AssemblyError> {
    let mut seen = HashSet::with_capacity(requests.len());
    for req in requests {
        if req.name == DATE_COLUMN {
            return Err(AssemblyError::ReservedName(req.name.clone()));
        }
        if !seen.insert(req.name.as_str()) {
            return Err(AssemblyError::DuplicateName(req.name.clone()));
        }
    }
    Ok(())
}

fn check_common_frequency(requests: &[SeriesRequest]) -> Result<(), AssemblyError> {
    let first = requests[0].frequency;
    if requests.iter().all(|req| req.frequency == first) {
        return Ok(());
    }
    let entries = requests
        .iter()
        .map(|req| MismatchEntry {
            name: req.name.clone(),
            symbol: req.request.symbol.clone(),
            frequency: req.frequency,
        })
        .collect();
    Err(AssemblyError::FrequencyMismatch(MismatchList(entries)))
}

/// Union of all dates, one column per series in request order.
///
/// NaN points become absent cells.
fn outer_merge(requests: &[SeriesRequest], series: &[Series]) -> AssembledTable {
    let dates: Vec<NaiveDate> = series
        .iter()
        .flat_map(|s| s.dates())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let columns = requests
        .iter()
        .zip(series)
        .map(|(req, s)| {
            let mut values = vec![None; dates.len()];
            let mut row = 0;
            // Both sides are ascending, so one forward scan places every point.
            for obs in s.points() {
                while dates[row] < obs.date {
                    row += 1;
                }
                if !obs.value.is_nan() {
                    values[row] = Some(obs.value);
                }
            }
            TableColumn {
                name: req.name.clone(),
                values,
            }
        })
        .collect();

    AssembledTable { dates, columns }
}
