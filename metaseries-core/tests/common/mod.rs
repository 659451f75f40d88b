//! Shared mock adapters for integration tests.

#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use metaseries_core::data::{AdapterError, SourceAdapter};
use metaseries_core::domain::{Frequency, Observation};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Exchange holidays the mock skips on its daily calendar.
const HOLIDAYS: [&str; 2] = ["2024-01-01", "2024-01-15"];

/// Weekdays in `[start, end]` minus [`HOLIDAYS`].
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .filter(|day| !HOLIDAYS.iter().any(|h| d(h) == *day))
        .collect()
}

/// Period-end dates of `frequency` that fall in `[start, end]`.
pub fn period_ends(frequency: Frequency, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut label = frequency.period_end(start);
    while label <= end {
        out.push(label);
        label = frequency.next_period_end(label);
    }
    out
}

struct MockSymbol {
    frequency: Frequency,
    delay: Duration,
    failure: Option<fn(&str) -> AdapterError>,
}

/// Configurable in-memory source that counts calls and records completion order.
pub struct MockSource {
    name: String,
    symbols: HashMap<String, MockSymbol>,
    calls: AtomicUsize,
    completed: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            symbols: HashMap::new(),
            calls: AtomicUsize::new(0),
            completed: Mutex::new(Vec::new()),
        }
    }

    /// Serve `symbol` at `frequency` (daily means business days).
    pub fn with_symbol(mut self, symbol: &str, frequency: Frequency) -> Self {
        self.symbols.insert(
            symbol.to_string(),
            MockSymbol {
                frequency,
                delay: Duration::ZERO,
                failure: None,
            },
        );
        self
    }

    /// Sleep before answering for `symbol`.
    pub fn with_delay(mut self, symbol: &str, delay: Duration) -> Self {
        if let Some(entry) = self.symbols.get_mut(symbol) {
            entry.delay = delay;
        }
        self
    }

    /// Answer `symbol` with `NotFound`.
    pub fn with_not_found(mut self, symbol: &str) -> Self {
        self.symbols.insert(
            symbol.to_string(),
            MockSymbol {
                frequency: Frequency::Daily,
                delay: Duration::ZERO,
                failure: Some(|symbol| AdapterError::NotFound {
                    symbol: symbol.to_string(),
                }),
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

impl SourceAdapter for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(
        &self,
        symbol: &str,
        _field: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let entry = self
            .symbols
            .get(symbol)
            .ok_or_else(|| AdapterError::Unavailable(format!("no mock for {symbol}")))?;
        if !entry.delay.is_zero() {
            std::thread::sleep(entry.delay);
        }
        self.completed.lock().unwrap().push(symbol.to_string());
        if let Some(failure) = entry.failure {
            return Err(failure(symbol));
        }

        let dates = match entry.frequency {
            Frequency::Daily => business_days(start, end),
            other => period_ends(other, start, end),
        };
        Ok(dates
            .into_iter()
            .enumerate()
            .map(|(i, date)| Observation::new(date, 100.0 + i as f64))
            .collect())
    }
}
