//! Local CSV / Parquet files served through the adapter trait.
//!
//! A file holds one date column and one column per series; the adapter's
//! symbol is the column name. The file is re-read on every fetch so edits
//! show up after a cache bypass.

use super::provider::{AdapterError, SourceAdapter};
use crate::domain::Observation;
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk layout of a local source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Header row; first column holds `YYYY-MM-DD` dates.
    Csv,
    /// A `date` column of type Date (or a string column in `YYYY-MM-DD`).
    Parquet,
}

impl FileKind {
    /// Guess the kind from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(FileKind::Csv),
            "parquet" | "pq" => Some(FileKind::Parquet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalFileSource {
    name: String,
    path: PathBuf,
    kind: FileKind,
}

impl LocalFileSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
        }
    }

    pub fn csv(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(name, path, FileKind::Csv)
    }

    pub fn parquet(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(name, path, FileKind::Parquet)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    fn read_column(&self, symbol: &str) -> Result<Vec<Observation>, AdapterError> {
        if !self.path.exists() {
            return Err(AdapterError::Unavailable(format!(
                "file not found: {}",
                self.path.display()
            )));
        }
        match self.kind {
            FileKind::Csv => read_csv_column(&self.path, symbol),
            FileKind::Parquet => read_parquet_column(&self.path, symbol),
        }
    }
}

impl SourceAdapter for LocalFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(
        &self,
        symbol: &str,
        field: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, AdapterError> {
        if let Some(field) = field {
            tracing::error!(source = %self.name, symbol, field, "fetch_failed: field not supported");
            return Err(AdapterError::NotFound {
                symbol: format!("{symbol}[{field}]"),
            });
        }
        tracing::debug!(
            source = %self.name,
            path = %self.path.display(),
            symbol,
            %start,
            %end,
            "fetch_start"
        );

        let points: Vec<Observation> = self
            .read_column(symbol)?
            .into_iter()
            .filter(|obs| start <= obs.date && obs.date <= end)
            .collect();

        tracing::info!(source = %self.name, symbol, rows = points.len(), "fetch_complete");
        Ok(points)
    }
}

fn unavailable(path: &Path, what: impl std::fmt::Display) -> AdapterError {
    AdapterError::Unavailable(format!("{}: {what}", path.display()))
}

/// Accepts `YYYY-MM-DD` optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn read_csv_column(path: &Path, symbol: &str) -> Result<Vec<Observation>, AdapterError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| unavailable(path, e))?;

    let headers = reader.headers().map_err(|e| unavailable(path, e))?.clone();
    let column = headers
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, name)| *name == symbol)
        .map(|(i, _)| i)
        .ok_or_else(|| AdapterError::NotFound {
            symbol: symbol.to_string(),
        })?;

    let mut points = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| unavailable(path, e))?;
        let raw_date = record.get(0).unwrap_or_default();
        let date = parse_date(raw_date)
            .ok_or_else(|| unavailable(path, format!("bad date '{raw_date}' at row {}", row + 1)))?;
        let raw_value = record.get(column).unwrap_or_default();
        if raw_value.is_empty() {
            continue;
        }
        let value: f64 = raw_value.parse().map_err(|_| {
            unavailable(path, format!("bad value '{raw_value}' at row {}", row + 1))
        })?;
        points.push(Observation::new(date, value));
    }
    Ok(points)
}

fn read_parquet_column(path: &Path, symbol: &str) -> Result<Vec<Observation>, AdapterError> {
    let file = fs::File::open(path).map_err(|e| unavailable(path, e))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| unavailable(path, format!("read: {e}")))?;

    let values = df.column(symbol).map_err(|_| AdapterError::NotFound {
        symbol: symbol.to_string(),
    })?;
    let values = values
        .cast(&DataType::Float64)
        .map_err(|e| unavailable(path, format!("{symbol} column type: {e}")))?;
    let value_ca = values
        .f64()
        .map_err(|e| unavailable(path, format!("{symbol} column type: {e}")))?;

    let dates = df
        .column("date")
        .map_err(|e| unavailable(path, format!("date column: {e}")))?
        .cast(&DataType::Date)
        .map_err(|e| unavailable(path, format!("date column type: {e}")))?;
    let date_ca = dates
        .date()
        .map_err(|e| unavailable(path, format!("date column type: {e}")))?;

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let mut points = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| unavailable(path, format!("null date at row {i}")))?;
        // Nulls are empty cells.
        if let Some(value) = value_ca.get(i) {
            points.push(Observation::new(epoch + Duration::days(i64::from(days)), value));
        }
    }
    Ok(points)
}
