//! Writing assembled tables as CSV, Parquet or JSON.
//!
//! Wide layout: `date` then one column per series, empty cell when absent.
//! Long layout: `date,name,value`, one row per present observation.

use crate::domain::{AssembledTable, LongRow, DATE_COLUMN};
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown output format '{0}' (expected csv, parquet or json)")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Wide,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Parquet,
    Json,
}

impl ExportFormat {
    /// Format implied by a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ext.parse()
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "parquet" | "pq" => Ok(ExportFormat::Parquet),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

/// Write `table` to `path` in `format`.
pub fn write_table(
    table: &AssembledTable,
    path: &Path,
    format: ExportFormat,
    layout: Layout,
) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    match format {
        ExportFormat::Csv => write_csv(table, fs::File::create(path)?, layout)?,
        ExportFormat::Parquet => {
            let mut df = match layout {
                Layout::Wide => to_dataframe(table)?,
                Layout::Long => long_to_dataframe(&table.to_long())?,
            };
            ParquetWriter::new(fs::File::create(path)?)
                .finish(&mut df)
                .map_err(|e| ExportError::Parquet(format!("write parquet: {e}")))?;
        }
        ExportFormat::Json => write_json(table, fs::File::create(path)?, layout)?,
    }
    tracing::info!(
        path = %path.display(),
        ?format,
        ?layout,
        rows = table.row_count(),
        "table_exported"
    );
    Ok(())
}

/// CSV to any writer (a file, stdout).
pub fn write_csv<W: Write>(
    table: &AssembledTable,
    writer: W,
    layout: Layout,
) -> Result<(), ExportError> {
    let mut out = csv::Writer::from_writer(writer);
    match layout {
        Layout::Wide => {
            let mut header = vec![DATE_COLUMN.to_string()];
            header.extend(table.columns.iter().map(|c| c.name.clone()));
            out.write_record(&header)?;
            for (row, date) in table.dates.iter().enumerate() {
                let mut record = vec![date.to_string()];
                record.extend(
                    table
                        .columns
                        .iter()
                        .map(|c| c.values[row].map(|v| v.to_string()).unwrap_or_default()),
                );
                out.write_record(&record)?;
            }
        }
        Layout::Long => {
            out.write_record([DATE_COLUMN, "name", "value"])?;
            for row in table.to_long() {
                out.write_record([row.date.to_string(), row.name, row.value.to_string()])?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// JSON records: wide rows keyed by column name, or long rows.
pub fn write_json<W: Write>(
    table: &AssembledTable,
    writer: W,
    layout: Layout,
) -> Result<(), ExportError> {
    match layout {
        Layout::Wide => {
            let rows: Vec<serde_json::Map<String, serde_json::Value>> = table
                .dates
                .iter()
                .enumerate()
                .map(|(row, date)| {
                    let mut record = serde_json::Map::new();
                    record.insert(DATE_COLUMN.into(), date.to_string().into());
                    for column in &table.columns {
                        let value = column.values[row]
                            .and_then(serde_json::Number::from_f64)
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null);
                        record.insert(column.name.clone(), value);
                    }
                    record
                })
                .collect();
            serde_json::to_writer_pretty(writer, &rows)?;
        }
        Layout::Long => serde_json::to_writer_pretty(writer, &table.to_long())?,
    }
    Ok(())
}

fn days_since_epoch(dates: impl Iterator<Item = NaiveDate>) -> Vec<i32> {
    let epoch = NaiveDate::default();
    dates.map(|d| (d - epoch).num_days() as i32).collect()
}

fn date_column(dates: impl Iterator<Item = NaiveDate>) -> Result<Column, ExportError> {
    Column::new(DATE_COLUMN.into(), days_since_epoch(dates))
        .cast(&DataType::Date)
        .map_err(|e| ExportError::Parquet(format!("date cast: {e}")))
}

/// Wide polars frame: `date` (Date) plus one nullable Float64 column per series.
pub fn to_dataframe(table: &AssembledTable) -> Result<DataFrame, ExportError> {
    let mut columns = Vec::with_capacity(table.columns.len() + 1);
    columns.push(date_column(table.dates.iter().copied())?);
    for column in &table.columns {
        columns.push(Column::new(column.name.as_str().into(), column.values.clone()));
    }
    DataFrame::new(columns).map_err(|e| ExportError::Parquet(format!("dataframe creation: {e}")))
}

/// Long polars frame with `date`, `name`, `value` columns.
pub fn long_to_dataframe(rows: &[LongRow]) -> Result<DataFrame, ExportError> {
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
    DataFrame::new(vec![
        date_column(rows.iter().map(|r| r.date))?,
        Column::new("name".into(), names),
        Column::new("value".into(), values),
    ])
    .map_err(|e| ExportError::Parquet(format!("dataframe creation: {e}")))
}
