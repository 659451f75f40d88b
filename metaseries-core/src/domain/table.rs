//! The date-indexed, multi-column result of an assembly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Header of the date axis in wide output; no column may use it.
pub const DATE_COLUMN: &str = "date";

/// One named column, aligned to [`AssembledTable::dates`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub name: String,
    /// Same length as the table's date axis; `None` marks an absent cell.
    pub values: Vec<Option<f64>>,
}

/// Wide table: one row per date (ascending, unique), one column per display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledTable {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<TableColumn>,
}

/// One observation in long ("tall") form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRow {
    pub date: NaiveDate,
    pub name: String,
    pub value: f64,
}

impl AssembledTable {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.dates.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Cell lookup by column name and date.
    pub fn value(&self, name: &str, date: NaiveDate) -> Option<f64> {
        let row = self.dates.binary_search(&date).ok()?;
        self.column(name)?.values[row]
    }

    /// Flatten to long form, ordered by column name then date.
    ///
    /// Absent cells produce no row.
    pub fn to_long(&self) -> Vec<LongRow> {
        let mut columns: Vec<&TableColumn> = self.columns.iter().collect();
        columns.sort_by(|a, b| a.name.cmp(&b.name));

        columns
            .into_iter()
            .flat_map(|column| {
                self.dates
                    .iter()
                    .zip(&column.values)
                    .filter_map(move |(date, &value)| {
                        value.map(|value| LongRow {
                            date: *date,
                            name: column.name.clone(),
                            value,
                        })
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample() -> AssembledTable {
        AssembledTable {
            dates: vec![d("2024-01-01"), d("2024-01-02")],
            columns: vec![
                TableColumn {
                    name: "VIX".into(),
                    values: vec![Some(15.0), None],
                },
                TableColumn {
                    name: "SPX".into(),
                    values: vec![Some(100.0), Some(101.0)],
                },
            ],
        }
    }

    #[test]
    fn value_lookup() {
        let table = sample();
        assert_eq!(table.value("SPX", d("2024-01-02")), Some(101.0));
        assert_eq!(table.value("VIX", d("2024-01-02")), None);
        assert_eq!(table.value("VIX", d("2024-03-01")), None);
        assert_eq!(table.value("NOPE", d("2024-01-01")), None);
    }

    #[test]
    fn long_form_sorted_by_name_then_date_and_skips_absent() {
        let rows = sample().to_long();
        let keys: Vec<(&str, NaiveDate)> = rows.iter().map(|r| (r.name.as_str(), r.date)).collect();
        assert_eq!(
            keys,
            vec![
                ("SPX", d("2024-01-01")),
                ("SPX", d("2024-01-02")),
                ("VIX", d("2024-01-01")),
            ]
        );
    }
}
