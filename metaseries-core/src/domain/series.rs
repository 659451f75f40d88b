//! Ordered, date-unique run of observations for one column.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One `(date, value)` point.
///
/// `value` may be NaN when the upstream published a gap; alignment treats
/// NaN as "not observed".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Single-column time series, sorted ascending by date with unique dates.
///
/// Every constructor normalises its input, so the invariant holds for any
/// `Series` a caller can observe. Deserialisation goes through
/// [`Series::from_points`] as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "SeriesRepr", into = "SeriesRepr")]
pub struct Series {
    points: Vec<Observation>,
}

/// Wire shape of [`Series`]: `{"points": [...]}`.
#[derive(Serialize, Deserialize)]
struct SeriesRepr {
    points: Vec<Observation>,
}

impl From<SeriesRepr> for Series {
    fn from(repr: SeriesRepr) -> Self {
        Self::from_points(repr.points)
    }
}

impl From<Series> for SeriesRepr {
    fn from(series: Series) -> Self {
        Self {
            points: series.points,
        }
    }
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from unordered points. A later duplicate date
    /// overwrites an earlier one.
    pub fn from_points(points: impl IntoIterator<Item = Observation>) -> Self {
        let mut points: Vec<Observation> = points.into_iter().collect();
        // Stable sort keeps input order among equal dates, so the last
        // occurrence of a date is the one that survives the dedup below.
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<Observation> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self { points: deduped }
    }

    /// Build from points the caller guarantees are strictly ascending.
    pub(crate) fn from_sorted_unchecked(points: Vec<Observation>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].date < w[1].date));
        Self { points }
    }

    /// Insert or overwrite the value at `date`.
    pub fn insert(&mut self, date: NaiveDate, value: f64) {
        match self.points.binary_search_by_key(&date, |p| p.date) {
            Ok(i) => self.points[i].value = value,
            Err(i) => self.points.insert(i, Observation::new(date, value)),
        }
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Observation> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].value)
    }

    /// Points whose date lies in `[start, end]` (inclusive on both ends).
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Series {
        let lo = self.points.partition_point(|p| p.date < start);
        let hi = self.points.partition_point(|p| p.date <= end);
        let points = if lo < hi {
            self.points[lo..hi].to_vec()
        } else {
            Vec::new()
        };
        Self { points }
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|p| p.date)
    }
}

impl FromIterator<Observation> for Series {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self::from_points(iter)
    }
}
