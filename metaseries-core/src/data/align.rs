//! Frequency alignment for a single series.
//!
//! One rule covers both directions: bin every observation into the target
//! period that contains it (labelled by the period end), keep the last
//! non-NaN value per period, then walk the period-end grid from the first
//! to the last label carrying the previous value into empty periods.
//!
//! - Upsampling (quarterly -> daily) becomes a forward fill. Nothing is
//!   emitted before the first known value.
//! - Downsampling (daily -> monthly) keeps the last observation of each
//!   period.
//! - Equal frequency reindexes onto the period-end grid and leaves values
//!   unchanged.
//!
//! No interpolation, and no looking across series.

use crate::domain::{Frequency, Observation, Series};
use chrono::NaiveDate;

/// How a native frequency relates to a target frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Target is finer than native (forward fill).
    Upsample,
    /// Target is coarser than native (last value per period).
    Downsample,
    Identity,
}

impl Direction {
    pub fn between(native: Frequency, target: Frequency) -> Self {
        use std::cmp::Ordering;
        match target.cmp(&native) {
            Ordering::Less => Direction::Upsample,
            Ordering::Greater => Direction::Downsample,
            Ordering::Equal => Direction::Identity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upsample => "upsample",
            Direction::Downsample => "downsample",
            Direction::Identity => "identity",
        }
    }
}

/// Resample `series` onto the period-end grid of `target`.
///
/// NaN observations never win a period and never seed the fill. A series
/// without any finite value resamples to an empty series.
pub fn resample(series: &Series, target: Frequency) -> Series {
    let bins = last_per_period(series, target);
    let (Some(&(first, _)), Some(&(last, _))) = (bins.first(), bins.last()) else {
        return Series::new();
    };

    let mut out = Vec::with_capacity(bins.len());
    let mut pending = bins.into_iter().peekable();
    let mut carried = f64::NAN;
    let mut label = first;
    loop {
        if let Some(&(bin_label, value)) = pending.peek() {
            if bin_label == label {
                carried = value;
                pending.next();
            }
        }
        out.push(Observation::new(label, carried));
        if label >= last {
            break;
        }
        label = target.next_period_end(label);
    }

    Series::from_sorted_unchecked(out)
}

/// Resample when a target is given and log the direction; identity otherwise.
pub fn align(series: &Series, native: Frequency, target: Option<Frequency>, name: &str) -> Series {
    let Some(target) = target else {
        return series.clone();
    };
    let direction = Direction::between(native, target);
    let aligned = resample(series, target);
    tracing::debug!(
        name,
        native = %native,
        target = %target,
        direction = direction.as_str(),
        input_rows = series.len(),
        output_rows = aligned.len(),
        "aligning_series"
    );
    aligned
}

/// `(period_end, last finite value)` per non-empty period, ascending.
fn last_per_period(series: &Series, target: Frequency) -> Vec<(NaiveDate, f64)> {
    let mut bins: Vec<(NaiveDate, f64)> = Vec::new();
    for obs in series.points() {
        if obs.value.is_nan() {
            continue;
        }
        let label = target.period_end(obs.date);
        match bins.last_mut() {
            Some((last_label, value)) if *last_label == label => *value = obs.value,
            _ => bins.push((label, obs.value)),
        }
    }
    bins
}
