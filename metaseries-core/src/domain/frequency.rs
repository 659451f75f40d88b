//! Sampling frequencies and their calendar periods.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Native or target sampling cadence of a series.
///
/// Variants are ordered from finest to coarsest, so `Daily < Annual`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl Frequency {
    pub const ALL: [Frequency; 5] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Quarterly,
        Frequency::Annual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Annual => "annual",
        }
    }

    /// Last calendar day of the period containing `date`.
    ///
    /// Weeks end on Sunday; months, quarters and years end on their last
    /// calendar day.
    pub fn period_end(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => date,
            Frequency::Weekly => {
                let to_sunday = 6 - i64::from(date.weekday().num_days_from_monday());
                date + Duration::days(to_sunday)
            }
            Frequency::Monthly => month_end(date.year(), date.month()),
            Frequency::Quarterly => {
                let quarter_end_month = (date.month() - 1) / 3 * 3 + 3;
                month_end(date.year(), quarter_end_month)
            }
            Frequency::Annual => month_end(date.year(), 12),
        }
    }

    /// Label of the period immediately after the one labelled `label`.
    pub fn next_period_end(&self, label: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => label + Duration::days(1),
            Frequency::Weekly => label + Duration::days(7),
            _ => self.period_end(label + Duration::days(1)),
        }
    }
}

fn month_end(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    // Day 1 of any month in chrono's supported range is always valid.
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .map(|first| first - Duration::days(1))
        .unwrap_or(NaiveDate::MAX)
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown frequency '{0}' (expected daily, weekly, monthly, quarterly or annual)")]
pub struct FrequencyParseError(pub String);

impl FromStr for Frequency {
    type Err = FrequencyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "d" => Ok(Frequency::Daily),
            "weekly" | "w" => Ok(Frequency::Weekly),
            "monthly" | "me" | "m" => Ok(Frequency::Monthly),
            "quarterly" | "qe" | "q" => Ok(Frequency::Quarterly),
            "annual" | "yearly" | "ye" | "y" => Ok(Frequency::Annual),
            _ => Err(FrequencyParseError(s.to_string())),
        }
    }
}
