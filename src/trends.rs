// 📈 Trend Analytics - Spending resampled onto a fixed time grid
//
// Charts need a continuous axis: a category with entries in January and
// March must show a zero for February, not a line interpolated across the
// gap. Entries are bucketed by week (Monday start) or calendar month, and
// every bucket between the first and last occupied one is emitted.

use crate::db::SpendingEntry;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// FREQUENCY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendFrequency {
    /// Buckets start on Monday
    Weekly,
    /// Buckets start on the first of the month
    Monthly,
}

impl TrendFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendFrequency::Weekly => "weekly",
            TrendFrequency::Monthly => "monthly",
        }
    }

    /// Parse the URL form ("weekly" / "monthly")
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "weekly" | "w" => Some(TrendFrequency::Weekly),
            "monthly" | "m" => Some(TrendFrequency::Monthly),
            _ => None,
        }
    }
}

// ============================================================================
// SERIES TYPES
// ============================================================================

/// One point on a trend line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period_start: NaiveDate,
    pub total: f64,
}

/// A category's spending resampled at a fixed frequency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSeries {
    pub category: String,
    pub frequency: TrendFrequency,
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sum over all points (equals the sum of the underlying entries)
    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.total).sum()
    }
}

// ============================================================================
// BUCKETING
// ============================================================================

/// Snap a date to the start of its bucket
pub fn bucket_start(date: NaiveDate, frequency: TrendFrequency) -> NaiveDate {
    match frequency {
        TrendFrequency::Weekly => {
            date - Duration::days(date.weekday().num_days_from_monday() as i64)
        }
        TrendFrequency::Monthly => date - Duration::days((date.day() - 1) as i64),
    }
}

/// Start of the bucket after `start` (`start` must itself be a bucket start)
fn next_bucket(start: NaiveDate, frequency: TrendFrequency) -> NaiveDate {
    match frequency {
        TrendFrequency::Weekly => start + Duration::days(7),
        TrendFrequency::Monthly => {
            // 32 days past the first always lands in the next month
            let probe = start + Duration::days(32);
            probe - Duration::days((probe.day() - 1) as i64)
        }
    }
}

// ============================================================================
// RESAMPLING
// ============================================================================

/// Resample one category's spending onto the bucket grid.
///
/// Buckets with no entries between the first and last occupied bucket are
/// included with a total of 0.0 so the series has no gaps. An unknown
/// category (or no entries at all) yields an empty series.
pub fn trend_for_category(
    entries: &[SpendingEntry],
    category: &str,
    frequency: TrendFrequency,
) -> TrendSeries {
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for entry in entries.iter().filter(|e| e.category == category) {
        let bucket = bucket_start(entry.date(), frequency);
        *buckets.entry(bucket).or_insert(0.0) += entry.amount;
    }

    let mut points = Vec::new();

    if let (Some(&first), Some(&last)) = (
        buckets.keys().next(),
        buckets.keys().next_back(),
    ) {
        let mut cursor = first;
        while cursor <= last {
            points.push(TrendPoint {
                period_start: cursor,
                total: buckets.get(&cursor).copied().unwrap_or(0.0),
            });
            cursor = next_bucket(cursor, frequency);
        }
    }

    TrendSeries {
        category: category.to_string(),
        frequency,
        points,
    }
}

/// One series per selected category
pub fn trends_for_categories(
    entries: &[SpendingEntry],
    categories: &[String],
    frequency: TrendFrequency,
) -> Vec<TrendSeries> {
    categories
        .iter()
        .map(|category| trend_for_category(entries, category, frequency))
        .collect()
}
