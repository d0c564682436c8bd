//! Statistics request/response types

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::EventKind;
use crate::statistics::StatisticsError;

const SECONDS_PER_DAY: i64 = 86_400;

/// Width of one bucket in a statistics series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[serde(alias = "date")]
    Day,
    Hour,
}

impl Granularity {
    /// `strftime`-style pattern of the bucket labels (`2024-08-01`, `2024-08-01 13:00`)
    pub const fn label_format(self) -> &'static str {
        match self {
            Granularity::Day => "%Y-%m-%d",
            Granularity::Hour => "%Y-%m-%d %H:00",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Hour => "hour",
        }
    }
}

impl FromStr for Granularity {
    type Err = StatisticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "date" | "daily" => Ok(Granularity::Day),
            "hour" | "hourly" => Ok(Granularity::Hour),
            _ => Err(StatisticsError::UnknownGranularity(s.to_string())),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which engagement counter a statistics request reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[serde(alias = "count")]
    PostCount,
    LikeCount,
    ViewCount,
    ShareCount,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::PostCount,
        MetricKind::LikeCount,
        MetricKind::ViewCount,
        MetricKind::ShareCount,
    ];

    /// Event type counted for this metric
    pub const fn event_kind(self) -> EventKind {
        match self {
            MetricKind::PostCount => EventKind::Post,
            MetricKind::LikeCount => EventKind::Like,
            MetricKind::ViewCount => EventKind::View,
            MetricKind::ShareCount => EventKind::Share,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MetricKind::PostCount => "post_count",
            MetricKind::LikeCount => "like_count",
            MetricKind::ViewCount => "view_count",
            MetricKind::ShareCount => "share_count",
        }
    }
}

impl FromStr for MetricKind {
    type Err = StatisticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "count" | "post_count" => Ok(MetricKind::PostCount),
            "like_count" => Ok(MetricKind::LikeCount),
            "view_count" => Ok(MetricKind::ViewCount),
            "share_count" => Ok(MetricKind::ShareCount),
            _ => Err(StatisticsError::UnknownMetricKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive calendar-date range that already passed range validation.
///
/// Only `StatisticsLimits::validate` builds one, so `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub(crate) const fn new_validated(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, counting both ends
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Half-open Unix-second window `[start 00:00, end+1 00:00)` in UTC
    pub fn unix_bounds(&self) -> (i64, i64) {
        let from = self.start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let until = self.end.and_time(NaiveTime::MIN).and_utc().timestamp() + SECONDS_PER_DAY;
        (from, until)
    }
}

/// One slot of a statistics series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(rename = "time")]
    pub label: String,
    pub value: u64,
}

impl Bucket {
    pub fn empty(label: String) -> Self {
        Self { label, value: 0 }
    }
}

/// Count reported by a counter source for a label that saw at least one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseCount {
    pub label: String,
    pub value: u64,
}

impl SparseCount {
    pub fn new(label: impl Into<String>, value: u64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Caller-facing statistics request
#[derive(Debug, Clone, Deserialize)]
pub struct StatisticsRequest {
    /// Hashtag to aggregate over; the caller's own account when absent
    #[serde(default)]
    pub hashtag: Option<String>,
    #[serde(rename = "value")]
    pub metric: MetricKind,
    #[serde(rename = "type")]
    pub granularity: Granularity,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StatisticsRequest {
    pub fn resolve_hashtag(&self, caller_account: &str) -> String {
        match self.hashtag.as_deref() {
            Some(tag) if !tag.trim().is_empty() => tag.to_string(),
            _ => caller_account.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_metric_kind() {
        assert_eq!("count".parse::<MetricKind>().unwrap(), MetricKind::PostCount);
        assert_eq!("LIKE_COUNT".parse::<MetricKind>().unwrap(), MetricKind::LikeCount);
        assert_eq!("view_count".parse::<MetricKind>().unwrap(), MetricKind::ViewCount);
        assert_eq!("share_count".parse::<MetricKind>().unwrap(), MetricKind::ShareCount);

        let err = "comment_count".parse::<MetricKind>().unwrap_err();
        assert!(matches!(err, StatisticsError::UnknownMetricKind(ref kind) if kind == "comment_count"));
    }

    #[test]
    fn test_parse_granularity() {
        assert_eq!("DATE".parse::<Granularity>().unwrap(), Granularity::Day);
        assert_eq!("hour".parse::<Granularity>().unwrap(), Granularity::Hour);
        assert!(matches!(
            "week".parse::<Granularity>(),
            Err(StatisticsError::UnknownGranularity(_))
        ));
    }

    #[test]
    fn test_every_metric_maps_to_distinct_event() {
        let kinds: std::collections::HashSet<EventKind> =
            MetricKind::ALL.iter().map(|m| m.event_kind()).collect();
        assert_eq!(kinds.len(), MetricKind::ALL.len());
    }

    #[test]
    fn test_date_range_bounds() {
        let range = DateRange::new_validated(date(2024, 8, 1), date(2024, 8, 2));
        assert_eq!(range.days(), 2);
        // 2024-08-01T00:00:00Z .. 2024-08-03T00:00:00Z
        assert_eq!(range.unix_bounds(), (1_722_470_400, 1_722_643_200));
    }

    #[test]
    fn test_bucket_serializes_as_time_value() {
        let bucket = Bucket {
            label: "2024-08-01".to_string(),
            value: 3,
        };
        let json = serde_json::to_value(&bucket).unwrap();
        assert_eq!(json, serde_json::json!({ "time": "2024-08-01", "value": 3 }));
    }

    #[test]
    fn test_request_hashtag_defaults_to_caller() {
        let request: StatisticsRequest = serde_json::from_value(serde_json::json!({
            "type": "date",
            "value": "count",
            "start": "2024-08-01",
            "end": "2024-08-07"
        }))
        .unwrap();
        assert_eq!(request.metric, MetricKind::PostCount);
        assert_eq!(request.granularity, Granularity::Day);
        assert_eq!(request.resolve_hashtag("alice"), "alice");

        let tagged = StatisticsRequest {
            hashtag: Some("#demo".to_string()),
            ..request
        };
        assert_eq!(tagged.resolve_hashtag("alice"), "#demo");
    }
}
