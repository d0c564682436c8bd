use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{DateRange, Granularity};
use crate::statistics::DateRangeError;

/// Maximum span (`end - start`, in days) accepted per granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsLimits {
    pub max_daily_span_days: i64,
    pub max_hourly_span_days: i64,
}

impl StatisticsLimits {
    pub const DEFAULT_MAX_DAILY_SPAN_DAYS: i64 = 30;
    pub const DEFAULT_MAX_HOURLY_SPAN_DAYS: i64 = 7;

    /// Check `start <= end` and the granularity ceiling, yielding the validated range.
    ///
    /// A zero-day span (`start == end`) is a valid single-day range.
    pub fn validate(
        &self,
        granularity: Granularity,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DateRange, DateRangeError> {
        let diff = (end - start).num_days();
        debug!(%start, %end, diff, %granularity, "validating statistics range");

        if diff < 0 {
            return Err(DateRangeError::StartAfterEnd);
        }

        match granularity {
            Granularity::Day if diff > self.max_daily_span_days => {
                Err(DateRangeError::TooLongForDaily {
                    max_days: self.max_daily_span_days,
                })
            }
            Granularity::Hour if diff > self.max_hourly_span_days => {
                Err(DateRangeError::TooLongForHourly {
                    max_days: self.max_hourly_span_days,
                })
            }
            _ => Ok(DateRange::new_validated(start, end)),
        }
    }
}

impl Default for StatisticsLimits {
    fn default() -> Self {
        Self {
            max_daily_span_days: Self::DEFAULT_MAX_DAILY_SPAN_DAYS,
            max_hourly_span_days: Self::DEFAULT_MAX_HOURLY_SPAN_DAYS,
        }
    }
}
