use thiserror::Error;

/// Reasons a requested date range is rejected before any data access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DateRangeError {
    #[error("start date is after end date")]
    StartAfterEnd,
    #[error("daily statistics can span at most {max_days} days")]
    TooLongForDaily { max_days: i64 },
    #[error("hourly statistics can span at most {max_days} days")]
    TooLongForHourly { max_days: i64 },
}

impl DateRangeError {
    pub const fn code(&self) -> &'static str {
        match self {
            DateRangeError::StartAfterEnd => "STATISTICS_INVALID_DATE_RANGE_START_AFTER_END",
            DateRangeError::TooLongForDaily { .. } => "STATISTICS_INVALID_DATE_RANGE_TOO_LONG_DATE",
            DateRangeError::TooLongForHourly { .. } => "STATISTICS_INVALID_DATE_RANGE_TOO_LONG_HOUR",
        }
    }
}

#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error("invalid date range: {0}")]
    InvalidDateRange(#[from] DateRangeError),
    #[error("unknown metric kind '{0}'")]
    UnknownMetricKind(String),
    #[error("unknown statistics granularity '{0}'")]
    UnknownGranularity(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl StatisticsError {
    /// Stable machine-readable code for reporting to callers
    pub const fn code(&self) -> &'static str {
        match self {
            StatisticsError::InvalidDateRange(err) => err.code(),
            StatisticsError::UnknownMetricKind(_) => "STATISTICS_UNKNOWN_METRIC",
            StatisticsError::UnknownGranularity(_) => "STATISTICS_UNKNOWN_TYPE",
            StatisticsError::Storage(_) => "STATISTICS_STORAGE_FAILURE",
        }
    }

    /// Whether the caller sent a bad request, as opposed to a backend failure
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, StatisticsError::Storage(_))
    }
}
