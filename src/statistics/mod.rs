//! Hashtag engagement statistics
//!
//! Turns a (hashtag, metric, granularity, date range) request into a dense,
//! chronologically ordered series of buckets:
//!
//! 1. the range is validated against granularity-specific ceilings,
//! 2. the hashtag is resolved to the posts carrying it,
//! 3. the counter source for the metric returns sparse per-bucket counts,
//! 4. a zero-filled template covering every bucket of the range is built,
//! 5. the sparse counts are merged into the template.
//!
//! Everything here is read-only; no state survives a request.

pub mod bucketer;
pub mod counter;
pub mod error;
pub mod merger;
pub mod range;
pub mod service;

pub use bucketer::build_template;
pub use counter::{CounterSource, CounterSources};
pub use error::{DateRangeError, StatisticsError};
pub use merger::merge;
pub use range::StatisticsLimits;
pub use service::StatisticsService;
