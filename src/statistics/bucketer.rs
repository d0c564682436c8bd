//! Zero-filled bucket templates covering a whole date range

use chrono::NaiveDate;

use crate::models::{Bucket, DateRange, Granularity};

const HOURS_PER_DAY: u32 = 24;

/// Build the dense, ordered bucket sequence for `range`, every value 0.
///
/// Daily ranges yield one bucket per calendar day; hourly ranges yield one
/// bucket per hour from `start 00:00` through `end 23:00`. The returned order
/// is the final output order of a statistics series.
pub fn build_template(granularity: Granularity, range: &DateRange) -> Vec<Bucket> {
    let days = range.start().iter_days().take(day_count(range));

    match granularity {
        Granularity::Day => days.map(|day| Bucket::empty(day_label(day))).collect(),
        Granularity::Hour => days
            .flat_map(|day| {
                let day = day_label(day);
                (0..HOURS_PER_DAY).map(move |hour| Bucket::empty(format!("{day} {hour:02}:00")))
            })
            .collect(),
    }
}

fn day_count(range: &DateRange) -> usize {
    usize::try_from(range.days()).unwrap_or(0)
}

fn day_label(day: NaiveDate) -> String {
    day.format(Granularity::Day.label_format()).to_string()
}
