//! The matching times between two instants.

use crate::error::Result;
use crate::zone::{floor_seconds, Instant};
use crate::{Cron, DayMatching};
use chrono::{Datelike, Duration};
use core::iter::FusedIterator;
use tracing::debug;

/// Range configuration.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RangeOptions {
    /// How a restricted day of month and a restricted day of week combine.
    pub day_matching: DayMatching,
    /// Leaves out the start and stop instants even if they match.
    pub exclude_endpoints: bool,
}

impl RangeOptions {
    #[inline]
    pub fn with_day_matching(mut self, day_matching: DayMatching) -> Self {
        self.day_matching = day_matching;
        self
    }

    #[inline]
    pub fn with_exclude_endpoints(mut self, exclude_endpoints: bool) -> Self {
        self.exclude_endpoints = exclude_endpoints;
        self
    }
}

/// The matching times between two instants, created by [`range`].
#[derive(Debug, Clone)]
pub struct CronRange<T: Instant> {
    cron: Cron,
    cursor: T,
    stop: T,
    forward: bool,
    inclusive: bool,
    max_years: u32,
    done: bool,
}

/// Returns the times matching the expression from `start` to `stop`.
///
/// The times come in ascending order, or descending when `stop` is before `start`. Both ends are
/// included unless the options exclude them. Each step looks as far ahead as the years the range
/// spans, so sparse expressions are still found.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use sundial::{range, RangeOptions};
///
/// let day = |d| {
///     NaiveDate::from_ymd_opt(2015, 1, d)
///         .and_then(|d| d.and_hms_opt(0, 0, 0))
///         .unwrap()
/// };
/// let days: Vec<_> = range(day(1), day(3), "0 0 * * *", RangeOptions::default())
///     .unwrap()
///     .collect();
/// assert_eq!(days, [day(1), day(2), day(3)]);
///
/// let open = RangeOptions::default().with_exclude_endpoints(true);
/// let days: Vec<_> = range(day(3), day(1), "0 0 * * *", open).unwrap().collect();
/// assert_eq!(days, [day(2)]);
/// ```
pub fn range<T: Instant>(
    start: T,
    stop: T,
    expr: &str,
    options: RangeOptions,
) -> Result<CronRange<T>> {
    let cron = expr.parse::<Cron>()?.with_day_matching(options.day_matching);
    Ok(CronRange::new(cron, start, stop, !options.exclude_endpoints))
}

impl<T: Instant> CronRange<T> {
    fn new(cron: Cron, start: T, stop: T, inclusive: bool) -> Self {
        let forward = start <= stop;

        let start_year = start.to_zoned().naive_local().year();
        let stop_year = stop.to_zoned().naive_local().year();
        let max_years = start_year.abs_diff(stop_year).saturating_add(1);

        // Steps are strict and run on whole seconds. The cursor sits one second outside a whole
        // start when it is included. A fractional start is never a match, so the cursor goes to
        // the whole second on its far side.
        let zoned = start.to_zoned();
        let floored = floor_seconds(&zoned);
        let whole = floored == zoned;
        let shifted = match (forward, whole) {
            (true, true) if inclusive => floored.checked_sub_signed(Duration::seconds(1)),
            (true, _) => Some(floored),
            (false, true) if !inclusive => Some(floored),
            (false, _) => floored.checked_add_signed(Duration::seconds(1)),
        };
        let cursor = shifted.map(T::from_zoned).unwrap_or(start);

        Self {
            cron,
            cursor,
            stop,
            forward,
            inclusive,
            max_years,
            done: false,
        }
    }

    /// Returns the underlying cron value.
    #[inline]
    pub fn cron(&self) -> &Cron {
        &self.cron
    }

    fn within(&self, time: &T) -> bool {
        match (self.forward, self.inclusive) {
            (true, true) => *time <= self.stop,
            (true, false) => *time < self.stop,
            (false, true) => *time >= self.stop,
            (false, false) => *time > self.stop,
        }
    }
}

impl<T: Instant> Iterator for CronRange<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let step = if self.forward {
            self.cron.next_after(&self.cursor, self.max_years)
        } else {
            self.cron.previous_before(&self.cursor, self.max_years)
        };

        match step {
            Ok(time) if self.within(&time) => {
                self.cursor = time.clone();
                Some(time)
            }
            Ok(_) => {
                self.done = true;
                None
            }
            Err(err) => {
                debug!(%err, cron = %self.cron, "cron range ended");
                self.done = true;
                None
            }
        }
    }
}

impl<T: Instant> FusedIterator for CronRange<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CronError;
    use chrono::{NaiveDateTime, TimeZone};
    use chrono_tz::US::Eastern;

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%F %T").expect("Failed to parse date")
    }

    fn collect(start: &str, stop: &str, expr: &str, options: RangeOptions) -> Vec<NaiveDateTime> {
        range(naive(start), naive(stop), expr, options)
            .expect("Failed to parse cron expression")
            .collect()
    }

    #[test]
    fn daily_including_endpoints() {
        let days = collect(
            "2016-01-01 00:00:00",
            "2016-01-07 00:00:00",
            "0 0 * * *",
            RangeOptions::default(),
        );
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], naive("2016-01-01 00:00:00"));
        assert_eq!(days[6], naive("2016-01-07 00:00:00"));
    }

    #[test]
    fn daily_excluding_endpoints() {
        let options = RangeOptions::default().with_exclude_endpoints(true);
        let days = collect("2016-01-01 00:00:00", "2016-01-07 00:00:00", "0 0 * * *", options);
        assert_eq!(days.len(), 5);
        assert_eq!(days[0], naive("2016-01-02 00:00:00"));
    }

    #[test]
    fn reverse_order() {
        let days = collect(
            "2016-01-07 00:00:00",
            "2016-01-01 00:00:00",
            "0 0 * * *",
            RangeOptions::default(),
        );
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], naive("2016-01-07 00:00:00"));
        assert!(days.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn fractional_starts_stay_inside() {
        let start = naive("2020-01-01 00:00:00") + Duration::milliseconds(500);
        let stop = naive("2020-01-03 00:00:00");

        let days: Vec<_> = range(start, stop, "0 0 * * *", RangeOptions::default())
            .unwrap()
            .collect();
        assert_eq!(days, [naive("2020-01-02 00:00:00"), stop]);

        let days: Vec<_> = range(stop, start, "0 0 * * *", RangeOptions::default())
            .unwrap()
            .collect();
        assert_eq!(days, [stop, naive("2020-01-02 00:00:00")]);

        let start = naive("2020-01-02 00:00:00") + Duration::milliseconds(500);
        let open = RangeOptions::default().with_exclude_endpoints(true);
        let days: Vec<_> = range(start, naive("2020-01-01 00:00:00"), "0 0 * * *", open)
            .unwrap()
            .collect();
        assert_eq!(days, [naive("2020-01-02 00:00:00")]);
    }

    #[test]
    fn monthly_over_two_years() {
        let months = collect(
            "2015-01-01 00:00:00",
            "2016-12-31 00:00:00",
            "0 0 1 * *",
            RangeOptions::default(),
        );
        assert_eq!(months.len(), 24);
    }

    #[test]
    fn sparse_matches_use_the_span_as_lookahead() {
        let options = RangeOptions::default().with_day_matching(DayMatching::Intersection);
        let times = collect(
            "2020-09-24 00:00:00",
            "2026-01-01 00:00:00",
            "0 13 8 1,4,7,10 wed",
            options,
        );
        assert_eq!(
            times,
            [naive("2025-01-08 13:00:00"), naive("2025-10-08 13:00:00")]
        );
    }

    #[test]
    fn impossible_expressions_are_empty() {
        let times = collect(
            "2020-01-01 00:00:00",
            "2021-01-01 00:00:00",
            "* * 31 2 *",
            RangeOptions::default(),
        );
        assert!(times.is_empty());
    }

    #[test]
    fn bad_expressions_fail_early() {
        let result = range(
            naive("2020-01-01 00:00:00"),
            naive("2021-01-01 00:00:00"),
            "* * * * * * *",
            RangeOptions::default(),
        );
        assert!(matches!(result, Err(CronError::BadCron { .. })));
    }

    #[test]
    fn across_daylight_saving_changes() {
        let daily: Vec<_> = range(
            Eastern.with_ymd_and_hms(2020, 10, 30, 0, 0, 0).unwrap(),
            Eastern.with_ymd_and_hms(2020, 11, 10, 0, 0, 0).unwrap(),
            "0 0 * * *",
            RangeOptions::default(),
        )
        .unwrap()
        .collect();
        assert_eq!(daily.len(), 12);

        let nightly: Vec<_> = range(
            Eastern.with_ymd_and_hms(2020, 3, 7, 12, 0, 0).unwrap(),
            Eastern.with_ymd_and_hms(2020, 3, 11, 12, 0, 0).unwrap(),
            "0 3 * * *",
            RangeOptions::default(),
        )
        .unwrap()
        .map(|t| t.to_rfc3339())
        .collect();
        assert_eq!(
            nightly,
            [
                "2020-03-08T03:00:00-04:00",
                "2020-03-09T03:00:00-04:00",
                "2020-03-10T03:00:00-04:00",
                "2020-03-11T03:00:00-04:00",
            ]
        );
    }
}
