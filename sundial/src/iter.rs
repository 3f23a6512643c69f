//! A cursor over the matching times of an expression.

use crate::error::Result;
use crate::zone::Instant;
use crate::{Cron, DayMatching};
use core::iter::FusedIterator;
use tracing::debug;

/// Iterator configuration.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IterOptions {
    /// How a restricted day of month and a restricted day of week combine.
    pub day_matching: DayMatching,
    /// How many calendar years a single step searches before giving up. Values below 1 count
    /// as 1.
    pub max_years_between_matches: u32,
}

impl Default for IterOptions {
    fn default() -> Self {
        Self {
            day_matching: DayMatching::Union,
            max_years_between_matches: 1,
        }
    }
}

impl IterOptions {
    #[inline]
    pub fn with_day_matching(mut self, day_matching: DayMatching) -> Self {
        self.day_matching = day_matching;
        self
    }

    #[inline]
    pub fn with_max_years_between_matches(mut self, years: u32) -> Self {
        self.max_years_between_matches = years;
        self
    }
}

/// Steps through the matching times of an expression from a cursor, in either direction.
///
/// [`next_match`](CronIter::next_match) and [`previous_match`](CronIter::previous_match) move the
/// cursor to the time they return. Iterating yields the following times and ends once a step
/// fails to find one within the lookahead.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use sundial::{CronIter, DayMatching, IterOptions};
///
/// let start = NaiveDate::from_ymd_opt(2020, 9, 24)
///     .and_then(|d| d.and_hms_opt(0, 0, 0))
///     .unwrap();
/// let options = IterOptions::default()
///     .with_day_matching(DayMatching::Intersection)
///     .with_max_years_between_matches(5);
/// let mut iter = CronIter::with_options("0 13 8 1,4,7,10 wed", start, options).unwrap();
///
/// assert_eq!(iter.next_match().unwrap().to_string(), "2025-01-08 13:00:00");
/// assert_eq!(iter.previous_match().unwrap().to_string(), "2020-07-08 13:00:00");
/// ```
#[derive(Debug, Clone)]
pub struct CronIter<T: Instant> {
    cron: Cron,
    current: T,
    max_years: u32,
    exhausted: bool,
}

impl<T: Instant> CronIter<T> {
    /// Expands the expression and starts at the given instant, with the default options.
    #[inline]
    pub fn new(expr: &str, start: T) -> Result<Self> {
        Self::with_options(expr, start, IterOptions::default())
    }

    pub fn with_options(expr: &str, start: T, options: IterOptions) -> Result<Self> {
        let cron = expr.parse::<Cron>()?.with_day_matching(options.day_matching);
        let mut iter = Self::from_cron(cron, start);
        iter.max_years = options.max_years_between_matches.max(1);
        Ok(iter)
    }

    /// Starts at the given instant with an already compiled expression and the default lookahead.
    pub fn from_cron(cron: Cron, start: T) -> Self {
        Self {
            cron,
            current: start,
            max_years: IterOptions::default().max_years_between_matches,
            exhausted: false,
        }
    }

    /// Moves to the first matching time after the cursor and returns it. The cursor stays put on
    /// error.
    pub fn next_match(&mut self) -> Result<T> {
        let next = self.cron.next_after(&self.current, self.max_years)?;
        self.current = next.clone();
        Ok(next)
    }

    /// Moves to the last matching time before the cursor and returns it. The cursor stays put on
    /// error.
    pub fn previous_match(&mut self) -> Result<T> {
        let previous = self.cron.previous_before(&self.current, self.max_years)?;
        self.current = previous.clone();
        Ok(previous)
    }

    #[inline]
    pub fn current(&self) -> &T {
        &self.current
    }

    /// Moves the cursor. Iteration resumes if it had ended.
    pub fn set_current(&mut self, current: T) {
        self.current = current;
        self.exhausted = false;
    }

    /// Returns the underlying cron value.
    #[inline]
    pub fn cron(&self) -> &Cron {
        &self.cron
    }
}

impl<T: Instant> Iterator for CronIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        match self.next_match() {
            Ok(next) => Some(next),
            Err(err) => {
                debug!(%err, cron = %self.cron, "cron iterator ended");
                self.exhausted = true;
                None
            }
        }
    }
}

impl<T: Instant> FusedIterator for CronIter<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CronError;
    use chrono::{NaiveDateTime, TimeZone, Utc};
    use chrono_tz::Europe::Warsaw;

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%F %T").expect("Failed to parse date")
    }

    #[test]
    fn moves_in_both_directions() {
        let start = naive("2021-01-01 00:00:00");
        let mut iter = CronIter::new("0 */6 * * *", start).unwrap();

        assert_eq!(iter.next_match(), Ok(naive("2021-01-01 06:00:00")));
        assert_eq!(iter.next_match(), Ok(naive("2021-01-01 12:00:00")));
        assert_eq!(iter.current(), &naive("2021-01-01 12:00:00"));
        assert_eq!(iter.previous_match(), Ok(naive("2021-01-01 06:00:00")));
        assert_eq!(iter.previous_match(), Ok(start));
        assert_eq!(iter.previous_match(), Ok(naive("2020-12-31 18:00:00")));
    }

    #[test]
    fn set_current_seeks() {
        let mut iter = CronIter::new("30 9 * * mon", naive("2021-01-01 00:00:00")).unwrap();
        iter.set_current(naive("2021-06-01 00:00:00"));
        assert_eq!(iter.next_match(), Ok(naive("2021-06-07 09:30:00")));
    }

    #[test]
    fn construction_validates() {
        let start = naive("2021-01-01 00:00:00");
        assert!(matches!(
            CronIter::new("* * * *", start),
            Err(CronError::BadCron { .. })
        ));
        assert!(matches!(
            CronIter::new("* * * janu-jun *", start),
            Err(CronError::NotAlpha { .. })
        ));
        assert!(matches!(
            CronIter::new("0 0 * * 5,6#3", start),
            Err(CronError::UnsupportedSyntax { .. })
        ));
    }

    #[test]
    fn failed_steps_keep_the_cursor() {
        let start = naive("2021-01-01 00:00:00");
        let mut iter = CronIter::new("* * 30 2 *", start).unwrap();
        assert!(matches!(iter.next_match(), Err(CronError::BadDate { .. })));
        assert_eq!(iter.current(), &start);
    }

    #[test]
    fn lookahead_below_one_is_one() {
        let start = naive("2020-09-24 00:00:00");
        let options = IterOptions::default().with_max_years_between_matches(0);
        let mut iter = CronIter::with_options("0 0 1 1 *", start, options).unwrap();
        assert_eq!(iter.next_match(), Ok(naive("2021-01-01 00:00:00")));
    }

    #[test]
    fn largest_lookahead_still_steps() {
        let start = naive("2020-01-01 00:00:00");
        let options = IterOptions::default().with_max_years_between_matches(u32::MAX);
        let mut iter = CronIter::with_options("0 0 * * *", start, options).unwrap();
        assert_eq!(iter.next_match(), Ok(naive("2020-01-02 00:00:00")));
        assert_eq!(iter.previous_match(), Ok(start));
        assert_eq!(iter.previous_match(), Ok(naive("2019-12-31 00:00:00")));
    }

    #[test]
    fn iteration_ends_when_nothing_matches() {
        let start = naive("2021-01-01 00:00:00");
        let mut iter = CronIter::new("0 0 31 4 *", start).unwrap();
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn iterates_zoned_times() {
        let start = Warsaw.with_ymd_and_hms(2017, 3, 26, 0, 0, 0).unwrap();
        let times: Vec<_> = CronIter::new("0 * * * *", start)
            .unwrap()
            .take(3)
            .map(|t| t.to_rfc3339())
            .collect();
        assert_eq!(
            times,
            [
                "2017-03-26T01:00:00+01:00",
                "2017-03-26T03:00:00+02:00",
                "2017-03-26T04:00:00+02:00",
            ]
        );
    }

    #[test]
    fn iter_after_uses_the_compiled_mode() {
        let cron = "0 16 */2 * sat"
            .parse::<Cron>()
            .unwrap()
            .with_day_matching(DayMatching::Intersection);
        let start = Utc.with_ymd_and_hms(2023, 5, 2, 0, 0, 0).unwrap();
        let next = cron.iter_after(start).next();
        assert_eq!(next, Some(Utc.with_ymd_and_hms(2023, 5, 13, 16, 0, 0).unwrap()));
    }
}
