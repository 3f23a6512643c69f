//! Finding the nearest matching time before or after an instant.
//!
//! The search runs on wall clock readings, field by field from the month down to the second,
//! carrying into the coarser field whenever a field runs out of values. Each reading found is
//! then resolved in the time zone. Readings inside a gap fire at the end of the gap, readings
//! inside a fold fire at each of their instants, in real time order. A time fired for a gap
//! reading doesn't match the expression in its own wall clock.

use crate::error::{CronError, Result};
use crate::zone::{floor_seconds, localize, Instant, Localized};
use crate::Cron;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike};
use tracing::debug;

/// The lookahead as a year offset. Lookaheads past the calendar's range reach its end.
#[inline]
fn lookahead(years: u32) -> i32 {
    i32::try_from(years).unwrap_or(i32::MAX)
}

impl Cron {
    /// Returns the earliest matching wall clock reading at or after `from`, searching up to the
    /// end of `last_year`.
    pub(crate) fn next_wall(&self, from: &NaiveDateTime, last_year: i32) -> Option<NaiveDateTime> {
        let mut year = from.year();
        let mut month = from.month() as i32;
        let mut day = from.day() as i32;
        let mut hour = from.hour() as i32;
        let mut minute = from.minute() as i32;
        let mut second = from.second() as i32;

        loop {
            if year > last_year {
                return None;
            }

            match self.months.next_from(month) {
                None => {
                    year += 1;
                    month = 1;
                    day = 1;
                    hour = 0;
                    minute = 0;
                    second = 0;
                    continue;
                }
                Some(next) if next != month => {
                    month = next;
                    day = 1;
                    hour = 0;
                    minute = 0;
                    second = 0;
                }
                Some(_) => {}
            }

            match self.day_mask(year, month as u32).next_from(day) {
                None => {
                    month += 1;
                    day = 1;
                    hour = 0;
                    minute = 0;
                    second = 0;
                    continue;
                }
                Some(next) if next != day => {
                    day = next;
                    hour = 0;
                    minute = 0;
                    second = 0;
                }
                Some(_) => {}
            }

            match self.hours.next_from(hour) {
                None => {
                    day += 1;
                    hour = 0;
                    minute = 0;
                    second = 0;
                    continue;
                }
                Some(next) if next != hour => {
                    hour = next;
                    minute = 0;
                    second = 0;
                }
                Some(_) => {}
            }

            match self.minutes.next_from(minute) {
                None => {
                    hour += 1;
                    minute = 0;
                    second = 0;
                    continue;
                }
                Some(next) if next != minute => {
                    minute = next;
                    second = 0;
                }
                Some(_) => {}
            }

            match self.seconds.next_from(second) {
                None => {
                    minute += 1;
                    second = 0;
                    continue;
                }
                Some(next) => second = next,
            }

            return NaiveDate::from_ymd_opt(year, month as u32, day as u32)?.and_hms_opt(
                hour as u32,
                minute as u32,
                second as u32,
            );
        }
    }

    /// Returns the latest matching wall clock reading at or before `from`, searching back to the
    /// start of `first_year`.
    pub(crate) fn previous_wall(
        &self,
        from: &NaiveDateTime,
        first_year: i32,
    ) -> Option<NaiveDateTime> {
        let mut year = from.year();
        let mut month = from.month() as i32;
        let mut day = from.day() as i32;
        let mut hour = from.hour() as i32;
        let mut minute = from.minute() as i32;
        let mut second = from.second() as i32;

        loop {
            if year < first_year {
                return None;
            }

            match self.months.prev_from(month) {
                None => {
                    year -= 1;
                    month = 12;
                    day = 31;
                    hour = 23;
                    minute = 59;
                    second = 59;
                    continue;
                }
                Some(prev) if prev != month => {
                    month = prev;
                    day = 31;
                    hour = 23;
                    minute = 59;
                    second = 59;
                }
                Some(_) => {}
            }

            match self.day_mask(year, month as u32).prev_from(day) {
                None => {
                    month -= 1;
                    day = 31;
                    hour = 23;
                    minute = 59;
                    second = 59;
                    continue;
                }
                Some(prev) if prev != day => {
                    day = prev;
                    hour = 23;
                    minute = 59;
                    second = 59;
                }
                Some(_) => {}
            }

            match self.hours.prev_from(hour) {
                None => {
                    day -= 1;
                    hour = 23;
                    minute = 59;
                    second = 59;
                    continue;
                }
                Some(prev) if prev != hour => {
                    hour = prev;
                    minute = 59;
                    second = 59;
                }
                Some(_) => {}
            }

            match self.minutes.prev_from(minute) {
                None => {
                    hour -= 1;
                    minute = 59;
                    second = 59;
                    continue;
                }
                Some(prev) if prev != minute => {
                    minute = prev;
                    second = 59;
                }
                Some(_) => {}
            }

            match self.seconds.prev_from(second) {
                None => {
                    minute -= 1;
                    second = 59;
                    continue;
                }
                Some(prev) => second = prev,
            }

            return NaiveDate::from_ymd_opt(year, month as u32, day as u32)?.and_hms_opt(
                hour as u32,
                minute as u32,
                second as u32,
            );
        }
    }

    /// Walks matching wall clock readings forward from `from` and returns the first instant
    /// accepted. A fold offers its earlier instant first.
    fn scan_forward<Tz, F>(
        &self,
        tz: &Tz,
        from: NaiveDateTime,
        last_year: i32,
        accept: F,
    ) -> Option<DateTime<Tz>>
    where
        Tz: TimeZone,
        F: Fn(&DateTime<Tz>) -> bool,
    {
        let mut from = from;
        loop {
            let wall = self.next_wall(&from, last_year)?;
            let found = match localize(tz, &wall) {
                Some(Localized::Single(time)) => Some(time).filter(&accept),
                Some(Localized::Fold { earlier, later }) => Some(earlier)
                    .filter(&accept)
                    .or_else(|| Some(later).filter(&accept)),
                Some(Localized::Gap { end }) => Some(end).filter(&accept),
                None => None,
            };
            if found.is_some() {
                return found;
            }
            from = wall.checked_add_signed(Duration::seconds(1))?;
        }
    }

    /// Walks matching wall clock readings backward from `from` and returns the first instant
    /// accepted. A fold offers its later instant first.
    fn scan_backward<Tz, F>(
        &self,
        tz: &Tz,
        from: NaiveDateTime,
        first_year: i32,
        accept: F,
    ) -> Option<DateTime<Tz>>
    where
        Tz: TimeZone,
        F: Fn(&DateTime<Tz>) -> bool,
    {
        let mut from = from;
        loop {
            let wall = self.previous_wall(&from, first_year)?;
            let found = match localize(tz, &wall) {
                Some(Localized::Single(time)) => Some(time).filter(&accept),
                Some(Localized::Fold { earlier, later }) => Some(later)
                    .filter(&accept)
                    .or_else(|| Some(earlier).filter(&accept)),
                Some(Localized::Gap { end }) => Some(end).filter(&accept),
                None => None,
            };
            if found.is_some() {
                return found;
            }
            from = wall.checked_sub_signed(Duration::seconds(1))?;
        }
    }

    pub(crate) fn next_after_zoned<Tz: TimeZone>(
        &self,
        cursor: &DateTime<Tz>,
        max_years: u32,
    ) -> Result<DateTime<Tz>> {
        let cursor = floor_seconds(cursor);
        let tz = cursor.timezone();
        let wall = cursor.naive_local();
        let years = max_years.max(1);
        let last_year = wall
            .year()
            .saturating_add(lookahead(years))
            .min(NaiveDate::MAX.year());
        let after = |time: &DateTime<Tz>| *time > cursor;

        let mut found = wall
            .checked_add_signed(Duration::seconds(1))
            .and_then(|from| self.scan_forward(&tz, from, last_year, &after));

        // Inside the first pass of a fold, the second pass still lies ahead with wall clock
        // readings behind the cursor's.
        if let Some(Localized::Fold { earlier, later }) = localize(&tz, &wall) {
            if earlier == cursor {
                let shift = i64::from(later.offset().fix().local_minus_utc()) + 1;
                let second_pass = cursor
                    .naive_utc()
                    .checked_add_signed(Duration::seconds(shift))
                    .and_then(|from| self.scan_forward(&tz, from, last_year, &after));
                found = match (found, second_pass) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
            }
        }

        found.ok_or_else(|| {
            debug!(from = %wall, years, "no matching time ahead within the lookahead");
            CronError::BadDate { from: wall, years }
        })
    }

    pub(crate) fn previous_before_zoned<Tz: TimeZone>(
        &self,
        cursor: &DateTime<Tz>,
        max_years: u32,
    ) -> Result<DateTime<Tz>> {
        let cursor = floor_seconds(cursor);
        let tz = cursor.timezone();
        let wall = cursor.naive_local();
        let years = max_years.max(1);
        let first_year = wall
            .year()
            .saturating_sub(lookahead(years))
            .max(NaiveDate::MIN.year());
        let before = |time: &DateTime<Tz>| *time < cursor;

        let mut found = wall
            .checked_sub_signed(Duration::seconds(1))
            .and_then(|from| self.scan_backward(&tz, from, first_year, &before));

        // Inside the second pass of a fold, the first pass still lies behind with wall clock
        // readings ahead of the cursor's.
        if let Some(Localized::Fold { earlier, later }) = localize(&tz, &wall) {
            if later == cursor {
                let shift = i64::from(earlier.offset().fix().local_minus_utc()) - 1;
                let first_pass = cursor
                    .naive_utc()
                    .checked_add_signed(Duration::seconds(shift))
                    .and_then(|from| self.scan_backward(&tz, from, first_year, &before));
                found = match (found, first_pass) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
            }
        }

        found.ok_or_else(|| {
            debug!(from = %wall, years, "no matching time behind within the lookahead");
            CronError::BadDate { from: wall, years }
        })
    }

    /// Returns the first matching time strictly after the instant.
    ///
    /// Fractions of a second are dropped from the instant first. Fails with
    /// [`CronError::BadDate`] when nothing matches up to `max_years` calendar years ahead
    /// (at least 1).
    ///
    /// A matching wall clock reading skipped by a daylight saving gap fires at the end of the
    /// gap. That time reads differently in its zone, so [`Cron::contains`] may reject it: in
    /// Warsaw, `30 2 * * *` fires at 03:00 on 2017-03-26.
    ///
    /// # Example
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use sundial::Cron;
    ///
    /// let cron = "*/10 * * * *".parse::<Cron>().unwrap();
    /// let date = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
    /// assert_eq!(
    ///     cron.next_after(&date, 1),
    ///     Ok(Utc.with_ymd_and_hms(1970, 1, 1, 0, 10, 0).unwrap())
    /// );
    ///
    /// let never = "* * 31 2 *".parse::<Cron>().unwrap();
    /// assert!(never.next_after(&date, 1).is_err());
    /// ```
    pub fn next_after<T: Instant>(&self, instant: &T, max_years: u32) -> Result<T> {
        self.next_after_zoned(&instant.to_zoned(), max_years)
            .map(T::from_zoned)
    }

    /// Returns the last matching time strictly before the instant.
    ///
    /// Fractions of a second are dropped from the instant first. Fails with
    /// [`CronError::BadDate`] when nothing matches down to `max_years` calendar years behind
    /// (at least 1).
    ///
    /// Readings skipped by a daylight saving gap fire at the end of the gap, as in
    /// [`next_after`](Cron::next_after).
    ///
    /// # Example
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use sundial::Cron;
    ///
    /// let cron = "*/10 * * * *".parse::<Cron>().unwrap();
    /// let date = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
    /// assert_eq!(
    ///     cron.previous_before(&date, 1),
    ///     Ok(Utc.with_ymd_and_hms(1969, 12, 31, 23, 50, 0).unwrap())
    /// );
    /// ```
    pub fn previous_before<T: Instant>(&self, instant: &T, max_years: u32) -> Result<T> {
        self.previous_before_zoned(&instant.to_zoned(), max_years)
            .map(T::from_zoned)
    }
}
