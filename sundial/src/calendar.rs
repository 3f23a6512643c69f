//! Proleptic Gregorian calendar helpers used by the matcher and the stepper.

use chrono::{Datelike, NaiveDate, Weekday};

/// Returns whether the year is a leap year in the Gregorian calendar.
#[inline]
pub fn is_leap_year(year: i32) -> bool {
    if year % 4 != 0 {
        false
    } else if year % 100 != 0 {
        true
    } else {
        year % 400 == 0
    }
}

/// Returns the number of days in the month, 28-31. Returns 0 for months outside 1-12.
#[inline]
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// The weekday of the first day of the month.
#[inline]
fn first_weekday(year: i32, month: u32) -> Option<Weekday> {
    NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.weekday())
}

/// The first day (1-7) of the month falling on the given weekday.
#[inline]
fn first_day_of(year: i32, month: u32, weekday: Weekday) -> Option<u32> {
    let first = first_weekday(year, month)?.num_days_from_sunday();
    let wanted = weekday.num_days_from_sunday();
    Some((wanted + 7 - first) % 7 + 1)
}

/// Returns every day of the month falling on the given weekday, in ascending order.
///
/// # Example
/// ```
/// use chrono::Weekday;
/// use sundial::calendar::weekdays_of_month;
///
/// // Fridays in January 1987
/// assert_eq!(weekdays_of_month(1987, 1, Weekday::Fri), vec![2, 9, 16, 23, 30]);
/// ```
pub fn weekdays_of_month(year: i32, month: u32, weekday: Weekday) -> Vec<u32> {
    let days = days_in_month(year, month);
    match first_day_of(year, month, weekday) {
        Some(first) => (first..=days).step_by(7).collect(),
        None => Vec::new(),
    }
}

/// Returns the day of the `nth` (1-5) occurrence of the weekday in the month, or `None` if the
/// month doesn't have that many.
#[inline]
pub fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, nth: u32) -> Option<u32> {
    if nth == 0 {
        return None;
    }
    let day = first_day_of(year, month, weekday)? + 7 * (nth - 1);
    if day <= days_in_month(year, month) {
        Some(day)
    } else {
        None
    }
}

/// Returns the day of the last occurrence of the weekday in the month.
#[inline]
pub fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<u32> {
    let first = first_day_of(year, month, weekday)?;
    let days = days_in_month(year, month);
    Some(first + (days - first) / 7 * 7)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEKDAYS: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    fn brute_force(year: i32, month: u32, weekday: Weekday) -> Vec<u32> {
        (1..=days_in_month(year, month))
            .filter(|&d| {
                NaiveDate::from_ymd_opt(year, month, d)
                    .map(|date| date.weekday() == weekday)
                    .unwrap_or(false)
            })
            .collect()
    }

    #[test]
    fn leap_years() {
        assert!(is_leap_year(2000));
        assert!(is_leap_year(1996));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2100));
        assert!(!is_leap_year(2023));
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2021, 4), 30);
        assert_eq!(days_in_month(2021, 12), 31);
        assert_eq!(days_in_month(2021, 13), 0);
    }

    #[test]
    fn nth_weekday_matches_brute_force() {
        for year in [1900, 1987, 1996, 2000, 2020, 2023, 2024] {
            for month in 1..=12 {
                for &weekday in WEEKDAYS.iter() {
                    let expected = brute_force(year, month, weekday);
                    assert_eq!(weekdays_of_month(year, month, weekday), expected);
                    for nth in 1..=5u32 {
                        assert_eq!(
                            nth_weekday_of_month(year, month, weekday, nth),
                            expected.get(nth as usize - 1).copied(),
                            "{}-{} {:?} #{}",
                            year,
                            month,
                            weekday,
                            nth
                        );
                    }
                    assert_eq!(
                        last_weekday_of_month(year, month, weekday),
                        expected.last().copied()
                    );
                }
            }
        }
    }

    #[test]
    fn zeroth_weekday_is_none() {
        assert_eq!(nth_weekday_of_month(2020, 1, Weekday::Mon, 0), None);
    }
}
