//! A cron expression parser and schedule iterator.
//!
//! Expressions have 5 fields (`minute hour day-of-month month day-of-week`) or 6 with a leading
//! seconds field. Besides the usual values, ranges, steps and names, the day of month accepts `L`
//! and `a-L`, and the day of week accepts `L5` (last Friday) and `5#3` (third Friday).
//!
//! Matching times are found in the wall clock of the instant's time zone. Times skipped by a
//! daylight saving gap fire once at the end of the gap, times repeated by a fold fire once for
//! each real occurrence.
//!
//! # Example
//! ```
//! use chrono::NaiveDate;
//! use sundial::CronIter;
//!
//! let start = NaiveDate::from_ymd_opt(2016, 12, 3)
//!     .and_then(|d| d.and_hms_opt(10, 0, 0))
//!     .unwrap();
//! let mut iter = CronIter::new("0 0 1 3,6,9,12 *", start).unwrap();
//! let next = iter.next_match().unwrap();
//! assert_eq!(next.to_string(), "2017-03-01 00:00:00");
//! ```

pub mod calendar;
mod error;
mod expand;
mod iter;
pub mod parse;
mod range;
mod step;
pub mod zone;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

use core::fmt::{self, Display, Formatter};
use core::ops::{BitAnd, BitOr};
use core::str::FromStr;

use self::parse::CronExpr;

pub use self::error::{CronError, Result};
pub use self::expand::{expand, is_valid, ExpandedExpr, Field, FieldSet};
pub use self::iter::{CronIter, IterOptions};
pub use self::range::{range, CronRange, RangeOptions};
pub use self::zone::Instant;

pub(crate) mod internal {
    pub trait Sealed {}
}

/// How a restricted day of month and a restricted day of week combine.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DayMatching {
    /// A day matches if either field matches it, as in Vixie cron. When one of the fields is a
    /// `*`, the other one alone decides.
    #[default]
    Union,
    /// A day matches only if both fields match it.
    Intersection,
    /// Like [`Union`](DayMatching::Union), except that the fields intersect when either of them
    /// is written starting with `*`, such as `*/2`. ISC cron behaves this way.
    StarredIntersection,
}

macro_rules! debug_assert_pattern {
    ($pat:expr, $mask:expr) => {
        debug_assert!(
            ($pat & !($mask)) == 0,
            "Value mapped out of range of valid bit patterns"
        )
    };
}

/// A bit-mask of the values set in one field, bit `n` standing for the value `n`.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
pub(crate) struct Pattern(u64);

impl Pattern {
    /// All values in the inclusive span. Both ends must be below 64.
    #[inline]
    fn span(start: u8, end: u8) -> Self {
        if start > end {
            return Self(0);
        }
        let bits = (u64::MAX >> (63 - end)) & (u64::MAX << start);
        Self(bits)
    }

    fn compile(field: Field, set: &FieldSet) -> Self {
        let range = field.range();
        let all = Self::span(*range.start(), *range.end());
        match set.values() {
            None => all,
            Some(values) => {
                let bits = values.iter().fold(0u64, |bits, &value| bits | 1 << value);
                debug_assert_pattern!(bits, all.0);
                Self(bits)
            }
        }
    }

    #[inline]
    fn with(self, value: u32) -> Self {
        debug_assert!(value < 64);
        Self(self.0 | 1 << value)
    }

    #[inline]
    pub(crate) fn contains(self, value: u32) -> bool {
        value < 64 && self.0 & (1 << value) != 0
    }

    /// The smallest value set that is at least `value`.
    #[inline]
    pub(crate) fn next_from(self, value: i32) -> Option<i32> {
        if value >= 64 {
            return None;
        }
        let value = value.max(0);
        let bits = self.0 & (u64::MAX << value);
        if bits == 0 {
            None
        } else {
            Some(bits.trailing_zeros() as i32)
        }
    }

    /// The largest value set that is at most `value`.
    #[inline]
    pub(crate) fn prev_from(self, value: i32) -> Option<i32> {
        if value < 0 {
            return None;
        }
        let value = value.min(63);
        let bits = self.0 & (u64::MAX >> (63 - value));
        if bits == 0 {
            None
        } else {
            Some(63 - bits.leading_zeros() as i32)
        }
    }
}

impl BitOr for Pattern {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for Pattern {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Weekdays in the order of their cron values.
const WEEKDAYS: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// The days of the month field, with `L` kept as a flag since the last day depends on the month.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
struct DaysOfMonth {
    star: bool,
    days: Pattern,
    last: bool,
}

impl DaysOfMonth {
    fn compile(expr: &ExpandedExpr) -> Self {
        Self {
            star: !expr.restricts_day_of_month(),
            days: Pattern::compile(Field::DayOfMonth, expr.days_of_month()),
            last: expr.last_day_of_month(),
        }
    }

    /// The days of the month matched by this field in a month with `len` days.
    #[inline]
    fn mask(&self, len: u32) -> Pattern {
        if self.last && len > 0 {
            self.days.with(len)
        } else {
            self.days
        }
    }
}

/// The days of the week field. Occurrence modifiers are kept per weekday: bit `n` of `nth[w]`
/// is set for `w#n`, bit `w` of `last` for `Lw`.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
struct DaysOfWeek {
    star: bool,
    days: u8,
    nth: [u8; 7],
    last: u8,
}

impl DaysOfWeek {
    fn compile(expr: &ExpandedExpr) -> Self {
        let days = match expr.days_of_week().values() {
            None => 0b0111_1111,
            Some(values) => values.iter().fold(0u8, |bits, &value| bits | 1 << value),
        };
        debug_assert_pattern!(days, 0b0111_1111);

        let mut nth = [0u8; 7];
        for (&weekday, occurrences) in expr.nth_weekday_of_month() {
            nth[usize::from(weekday % 7)] = occurrences.iter().fold(0, |bits, &n| bits | 1 << n);
        }
        let last = expr
            .last_weekday_of_month()
            .iter()
            .fold(0u8, |bits, &weekday| bits | 1 << (weekday % 7));

        Self {
            star: !expr.restricts_day_of_week(),
            days,
            nth,
            last,
        }
    }

    /// The days of the given month matched by this field.
    fn mask(&self, year: i32, month: u32) -> Pattern {
        let mut pattern = Pattern(0);
        for (index, &weekday) in WEEKDAYS.iter().enumerate() {
            if self.days & (1 << index) != 0 {
                for day in calendar::weekdays_of_month(year, month, weekday) {
                    pattern = pattern.with(day);
                }
                continue;
            }

            if self.last & (1 << index) != 0 {
                if let Some(day) = calendar::last_weekday_of_month(year, month, weekday) {
                    pattern = pattern.with(day);
                }
            }
            let nth = self.nth[index];
            for n in (1..=5u32).filter(|&n| nth & (1 << n) != 0) {
                if let Some(day) = calendar::nth_weekday_of_month(year, month, weekday, n) {
                    pattern = pattern.with(day);
                }
            }
        }
        pattern
    }
}

/// A cron expression compiled into bit patterns, ready for matching and stepping.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use sundial::{Cron, DayMatching};
///
/// let cron: Cron = "0 16 */2 * sat".parse().unwrap();
/// // 2023-05-06 is a Saturday, but not an odd day
/// let saturday = NaiveDate::from_ymd_opt(2023, 5, 6)
///     .and_then(|d| d.and_hms_opt(16, 0, 0))
///     .unwrap();
///
/// assert!(cron.contains(&saturday));
/// assert!(!cron.with_day_matching(DayMatching::Intersection).contains(&saturday));
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Cron {
    has_seconds: bool,
    seconds: Pattern,
    minutes: Pattern,
    hours: Pattern,
    dom: DaysOfMonth,
    months: Pattern,
    dow: DaysOfWeek,
    /// Whether a day field was written starting with `*`
    days_starred: bool,
    day_matching: DayMatching,
    expr: ExpandedExpr,
}

impl FromStr for Cron {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self> {
        let parsed = s.parse::<CronExpr>()?;
        let days_starred = parsed.dom_starred || parsed.dow_starred;
        let mut cron = Cron::new(ExpandedExpr::from_parsed(s, parsed)?);
        cron.days_starred = days_starred;
        Ok(cron)
    }
}

impl Display for Cron {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        self.expr.fmt(f)
    }
}

impl Cron {
    /// Compiles the expanded expression, combining days with [`DayMatching::Union`].
    ///
    /// An expanded expression doesn't keep how its fields were written, so
    /// [`DayMatching::StarredIntersection`] works as a union on the result. Parse the expression
    /// text instead to keep the `*` prefixes.
    pub fn new(expr: ExpandedExpr) -> Self {
        let seconds = match expr.seconds() {
            Some(set) => Pattern::compile(Field::Second, set),
            // 5 field expressions fire at the top of the minute
            None => Pattern(1),
        };
        Self {
            has_seconds: expr.seconds().is_some(),
            seconds,
            minutes: Pattern::compile(Field::Minute, expr.minutes()),
            hours: Pattern::compile(Field::Hour, expr.hours()),
            dom: DaysOfMonth::compile(&expr),
            months: Pattern::compile(Field::Month, expr.months()),
            dow: DaysOfWeek::compile(&expr),
            days_starred: false,
            day_matching: DayMatching::Union,
            expr,
        }
    }

    /// Returns the same expression with the given day combination mode.
    #[inline]
    pub fn with_day_matching(mut self, day_matching: DayMatching) -> Self {
        self.day_matching = day_matching;
        self
    }

    #[inline]
    pub fn day_matching(&self) -> DayMatching {
        self.day_matching
    }

    /// Returns the expanded expression this was compiled from.
    #[inline]
    pub fn expanded(&self) -> &ExpandedExpr {
        &self.expr
    }

    /// Returns the days of the given month matched by the day of month and day of week fields
    /// combined. Months outside 1-12 match nothing.
    pub(crate) fn day_mask(&self, year: i32, month: u32) -> Pattern {
        let len = calendar::days_in_month(year, month);
        if len == 0 {
            return Pattern(0);
        }
        let valid = Pattern::span(1, len as u8);

        let days = match (self.dom.star, self.dow.star) {
            (true, true) => valid,
            (true, false) => self.dow.mask(year, month),
            (false, true) => self.dom.mask(len),
            (false, false) => match self.day_matching {
                DayMatching::Intersection => self.dom.mask(len) & self.dow.mask(year, month),
                DayMatching::StarredIntersection if self.days_starred => {
                    self.dom.mask(len) & self.dow.mask(year, month)
                }
                DayMatching::Union | DayMatching::StarredIntersection => {
                    self.dom.mask(len) | self.dow.mask(year, month)
                }
            },
        };
        days & valid
    }

    /// Returns whether the wall clock reading matches. Seconds are only checked for 6 field
    /// expressions.
    pub(crate) fn contains_wall(&self, wall: &NaiveDateTime) -> bool {
        if self.has_seconds && !self.seconds.contains(wall.second()) {
            return false;
        }
        self.minutes.contains(wall.minute())
            && self.hours.contains(wall.hour())
            && self.months.contains(wall.month())
            && self.day_mask(wall.year(), wall.month()).contains(wall.day())
    }

    /// Returns whether this expression matches the instant, read in its own time zone.
    ///
    /// # Example
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use sundial::Cron;
    ///
    /// let cron: Cron = "*/10 0 * OCT MON".parse().expect("Couldn't parse expression!");
    /// let time = Utc.with_ymd_and_hms(2020, 10, 19, 0, 30, 0).unwrap();
    /// assert!(cron.contains(&time));
    /// ```
    #[inline]
    pub fn contains<T: Instant>(&self, instant: &T) -> bool {
        self.contains_wall(&instant.to_zoned().naive_local())
    }

    /// Creates an iterator over the times matching after the given instant, searching at most a
    /// year ahead for each one.
    ///
    /// # Example
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use sundial::Cron;
    ///
    /// let cron = "*/10 * * * *".parse::<Cron>().expect("Couldn't parse expression!");
    /// let start = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
    /// let times: Vec<_> = cron.iter_after(start).take(3).map(|t| t.to_string()).collect();
    /// assert_eq!(
    ///     times,
    ///     [
    ///         "1970-01-01 00:10:00 UTC",
    ///         "1970-01-01 00:20:00 UTC",
    ///         "1970-01-01 00:30:00 UTC",
    ///     ]
    /// );
    /// ```
    #[inline]
    pub fn iter_after<T: Instant>(self, start: T) -> CronIter<T> {
        CronIter::from_cron(self, start)
    }
}

/// Returns whether the instant matches the expression.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use sundial::{matches, DayMatching};
///
/// let leap_day = NaiveDate::from_ymd_opt(2000, 2, 29)
///     .and_then(|d| d.and_hms_opt(0, 0, 0))
///     .unwrap();
/// assert!(matches("0 0 L 2 *", &leap_day, DayMatching::Union).unwrap());
/// assert!(matches("0 0 * * L", &leap_day, DayMatching::Union).is_err());
/// ```
pub fn matches<T: Instant>(expr: &str, instant: &T, day_matching: DayMatching) -> Result<bool> {
    let cron = expr.parse::<Cron>()?.with_day_matching(day_matching);
    Ok(cron.contains(instant))
}
