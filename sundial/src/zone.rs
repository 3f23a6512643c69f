//! Reading instants as wall clock times and resolving wall clock times back into instants.
//!
//! Any [`chrono::TimeZone`] plugs in. A wall clock reading resolves to a single instant, to two
//! instants when a fold repeats it, or to none when a gap skips it. Gaps are resolved to the
//! first instant after the gap.

use crate::internal::Sealed;
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use core::fmt::Debug;
use tracing::trace;

/// A calendar instant usable as a cursor.
///
/// Naive date times are read as they are and give naive results. Zoned date times are read in
/// their own time zone and give results in the same zone.
pub trait Instant: Clone + Ord + Debug + Sealed {
    /// The time zone the instant is read in.
    type Zone: TimeZone;

    /// Returns the instant with its time zone.
    fn to_zoned(&self) -> DateTime<Self::Zone>;

    /// Returns the zoned instant in this representation.
    fn from_zoned(zoned: DateTime<Self::Zone>) -> Self;
}

impl Sealed for NaiveDateTime {}
impl Instant for NaiveDateTime {
    type Zone = Utc;

    #[inline]
    fn to_zoned(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(self)
    }

    #[inline]
    fn from_zoned(zoned: DateTime<Utc>) -> Self {
        zoned.naive_utc()
    }
}

impl<Tz: TimeZone> Sealed for DateTime<Tz> {}
impl<Tz: TimeZone> Instant for DateTime<Tz> {
    type Zone = Tz;

    #[inline]
    fn to_zoned(&self) -> DateTime<Tz> {
        self.clone()
    }

    #[inline]
    fn from_zoned(zoned: DateTime<Tz>) -> Self {
        zoned
    }
}

/// A wall clock reading resolved in a time zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Localized<Tz: TimeZone> {
    /// The reading happens once.
    Single(DateTime<Tz>),
    /// The reading happens twice, once before a backward transition and once after.
    Fold {
        earlier: DateTime<Tz>,
        later: DateTime<Tz>,
    },
    /// The reading is skipped by a forward transition. `end` is the first instant after it.
    Gap { end: DateTime<Tz> },
}

/// Resolves the wall clock reading in the time zone.
///
/// Returns `None` only for a skipped reading whose transition can't be located, which happens
/// at the edges of the representable range.
///
/// # Example
/// ```
/// use chrono::{FixedOffset, NaiveDate};
/// use sundial::zone::{localize, Localized};
///
/// let tz = FixedOffset::east_opt(3600).unwrap();
/// let wall = NaiveDate::from_ymd_opt(2021, 1, 1)
///     .and_then(|d| d.and_hms_opt(12, 0, 0))
///     .unwrap();
/// match localize(&tz, &wall) {
///     Some(Localized::Single(time)) => assert_eq!(time.to_rfc3339(), "2021-01-01T12:00:00+01:00"),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn localize<Tz: TimeZone>(tz: &Tz, wall: &NaiveDateTime) -> Option<Localized<Tz>> {
    match tz.from_local_datetime(wall) {
        LocalResult::Single(time) => Some(Localized::Single(time)),
        LocalResult::Ambiguous(a, b) => {
            let (earlier, later) = if a <= b { (a, b) } else { (b, a) };
            trace!(%wall, "wall clock time is repeated by a fold");
            Some(Localized::Fold { earlier, later })
        }
        LocalResult::None => {
            let end = gap_end(tz, wall)?;
            trace!(%wall, end = %end.naive_local(), "wall clock time falls in a gap");
            Some(Localized::Gap { end })
        }
    }
}

/// Finds the transition that skipped the wall clock reading.
///
/// The offsets a day either side of the reading bound the transition: read with the offset in
/// effect after it, the reading is an instant before the transition, read with the offset before
/// it, an instant after. The first second using a new offset is found by bisection.
fn gap_end<Tz: TimeZone>(tz: &Tz, wall: &NaiveDateTime) -> Option<DateTime<Tz>> {
    let day = Duration::days(1);
    let before = tz
        .offset_from_utc_datetime(&wall.checked_sub_signed(day)?)
        .fix();
    let after = tz
        .offset_from_utc_datetime(&wall.checked_add_signed(day)?)
        .fix();

    let low = wall.checked_sub_signed(Duration::seconds(i64::from(after.local_minus_utc())))?;
    let high = wall.checked_sub_signed(Duration::seconds(i64::from(before.local_minus_utc())))?;
    let changed = |seconds: i64| -> Option<bool> {
        let utc = low.checked_add_signed(Duration::seconds(seconds))?;
        Some(tz.offset_from_utc_datetime(&utc).fix() != before)
    };

    let (mut lo, mut hi) = (0i64, (high - low).num_seconds());
    if hi <= 0 || !changed(hi)? {
        return None;
    }
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if changed(mid)? {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    let utc = low.checked_add_signed(Duration::seconds(hi))?;
    Some(tz.from_utc_datetime(&utc))
}

/// Drops the fraction of a second, keeping the instant's zone.
#[inline]
pub(crate) fn floor_seconds<Tz: TimeZone>(time: &DateTime<Tz>) -> DateTime<Tz> {
    let utc = time.naive_utc();
    let floored = utc
        .checked_sub_signed(Duration::nanoseconds(i64::from(utc.nanosecond())))
        .unwrap_or(utc);
    time.timezone().from_utc_datetime(&floored)
}
