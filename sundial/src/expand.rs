//! Expansion of parsed cron expressions into normalized per-field value sets.

use crate::error::{CronError, Result};
use crate::parse::{
    CronExpr, DayOfMonthTerm, DayOfWeek, DayOfWeekTerm, ExprValue, Exprs, OrsExpr,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use std::ops::RangeInclusive;
use std::str::FromStr;

/// A field of a cron expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Second,
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl Field {
    /// The legal values of the field.
    pub fn range(self) -> RangeInclusive<u8> {
        match self {
            Field::Second | Field::Minute => 0..=59,
            Field::Hour => 0..=23,
            Field::DayOfMonth => 1..=31,
            Field::Month => 1..=12,
            Field::DayOfWeek => 0..=6,
        }
    }

    fn len(self) -> usize {
        let range = self.range();
        usize::from(range.end() - range.start()) + 1
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Field::Second => "second",
            Field::Minute => "minute",
            Field::Hour => "hour",
            Field::DayOfMonth => "day of month",
            Field::Month => "month",
            Field::DayOfWeek => "day of week",
        })
    }
}

/// The values of one field: either any legal value or a sorted set without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldSet {
    /// A `*`, or a list covering the whole range of the field
    All,
    /// Sorted, deduplicated values inside the legal range of the field
    Values(Vec<u8>),
}

impl FieldSet {
    fn collapse(field: Field, values: BTreeSet<u8>) -> Self {
        if values.len() == field.len() {
            FieldSet::All
        } else {
            FieldSet::Values(values.into_iter().collect())
        }
    }

    /// Returns whether the set is a `*`.
    #[inline]
    pub fn is_all(&self) -> bool {
        matches!(self, FieldSet::All)
    }

    /// Returns whether the set contains the value.
    #[inline]
    pub fn contains(&self, value: u8) -> bool {
        match self {
            FieldSet::All => true,
            FieldSet::Values(values) => values.binary_search(&value).is_ok(),
        }
    }

    /// Returns the explicit values, or `None` for a `*`.
    #[inline]
    pub fn values(&self) -> Option<&[u8]> {
        match self {
            FieldSet::All => None,
            FieldSet::Values(values) => Some(values.as_slice()),
        }
    }

    fn fmt_values(values: &[u8], f: &mut Formatter, first: &mut bool) -> fmt::Result {
        for value in values {
            separate(f, first)?;
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}

impl Display for FieldSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            FieldSet::All => f.write_str("*"),
            FieldSet::Values(values) => Self::fmt_values(values, f, &mut true),
        }
    }
}

fn separate(f: &mut Formatter, first: &mut bool) -> fmt::Result {
    if !*first {
        f.write_str(",")?;
    }
    *first = false;
    Ok(())
}

/// A cron expression expanded into value sets, with the day modifiers kept aside.
///
/// Created with [`expand`] or by parsing. Displaying the value yields a canonical expression
/// which expands back into an equal value.
///
/// # Example
/// ```
/// use sundial::{expand, FieldSet};
///
/// let expanded = expand("*/20 9-17 * * mon-fri").unwrap();
/// assert_eq!(expanded.minutes(), &FieldSet::Values(vec![0, 20, 40]));
/// assert_eq!(expanded.to_string(), "0,20,40 9,10,11,12,13,14,15,16,17 * * 1,2,3,4,5");
/// assert_eq!(expand(&expanded.to_string()).unwrap(), expanded);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedExpr {
    seconds: Option<FieldSet>,
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
    nth_weekday_of_month: BTreeMap<u8, BTreeSet<u8>>,
    last_weekday_of_month: BTreeSet<u8>,
    last_day_of_month: bool,
}

impl ExpandedExpr {
    /// The seconds, present only in the 6 field form
    #[inline]
    pub fn seconds(&self) -> Option<&FieldSet> {
        self.seconds.as_ref()
    }

    #[inline]
    pub fn minutes(&self) -> &FieldSet {
        &self.minutes
    }

    #[inline]
    pub fn hours(&self) -> &FieldSet {
        &self.hours
    }

    /// The plain days of the month. `L` is reported by [`last_day_of_month`] instead.
    ///
    /// [`last_day_of_month`]: ExpandedExpr::last_day_of_month
    #[inline]
    pub fn days_of_month(&self) -> &FieldSet {
        &self.days_of_month
    }

    #[inline]
    pub fn months(&self) -> &FieldSet {
        &self.months
    }

    /// The plain days of the week, 0-6 starting on Sunday. Nth and last weekday modifiers are
    /// reported separately.
    #[inline]
    pub fn days_of_week(&self) -> &FieldSet {
        &self.days_of_week
    }

    /// Weekdays (0-6) mapped to the occurrences (1-5) they match in a month.
    #[inline]
    pub fn nth_weekday_of_month(&self) -> &BTreeMap<u8, BTreeSet<u8>> {
        &self.nth_weekday_of_month
    }

    /// Weekdays (0-6) matching only on their last occurrence in a month.
    #[inline]
    pub fn last_weekday_of_month(&self) -> &BTreeSet<u8> {
        &self.last_weekday_of_month
    }

    /// Whether the day of month field contains `L`.
    #[inline]
    pub fn last_day_of_month(&self) -> bool {
        self.last_day_of_month
    }

    /// Whether the day of month field restricts the days matched.
    #[inline]
    pub fn restricts_day_of_month(&self) -> bool {
        !self.days_of_month.is_all()
    }

    /// Whether the day of week field, including its modifiers, restricts the days matched.
    #[inline]
    pub fn restricts_day_of_week(&self) -> bool {
        !self.days_of_week.is_all()
    }

    pub(crate) fn from_parsed(source: &str, expr: CronExpr) -> Result<Self> {
        let seconds = match expr.seconds {
            Some(exprs) => Some(expand_field(source, Field::Second, exprs)?),
            None => None,
        };
        let minutes = expand_field(source, Field::Minute, expr.minutes)?;
        let hours = expand_field(source, Field::Hour, expr.hours)?;
        let months = expand_field(source, Field::Month, expr.months)?;

        let (days_of_month, last_day_of_month) = expand_doms(source, expr.doms)?;
        let days = expand_dows(source, expr.dows)?;

        Ok(Self {
            seconds,
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week: days.values,
            nth_weekday_of_month: days.nth,
            last_weekday_of_month: days.last,
            last_day_of_month,
        })
    }
}

impl FromStr for ExpandedExpr {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self> {
        let parsed = s.parse::<CronExpr>()?;
        Self::from_parsed(s, parsed)
    }
}

impl Display for ExpandedExpr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if let Some(seconds) = &self.seconds {
            write!(f, "{} ", seconds)?;
        }
        write!(f, "{} {} ", self.minutes, self.hours)?;

        match &self.days_of_month {
            FieldSet::All => f.write_str("*")?,
            FieldSet::Values(values) => {
                let mut first = true;
                FieldSet::fmt_values(values, f, &mut first)?;
                if self.last_day_of_month {
                    separate(f, &mut first)?;
                    f.write_str("L")?;
                }
            }
        }

        write!(f, " {} ", self.months)?;

        match &self.days_of_week {
            FieldSet::All => f.write_str("*"),
            FieldSet::Values(values) => {
                let mut first = true;
                FieldSet::fmt_values(values, f, &mut first)?;
                for (weekday, nths) in &self.nth_weekday_of_month {
                    for nth in nths {
                        separate(f, &mut first)?;
                        write!(f, "{}#{}", weekday, nth)?;
                    }
                }
                for weekday in &self.last_weekday_of_month {
                    separate(f, &mut first)?;
                    write!(f, "L{}", weekday)?;
                }
                Ok(())
            }
        }
    }
}

/// Returns the start, end and step of a term, or an error if the range is reversed.
fn bounds<E>(source: &str, field: Field, term: OrsExpr<E>) -> Result<(u8, u8, u8)>
where
    E: ExprValue + Into<u8>,
{
    let (start, end, step) = match term {
        OrsExpr::All => (E::MIN, E::MAX, 1),
        OrsExpr::One(value) => {
            let value = value.into();
            (value, value, 1)
        }
        OrsExpr::Range(start, end) => (start.into(), end.into(), 1),
        OrsExpr::Step { start, end, step } => (start.into(), end.into(), step.into()),
    };

    if start > end {
        return Err(CronError::bad_cron(
            source,
            format!("invalid range {}-{} in {} field", start, end, field),
        ));
    }

    Ok((start, end, step))
}

fn span((start, end, step): (u8, u8, u8)) -> impl Iterator<Item = u8> {
    (start..=end).step_by(usize::from(step))
}

fn expand_field<E>(source: &str, field: Field, exprs: Exprs<OrsExpr<E>>) -> Result<FieldSet>
where
    E: ExprValue + Into<u8>,
{
    let mut values = BTreeSet::new();
    for term in exprs {
        values.extend(span(bounds(source, field, term)?));
    }
    Ok(FieldSet::collapse(field, values))
}

fn expand_doms(source: &str, exprs: Exprs<DayOfMonthTerm>) -> Result<(FieldSet, bool)> {
    let max = *Field::DayOfMonth.range().end();
    let mut values = BTreeSet::new();
    let mut last = false;

    for term in exprs {
        match term {
            DayOfMonthTerm::Term(term) => {
                values.extend(span(bounds(source, Field::DayOfMonth, term)?));
            }
            // days past the end of a month never match, so this is the same as
            // resolving `L` against each month
            DayOfMonthTerm::ToLast { start, step } => {
                let step = step.map_or(1, u8::from);
                values.extend(span((start.into(), max, step)));
            }
            DayOfMonthTerm::Last => last = true,
        }
    }

    match FieldSet::collapse(Field::DayOfMonth, values) {
        FieldSet::All => Ok((FieldSet::All, false)),
        set => Ok((set, last)),
    }
}

struct ExpandedDays {
    values: FieldSet,
    nth: BTreeMap<u8, BTreeSet<u8>>,
    last: BTreeSet<u8>,
}

/// Returns the weekdays of a term, 0-6. A range ending on Sunday (`5-0`, `fri-sun`) runs through
/// Saturday.
fn weekdays(source: &str, term: OrsExpr<DayOfWeek>) -> Result<impl Iterator<Item = u8>> {
    let term = match term {
        OrsExpr::Range(start, end) if start > end => OrsExpr::Range(start, end.sunday_as_end()),
        OrsExpr::Step { start, end, step } if start > end => OrsExpr::Step {
            start,
            end: end.sunday_as_end(),
            step,
        },
        term => term,
    };

    Ok(span(bounds(source, Field::DayOfWeek, term)?).map(|day| day % 7))
}

fn expand_dows(source: &str, exprs: Exprs<DayOfWeekTerm>) -> Result<ExpandedDays> {
    let mut values = BTreeSet::new();
    let mut nth = BTreeMap::<u8, BTreeSet<u8>>::new();
    let mut last = BTreeSet::new();

    for term in exprs {
        match term {
            DayOfWeekTerm::Term(term) => values.extend(weekdays(source, term)?),
            DayOfWeekTerm::Last(day) => {
                last.insert(day.weekday().num_days_from_sunday() as u8);
            }
            DayOfWeekTerm::Nth { start, end, nth: n } => {
                let range = if start == end {
                    OrsExpr::One(start)
                } else {
                    OrsExpr::Range(start, end)
                };
                for day in weekdays(source, range)? {
                    nth.entry(day).or_default().insert(n.into());
                }
            }
        }
    }

    match FieldSet::collapse(Field::DayOfWeek, values) {
        // a full week already contains every nth and last weekday
        FieldSet::All => Ok(ExpandedDays {
            values: FieldSet::All,
            nth: BTreeMap::new(),
            last: BTreeSet::new(),
        }),
        FieldSet::Values(values) if !values.is_empty() && !(nth.is_empty() && last.is_empty()) => {
            Err(CronError::unsupported(
                source,
                "day of week field can't mix literal weekdays with nth or last weekday terms",
            ))
        }
        values => Ok(ExpandedDays { values, nth, last }),
    }
}

/// Expands a cron expression into its per-field value sets.
///
/// # Example
/// ```
/// use sundial::{expand, FieldSet};
///
/// let expanded = expand("0 0 * * L5").unwrap();
/// assert_eq!(expanded.days_of_week(), &FieldSet::Values(vec![]));
/// assert!(expanded.last_weekday_of_month().contains(&5));
///
/// assert!(expand("0 0 * * mon,L5").is_err());
/// ```
pub fn expand(expr: &str) -> Result<ExpandedExpr> {
    expr.parse()
}

/// Returns whether the expression expands without error.
///
/// # Example
/// ```
/// assert!(sundial::is_valid("0 13 8 1,4,7,10 wed"));
/// assert!(!sundial::is_valid("0 13 8 1,4,7,10 wednesday"));
/// ```
pub fn is_valid(expr: &str) -> bool {
    expand(expr).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(values: &[u8]) -> FieldSet {
        FieldSet::Values(values.to_vec())
    }

    #[test]
    fn full_range_collapses() {
        let e = expand("0-59 0-23 1-31 1-12 0-6").unwrap();
        assert!(e.minutes().is_all());
        assert!(e.hours().is_all());
        assert!(e.days_of_month().is_all());
        assert!(e.months().is_all());
        assert!(e.days_of_week().is_all());

        let e = expand("0-29,30-59 * * jan-jun,jul-dec *").unwrap();
        assert!(e.minutes().is_all());
        assert!(e.months().is_all());
    }

    #[test]
    fn sorted_and_deduplicated() {
        let e = expand("5,1,3,1,3-5 * * * *").unwrap();
        assert_eq!(e.minutes(), &values(&[1, 3, 4, 5]));
    }

    #[test]
    fn steps() {
        let e = expand("*/15 10/20 */100 * * *").unwrap();
        assert_eq!(e.seconds(), Some(&values(&[0, 15, 30, 45])));
        assert_eq!(e.minutes(), &values(&[10, 30, 50]));
        assert_eq!(e.hours(), &values(&[0]));

        let e = expand("0 0 */2 * *").unwrap();
        assert_eq!(
            e.days_of_month(),
            &values(&[1, 3, 5, 7, 9, 11, 13, 15, 17, 19, 21, 23, 25, 27, 29, 31])
        );
    }

    #[test]
    fn five_fields_have_no_seconds() {
        assert_eq!(expand("* * * * *").unwrap().seconds(), None);
        assert_eq!(expand("* * * * * *").unwrap().seconds(), Some(&FieldSet::All));
    }

    #[test]
    fn aliases_are_case_insensitive() {
        let e = expand("0 0 * Mar,JUN,sep * ").unwrap();
        assert_eq!(e.months(), &values(&[3, 6, 9]));

        let e = expand("0 0 * * Mon-wED").unwrap();
        assert_eq!(e.days_of_week(), &values(&[1, 2, 3]));
    }

    #[test]
    fn iso_sunday() {
        assert_eq!(expand("* * * * 7").unwrap().days_of_week(), &values(&[0]));
        assert!(expand("* * * * 1-7").unwrap().days_of_week().is_all());
        assert!(expand("* * * * 0-7").unwrap().days_of_week().is_all());
        assert_eq!(
            expand("* * * * sat-sun").unwrap().days_of_week(),
            &values(&[0, 6])
        );
        assert_eq!(
            expand("* * * * 5-0").unwrap().days_of_week(),
            &values(&[0, 5, 6])
        );
        assert_eq!(
            expand("* * * * 1-7/2").unwrap().days_of_week(),
            &values(&[0, 1, 3, 5])
        );
    }

    #[test]
    fn last_day_of_month() {
        let e = expand("0 0 L * *").unwrap();
        assert_eq!(e.days_of_month(), &values(&[]));
        assert!(e.last_day_of_month());
        assert!(e.restricts_day_of_month());

        let e = expand("0 0 25-L * *").unwrap();
        assert_eq!(e.days_of_month(), &values(&[25, 26, 27, 28, 29, 30, 31]));
        assert!(!e.last_day_of_month());

        let e = expand("0 0 1-L/8 * *").unwrap();
        assert_eq!(e.days_of_month(), &values(&[1, 9, 17, 25]));

        let e = expand("0 0 1-L,L * *").unwrap();
        assert!(e.days_of_month().is_all());
        assert!(!e.last_day_of_month());
    }

    #[test]
    fn weekday_modifiers() {
        let e = expand("0 0 * * 6#1,L6").unwrap();
        assert_eq!(e.days_of_week(), &values(&[]));
        assert_eq!(e.nth_weekday_of_month().get(&6), Some(&BTreeSet::from([1])));
        assert!(e.last_weekday_of_month().contains(&6));
        assert!(e.restricts_day_of_week());

        let e = expand("0 0 * * mon-fri#1").unwrap();
        assert_eq!(e.nth_weekday_of_month().len(), 5);
        assert!(e.nth_weekday_of_month().values().all(|n| n.contains(&1)));

        let e = expand("0 0 * * 1#1,1#3,Lfri").unwrap();
        assert_eq!(
            e.nth_weekday_of_month().get(&1),
            Some(&BTreeSet::from([1, 3]))
        );
        assert!(e.last_weekday_of_month().contains(&5));
    }

    #[test]
    fn collapsed_weekdays_drop_modifiers() {
        for expr in ["* * * * 1-7,sat#3", "* * * * *,sat#3", "* * * * *,L5"] {
            let e = expand(expr).unwrap();
            assert!(e.days_of_week().is_all(), "{}", expr);
            assert!(e.nth_weekday_of_month().is_empty(), "{}", expr);
            assert!(e.last_weekday_of_month().is_empty(), "{}", expr);
        }
    }

    #[test]
    fn mixing_literal_weekdays_is_unsupported() {
        for expr in ["* * * * 1,sat#3", "* * * * sat,sat#3", "* * * * 1-3,L5"] {
            match expand(expr) {
                Err(CronError::UnsupportedSyntax { .. }) => {}
                other => panic!("{} expanded to {:?}", expr, other),
            }
        }
    }

    #[test]
    fn malformed() {
        for expr in [
            "30-10 * * * *",
            "* 23-1 * * *",
            "* * 0 * *",
            "* * * 0 *",
            "* * * 13 *",
            "* * * * 8",
            "*/0 * * * *",
            "60 * * * *",
            "* 24 * * *",
            "* * L/2 * *",
            "* * 1#2 * *",
            "* * * * 1#6",
            "* * * *",
            "* * * * * * *",
        ] {
            match expand(expr) {
                Err(CronError::BadCron { .. }) => {}
                other => panic!("{} expanded to {:?}", expr, other),
            }
        }
    }

    #[test]
    fn unknown_names() {
        for expr in ["* * * * mo", "* * * jam *", "* * * * fri-saturday"] {
            match expand(expr) {
                Err(CronError::NotAlpha { .. }) => {}
                other => panic!("{} expanded to {:?}", expr, other),
            }
        }
    }

    #[test]
    fn display() {
        for (expr, expected) in [
            ("0 0 1 3,6,9,12 *", "0 0 1 3,6,9,12 *"),
            ("0 0 * * L5", "0 0 * * L5"),
            ("*/15 * * * * *", "0,15,30,45 * * * * *"),
            ("0 0 15,L * *", "0 0 15,L * *"),
            ("0 0 * * Lsat,fri#3,1#1", "0 0 * * 1#1,5#3,L6"),
            ("0 16 */10 * sat", "0 16 1,11,21,31 * 6"),
        ] {
            assert_eq!(expand(expr).unwrap().to_string(), expected);
        }
    }

    #[test]
    fn expansion_is_idempotent() {
        for expr in [
            "*/15 * * * * *",
            "0 0 1 3,6,9,12 *",
            "0 16 */2 * sat",
            "0 0 * * L5",
            "0 0 L,15 feb *",
            "0 0 25-L * *",
            "0 0 * * 6#1,L6",
            "0 0 * * mon-fri#2",
            "0 13 8 1,4,7,10 wed",
            "5-55/10 1-7 * * 1-7",
        ] {
            let expanded = expand(expr).unwrap();
            let again = expand(&expanded.to_string()).unwrap();
            assert_eq!(expanded, again, "{}", expr);
        }
    }

    #[test]
    fn validity() {
        assert!(is_valid("0 0 * * *"));
        assert!(is_valid("0 0 * * * *"));
        assert!(!is_valid("0 0 * * * * *"));
        assert!(!is_valid("0 0 * * mon,L5"));
        assert!(!is_valid(""));
        assert!(!is_valid("ünïcödé * * * *"));
    }
}
