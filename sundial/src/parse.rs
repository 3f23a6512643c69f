//! A module allowing for inspection of a parsed cron expression before it's expanded into value
//! sets.
//!
//! The grammar accepts 5 fields (`minute hour day-of-month month day-of-week`) or 6 fields with
//! a leading `second` field. Each field is a comma separated list of terms.

use crate::error::CronError;
use crate::expand::Field;
use crate::internal::Sealed;
use core::iter::{Chain, Once};
use core::marker::PhantomData;
use core::slice;
use core::str::FromStr;
use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt},
    sequence::{preceded, tuple},
    IResult,
};
use std::vec;
use thiserror::Error;

/// An error returned if an expression type value is out of range.
#[derive(Debug, Error)]
#[error("the expression value is out of range of valid values")]
pub struct ValueOutOfRangeError;

/// A trait implemented for expression values that defines a MIN value and a MAX value.
pub trait ExprValue: Sized + Sealed {
    /// The max value for an expression value
    const MAX: u8;
    /// The min value for an expression value
    const MIN: u8;

    /// The max value as this expression value type
    fn max() -> Self;
    /// The min value as this expression value type
    fn min() -> Self;
}

macro_rules! expr_value {
    ($(#[$meta:meta])* $name:ident, $min:expr, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u8);
        impl Sealed for $name {}
        impl ExprValue for $name {
            const MAX: u8 = $max;
            const MIN: u8 = $min;

            fn max() -> Self {
                Self(Self::MAX)
            }
            fn min() -> Self {
                Self(Self::MIN)
            }
        }
        impl From<$name> for u8 {
            #[inline]
            fn from(v: $name) -> Self {
                v.0
            }
        }
        impl TryFrom<u8> for $name {
            type Error = ValueOutOfRangeError;

            #[inline]
            fn try_from(value: u8) -> Result<Self, Self::Error> {
                if (Self::MIN..=Self::MAX).contains(&value) {
                    Ok(Self(value))
                } else {
                    Err(ValueOutOfRangeError)
                }
            }
        }
        impl PartialEq<u8> for $name {
            #[inline]
            fn eq(&self, other: &u8) -> bool {
                &self.0 == other
            }
        }
    };
}

expr_value!(
    /// A second value, 0-59
    Second,
    0,
    59
);
expr_value!(
    /// A minute value, 0-59
    Minute,
    0,
    59
);
expr_value!(
    /// An hour value, 0-23
    Hour,
    0,
    23
);
expr_value!(
    /// A day of the month, 1-31
    DayOfMonth,
    1,
    31
);
expr_value!(
    /// A month, 1-12
    Month,
    1,
    12
);
expr_value!(
    /// An "nth" occurrence of a weekday in a month, 1-5
    NthDay,
    1,
    5
);

/// A day of the week, 0-7 where both 0 and 7 are Sunday.
///
/// The raw value is kept so a range such as `1-7` can be told apart from `1-0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayOfWeek(u8);
impl Sealed for DayOfWeek {}
impl ExprValue for DayOfWeek {
    const MAX: u8 = 6;
    const MIN: u8 = 0;

    fn max() -> Self {
        Self(Self::MAX)
    }
    fn min() -> Self {
        Self(Self::MIN)
    }
}
impl DayOfWeek {
    /// The ISO form of Sunday
    pub const ISO_SUNDAY: u8 = 7;

    /// Returns the weekday this value names.
    pub fn weekday(self) -> chrono::Weekday {
        use chrono::Weekday::*;

        match self.0 % 7 {
            0 => Sun,
            1 => Mon,
            2 => Tue,
            3 => Wed,
            4 => Thu,
            5 => Fri,
            _ => Sat,
        }
    }

    /// Writes Sunday as 7, so a range ending on Sunday runs through Saturday.
    pub(crate) fn sunday_as_end(self) -> Self {
        if self.0 == 0 {
            Self(Self::ISO_SUNDAY)
        } else {
            self
        }
    }
}
impl From<DayOfWeek> for u8 {
    /// Returns the raw value, 0-7
    #[inline]
    fn from(d: DayOfWeek) -> Self {
        d.0
    }
}
impl From<chrono::Weekday> for DayOfWeek {
    #[inline]
    fn from(w: chrono::Weekday) -> Self {
        Self(w.num_days_from_sunday() as u8)
    }
}
impl TryFrom<u8> for DayOfWeek {
    type Error = ValueOutOfRangeError;

    #[inline]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= Self::ISO_SUNDAY {
            Ok(Self(value))
        } else {
            Err(ValueOutOfRangeError)
        }
    }
}
impl PartialEq<chrono::Weekday> for DayOfWeek {
    #[inline]
    fn eq(&self, other: &chrono::Weekday) -> bool {
        self.weekday() == *other
    }
}

/// A step value for an expression value. The minimum value is always 1. Steps larger than the
/// field's range are accepted and select only the start value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Step<E> {
    e: PhantomData<fn(E) -> E>,
    value: u8,
}
impl<E: Sealed> Sealed for Step<E> {}
impl<E> From<Step<E>> for u8 {
    #[inline]
    fn from(s: Step<E>) -> Self {
        s.value
    }
}
impl<E> TryFrom<u8> for Step<E> {
    type Error = ValueOutOfRangeError;

    #[inline]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value >= 1 {
            Ok(Self {
                e: PhantomData,
                value,
            })
        } else {
            Err(ValueOutOfRangeError)
        }
    }
}

/// Either any value, one value, a range, or a step expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrsExpr<E> {
    /// A '*' character
    All,
    /// One value
    One(E),
    /// A '-' character.
    Range(E, E),
    /// A '/' character.
    Step {
        /// The start value. If the step expression starts with '*', this is the min value of E.
        start: E,
        /// The end value. If the step expression does not specify a value, this is the max value of E.
        end: E,
        /// The step value.
        step: Step<E>,
    },
}

/// A day of the month term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DayOfMonthTerm {
    /// A plain value, range, or step
    Term(OrsExpr<DayOfMonth>),
    /// An `a-L` or `a-L/s` expression, a range ending on the last day of the month
    ToLast {
        /// The first day of the range
        start: DayOfMonth,
        /// The optional step
        step: Option<Step<DayOfMonth>>,
    },
    /// An `L` character, the last day of the month
    Last,
}

/// A day of the week term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DayOfWeekTerm {
    /// A plain value, range, or step
    Term(OrsExpr<DayOfWeek>),
    /// An `L` prefix, the last occurrence of the weekday in the month
    Last(DayOfWeek),
    /// A '#' expression for the nth occurrence of a weekday or of each weekday in a range
    Nth {
        /// The first weekday
        start: DayOfWeek,
        /// The last weekday, equal to `start` for a single weekday
        end: DayOfWeek,
        /// The occurrence in the month
        nth: NthDay,
    },
}

/// A set of expressions with at least one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exprs<T> {
    /// The first expression
    pub first: T,
    /// The rest of the other expressions in the set.
    pub tail: Vec<T>,
}

/// An immutable iterator over all expressions in a set of [`Exprs`]
pub type ExprsIter<'a, T> = Chain<Once<&'a T>, slice::Iter<'a, T>>;

/// An owned iterator over all expressions in a set of [`Exprs`]
pub type IntoExprsIter<T> = Chain<Once<T>, vec::IntoIter<T>>;

impl<T> Exprs<T> {
    /// Creates a new set of [`Exprs`] using the first given expression
    pub fn new(first: T) -> Self {
        Self {
            first,
            tail: Vec::new(),
        }
    }

    /// Iterates over all expressions in this set
    pub fn iter(&self) -> ExprsIter<T> {
        core::iter::once(&self.first).chain(self.tail.iter())
    }
}

impl<T> IntoIterator for Exprs<T> {
    type Item = T;
    type IntoIter = IntoExprsIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        core::iter::once(self.first).chain(self.tail)
    }
}

impl<'a, T> IntoIterator for &'a Exprs<T> {
    type Item = &'a T;
    type IntoIter = ExprsIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A parsed cron expression. This can be inspected or expanded into an
/// [`ExpandedExpr`](crate::ExpandedExpr).
///
/// # Example
/// ```
/// use sundial::parse::{CronExpr, DayOfWeekTerm};
///
/// let expr: CronExpr = "0 0 * * L5".parse().expect("Valid cron expression");
/// assert!(expr.seconds.is_none());
/// assert!(matches!(expr.dows.first, DayOfWeekTerm::Last(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CronExpr {
    /// The second part of the expression, only present in the 6 field form
    pub seconds: Option<Exprs<OrsExpr<Second>>>,
    /// The minute part of the expression
    pub minutes: Exprs<OrsExpr<Minute>>,
    /// The hour part of the expression
    pub hours: Exprs<OrsExpr<Hour>>,
    /// The day of the month part of the expression
    pub doms: Exprs<DayOfMonthTerm>,
    /// The month part of the expression
    pub months: Exprs<OrsExpr<Month>>,
    /// The day of the week part of the expression.
    pub dows: Exprs<DayOfWeekTerm>,
    /// Whether the day of the month field is written starting with `*`, such as `*/2`
    pub dom_starred: bool,
    /// Whether the day of the week field is written starting with `*`
    pub dow_starred: bool,
}

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Checks every alphabetic word in a field resolves to a name the field understands.
fn check_names(expr: &str, field: Field, text: &str) -> Result<(), CronError> {
    let is_weekday = |w: &str| WEEKDAY_NAMES.contains(&w);
    let words = text
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty());

    for word in words {
        let lower = word.to_ascii_lowercase();
        let known = match field {
            Field::Month => MONTH_NAMES.contains(&lower.as_str()),
            Field::DayOfWeek => {
                is_weekday(&lower) || lower == "l" || lower.strip_prefix('l').map_or(false, is_weekday)
            }
            Field::DayOfMonth => lower == "l",
            _ => false,
        };
        if !known {
            return Err(CronError::NotAlpha {
                expr: expr.to_owned(),
                token: word.to_owned(),
            });
        }
    }

    Ok(())
}

fn field<T, F>(expr: &str, kind: Field, text: &str, parser: F) -> Result<T, CronError>
where
    F: Fn(&str) -> IResult<&str, T>,
{
    check_names(expr, kind, text)?;
    all_consuming(parser)(text)
        .map(|(_, value)| value)
        .map_err(|_| CronError::bad_cron(expr, format!("invalid {} field '{}'", kind, text)))
}

#[inline]
fn map_digit1<E>() -> impl Fn(&str) -> IResult<&str, E>
where
    E: TryFrom<u8, Error = ValueOutOfRangeError>,
{
    move |input: &str| {
        map_res(digit1, |s: &str| {
            let value = s
                .parse::<u8>()
                // discard error, we won't see it anyway
                .map_err(|_| ValueOutOfRangeError)?;

            E::try_from(value)
        })(input)
    }
}

#[inline]
fn step_digit<E>() -> impl Fn(&str) -> IResult<&str, Step<E>> {
    map_digit1()
}

/// A parser that can parse any value, a single value, a range of values, or a step expression
fn ors_expr<E, F>(f: F) -> impl Fn(&str) -> IResult<&str, OrsExpr<E>>
where
    E: ExprValue + Copy,
    F: Fn(&str) -> IResult<&str, E>,
{
    move |input: &str| {
        let (input, star) = opt(char('*'))(input)?;
        if star.is_some() {
            return match opt(char('/'))(input)? {
                (input, Some(_)) => map(step_digit::<E>(), |step| OrsExpr::Step {
                    start: E::min(),
                    end: E::max(),
                    step,
                })(input),
                (input, None) => Ok((input, OrsExpr::All)),
            };
        }

        let (input, start) = f(input)?;
        match opt(alt((char('/'), char('-'))))(input)? {
            (input, Some('/')) => map(step_digit::<E>(), move |step| OrsExpr::Step {
                start,
                end: E::max(),
                step,
            })(input),
            (input, Some(_)) => {
                let (input, end) = f(input)?;
                match opt(char('/'))(input)? {
                    (input, Some(_)) => map(step_digit::<E>(), move |step| OrsExpr::Step {
                        start,
                        end,
                        step,
                    })(input),
                    (input, None) => Ok((input, OrsExpr::Range(start, end))),
                }
            }
            (input, None) => Ok((input, OrsExpr::One(start))),
        }
    }
}

/// Consumes a set of trailing comma separated expressions
fn tail_exprs<'a, T, F>(mut input: &'a str, f: F, mut exprs: Exprs<T>) -> IResult<&'a str, Exprs<T>>
where
    F: Fn(&str) -> IResult<&str, T>,
{
    loop {
        let comma = opt(char(','))(input)?;
        input = comma.0;
        if comma.1.is_none() {
            break Ok((input, exprs));
        }

        let expr = f(input)?;
        input = expr.0;
        exprs.tail.push(expr.1);
    }
}

/// A parser for a comma separated list of terms given a parser for one term.
fn exprs<T, F>(term: F) -> impl Fn(&str) -> IResult<&str, Exprs<T>>
where
    F: Fn(&str) -> IResult<&str, T>,
{
    move |input: &str| {
        let (input, first) = term(input)?;
        tail_exprs(input, &term, Exprs::new(first))
    }
}

fn month(s: &str) -> IResult<&str, Month> {
    alt((
        map_digit1::<Month>(),
        map(tag_no_case("JAN"), |_| Month(1)),
        map(tag_no_case("FEB"), |_| Month(2)),
        map(tag_no_case("MAR"), |_| Month(3)),
        map(tag_no_case("APR"), |_| Month(4)),
        map(tag_no_case("MAY"), |_| Month(5)),
        map(tag_no_case("JUN"), |_| Month(6)),
        map(tag_no_case("JUL"), |_| Month(7)),
        map(tag_no_case("AUG"), |_| Month(8)),
        map(tag_no_case("SEP"), |_| Month(9)),
        map(tag_no_case("OCT"), |_| Month(10)),
        map(tag_no_case("NOV"), |_| Month(11)),
        map(tag_no_case("DEC"), |_| Month(12)),
    ))(s)
}

fn dow(s: &str) -> IResult<&str, DayOfWeek> {
    alt((
        map_digit1::<DayOfWeek>(),
        map(tag_no_case("SUN"), |_| DayOfWeek(0)),
        map(tag_no_case("MON"), |_| DayOfWeek(1)),
        map(tag_no_case("TUE"), |_| DayOfWeek(2)),
        map(tag_no_case("WED"), |_| DayOfWeek(3)),
        map(tag_no_case("THU"), |_| DayOfWeek(4)),
        map(tag_no_case("FRI"), |_| DayOfWeek(5)),
        map(tag_no_case("SAT"), |_| DayOfWeek(6)),
    ))(s)
}

#[inline]
fn seconds_expr(s: &str) -> IResult<&str, Exprs<OrsExpr<Second>>> {
    exprs(ors_expr(map_digit1()))(s)
}

#[inline]
fn minutes_expr(s: &str) -> IResult<&str, Exprs<OrsExpr<Minute>>> {
    exprs(ors_expr(map_digit1()))(s)
}

#[inline]
fn hours_expr(s: &str) -> IResult<&str, Exprs<OrsExpr<Hour>>> {
    exprs(ors_expr(map_digit1()))(s)
}

#[inline]
fn months_expr(s: &str) -> IResult<&str, Exprs<OrsExpr<Month>>> {
    exprs(ors_expr(month))(s)
}

fn dom_term(input: &str) -> IResult<&str, DayOfMonthTerm> {
    let to_last = tuple((
        map_digit1::<DayOfMonth>(),
        char('-'),
        tag_no_case("L"),
        opt(preceded(char('/'), step_digit::<DayOfMonth>())),
    ));

    alt((
        map(to_last, |(start, _, _, step)| DayOfMonthTerm::ToLast { start, step }),
        map(tag_no_case("L"), |_| DayOfMonthTerm::Last),
        map(ors_expr(map_digit1::<DayOfMonth>()), DayOfMonthTerm::Term),
    ))(input)
}

#[inline]
fn doms_expr(s: &str) -> IResult<&str, Exprs<DayOfMonthTerm>> {
    exprs(dom_term)(s)
}

fn dow_term(input: &str) -> IResult<&str, DayOfWeekTerm> {
    let nth = tuple((
        dow,
        opt(preceded(char('-'), dow)),
        char('#'),
        map_digit1::<NthDay>(),
    ));

    alt((
        map(preceded(tag_no_case("L"), dow), DayOfWeekTerm::Last),
        map(nth, |(start, end, _, nth)| DayOfWeekTerm::Nth {
            start,
            end: end.unwrap_or(start),
            nth,
        }),
        map(ors_expr(dow), DayOfWeekTerm::Term),
    ))(input)
}

#[inline]
fn dows_expr(s: &str) -> IResult<&str, Exprs<DayOfWeekTerm>> {
    exprs(dow_term)(s)
}

impl FromStr for CronExpr {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = s.split_whitespace().collect::<Vec<_>>();
        let (seconds, rest) = match fields.len() {
            6 => (Some(fields[0]), &fields[1..]),
            5 => (None, &fields[..]),
            n => {
                return Err(CronError::bad_cron(
                    s,
                    format!("expected 5 or 6 fields, found {}", n),
                ))
            }
        };

        Ok(CronExpr {
            seconds: seconds
                .map(|text| field(s, Field::Second, text, seconds_expr))
                .transpose()?,
            minutes: field(s, Field::Minute, rest[0], minutes_expr)?,
            hours: field(s, Field::Hour, rest[1], hours_expr)?,
            doms: field(s, Field::DayOfMonth, rest[2], doms_expr)?,
            months: field(s, Field::Month, rest[3], months_expr)?,
            dows: field(s, Field::DayOfWeek, rest[4], dows_expr)?,
            dom_starred: rest[2].starts_with('*'),
            dow_starred: rest[4].starts_with('*'),
        })
    }
}
