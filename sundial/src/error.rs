//! Errors raised while expanding expressions and searching for matching times.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Result type alias for cron operations
pub type Result<T> = std::result::Result<T, CronError>;

/// An error returned by the expander, the iterator constructors or the stepper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    /// The expression is structurally malformed: wrong field count, an out of range value,
    /// a reversed range, a zero step or an unknown character.
    #[error("[{expr}] is not acceptable: {reason}")]
    BadCron { expr: String, reason: String },

    /// An alphabetic token didn't resolve to a month or weekday name valid for its field.
    #[error("[{expr}] is not acceptable: unknown name '{token}'")]
    NotAlpha { expr: String, token: String },

    /// The expression parses but combines features that can't be evaluated deterministically.
    #[error("[{expr}] is not supported: {reason}")]
    UnsupportedSyntax { expr: String, reason: String },

    /// No matching time exists within the lookahead window.
    #[error("failed to find a matching time within {years} year(s) of {from}")]
    BadDate { from: NaiveDateTime, years: u32 },
}

impl CronError {
    pub(crate) fn bad_cron(expr: &str, reason: impl Into<String>) -> Self {
        CronError::BadCron {
            expr: expr.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(expr: &str, reason: impl Into<String>) -> Self {
        CronError::UnsupportedSyntax {
            expr: expr.to_owned(),
            reason: reason.into(),
        }
    }

    /// Returns whether the error describes a malformed expression.
    ///
    /// Alias and unsupported syntax errors are specialised kinds of malformed expressions, so
    /// this returns `true` for them as well. Only [`CronError::BadDate`] returns `false`.
    ///
    /// # Example
    /// ```
    /// use sundial::expand;
    ///
    /// assert!(expand("* * * * foo").unwrap_err().is_bad_cron());
    /// assert!(expand("* * * * 1,sat#3").unwrap_err().is_bad_cron());
    /// ```
    pub fn is_bad_cron(&self) -> bool {
        !matches!(self, CronError::BadDate { .. })
    }
}
