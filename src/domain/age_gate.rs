use crate::error::{EnrollError, Result};
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// Client-side age requirement checked before an enrollment is submitted.
///
/// The check is bypassable; the backend re-validates on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgePolicy {
    /// Applicant must be at least `years` old on the day of submission.
    MinimumAge { years: u32 },
    /// Applicant must be born before January 1st of `year`.
    BornBefore { year: i32 },
}

impl Default for AgePolicy {
    fn default() -> Self {
        AgePolicy::MinimumAge { years: 17 }
    }
}

impl AgePolicy {
    pub fn check(&self, birth_date: NaiveDate, today: NaiveDate) -> Result<()> {
        match *self {
            AgePolicy::MinimumAge { years } => {
                if age_on(birth_date, today) < years as i32 {
                    return Err(EnrollError::AgeGate(format!(
                        "Você precisa ter no mínimo {years} anos para se inscrever."
                    )));
                }
            }
            AgePolicy::BornBefore { year } => {
                if birth_date.year() >= year {
                    return Err(EnrollError::AgeGate(format!(
                        "Inscrições permitidas apenas para nascidos antes de {year}."
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Full years elapsed between `birth_date` and `today`.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

impl FromStr for AgePolicy {
    type Err = EnrollError;

    /// Accepts `min-age:<years>` or `born-before:<year>`.
    fn from_str(s: &str) -> Result<Self> {
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| EnrollError::Validation(format!("invalid age policy: {s}")))?;
        let invalid = |_| EnrollError::Validation(format!("invalid age policy value: {value}"));
        match kind.trim() {
            "min-age" => Ok(AgePolicy::MinimumAge {
                years: value.trim().parse().map_err(invalid)?,
            }),
            "born-before" => Ok(AgePolicy::BornBefore {
                year: value.trim().parse().map_err(invalid)?,
            }),
            other => Err(EnrollError::Validation(format!(
                "unknown age policy kind: {other}"
            ))),
        }
    }
}

impl fmt::Display for AgePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgePolicy::MinimumAge { years } => write!(f, "min-age:{years}"),
            AgePolicy::BornBefore { year } => write!(f, "born-before:{year}"),
        }
    }
}
