use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::person::Person;

/// Request level validation failure for a single query parameter
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn must_be_an_integer(field: &'static str) -> Self {
        ValidationError {
            field,
            message: format!("{} must be an integer", field),
        }
    }
}

/// Query parameters as they arrive from the outside world, nothing has been validated yet
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RawPersonQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub min_age: Option<String>,
    pub max_age: Option<String>,
}

impl RawPersonQuery {
    /// Validates both age bounds before any filtering can happen, `min_age` is reported first
    pub fn parse(self) -> Result<AgeQuery, ValidationError> {
        let min_age = parse_age_bound("min_age", self.min_age.as_deref())?;
        let max_age = parse_age_bound("max_age", self.max_age.as_deref())?;

        Ok(AgeQuery {
            first_name_substring: self.first_name,
            last_name_substring: self.last_name,
            min_age,
            max_age,
        })
    }
}

/// Empty values mean the bound was not supplied
fn parse_age_bound(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<u32>, ValidationError> {
    let value = match value.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(v) => v,
    };

    let digits = value.strip_prefix('+').unwrap_or(value);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::must_be_an_integer(field));
    }

    // Only overflow can fail here, bounds that large saturate
    Ok(Some(digits.parse::<u32>().unwrap_or(u32::MAX)))
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AgeQuery {
    pub first_name_substring: Option<String>,
    pub last_name_substring: Option<String>,
    /// Inclusive
    pub min_age: Option<u32>,
    /// Inclusive
    pub max_age: Option<u32>,
}

impl AgeQuery {
    pub fn has_age_bound(&self) -> bool {
        self.min_age.is_some() || self.max_age.is_some()
    }

    pub fn matches(&self, person: &Person, reference_date: NaiveDate) -> bool {
        if let Some(first_name) = &self.first_name_substring {
            if !person.first_name.contains(first_name.as_str()) {
                return false;
            }
        }

        if let Some(last_name) = &self.last_name_substring {
            if !person.last_name.contains(last_name.as_str()) {
                return false;
            }
        }

        if !self.has_age_bound() {
            return true;
        }

        // Undefined age never satisfies an age bound
        let age = match person.age_at(reference_date) {
            Some(age) => age as i64,
            None => return false,
        };

        if let Some(min_age) = self.min_age {
            if age < min_age as i64 {
                return false;
            }
        }

        if let Some(max_age) = self.max_age {
            if age > max_age as i64 {
                return false;
            }
        }

        true
    }
}

/// A validated query together with the date ages are computed against, captured when the request was made
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PersonFilter {
    pub query: AgeQuery,
    pub reference_date: NaiveDate,
}

impl PersonFilter {
    pub fn new(query: AgeQuery, reference_date: NaiveDate) -> Self {
        Self {
            query,
            reference_date,
        }
    }
}

/// Keeps the people matching every supplied predicate, preserving their relative order
#[tracing::instrument(skip(people))]
pub fn filter(people: Vec<Person>, query: &AgeQuery, reference_date: NaiveDate) -> Vec<Person> {
    people
        .into_iter()
        .filter(|person| query.matches(person, reference_date))
        .collect()
}
