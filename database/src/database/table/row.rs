use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::person::Person;

use super::table::ApplyErrors;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub enum UpdateStatement<T> {
    Set(T),
    Unset,
    #[default]
    NoChanges,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct UpdatePersonData {
    pub username: UpdateStatement<String>,
    pub password: UpdateStatement<String>,
    pub first_name: UpdateStatement<String>,
    pub last_name: UpdateStatement<String>,
    pub email: UpdateStatement<String>,
    pub phone: UpdateStatement<String>,
    pub date_of_birth: UpdateStatement<NaiveDate>,
    pub is_staff: UpdateStatement<bool>,
}

/// Required field, cannot be unset
fn apply_required<T: Clone>(
    field: &str,
    target: &mut T,
    update: &UpdateStatement<T>,
) -> Result<(), ApplyErrors> {
    match update {
        UpdateStatement::Set(value) => *target = value.clone(),
        UpdateStatement::Unset => {
            return Err(ApplyErrors::NotNullConstraintViolation(field.to_string()))
        }
        UpdateStatement::NoChanges => {}
    }

    Ok(())
}

/// Blank-able text field, unsetting stores the empty string
fn apply_text(target: &mut String, update: &UpdateStatement<String>) {
    match update {
        UpdateStatement::Set(value) => *target = value.clone(),
        UpdateStatement::Unset => target.clear(),
        UpdateStatement::NoChanges => {}
    }
}

fn apply_optional<T: Clone>(target: &mut Option<T>, update: &UpdateStatement<T>) {
    match update {
        UpdateStatement::Set(value) => *target = Some(value.clone()),
        UpdateStatement::Unset => *target = None,
        UpdateStatement::NoChanges => {}
    }
}

impl UpdatePersonData {
    /// Produces the updated person, the previous state is left untouched
    pub fn apply(&self, previous: &Person) -> Result<Person, ApplyErrors> {
        let mut current = previous.clone();

        apply_required("username", &mut current.username, &self.username)?;
        apply_required("password", &mut current.password, &self.password)?;
        apply_required("is_staff", &mut current.is_staff, &self.is_staff)?;

        apply_text(&mut current.first_name, &self.first_name);
        apply_text(&mut current.last_name, &self.last_name);
        apply_text(&mut current.email, &self.email);
        apply_text(&mut current.phone, &self.phone);

        apply_optional(&mut current.date_of_birth, &self.date_of_birth);

        Ok(current)
    }
}
