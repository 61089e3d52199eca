use actix_web::HttpRequest;
use chrono::NaiveDate;
use database::{
    database::table::row::{UpdatePersonData, UpdateStatement},
    model::person::{NewPerson, Person},
};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    auth::{hash_password, PasswordError},
    errors::{ApiError, FieldErrors},
};

lazy_static::lazy_static! {
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^.@\s]+$").unwrap();
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?\d{8,15}$").unwrap();
}

const NAME_MAX_LENGTH: usize = 150;
const PASSWORD_MAX_LENGTH: usize = 128;
const EMAIL_MAX_LENGTH: usize = 254;
const PHONE_MAX_LENGTH: usize = 16;

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";

/// Create and Replace (PUT) need every required field, Partial (PATCH) only touches what was sent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Create,
    Replace,
    Partial,
}

impl InputMode {
    fn requires_all(&self) -> bool {
        !matches!(self, InputMode::Partial)
    }
}

/// Tells a missing field (`None`) apart from an explicit `null` (`Some(None)`)
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Writable person fields as sent by the client, unknown keys are ignored
#[derive(Deserialize, Debug, Default)]
pub struct PersonInput {
    #[serde(default, deserialize_with = "present")]
    pub username: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub password: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub date_of_birth: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub is_staff: Option<Option<bool>>,
}

/// Validated changes, `None` leaves the stored value untouched
#[derive(Debug, Default, PartialEq)]
pub struct PersonChanges {
    pub username: Option<String>,
    /// Plain text until `hash_password` runs
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub is_staff: Option<bool>,
}

struct Validator {
    mode: InputMode,
    errors: FieldErrors,
}

impl Validator {
    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    fn max_length(&mut self, field: &str, value: &str, max_length: usize) -> bool {
        if value.chars().count() > max_length {
            self.error(
                field,
                format!("Ensure this field has no more than {} characters.", max_length),
            );
            return false;
        }

        true
    }

    /// Strings that may be blank but never null
    fn text(
        &mut self,
        field: &str,
        value: Option<Option<String>>,
        max_length: usize,
    ) -> Option<String> {
        match value? {
            None => {
                self.error(field, NOT_NULL);
                None
            }
            Some(text) => self.max_length(field, &text, max_length).then_some(text),
        }
    }

    /// Strings that must be present on create / replace and never blank
    fn required_text(
        &mut self,
        field: &str,
        value: Option<Option<String>>,
        max_length: usize,
    ) -> Option<String> {
        match value {
            None if self.mode.requires_all() => {
                self.error(field, REQUIRED);
                None
            }
            None => None,
            Some(None) => {
                self.error(field, NOT_NULL);
                None
            }
            Some(Some(text)) if text.is_empty() => {
                self.error(field, NOT_BLANK);
                None
            }
            Some(Some(text)) => self.max_length(field, &text, max_length).then_some(text),
        }
    }

    fn matching(
        &mut self,
        field: &str,
        value: Option<String>,
        regex: &Regex,
        message: &str,
    ) -> Option<String> {
        let value = value?;

        if !value.is_empty() && !regex.is_match(&value) {
            self.error(field, message);
            return None;
        }

        Some(value)
    }

    fn date(&mut self, field: &str, value: Option<Option<String>>) -> Option<Option<NaiveDate>> {
        match value? {
            None => Some(None),
            Some(text) => match NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
                Ok(date) => Some(Some(date)),
                Err(_) => {
                    self.error(
                        field,
                        "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
                    );
                    None
                }
            },
        }
    }

    fn boolean(&mut self, field: &str, value: Option<Option<bool>>) -> Option<bool> {
        match value? {
            None => {
                self.error(field, NOT_NULL);
                None
            }
            Some(value) => Some(value),
        }
    }
}

impl PersonInput {
    /// Collects every field error before failing, like a form would
    pub fn validate(self, mode: InputMode) -> Result<PersonChanges, ApiError> {
        let mut validator = Validator {
            mode,
            errors: FieldErrors::new(),
        };

        let username = validator.required_text("username", self.username, NAME_MAX_LENGTH);
        let username = validator.matching(
            "username",
            username,
            &USERNAME_REGEX,
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );

        let password = validator.required_text("password", self.password, PASSWORD_MAX_LENGTH);

        let first_name = validator.text("first_name", self.first_name, NAME_MAX_LENGTH);
        let last_name = validator.text("last_name", self.last_name, NAME_MAX_LENGTH);

        let email = validator.text("email", self.email, EMAIL_MAX_LENGTH);
        let email = validator.matching("email", email, &EMAIL_REGEX, "Enter a valid email address.");

        let phone = validator.text("phone", self.phone, PHONE_MAX_LENGTH);
        let phone = validator.matching(
            "phone",
            phone,
            &PHONE_REGEX,
            "Phone number format: '(+)ccxxxxxxxxxx' with 8 to 15 digits.",
        );

        let date_of_birth = validator.date("date_of_birth", self.date_of_birth);
        let is_staff = validator.boolean("is_staff", self.is_staff);

        if !validator.errors.is_empty() {
            return Err(ApiError::Validation(validator.errors));
        }

        Ok(PersonChanges {
            username,
            password,
            first_name,
            last_name,
            email,
            phone,
            date_of_birth,
            is_staff,
        })
    }
}

fn to_update_statement<T>(value: Option<T>) -> UpdateStatement<T> {
    match value {
        Some(value) => UpdateStatement::Set(value),
        None => UpdateStatement::NoChanges,
    }
}

impl PersonChanges {
    /// Swaps the plain text password for its Argon2 hash, slow enough to belong on the blocking pool
    pub fn hash_password(mut self) -> Result<Self, PasswordError> {
        if let Some(password) = self.password.take() {
            self.password = Some(hash_password(&password)?);
        }

        Ok(self)
    }

    /// Fields a create did not send fall back to their blank defaults
    pub fn into_new_person(self) -> NewPerson {
        NewPerson {
            username: self.username.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
            date_of_birth: self.date_of_birth.flatten(),
            is_staff: self.is_staff.unwrap_or_default(),
        }
    }

    pub fn into_update(self) -> UpdatePersonData {
        UpdatePersonData {
            username: to_update_statement(self.username),
            password: to_update_statement(self.password),
            first_name: to_update_statement(self.first_name),
            last_name: to_update_statement(self.last_name),
            email: to_update_statement(self.email),
            phone: to_update_statement(self.phone),
            date_of_birth: match self.date_of_birth {
                Some(Some(date)) => UpdateStatement::Set(date),
                Some(None) => UpdateStatement::Unset,
                None => UpdateStatement::NoChanges,
            },
            is_staff: to_update_statement(self.is_staff),
        }
    }
}

fn person_url(req: &HttpRequest, person: &Person) -> Result<String, ApiError> {
    req.url_for("person_detail", [person.id.to_string()])
        .map(|url| url.to_string())
        .map_err(|e| {
            log::error!("Unable to build person url: {}", e);
            ApiError::Internal
        })
}

/// Every readable field, used by the admin endpoints
#[derive(Serialize, Debug, PartialEq)]
pub struct PersonResponse {
    pub url: String,
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<i32>,
    pub username: String,
    pub is_staff: bool,
}

impl PersonResponse {
    pub fn new(req: &HttpRequest, person: Person, today: NaiveDate) -> Result<Self, ApiError> {
        Ok(Self {
            url: person_url(req, &person)?,
            id: person.id.to_number(),
            age: person.age_at(today),
            first_name: person.first_name,
            last_name: person.last_name,
            email: person.email,
            phone: person.phone,
            date_of_birth: person.date_of_birth,
            username: person.username,
            is_staff: person.is_staff,
        })
    }
}

/// Public view of a person, account details stay hidden
#[derive(Serialize, Debug, PartialEq)]
pub struct FilterPersonResponse {
    pub url: String,
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<i32>,
}

impl FilterPersonResponse {
    pub fn new(req: &HttpRequest, person: Person, today: NaiveDate) -> Result<Self, ApiError> {
        Ok(Self {
            url: person_url(req, &person)?,
            id: person.id.to_number(),
            age: person.age_at(today),
            first_name: person.first_name,
            last_name: person.last_name,
            email: person.email,
            phone: person.phone,
            date_of_birth: person.date_of_birth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: serde_json::Value) -> PersonInput {
        serde_json::from_value(value).expect("valid input json")
    }

    fn field_errors(result: Result<PersonChanges, ApiError>) -> FieldErrors {
        match result {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("Expected validation errors, got {:?}", other),
        }
    }

    mod validate {
        use super::*;

        #[test]
        fn create_happy_path() {
            let changes = input(json!({
                "username": "test",
                "password": "test123",
                "email": "test@example.com",
                "first_name": "Test",
                "last_name": "User",
                "phone": "1111111111",
                "date_of_birth": "2002-01-01",
                "dateOfBirth": "ignored",
            }))
            .validate(InputMode::Create)
            .expect("valid");

            assert_eq!(changes.username.as_deref(), Some("test"));
            assert_eq!(
                changes.date_of_birth,
                Some(NaiveDate::from_ymd_opt(2002, 1, 1))
            );
            assert_eq!(changes.is_staff, None);
        }

        #[test]
        fn create_requires_username_and_password() {
            let errors = field_errors(input(json!({})).validate(InputMode::Create));

            assert_eq!(errors["username"], vec![REQUIRED]);
            assert_eq!(errors["password"], vec![REQUIRED]);
            assert_eq!(errors.len(), 2);
        }

        #[test]
        fn partial_requires_nothing() {
            let changes = input(json!({ "first_name": "Changed" }))
                .validate(InputMode::Partial)
                .expect("valid");

            assert_eq!(
                changes,
                PersonChanges {
                    first_name: Some("Changed".to_string()),
                    ..Default::default()
                }
            );
        }

        #[test]
        fn reports_every_invalid_field() {
            let errors = field_errors(
                input(json!({
                    "username": "has spaces",
                    "password": "",
                    "email": "not-an-email",
                    "phone": "12-34",
                    "date_of_birth": "01/02/2000",
                    "is_staff": null,
                    "first_name": null,
                }))
                .validate(InputMode::Create),
            );

            assert_eq!(
                errors.keys().collect::<Vec<_>>(),
                vec![
                    "date_of_birth",
                    "email",
                    "first_name",
                    "is_staff",
                    "password",
                    "phone",
                    "username"
                ]
            );
            assert_eq!(
                errors["phone"],
                vec!["Phone number format: '(+)ccxxxxxxxxxx' with 8 to 15 digits."]
            );
            assert_eq!(errors["password"], vec![NOT_BLANK]);
        }

        #[test]
        fn blank_optional_fields_are_allowed() {
            let changes = input(json!({ "email": "", "phone": "", "date_of_birth": null }))
                .validate(InputMode::Partial)
                .expect("valid");

            assert_eq!(changes.email.as_deref(), Some(""));
            assert_eq!(changes.phone.as_deref(), Some(""));
            assert_eq!(changes.date_of_birth, Some(None));
        }

        #[test]
        fn username_length_is_limited() {
            let errors = field_errors(
                input(json!({ "username": "a".repeat(151) })).validate(InputMode::Partial),
            );

            assert_eq!(
                errors["username"],
                vec!["Ensure this field has no more than 150 characters."]
            );
        }
    }

    mod convert {
        use super::*;

        #[test]
        fn unset_birth_date_becomes_unset_statement() {
            let update = PersonChanges {
                date_of_birth: Some(None),
                email: Some(String::new()),
                ..Default::default()
            }
            .into_update();

            assert_eq!(update.date_of_birth, UpdateStatement::Unset);
            assert_eq!(update.email, UpdateStatement::Set(String::new()));
            assert_eq!(update.username, UpdateStatement::NoChanges);
        }

        #[test]
        fn password_is_hashed() {
            let changes = PersonChanges {
                password: Some("admin123".to_string()),
                ..Default::default()
            }
            .hash_password()
            .expect("hash");

            let password = changes.password.expect("password");

            assert!(password.starts_with("$argon2"));
            assert!(crate::auth::verify_password("admin123", &password).unwrap());
        }
    }
}
