use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::consts::consts::EntityId;

use super::age::age_of;

/// A user account extended with contact details and a birth date
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Person {
    pub id: EntityId,
    pub username: String,
    /// Password hash in PHC string format, never the plain text password
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub is_staff: bool,
}

impl Person {
    /// Age is never stored, it is derived from the birth date every time it is needed
    pub fn age_at(&self, reference_date: NaiveDate) -> Option<i32> {
        age_of(self.date_of_birth, reference_date)
    }
}

/// Person that has not been persisted yet, the table assigns the id
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewPerson {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub is_staff: bool,
}

impl NewPerson {
    pub fn into_person(self, id: EntityId) -> Person {
        Person {
            id,
            username: self.username,
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            date_of_birth: self.date_of_birth,
            is_staff: self.is_staff,
        }
    }

    pub fn new_test(username: &str, first_name: &str, date_of_birth: Option<NaiveDate>) -> Self {
        NewPerson {
            username: username.to_string(),
            password: "not-a-real-hash".to_string(),
            first_name: first_name.to_string(),
            last_name: "User".to_string(),
            email: format!("{}@example.com", username),
            phone: String::new(),
            date_of_birth,
            is_staff: false,
        }
    }
}

impl Person {
    pub fn new_test(id: u64, first_name: &str, date_of_birth: Option<NaiveDate>) -> Self {
        NewPerson::new_test(&format!("user-{}", id), first_name, date_of_birth)
            .into_person(EntityId(id))
    }
}
