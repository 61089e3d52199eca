use serde::{Deserialize, Serialize};

use crate::{
    consts::consts::EntityId,
    database::table::{filter::PersonFilter, row::UpdatePersonData},
};

use super::person::{NewPerson, Person};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Statement {
    Add(NewPerson),
    Update(EntityId, UpdatePersonData),
    Remove(EntityId),
    Get(EntityId),
    GetByUsername(String),
    /// Returns a list of Person ordered by id, optionally narrowed down by a filter
    List(Option<PersonFilter>),
}

impl Statement {
    pub fn is_mutation(&self) -> bool {
        match self {
            Statement::Add(_) | Statement::Remove(_) | Statement::Update(_, _) => true,
            Statement::List(_) | Statement::Get(_) | Statement::GetByUsername(_) => false,
        }
    }
}

// TODO: Tie each Statement to its result type so callers no longer go through the panicking accessors below
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum StatementResult {
    Single(Person),
    GetSingle(Option<Person>),
    List(Vec<Person>),
}

impl StatementResult {
    pub fn single(self) -> Person {
        if let StatementResult::Single(p) = self {
            p
        } else {
            panic!("Statement result is not of type Single")
        }
    }

    pub fn get_single(self) -> Option<Person> {
        if let StatementResult::GetSingle(p) = self {
            p
        } else {
            panic!("Statement result is not of type GetSingle")
        }
    }

    pub fn list(self) -> Vec<Person> {
        if let StatementResult::List(l) = self {
            l
        } else {
            panic!("Statement result is not of type List")
        }
    }
}
