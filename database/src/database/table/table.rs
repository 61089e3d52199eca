use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::{
    consts::consts::{EntityId, START_AT_ID},
    model::{
        person::Person,
        statement::{Statement, StatementResult},
    },
};

use super::filter::filter;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyErrors {
    // CRUD - UPDATE
    #[error("Cannot Update, record does not exist: {0}")]
    CannotUpdateDoesNotExist(EntityId),

    // CRUD - DELETE
    #[error("Cannot delete, record does not exist: {0}")]
    CannotDeleteDoesNotExist(EntityId),

    // Constraints
    #[error("Cannot add row as a person already exists with this username: {0}")]
    UniqueConstraintViolation(String),

    #[error("Cannot set field to null: {0}")]
    NotNullConstraintViolation(String),
}

/// How to revert a mutation that was applied as part of a transaction that is being rolled back
#[derive(Debug, Clone, PartialEq)]
pub enum Undo {
    /// Row was created by the mutation
    RemoveAdded(EntityId),
    /// Row existed before the mutation, put the previous state back
    Restore(Person),
}

pub struct PersonTable {
    /// Ordered by id, which is the order people are listed in
    pub person_rows: BTreeMap<EntityId, Person>,
    pub unique_username_index: HashMap<String, EntityId>,
    next_id: EntityId,
}

impl Default for PersonTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PersonTable {
    pub fn new() -> Self {
        Self {
            person_rows: BTreeMap::new(),
            unique_username_index: HashMap::new(),
            next_id: START_AT_ID,
        }
    }

    // Each mutation statement can be broken up into 3 steps
    //  - Verifying validity / constraints (uniqueness)
    //  - Applying statement
    //  - Returning how to undo it
    pub fn apply(
        &mut self,
        statement: Statement,
    ) -> Result<(StatementResult, Option<Undo>), ApplyErrors> {
        let applied = match statement {
            Statement::Add(new_person) => {
                if self
                    .unique_username_index
                    .contains_key(&new_person.username)
                {
                    return Err(ApplyErrors::UniqueConstraintViolation(new_person.username));
                }

                let id = self.next_id;
                self.next_id = id.increment();

                let person = new_person.into_person(id);

                self.unique_username_index
                    .insert(person.username.clone(), id);
                self.person_rows.insert(id, person.clone());

                (StatementResult::Single(person), Some(Undo::RemoveAdded(id)))
            }
            Statement::Update(id, update_person) => {
                let previous = self
                    .person_rows
                    .get(&id)
                    .ok_or(ApplyErrors::CannotUpdateDoesNotExist(id))?
                    .clone();

                let current = update_person.apply(&previous)?;

                // Updating the username to the same value does not violate the constraint
                if current.username != previous.username
                    && self.unique_username_index.contains_key(&current.username)
                {
                    return Err(ApplyErrors::UniqueConstraintViolation(current.username));
                }

                self.unique_username_index.remove(&previous.username);
                self.unique_username_index
                    .insert(current.username.clone(), id);
                self.person_rows.insert(id, current.clone());

                (StatementResult::Single(current), Some(Undo::Restore(previous)))
            }
            Statement::Remove(id) => {
                let previous = self
                    .person_rows
                    .remove(&id)
                    .ok_or(ApplyErrors::CannotDeleteDoesNotExist(id))?;

                self.unique_username_index.remove(&previous.username);

                (
                    StatementResult::Single(previous.clone()),
                    Some(Undo::Restore(previous)),
                )
            }
            Statement::Get(id) => (
                StatementResult::GetSingle(self.person_rows.get(&id).cloned()),
                None,
            ),
            Statement::GetByUsername(username) => {
                let person = self
                    .unique_username_index
                    .get(&username)
                    .and_then(|id| self.person_rows.get(id))
                    .cloned();

                (StatementResult::GetSingle(person), None)
            }
            Statement::List(person_filter) => {
                let people: Vec<Person> = self.person_rows.values().cloned().collect();

                let people = match person_filter {
                    Some(f) => filter(people, &f.query, f.reference_date),
                    None => people,
                };

                (StatementResult::List(people), None)
            }
        };

        Ok(applied)
    }

    // Undo records must be applied in the reverse order they were produced
    pub fn apply_rollback(&mut self, undo: Undo) {
        match undo {
            Undo::RemoveAdded(id) => {
                if let Some(person) = self.person_rows.remove(&id) {
                    self.unique_username_index.remove(&person.username);
                }

                // Ids handed out by a rolled back transaction are handed out again, so replaying the
                //  transaction log reproduces the same ids
                self.next_id = id;
            }
            Undo::Restore(previous) => {
                if let Some(current) = self.person_rows.get(&previous.id) {
                    self.unique_username_index.remove(&current.username);
                }

                self.unique_username_index
                    .insert(previous.username.clone(), previous.id);
                self.person_rows.insert(previous.id, previous);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.person_rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.person_rows.is_empty()
    }
}
