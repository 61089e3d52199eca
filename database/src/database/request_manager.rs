use std::time::Duration;
use thiserror::Error;

use crate::{
    consts::consts::EntityId,
    model::{
        person::{NewPerson, Person},
        statement::{Statement, StatementResult},
    },
};

use super::{
    commands::{
        Control, DatabaseCommand, DatabaseCommandControlResponse, DatabaseCommandRequest,
        DatabaseCommandResponse, DatabaseCommandTransactionResponse,
    },
    table::{filter::PersonFilter, row::UpdatePersonData, table::ApplyErrors},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug, PartialEq)]
pub enum RequestManagerError {
    #[error("Database took too long to respond to request")]
    DatabaseTimeout,
    #[error("Database is no longer running")]
    DatabaseDisconnected,
    #[error("Rolled back transaction: {0}")]
    TransactionRollback(ApplyErrors),
}

/// Goal of the request manager is to provide a simple interface for interacting with the database
///
/// The request manager provides the following APIs. These are sorted by the easiest to use to the most complex
/// 1. CRUD operations on a single person -- these are completely type safe
/// 2. Transaction based API -- allows you to send multiple statements to the database at once, you need to know
///    which StatementResult each Statement maps to
#[derive(Clone)]
pub struct RequestManager {
    database_sender: flume::Sender<DatabaseCommandRequest>,
}

impl RequestManager {
    pub fn new(database_sender: flume::Sender<DatabaseCommandRequest>) -> Self {
        Self { database_sender }
    }

    pub fn send_add(&self, person: NewPerson) -> Result<Person, RequestManagerError> {
        let statement_result = self.send_single_statement(Statement::Add(person))?;
        Ok(statement_result.single())
    }

    pub fn send_update(
        &self,
        id: EntityId,
        person_update: UpdatePersonData,
    ) -> Result<Person, RequestManagerError> {
        let statement_result = self.send_single_statement(Statement::Update(id, person_update))?;
        Ok(statement_result.single())
    }

    /// Returns the person as it was before it was removed
    pub fn send_remove(&self, id: EntityId) -> Result<Person, RequestManagerError> {
        let statement_result = self.send_single_statement(Statement::Remove(id))?;
        Ok(statement_result.single())
    }

    pub fn send_get(&self, id: EntityId) -> Result<Option<Person>, RequestManagerError> {
        let statement_result = self.send_single_statement(Statement::Get(id))?;
        Ok(statement_result.get_single())
    }

    pub fn send_get_by_username(
        &self,
        username: String,
    ) -> Result<Option<Person>, RequestManagerError> {
        let statement_result = self.send_single_statement(Statement::GetByUsername(username))?;
        Ok(statement_result.get_single())
    }

    pub fn send_list(
        &self,
        person_filter: Option<PersonFilter>,
    ) -> Result<Vec<Person>, RequestManagerError> {
        let statement_result = self.send_single_statement(Statement::List(person_filter))?;
        Ok(statement_result.list())
    }

    /// Sends a shutdown request to the database and returns the database's response
    pub fn send_shutdown_request(&self) -> Result<String, RequestManagerError> {
        match self.send_command(DatabaseCommand::Control(Control::Shutdown))? {
            DatabaseCommandResponse::DatabaseCommandControlResponse(
                DatabaseCommandControlResponse::Success(message),
            ) => Ok(message),
            response => panic!("Unexpected response to a control command: {:?}", response),
        }
    }

    /// Sends a single statement to the database and returns a single statement result
    pub fn send_single_statement(
        &self,
        statement: Statement,
    ) -> Result<StatementResult, RequestManagerError> {
        let single_statement_result = self
            .send_transaction(vec![statement])?
            .pop()
            .expect("single a statement should generate single response");

        Ok(single_statement_result)
    }

    /// Runs all statements atomically, either every statement is applied or none are
    pub fn send_transaction(
        &self,
        statements: Vec<Statement>,
    ) -> Result<Vec<StatementResult>, RequestManagerError> {
        match self.send_command(DatabaseCommand::Transaction(statements))? {
            DatabaseCommandResponse::DatabaseCommandTransactionResponse(
                DatabaseCommandTransactionResponse::Commit(results),
            ) => Ok(results),
            DatabaseCommandResponse::DatabaseCommandTransactionResponse(
                DatabaseCommandTransactionResponse::Rollback(error),
            ) => Err(RequestManagerError::TransactionRollback(error)),
            response => panic!("Unexpected response to a transaction: {:?}", response),
        }
    }

    fn send_command(
        &self,
        command: DatabaseCommand,
    ) -> Result<DatabaseCommandResponse, RequestManagerError> {
        let (resolver, response_receiver) = oneshot::channel::<DatabaseCommandResponse>();

        // Sends the request to the database worker, database will respond
        //  on the response_receiver once it's finished processing its request
        self.database_sender
            .send(DatabaseCommandRequest { resolver, command })
            .map_err(|_| RequestManagerError::DatabaseDisconnected)?;

        match response_receiver.recv_timeout(REQUEST_TIMEOUT) {
            Ok(response) => Ok(response),
            Err(oneshot::RecvTimeoutError::Timeout) => Err(RequestManagerError::DatabaseTimeout),
            Err(oneshot::RecvTimeoutError::Disconnected) => {
                Err(RequestManagerError::DatabaseDisconnected)
            }
        }
    }
}
