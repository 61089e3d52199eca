use crate::model::statement::{Statement, StatementResult};

use super::table::table::ApplyErrors;

/// Database commands are how we interact with the database, they are how we ask the database to run a transaction or shutdown
///
/// The majority of interactions happen via statements (e.g. add, update, remove, etc), but there are also commands that are used
/// to control the database.
#[derive(Debug)]
pub enum DatabaseCommand {
    /// Sends a set of statements to the database and returns the results
    Transaction(Vec<Statement>),

    /// Commands that control the database
    Control(Control),
}

impl DatabaseCommand {
    /// Prints complex logs in a more readable format
    pub fn log_format(&self) -> String {
        match self {
            DatabaseCommand::Transaction(statements) => {
                if statements.len() > 1 {
                    format!("{:#?}", self)
                } else {
                    format!("{:?}", self)
                }
            }
            DatabaseCommand::Control(_) => format!("{:?}", self),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DatabaseCommandTransactionResponse {
    /// Transaction has successfully committed, returns a list of statement results
    Commit(Vec<StatementResult>),
    /// Transaction has been rolled back, returns the error of the statement that failed
    Rollback(ApplyErrors),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DatabaseCommandControlResponse {
    /// Successfully performed the control
    Success(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DatabaseCommandResponse {
    DatabaseCommandTransactionResponse(DatabaseCommandTransactionResponse),
    DatabaseCommandControlResponse(DatabaseCommandControlResponse),
}

impl DatabaseCommandResponse {
    pub fn control_success(message: &str) -> Self {
        DatabaseCommandResponse::DatabaseCommandControlResponse(
            DatabaseCommandControlResponse::Success(message.to_string()),
        )
    }

    pub fn transaction_commit(results: Vec<StatementResult>) -> Self {
        DatabaseCommandResponse::DatabaseCommandTransactionResponse(
            DatabaseCommandTransactionResponse::Commit(results),
        )
    }

    pub fn transaction_rollback(error: ApplyErrors) -> Self {
        DatabaseCommandResponse::DatabaseCommandTransactionResponse(
            DatabaseCommandTransactionResponse::Rollback(error),
        )
    }
}

#[derive(Debug, PartialEq)]
pub enum Control {
    /// Performs a safe shutdown of the database, requests before the shutdown will be run / committed, requests after the shutdown will be ignored
    Shutdown,
}

pub struct DatabaseCommandRequest {
    pub resolver: oneshot::Sender<DatabaseCommandResponse>,
    pub command: DatabaseCommand,
}
