use std::{thread, time::Instant};

use num_format::{Locale, ToFormattedString};
use thiserror::Error;

use crate::{
    consts::consts::TransactionId,
    model::statement::{Statement, StatementResult},
    persistence::{
        storage::{file::FileStorage, StorageError},
        transaction::{RestoreError, TransactionWAL},
    },
};

use super::{
    commands::{
        Control, DatabaseCommand, DatabaseCommandRequest, DatabaseCommandResponse,
        DatabaseCommandTransactionResponse,
    },
    options::DatabaseOptions,
    request_manager::RequestManager,
    table::table::{ApplyErrors, PersonTable, Undo},
    utils::crash::{crash_database, DatabaseCrash},
};

#[derive(Error, Debug)]
pub enum DatabaseStartError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Restore(#[from] RestoreError),

    #[error("Transaction {0} from the transaction log could not be replayed: {1}")]
    Replay(TransactionId, ApplyErrors),

    #[error("Unable to spawn database worker thread: {0}")]
    Spawn(std::io::Error),
}

/// Replayed transactions are already in the log, they must not be written again
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplyMode {
    Request,
    Restore,
}

pub struct Database {
    pub(crate) person_table: PersonTable,
    transaction_wal: TransactionWAL,
    database_options: DatabaseOptions,
}

impl Database {
    pub fn new(options: DatabaseOptions) -> Result<Self, StorageError> {
        let storage = FileStorage::new(options.data_directory.clone())?;

        Ok(Self {
            person_table: PersonTable::new(),
            transaction_wal: TransactionWAL::new(options.write_mode.clone(), Box::new(storage)),
            database_options: options,
        })
    }

    /// Restores the database then moves it onto its own worker thread, the returned request manager
    /// is the only way to talk to it from then on
    pub fn run(mut self) -> Result<RequestManager, DatabaseStartError> {
        self.start()?;

        let (database_sender, database_receiver) = flume::unbounded::<DatabaseCommandRequest>();

        thread::Builder::new()
            .name("Database Worker".to_string())
            .spawn(move || self.run_worker(database_receiver))
            .map_err(DatabaseStartError::Spawn)?;

        Ok(RequestManager::new(database_sender))
    }

    fn start(&mut self) -> Result<(), DatabaseStartError> {
        log::info!(
            "Transaction Log Location: [{}]",
            self.database_options.data_directory.display()
        );

        self.transaction_wal.init()?;

        if !self.database_options.restore {
            self.transaction_wal.reset()?;

            log::info!("⚠️  Restore disabled, discarded previous transaction log");

            return Ok(());
        }

        let now = Instant::now();

        let restored_transaction_count = self.restore()?;

        log::info!(
            "✅ Successful Restore [Duration: {}ms]",
            now.elapsed().as_millis(),
        );

        log::info!(
            "📀 Data               [Rows: {}, TransactionsReplayed: {}, CurrentTxId: {}]",
            self.person_table.len().to_formatted_string(&Locale::en),
            restored_transaction_count.to_formatted_string(&Locale::en),
            self.transaction_wal
                .get_current_transaction_id()
                .clone()
                .to_number()
                .to_formatted_string(&Locale::en)
        );

        Ok(())
    }

    /// Replays the transaction log, returns the number of transactions applied
    pub fn restore(&mut self) -> Result<usize, DatabaseStartError> {
        let restored_transactions = self.transaction_wal.restore()?;
        let restored_transaction_count = restored_transactions.len();

        for transaction in restored_transactions {
            let response = self.process_statements(transaction.statements, ApplyMode::Restore);

            if let DatabaseCommandResponse::DatabaseCommandTransactionResponse(
                DatabaseCommandTransactionResponse::Rollback(error),
            ) = response
            {
                return Err(DatabaseStartError::Replay(transaction.id, error));
            }

            self.transaction_wal.set_current_transaction_id(transaction.id);
        }

        Ok(restored_transaction_count)
    }

    fn run_worker(&mut self, database_receiver: flume::Receiver<DatabaseCommandRequest>) {
        // Process incoming requests from the channel
        loop {
            let DatabaseCommandRequest { command, resolver } = match database_receiver.recv() {
                Ok(request) => request,
                Err(_) => {
                    log::info!("Every request manager has been dropped, stopping database");
                    return;
                }
            };

            log::debug!("Received request: {}", command.log_format());

            match command {
                DatabaseCommand::Transaction(statements) => {
                    let response = self.process_statements(statements, ApplyMode::Request);

                    // Sends the response data back to the caller of the request, the caller may have
                    //  already given up waiting
                    let _ = resolver.send(response);
                }
                DatabaseCommand::Control(Control::Shutdown) => {
                    let _ = resolver.send(DatabaseCommandResponse::control_success(
                        "Successfully shutdown database",
                    ));

                    return;
                }
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn process_statements(
        &mut self,
        statements: Vec<Statement>,
        mode: ApplyMode,
    ) -> DatabaseCommandResponse {
        let applying_transaction_id = self
            .transaction_wal
            .get_current_transaction_id()
            .increment();

        let mut results: Vec<StatementResult> = Vec::with_capacity(statements.len());
        let mut undo_stack: Vec<Undo> = Vec::new();

        for statement in statements.iter().cloned() {
            match self.person_table.apply(statement) {
                Ok((result, undo)) => {
                    results.push(result);
                    undo_stack.extend(undo);
                }
                Err(error) => {
                    if mode == ApplyMode::Request {
                        log::info!("⚠️  Rolled back: [TX: {}] {}", &applying_transaction_id, error);
                    }

                    for undo in undo_stack.into_iter().rev() {
                        self.person_table.apply_rollback(undo)
                    }

                    return DatabaseCommandResponse::transaction_rollback(error);
                }
            }
        }

        if mode == ApplyMode::Request {
            let has_mutation = statements.iter().any(Statement::is_mutation);

            if let Err(e) = self
                .transaction_wal
                .commit(applying_transaction_id.clone(), &statements)
            {
                // Memory holds state the log does not, we cannot answer the caller truthfully anymore
                crash_database(DatabaseCrash::InconsistentUncommittedInMemoryWorldStateFromWALWrite(
                    e,
                ));
            }

            if has_mutation {
                log::info!("✅ Committed: [TX: {}]", &applying_transaction_id);
            }
        }

        DatabaseCommandResponse::transaction_commit(results)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        consts::consts::EntityId,
        database::{
            request_manager::RequestManagerError,
            table::{
                filter::{AgeQuery, PersonFilter},
                row::{UpdatePersonData, UpdateStatement},
            },
        },
        model::person::NewPerson,
        persistence::transaction::{TransactionFileWriteMode, TransactionWriteMode},
    };

    fn new_person(username: &str) -> NewPerson {
        NewPerson::new_test(username, "Test", NaiveDate::from_ymd_opt(1990, 1, 1))
    }

    mod add {
        use super::*;

        #[test]
        fn add_happy_path() {
            let mut database = Database::new(DatabaseOptions::new_test()).expect("database");

            let response = database
                .process_statements(vec![Statement::Add(new_person("one"))], ApplyMode::Request);

            assert_eq!(
                response,
                DatabaseCommandResponse::transaction_commit(vec![StatementResult::Single(
                    new_person("one").into_person(EntityId(1))
                )])
            );
        }

        #[test]
        fn add_multiple_transaction() {
            let mut database = Database::new(DatabaseOptions::new_test()).expect("database");

            let response = database.process_statements(
                vec![
                    Statement::Add(new_person("one")),
                    Statement::Add(new_person("two")),
                ],
                ApplyMode::Request,
            );

            assert_eq!(
                response,
                DatabaseCommandResponse::transaction_commit(vec![
                    StatementResult::Single(new_person("one").into_person(EntityId(1))),
                    StatementResult::Single(new_person("two").into_person(EntityId(2))),
                ])
            );
        }
    }

    mod transaction_rollback {
        use super::*;

        fn create_rollback_statements() -> Vec<Statement> {
            vec![
                Statement::Add(new_person("overlapping")),
                Statement::Add(new_person("overlapping")),
            ]
        }

        #[test]
        fn rollback_response() {
            // Given an empty database
            let mut database = Database::new(DatabaseOptions::new_test()).expect("database");

            // When a rollback happens
            let response =
                database.process_statements(create_rollback_statements(), ApplyMode::Request);

            // Then the error of the failing statement is returned
            assert_eq!(
                response,
                DatabaseCommandResponse::DatabaseCommandTransactionResponse(
                    DatabaseCommandTransactionResponse::Rollback(
                        ApplyErrors::UniqueConstraintViolation("overlapping".to_string())
                    )
                )
            );
        }

        #[test]
        fn transaction_id_is_not_advanced() {
            let mut database = Database::new(DatabaseOptions::new_test()).expect("database");

            database.process_statements(create_rollback_statements(), ApplyMode::Request);

            assert_eq!(
                database.transaction_wal.get_current_transaction_id(),
                &TransactionId::new_first_transaction(),
                "Transaction log should be empty"
            );
        }

        #[test]
        fn table_and_index_are_empty() {
            let mut database = Database::new(DatabaseOptions::new_test()).expect("database");

            database.process_statements(create_rollback_statements(), ApplyMode::Request);

            assert!(database.person_table.is_empty(), "Person rows should be empty");
            assert!(
                database.person_table.unique_username_index.is_empty(),
                "Unique username index should be empty"
            );
        }

        #[test]
        fn earlier_mutations_of_the_transaction_are_undone() {
            // Given a person
            let mut database = Database::new(DatabaseOptions::new_test()).expect("database");
            database
                .process_statements(vec![Statement::Add(new_person("kept"))], ApplyMode::Request);

            // When a transaction updates then deletes them, then fails
            let update = UpdatePersonData {
                first_name: UpdateStatement::Set("Changed".to_string()),
                ..Default::default()
            };

            database.process_statements(
                vec![
                    Statement::Update(EntityId(1), update),
                    Statement::Remove(EntityId(1)),
                    Statement::Remove(EntityId(1)),
                ],
                ApplyMode::Request,
            );

            // Then the person is untouched
            assert_eq!(
                database.person_table.person_rows.get(&EntityId(1)),
                Some(&new_person("kept").into_person(EntityId(1)))
            );
        }
    }

    mod worker {
        use super::*;
        use std::thread::JoinHandle;

        #[test_log::test]
        fn crud_through_request_manager() {
            let request_manager = Database::new(DatabaseOptions::new_test())
                .expect("database")
                .run()
                .expect("should start");

            let person = request_manager
                .send_add(new_person("guest"))
                .expect("should add");

            let updated = request_manager
                .send_update(
                    person.id,
                    UpdatePersonData {
                        last_name: UpdateStatement::Set("Visitor".to_string()),
                        ..Default::default()
                    },
                )
                .expect("should update");

            assert_eq!(updated.last_name, "Visitor");
            assert_eq!(
                request_manager.send_get(person.id).expect("get"),
                Some(updated.clone())
            );
            assert_eq!(
                request_manager
                    .send_get_by_username("guest".to_string())
                    .expect("get"),
                Some(updated.clone())
            );

            let removed = request_manager.send_remove(person.id).expect("remove");

            assert_eq!(removed, updated);
            assert_eq!(request_manager.send_get(person.id).expect("get"), None);
            assert_eq!(
                request_manager.send_remove(person.id),
                Err(RequestManagerError::TransactionRollback(
                    ApplyErrors::CannotDeleteDoesNotExist(person.id)
                ))
            );
        }

        #[test_log::test]
        fn list_with_filter() {
            let request_manager = Database::new(DatabaseOptions::new_test())
                .expect("database")
                .run()
                .expect("should start");

            request_manager
                .send_add(NewPerson::new_test(
                    "john",
                    "John",
                    NaiveDate::from_ymd_opt(1990, 1, 1),
                ))
                .expect("add");
            request_manager
                .send_add(NewPerson::new_test(
                    "jane",
                    "Jane",
                    NaiveDate::from_ymd_opt(2000, 1, 1),
                ))
                .expect("add");

            let person_filter = PersonFilter::new(
                AgeQuery {
                    min_age: Some(30),
                    max_age: Some(40),
                    ..Default::default()
                },
                NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date"),
            );

            let people = request_manager
                .send_list(Some(person_filter))
                .expect("list");

            assert_eq!(people.len(), 1);
            assert_eq!(people[0].first_name, "John");
            assert_eq!(request_manager.send_list(None).expect("list").len(), 2);
        }

        #[test_log::test]
        fn shutdown_stops_the_worker() {
            let request_manager = Database::new(DatabaseOptions::new_test())
                .expect("database")
                .run()
                .expect("should start");

            assert_eq!(
                request_manager.send_shutdown_request(),
                Ok("Successfully shutdown database".to_string())
            );

            // Either rejected outright or never answered, depending on whether the worker is gone yet
            assert!(request_manager.send_list(None).is_err());
        }

        #[test]
        fn concurrent_adds_get_unique_ids() {
            let request_manager = Database::new(DatabaseOptions::new_test())
                .expect("database")
                .run()
                .expect("should start");

            let sender_threads: Vec<JoinHandle<()>> = (0..4)
                .map(|thread_id| {
                    let rm = request_manager.clone();

                    std::thread::spawn(move || {
                        for index in 0..25 {
                            rm.send_add(new_person(&format!("user-{}-{}", thread_id, index)))
                                .expect("Should not timeout");
                        }
                    })
                })
                .collect();

            for thread in sender_threads {
                thread.join().unwrap();
            }

            let ids: Vec<EntityId> = request_manager
                .send_list(None)
                .expect("list")
                .into_iter()
                .map(|p| p.id)
                .collect();

            assert_eq!(ids, (1..=100).map(EntityId).collect::<Vec<_>>());
        }
    }

    mod restore {
        use super::*;

        fn file_options() -> DatabaseOptions {
            DatabaseOptions::new_test()
                .set_restore(true)
                .set_write_mode(TransactionWriteMode::File(
                    TransactionFileWriteMode::OSBuffered,
                ))
        }

        #[test_log::test]
        fn replays_committed_transactions() {
            // Given a database that committed adds, an update, a delete and a rolled back transaction
            let options = file_options();

            let request_manager = Database::new(options.clone())
                .expect("database")
                .run()
                .expect("should start");

            let one = request_manager.send_add(new_person("one")).expect("add");
            let two = request_manager.send_add(new_person("two")).expect("add");

            request_manager
                .send_update(
                    two.id,
                    UpdatePersonData {
                        first_name: UpdateStatement::Set("Second".to_string()),
                        ..Default::default()
                    },
                )
                .expect("update");
            request_manager.send_remove(one.id).expect("remove");

            let _ = request_manager.send_transaction(vec![
                Statement::Add(new_person("rolled-back")),
                Statement::Add(new_person("two")),
            ]);

            let three = request_manager.send_add(new_person("three")).expect("add");

            let before = request_manager.send_list(None).expect("list");
            request_manager.send_shutdown_request().expect("shutdown");

            // When a new database starts from the same directory
            let mut restored = Database::new(options).expect("database");
            let replayed = restored.restore().expect("should restore");

            // Then it holds the same people with the same ids
            assert_eq!(replayed, 5);
            assert_eq!(three.id, EntityId(3));

            let (after, _) = restored
                .person_table
                .apply(Statement::List(None))
                .expect("list");

            assert_eq!(after.list(), before);
        }

        #[test]
        fn disabled_restore_discards_the_log() {
            let options = file_options();

            let request_manager = Database::new(options.clone())
                .expect("database")
                .run()
                .expect("should start");

            request_manager.send_add(new_person("one")).expect("add");
            request_manager.send_shutdown_request().expect("shutdown");

            let request_manager = Database::new(options.set_restore(false))
                .expect("database")
                .run()
                .expect("should start");

            assert!(request_manager.send_list(None).expect("list").is_empty());
        }
    }
}
