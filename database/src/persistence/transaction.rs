use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::consts::TransactionId;
use crate::model::statement::Statement;

use super::storage::{Storage, StorageError, StorageResult};

// Todo: use this status to denote if we have done an fsync on the transaction log
//  once fsync is done, THEN we can consider the transaction committed / durable
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum TransactionStatus {
    Committed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionFileWriteMode {
    /// Writes the file to disk and performs an fsync per commit
    Sync,
    /// Writes the file to disk, lets the OS buffer the writes
    OSBuffered,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionWriteMode {
    /// Writes the WAL to disk
    File(TransactionFileWriteMode),
    /// Used for testing purposes. Skips writing the file to disk
    Off,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub statements: Vec<Statement>,
    pub status: TransactionStatus,
}

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Malformed transaction on line {line}: {reason}")]
    MalformedTransaction { line: usize, reason: String },
}

pub struct TransactionWAL {
    write_mode: TransactionWriteMode,
    current_transaction_id: TransactionId,
    storage: Box<dyn Storage + Send>,
}

impl TransactionWAL {
    pub fn new(write_mode: TransactionWriteMode, storage: Box<dyn Storage + Send>) -> Self {
        Self {
            write_mode,
            current_transaction_id: TransactionId::new_first_transaction(),
            storage,
        }
    }

    pub fn get_current_transaction_id(&self) -> &TransactionId {
        &self.current_transaction_id
    }

    pub fn set_current_transaction_id(&mut self, transaction_id: TransactionId) {
        self.current_transaction_id = transaction_id;
    }

    pub fn init(&self) -> StorageResult<()> {
        self.storage.init()
    }

    /// Drops every persisted transaction, used when the database starts without restoring
    pub fn reset(&mut self) -> StorageResult<()> {
        self.current_transaction_id = TransactionId::new_first_transaction();
        self.storage.reset()
    }

    /// Persists the transaction as a single json line, queries are not written as they cannot change state
    pub fn commit(
        &mut self,
        applied_transaction_id: TransactionId,
        statements: &[Statement],
    ) -> StorageResult<()> {
        let has_mutation = statements.iter().any(Statement::is_mutation);

        if has_mutation {
            if let TransactionWriteMode::File(file_write_mode) = &self.write_mode {
                let transaction = Transaction {
                    id: applied_transaction_id.clone(),
                    statements: statements.to_vec(),
                    status: TransactionStatus::Committed,
                };

                // Serializing plain data structures cannot fail
                let transaction_json_line = format!(
                    "{}\n",
                    serde_json::to_string(&transaction)
                        .expect("transaction should always serialize")
                );

                self.storage
                    .transaction_write(transaction_json_line.as_bytes())?;

                // Performs an fsync on the transaction log, ensuring that the transaction is durable
                // https://www.postgresql.org/docs/current/wal-reliability.html
                //
                // Note: The observed speed of fsync is ~3ms. This is a _very_ slow operation.
                if file_write_mode == &TransactionFileWriteMode::Sync {
                    self.storage.transaction_sync()?;
                }
            }
        }

        self.current_transaction_id = applied_transaction_id;

        Ok(())
    }

    pub fn restore(&mut self) -> Result<Vec<Transaction>, RestoreError> {
        let contents = self.storage.transaction_load()?;

        let mut transactions: Vec<Transaction> = vec![];

        for (index, transaction_string) in contents.split('\n').enumerate() {
            if transaction_string.is_empty() {
                continue;
            }

            let transaction: Transaction = serde_json::from_str(transaction_string).map_err(|e| {
                RestoreError::MalformedTransaction {
                    line: index + 1,
                    reason: e.to_string(),
                }
            })?;

            transactions.push(transaction);
        }

        Ok(transactions)
    }
}
