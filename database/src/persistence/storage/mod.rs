use thiserror::Error;

pub mod file;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Unable to initialize persistence: {0}")]
    UnableToInitializePersistence(String),

    #[error("Unable to reset persistence: {0}")]
    UnableToResetPersistence(String),

    #[error("Unable to write transaction: {0}")]
    UnableToWriteTransaction(String),

    #[error("Unable to sync transaction buffer to persistent storage: {0}")]
    UnableToSyncTransactionBufferToPersistentStorage(String),

    #[error("Unable to load previous transactions: {0}")]
    UnableToLoadPreviousTransactions(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

pub fn io_to_generic_error(error: std::io::Error) -> String {
    format!("{} ({:?})", error, error.kind())
}

/// Where the transaction log lives
pub trait Storage {
    /// Called on start-up, should be idempotent
    fn init(&self) -> StorageResult<()>;

    /// Removes every persisted transaction
    fn reset(&mut self) -> StorageResult<()>;

    /// Appends bytes to the log, may be buffered by the OS until `transaction_sync` is called
    fn transaction_write(&mut self, transaction: &[u8]) -> StorageResult<()>;

    fn transaction_sync(&self) -> StorageResult<()>;

    /// Returns the whole log, empty when nothing has been written yet
    fn transaction_load(&mut self) -> StorageResult<String>;
}
