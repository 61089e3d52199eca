use std::path::PathBuf;

use uuid::Uuid;

use crate::persistence::transaction::{TransactionFileWriteMode, TransactionWriteMode};

#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub data_directory: PathBuf,
    pub restore: bool,
    pub write_mode: TransactionWriteMode,
}

// Implements: https://rust-unofficial.github.io/patterns/patterns/creational/builder.html
impl DatabaseOptions {
    /// Directory holding the transaction log
    pub fn set_data_directory(mut self, data_directory: PathBuf) -> Self {
        self.data_directory = data_directory;
        self
    }

    /// Defines whether we should replay the transaction log on startup. When disabled the
    /// existing log is discarded so memory and disk agree
    pub fn set_restore(mut self, restore: bool) -> Self {
        self.restore = restore;
        self
    }

    /// Defines whether we should sync the file write to disk before marking the
    /// transaction as committed. This is useful for durability but can be slow ~3ms per sync
    pub fn set_write_mode(mut self, write_mode: TransactionWriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        // Defaults to $CWD/data
        Self {
            data_directory: PathBuf::from("data"),
            restore: true,
            write_mode: TransactionWriteMode::File(TransactionFileWriteMode::Sync),
        }
    }
}

impl DatabaseOptions {
    /// Throwaway database in a unique temp directory that never touches the disk log
    pub fn new_test() -> Self {
        let database_dir: PathBuf = ["/", "tmp", "persondb", &Uuid::new_v4().to_string()]
            .iter()
            .collect();

        DatabaseOptions::default()
            .set_data_directory(database_dir)
            .set_restore(false)
            .set_write_mode(TransactionWriteMode::Off)
    }
}
