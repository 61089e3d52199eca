use std::process;

use thiserror::Error;

use crate::persistence::storage::StorageError;

#[derive(Error, Debug)]
pub enum DatabaseCrash {
    #[error("Inconsistent, uncommitted world state due to storage error: {0}")]
    InconsistentUncommittedInMemoryWorldStateFromWALWrite(StorageError),
}

pub fn crash_database(reason: DatabaseCrash) -> ! {
    log::error!("Database crash: {}", reason);

    // This is a serious unrecoverable crash. Database must be restarted
    process::exit(0x0100);
}
