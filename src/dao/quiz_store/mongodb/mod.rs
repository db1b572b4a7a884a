//! MongoDB-backed quiz store.
//!
//! Every mutation runs inside a multi-document transaction, so the server must be a replica set
//! or a sharded cluster.

mod config;
mod connection;
mod error;
mod models;
mod store;
mod unit_of_work;

pub use config::MongoConfig;
pub use error::{MongoDaoError, MongoResult};
pub use store::MongoQuizStore;
pub use unit_of_work::MongoUnitOfWork;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        if err.is_transient() {
            StorageError::conflict(err.to_string())
        } else {
            StorageError::unavailable(err.to_string(), err)
        }
    }
}
