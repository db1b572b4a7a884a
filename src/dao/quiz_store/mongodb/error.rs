use mongodb::error::{Error as MongoError, TRANSIENT_TRANSACTION_ERROR};
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB data-access calls.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures of the MongoDB quiz store, each tagged with the operation that raised it.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// A required connection setting is absent.
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// The connection string cannot be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    /// The driver rejected the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    /// The server never answered the startup ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    /// A periodic health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    /// An index could not be created at startup.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    /// A session or transaction could not be opened.
    #[error("failed to start a MongoDB transaction")]
    StartTransaction {
        #[source]
        source: MongoError,
    },
    /// The transaction commit failed.
    #[error("failed to commit a MongoDB transaction")]
    CommitTransaction {
        #[source]
        source: MongoError,
    },
    /// The transaction abort failed.
    #[error("failed to abort a MongoDB transaction")]
    AbortTransaction {
        #[source]
        source: MongoError,
    },
    /// The player-lock upsert failed.
    #[error("failed to lock player `{id}`")]
    LockPlayer {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    /// A game could not be locked for update.
    #[error("failed to lock a game for player `{player_id}`")]
    LockGame {
        player_id: Uuid,
        #[source]
        source: MongoError,
    },
    /// Reading game documents failed.
    #[error("failed to load games")]
    LoadGames {
        #[source]
        source: MongoError,
    },
    /// Writing a game document failed.
    #[error("failed to save game `{id}`")]
    SaveGame {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    /// Reading progress documents failed.
    #[error("failed to load player progress")]
    LoadProgresses {
        #[source]
        source: MongoError,
    },
    /// Writing a progress document failed.
    #[error("failed to save player progress `{id}`")]
    SaveProgress {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    /// Reading the question bank failed.
    #[error("failed to load questions")]
    LoadQuestions {
        #[source]
        source: MongoError,
    },
    /// Reading a player account failed.
    #[error("failed to load player `{id}`")]
    LoadPlayer {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    /// A stored identifier is not a UUID.
    #[error("document `{id}` in `{collection}` holds a malformed identifier")]
    CorruptDocument {
        collection: &'static str,
        id: String,
        #[source]
        source: uuid::Error,
    },
}

impl MongoDaoError {
    fn driver_error(&self) -> Option<&MongoError> {
        std::error::Error::source(self).and_then(|source| source.downcast_ref::<MongoError>())
    }

    /// Whether the transaction was aborted by the server and may be replayed from the start
    /// (write conflicts between concurrent lockers, primary step-down).
    pub fn is_transient(&self) -> bool {
        self.driver_error()
            .is_some_and(|err| err.contains_label(TRANSIENT_TRANSACTION_ERROR))
    }
}
