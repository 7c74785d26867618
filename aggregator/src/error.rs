//! Engine error type

use thiserror::Error;
use timestrata_shared::VariableError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("snapshot has {got} values but tier {tier} tracks {expected} variables")]
    SnapshotWidth {
        tier: String,
        expected: usize,
        got: usize,
    },

    #[error("duplicate variable name: {0}")]
    DuplicateVariable(String),

    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("unknown tier: {0}")]
    UnknownTier(String),

    #[error("invalid table name {0:?}")]
    InvalidTableName(String),

    #[error("table {0} does not exist")]
    MissingTable(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("malformed update on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub(crate) fn poisoned<E: std::fmt::Display>(e: E) -> Self {
        Self::LockPoisoned(e.to_string())
    }
}
