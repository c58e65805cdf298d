//! Errors surfaced by the store, the persistence context and criteria queries.

use thiserror::Error;
use uuid::Uuid;

use crate::entity::Id;

pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Failures reported by the persistence layer.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("operation '{operation}' requires an active transaction")]
    TransactionRequired { operation: &'static str },

    #[error("a transaction is already active ({0})")]
    TransactionAlreadyActive(Uuid),

    #[error("transaction {0} was marked rollback-only and has been rolled back")]
    RollbackOnly(Uuid),

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("unknown entity '{0}': no table is registered for it")]
    UnknownEntity(&'static str),

    #[error("unknown attribute '{attribute}' on entity '{entity}'")]
    UnknownAttribute {
        entity: &'static str,
        attribute: String,
    },

    #[error("no result found for query on '{entity}'")]
    NoResult { entity: &'static str },

    #[error("query on '{entity}' returned {count} results where exactly one was expected")]
    NonUniqueResult { entity: &'static str, count: usize },

    #[error("entity '{entity}' with id {id} already exists")]
    EntityExists { entity: &'static str, id: Id },

    #[error("entity '{entity}' with id {id} not found")]
    EntityNotFound { entity: &'static str, id: Id },

    #[error("invalid LIKE pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to map entity '{entity}'")]
    Mapping {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub(crate) fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument(message.into())
    }
}
