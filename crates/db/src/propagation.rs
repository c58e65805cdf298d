//! Transaction propagation.
//!
//! Every service operation declares how it relates to the caller's ambient
//! transaction and runs its body through [`invoke`], which enforces the
//! declaration before the body executes.

use std::fmt;

use crate::entity_manager::EntityManager;
use crate::error::{PersistenceError, Result};

/// How an operation relates to the caller's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// The caller must already be inside a transaction.
    Mandatory,
    /// Join the caller's transaction if there is one, otherwise run without.
    Supports,
    /// Join the caller's transaction, or begin one and complete it around the
    /// operation.
    Required,
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Propagation::Mandatory => write!(f, "MANDATORY"),
            Propagation::Supports => write!(f, "SUPPORTS"),
            Propagation::Required => write!(f, "REQUIRED"),
        }
    }
}

/// Run `body` under `propagation`.
///
/// Any failure inside a joined transaction marks it rollback-only, result
/// cardinality errors included. A transaction begun here is committed when
/// `body` succeeds and rolled back when it fails.
pub fn invoke<T, F>(
    em: &mut EntityManager,
    propagation: Propagation,
    operation: &'static str,
    body: F,
) -> Result<T>
where
    F: FnOnce(&mut EntityManager) -> Result<T>,
{
    match (propagation, em.has_active_transaction()) {
        (_, true) => join(em, operation, body),
        (Propagation::Mandatory, false) => {
            tracing::warn!(operation, %propagation, "called without an active transaction");
            Err(PersistenceError::TransactionRequired { operation })
        }
        (Propagation::Supports, false) => {
            tracing::trace!(operation, %propagation, "running without a transaction");
            body(em)
        }
        (Propagation::Required, false) => run_in_new_transaction(em, operation, body),
    }
}

fn join<T, F>(em: &mut EntityManager, operation: &'static str, body: F) -> Result<T>
where
    F: FnOnce(&mut EntityManager) -> Result<T>,
{
    let result = body(em);
    if let Err(error) = &result {
        if em.has_active_transaction() {
            tracing::debug!(operation, %error, "marking caller transaction rollback-only");
            em.set_rollback_only()?;
        }
    }
    result
}

fn run_in_new_transaction<T, F>(em: &mut EntityManager, operation: &'static str, body: F) -> Result<T>
where
    F: FnOnce(&mut EntityManager) -> Result<T>,
{
    let transaction = em.begin()?;
    tracing::debug!(operation, %transaction, "transaction started for operation");

    match body(em) {
        Ok(value) => {
            em.commit()?;
            Ok(value)
        }
        Err(error) => {
            if em.has_active_transaction() {
                if let Err(rollback_error) = em.rollback() {
                    tracing::error!(
                        operation,
                        %transaction,
                        error = %rollback_error,
                        "rollback after failed operation failed"
                    );
                }
            }
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::entity::fixtures::Note;
    use crate::entity::Entity;
    use crate::store::Store;
    use crate::transaction::TransactionStatus;

    fn em() -> (Arc<Store>, EntityManager) {
        let store = Arc::new(Store::default());
        store.define_table(Note::NAME);
        (store.clone(), EntityManager::new(store))
    }

    #[test]
    fn mandatory_rejects_calls_without_a_transaction() {
        let (_, mut em) = em();
        let mut ran = false;
        let result = invoke(&mut em, Propagation::Mandatory, "save_note", |_| {
            ran = true;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(PersistenceError::TransactionRequired { operation: "save_note" })
        ));
        assert!(!ran);
    }

    #[test]
    fn mandatory_joins_the_caller_transaction() {
        let (store, mut em) = em();
        let outer = em.begin().unwrap();

        invoke(&mut em, Propagation::Mandatory, "save_note", |em| {
            assert_eq!(em.transaction().map(|t| t.id()), Some(outer));
            em.persist(&mut Note::new("joined"))
        })
        .unwrap();

        assert!(em.has_active_transaction());
        assert_eq!(store.row_count(Note::NAME).unwrap(), 0);
        em.commit().unwrap();
        assert_eq!(store.row_count(Note::NAME).unwrap(), 1);
    }

    #[test]
    fn supports_runs_with_or_without_a_transaction() {
        let (_, mut em) = em();
        let seen = invoke(&mut em, Propagation::Supports, "list_notes", |em| {
            Ok(em.has_active_transaction())
        })
        .unwrap();
        assert!(!seen);

        em.begin().unwrap();
        let seen = invoke(&mut em, Propagation::Supports, "list_notes", |em| {
            Ok(em.has_active_transaction())
        })
        .unwrap();
        assert!(seen);
    }

    #[test]
    fn required_begins_and_commits_its_own_transaction() {
        let (store, mut em) = em();
        let note = invoke(&mut em, Propagation::Required, "save_note", |em| {
            assert!(em.has_active_transaction());
            let mut note = Note::new("own transaction");
            em.persist(&mut note)?;
            Ok(note)
        })
        .unwrap();

        assert!(!em.has_active_transaction());
        assert_eq!(note.id, Some(1));
        assert_eq!(store.row_count(Note::NAME).unwrap(), 1);
    }

    #[test]
    fn required_rolls_back_its_own_transaction_on_failure() {
        let (store, mut em) = em();
        let result: Result<()> = invoke(&mut em, Propagation::Required, "save_note", |em| {
            em.persist(&mut Note::new("discarded"))?;
            Err(PersistenceError::illegal_argument("rejected"))
        });

        assert!(matches!(result, Err(PersistenceError::IllegalArgument(_))));
        assert!(!em.has_active_transaction());
        assert_eq!(store.row_count(Note::NAME).unwrap(), 0);
    }

    #[test]
    fn required_joins_an_existing_transaction_without_completing_it() {
        let (store, mut em) = em();
        em.begin().unwrap();

        invoke(&mut em, Propagation::Required, "save_note", |em| {
            em.persist(&mut Note::new("joined"))
        })
        .unwrap();

        assert!(em.has_active_transaction());
        assert_eq!(store.row_count(Note::NAME).unwrap(), 0);
    }

    #[test]
    fn failures_in_a_joined_transaction_mark_it_rollback_only() {
        let (_, mut em) = em();
        em.begin().unwrap();

        let _ = invoke::<(), _>(&mut em, Propagation::Mandatory, "find_note", |_| {
            Err(PersistenceError::illegal_argument("null id"))
        });

        assert_eq!(
            em.transaction().map(|t| t.status()),
            Some(TransactionStatus::MarkedRollback)
        );
        assert!(matches!(em.commit(), Err(PersistenceError::RollbackOnly(_))));
    }

    #[test]
    fn cardinality_failures_doom_the_joined_transaction() {
        use crate::criteria::{CriteriaQuery, Predicate};

        let (store, mut em) = em();
        em.begin().unwrap();
        em.persist(&mut Note::new("kept until commit")).unwrap();

        let result = invoke(&mut em, Propagation::Mandatory, "find_note", |em| {
            em.create_query(CriteriaQuery::<Note>::new().filter(Predicate::equal("id", 404)))
                .get_single_result()
        });

        assert!(matches!(result, Err(PersistenceError::NoResult { entity: "note" })));
        assert_eq!(
            em.transaction().map(|t| t.status()),
            Some(TransactionStatus::MarkedRollback)
        );
        assert!(matches!(em.commit(), Err(PersistenceError::RollbackOnly(_))));
        assert_eq!(store.row_count(Note::NAME).unwrap(), 0);
    }
}
