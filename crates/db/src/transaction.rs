//! Transaction state and staged writes.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

use crate::entity::{Id, Row};
use crate::store::RowKey;

/// Lifecycle of a transaction.
///
/// ```text
/// Active ──set_rollback_only──> MarkedRollback
///   │                               │
///   ├──commit──> Committed          └──commit/rollback──> RolledBack
///   └──rollback──> RolledBack
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Active,
    MarkedRollback,
    Committed,
    RolledBack,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Committed | TransactionStatus::RolledBack
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Active => write!(f, "ACTIVE"),
            TransactionStatus::MarkedRollback => write!(f, "MARKED_ROLLBACK"),
            TransactionStatus::Committed => write!(f, "COMMITTED"),
            TransactionStatus::RolledBack => write!(f, "ROLLED_BACK"),
        }
    }
}

/// An open unit of work. Writes are staged here by flushes and only reach the
/// store when the owning persistence context commits.
#[derive(Debug)]
pub struct Transaction {
    id: Uuid,
    status: TransactionStatus,
    staged: BTreeMap<RowKey, Option<Row>>,
}

impl Transaction {
    pub(crate) fn begin() -> Self {
        let transaction = Self {
            id: Uuid::now_v7(),
            status: TransactionStatus::Active,
            staged: BTreeMap::new(),
        };
        tracing::debug!(transaction = %transaction.id, "transaction begun");
        transaction
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn is_rollback_only(&self) -> bool {
        self.status == TransactionStatus::MarkedRollback
    }

    pub(crate) fn set_rollback_only(&mut self) {
        if self.status == TransactionStatus::Active {
            tracing::debug!(transaction = %self.id, "transaction marked rollback-only");
            self.status = TransactionStatus::MarkedRollback;
        }
    }

    pub(crate) fn stage(&mut self, key: RowKey, row: Option<Row>) {
        self.staged.insert(key, row);
    }

    /// Staged write for a row: `Some(None)` means staged for deletion.
    pub(crate) fn staged(&self, key: RowKey) -> Option<&Option<Row>> {
        self.staged.get(&key)
    }

    pub(crate) fn staged_in(&self, table: &'static str) -> impl Iterator<Item = (Id, &Option<Row>)> {
        self.staged
            .range((table, Id::MIN)..=(table, Id::MAX))
            .map(|(&(_, id), row)| (id, row))
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    pub(crate) fn finish(mut self, status: TransactionStatus) -> BTreeMap<RowKey, Option<Row>> {
        self.status = status;
        tracing::debug!(
            transaction = %self.id,
            status = %self.status,
            writes = self.staged.len(),
            "transaction finished"
        );
        std::mem::take(&mut self.staged)
    }
}
