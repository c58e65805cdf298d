//! Transaction-scoped persistence context.
//!
//! An [`EntityManager`] carries the caller's ambient transaction (or none) and
//! an identity map of the rows it manages. Reads resolve through the identity
//! map, then the transaction's staged writes, then the committed store. Writes
//! stay in the identity map until a flush stages them on the transaction; they
//! reach the store only on commit.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::criteria::CriteriaQuery;
use crate::entity::{from_row, row_id, to_row, Entity, Id, Row};
use crate::error::{PersistenceError, Result};
use crate::store::{RowKey, Store};
use crate::transaction::{Transaction, TransactionStatus};

/// When pending changes are written into the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Flush before every query and at commit.
    #[default]
    Auto,
    /// Flush only at commit or on an explicit [`EntityManager::flush`].
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityState {
    New,
    Clean,
    Dirty,
    Removed,
}

#[derive(Debug)]
struct Managed {
    row: Row,
    state: EntityState,
}

/// Unit of work over a shared [`Store`].
///
/// Mutating methods take `&mut self`; a context and its transaction belong to
/// exactly one caller at a time.
pub struct EntityManager {
    store: Arc<Store>,
    transaction: Option<Transaction>,
    managed: HashMap<RowKey, Managed>,
    flush_mode: FlushMode,
}

impl EntityManager {
    pub fn new(store: Arc<Store>) -> Self {
        let flush_mode = store.options().flush_mode;
        Self {
            store,
            transaction: None,
            managed: HashMap::new(),
            flush_mode,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    pub fn set_flush_mode(&mut self, flush_mode: FlushMode) {
        self.flush_mode = flush_mode;
    }

    // ---- transaction demarcation -------------------------------------------------

    /// Start the ambient transaction.
    pub fn begin(&mut self) -> Result<Uuid> {
        if let Some(transaction) = &self.transaction {
            return Err(PersistenceError::TransactionAlreadyActive(transaction.id()));
        }
        let transaction = Transaction::begin();
        let id = transaction.id();
        self.transaction = Some(transaction);
        Ok(id)
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn has_active_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Flush pending changes and publish the transaction's writes to the
    /// store. A rollback-only transaction is rolled back instead and reported
    /// as [`PersistenceError::RollbackOnly`]. Either way the context ends with
    /// no transaction and nothing managed.
    pub fn commit(&mut self) -> Result<TransactionStatus> {
        let rollback_only = self
            .transaction
            .as_ref()
            .ok_or(PersistenceError::TransactionRequired { operation: "commit" })?
            .is_rollback_only();

        if rollback_only {
            let id = self.rollback_inner("commit")?;
            return Err(PersistenceError::RollbackOnly(id));
        }

        if let Err(error) = self.flush_pending() {
            tracing::warn!(%error, "flush failed during commit; rolling back");
            self.rollback_inner("commit")?;
            return Err(error);
        }

        let transaction = self
            .transaction
            .take()
            .ok_or(PersistenceError::TransactionRequired { operation: "commit" })?;
        let id = transaction.id();
        let writes = transaction.finish(TransactionStatus::Committed);
        self.managed.clear();

        let applied = self.store.apply(&writes)?;
        tracing::debug!(transaction = %id, writes = applied, "transaction committed");
        Ok(TransactionStatus::Committed)
    }

    /// Discard the transaction and every change made through this context.
    pub fn rollback(&mut self) -> Result<TransactionStatus> {
        self.rollback_inner("rollback")?;
        Ok(TransactionStatus::RolledBack)
    }

    pub fn set_rollback_only(&mut self) -> Result<()> {
        self.transaction
            .as_mut()
            .ok_or(PersistenceError::TransactionRequired {
                operation: "set_rollback_only",
            })?
            .set_rollback_only();
        Ok(())
    }

    fn rollback_inner(&mut self, operation: &'static str) -> Result<Uuid> {
        let transaction = self
            .transaction
            .take()
            .ok_or(PersistenceError::TransactionRequired { operation })?;
        let id = transaction.id();
        let discarded = transaction.finish(TransactionStatus::RolledBack);
        self.managed.clear();
        tracing::debug!(
            transaction = %id,
            discarded = discarded.len(),
            "transaction rolled back"
        );
        Ok(id)
    }

    fn require_transaction(&self, operation: &'static str) -> Result<()> {
        if self.transaction.is_none() {
            return Err(PersistenceError::TransactionRequired { operation });
        }
        Ok(())
    }

    fn require_table<E: Entity>(&self) -> Result<()> {
        if !self.store.has_table(E::NAME) {
            return Err(PersistenceError::UnknownEntity(E::NAME));
        }
        Ok(())
    }

    // ---- entity operations ---------------------------------------------------------

    /// Make a transient entity persistent. The generated identity is written
    /// back into `entity` immediately; the row is inserted at the next flush.
    pub fn persist<E: Entity>(&mut self, entity: &mut E) -> Result<()> {
        self.require_transaction("persist")?;
        self.require_table::<E>()?;

        let id = match entity.id() {
            Some(id) if id < 1 => {
                return Err(PersistenceError::illegal_argument(format!(
                    "identity {id} of '{}' must be positive",
                    E::NAME
                )));
            }
            Some(id) => {
                let key = (E::NAME, id);
                match self.managed.get(&key).map(|managed| managed.state) {
                    // Persisting a removed entity cancels the removal.
                    Some(EntityState::Removed) => {
                        let row = to_row(entity)?;
                        self.managed.insert(
                            key,
                            Managed {
                                row,
                                state: EntityState::Dirty,
                            },
                        );
                        return Ok(());
                    }
                    Some(_) => return Ok(()),
                    None => {}
                }
                if self.load_row(key)?.is_some() {
                    return Err(PersistenceError::EntityExists { entity: E::NAME, id });
                }
                self.store.reserve_id(E::NAME, id)?;
                id
            }
            None => {
                let id = self.store.next_id(E::NAME)?;
                entity.set_id(id);
                id
            }
        };

        let row = to_row(entity)?;
        self.managed.insert(
            (E::NAME, id),
            Managed {
                row,
                state: EntityState::New,
            },
        );
        tracing::debug!(entity = E::NAME, id, "entity persisted");
        Ok(())
    }

    /// Look an entity up by identity. Inside a transaction the result becomes
    /// managed; outside one it is returned detached.
    pub fn find<E: Entity>(&mut self, id: Id) -> Result<Option<E>> {
        self.require_table::<E>()?;
        let key = (E::NAME, id);

        let Some(row) = self.load_row(key)? else {
            tracing::debug!(entity = E::NAME, id, "entity not found");
            return Ok(None);
        };

        let entity = from_row(&row)?;
        self.manage_clean(key, row);
        Ok(Some(entity))
    }

    /// Copy the state of a detached entity onto its managed counterpart and
    /// return the managed state. Entities without identity are persisted as
    /// new ones.
    pub fn merge<E: Entity>(&mut self, entity: &E) -> Result<E> {
        self.require_transaction("merge")?;
        self.require_table::<E>()?;

        let Some(id) = entity.id() else {
            let mut copy = entity.clone();
            self.persist(&mut copy)?;
            return Ok(copy);
        };

        let key = (E::NAME, id);
        let mut current = self
            .load_row(key)?
            .ok_or(PersistenceError::EntityNotFound { entity: E::NAME, id })?;

        for (attribute, value) in to_row(entity)? {
            current.insert(attribute, value);
        }

        let state = match self.managed.get(&key).map(|managed| managed.state) {
            Some(EntityState::New) => EntityState::New,
            _ => EntityState::Dirty,
        };
        let merged = from_row(&current)?;
        self.managed.insert(
            key,
            Managed {
                row: current,
                state,
            },
        );
        tracing::debug!(entity = E::NAME, id, "entity merged");
        Ok(merged)
    }

    /// Schedule an entity for deletion. Entities that were never flushed are
    /// simply forgotten.
    pub fn remove<E: Entity>(&mut self, entity: &E) -> Result<()> {
        self.require_transaction("remove")?;
        self.require_table::<E>()?;

        let id = entity.id().ok_or_else(|| {
            PersistenceError::illegal_argument(format!(
                "cannot remove a transient '{}' instance",
                E::NAME
            ))
        })?;
        let key = (E::NAME, id);

        match self.managed.get_mut(&key) {
            Some(managed) if managed.state == EntityState::New => {
                self.managed.remove(&key);
            }
            Some(managed) => managed.state = EntityState::Removed,
            None => {
                let row = self
                    .load_row(key)?
                    .ok_or(PersistenceError::EntityNotFound { entity: E::NAME, id })?;
                self.managed.insert(
                    key,
                    Managed {
                        row,
                        state: EntityState::Removed,
                    },
                );
            }
        }

        tracing::debug!(entity = E::NAME, id, "entity removed");
        Ok(())
    }

    /// Stage every pending change on the transaction.
    pub fn flush(&mut self) -> Result<()> {
        self.require_transaction("flush")?;
        self.flush_pending()
    }

    /// Overwrite `entity` with the state visible to the transaction, discarding
    /// unflushed changes.
    pub fn refresh<E: Entity>(&mut self, entity: &mut E) -> Result<()> {
        self.require_transaction("refresh")?;
        self.require_table::<E>()?;

        let id = entity.id().ok_or_else(|| {
            PersistenceError::illegal_argument(format!(
                "cannot refresh a transient '{}' instance",
                E::NAME
            ))
        })?;
        let key = (E::NAME, id);

        if !self.is_managed(key) {
            return Err(PersistenceError::illegal_argument(format!(
                "'{}' with id {id} is not managed",
                E::NAME
            )));
        }

        let row = self
            .load_persistent_row(key)?
            .ok_or(PersistenceError::EntityNotFound { entity: E::NAME, id })?;
        *entity = from_row(&row)?;
        self.managed.insert(
            key,
            Managed {
                row,
                state: EntityState::Clean,
            },
        );
        Ok(())
    }

    /// Whether the entity is managed by this context.
    pub fn contains<E: Entity>(&self, entity: &E) -> bool {
        entity
            .id()
            .is_some_and(|id| self.is_managed((E::NAME, id)))
    }

    /// Detach every managed entity, dropping unflushed changes.
    pub fn clear(&mut self) {
        self.managed.clear();
    }

    /// Prepare a criteria query for execution.
    pub fn create_query<E: Entity>(&mut self, criteria: CriteriaQuery<E>) -> TypedQuery<'_, E> {
        TypedQuery { em: self, criteria }
    }

    // ---- internals ---------------------------------------------------------------

    fn is_managed(&self, key: RowKey) -> bool {
        self.managed
            .get(&key)
            .is_some_and(|managed| managed.state != EntityState::Removed)
    }

    fn manage_clean(&mut self, key: RowKey, row: Row) {
        if self.transaction.is_some() && !self.managed.contains_key(&key) {
            self.managed.insert(
                key,
                Managed {
                    row,
                    state: EntityState::Clean,
                },
            );
        }
    }

    fn load_row(&self, key: RowKey) -> Result<Option<Row>> {
        if let Some(managed) = self.managed.get(&key) {
            return Ok(match managed.state {
                EntityState::Removed => None,
                _ => Some(managed.row.clone()),
            });
        }
        self.load_persistent_row(key)
    }

    fn load_persistent_row(&self, key: RowKey) -> Result<Option<Row>> {
        if let Some(staged) = self
            .transaction
            .as_ref()
            .and_then(|transaction| transaction.staged(key))
        {
            return Ok(staged.clone());
        }
        self.store.get(key)
    }

    fn flush_pending(&mut self) -> Result<()> {
        let Some(transaction) = self.transaction.as_mut() else {
            return Ok(());
        };

        let mut staged = 0usize;
        self.managed.retain(|&key, managed| match managed.state {
            EntityState::Clean => true,
            EntityState::New | EntityState::Dirty => {
                transaction.stage(key, Some(managed.row.clone()));
                managed.state = EntityState::Clean;
                staged += 1;
                true
            }
            EntityState::Removed => {
                transaction.stage(key, None);
                staged += 1;
                false
            }
        });

        if staged > 0 {
            tracing::debug!(transaction = %transaction.id(), writes = staged, "flushed");
        }
        Ok(())
    }

    fn select_rows<E: Entity>(&mut self, criteria: &CriteriaQuery<E>) -> Result<Vec<Row>> {
        self.require_table::<E>()?;
        criteria.validate()?;

        if self.flush_mode == FlushMode::Auto {
            self.flush_pending()?;
        }

        let matcher = criteria
            .restriction()
            .map(|predicate| predicate.compile(self.store.options().like_case_sensitive))
            .transpose()?;

        let mut rows = self.store.scan(E::NAME)?;
        if let Some(transaction) = &self.transaction {
            for (id, staged) in transaction.staged_in(E::NAME) {
                match staged {
                    Some(row) => rows.insert(id, row.clone()),
                    None => rows.remove(&id),
                };
            }
        }

        let mut selected: Vec<Row> = rows
            .into_values()
            .filter(|row| matcher.as_ref().map_or(true, |matcher| matcher.matches(row)))
            .collect();

        for order in criteria.ordering().iter().rev() {
            selected.sort_by(|left, right| order.compare(left, right));
        }
        if let Some(limit) = criteria.limit() {
            selected.truncate(limit);
        }

        // Hand back the managed state for rows this context already tracks.
        let selected = selected
            .into_iter()
            .map(|row| match row_id(&row) {
                Some(id) => {
                    let key = (E::NAME, id);
                    match self.managed.get(&key) {
                        Some(managed) => managed.row.clone(),
                        None => {
                            self.manage_clean(key, row.clone());
                            row
                        }
                    }
                }
                None => row,
            })
            .collect();

        Ok(selected)
    }
}

/// A criteria query bound to the context that runs it.
pub struct TypedQuery<'em, E> {
    em: &'em mut EntityManager,
    criteria: CriteriaQuery<E>,
}

impl<E: Entity> TypedQuery<'_, E> {
    pub fn set_max_results(mut self, max_results: usize) -> Self {
        self.criteria = self.criteria.max_results(max_results);
        self
    }

    /// Every matching entity; empty when nothing matches.
    pub fn get_result_list(self) -> Result<Vec<E>> {
        let rows = self.em.select_rows(&self.criteria)?;
        tracing::debug!(
            entity = E::NAME,
            restriction = %DisplayRestriction(self.criteria.restriction()),
            results = rows.len(),
            "query executed"
        );
        rows.iter().map(from_row::<E>).collect()
    }

    /// The single matching entity. No match is [`PersistenceError::NoResult`],
    /// several are [`PersistenceError::NonUniqueResult`].
    pub fn get_single_result(self) -> Result<E> {
        let rows = self.em.select_rows(&self.criteria)?;
        match rows.as_slice() {
            [row] => from_row(row),
            [] => Err(PersistenceError::NoResult { entity: E::NAME }),
            _ => Err(PersistenceError::NonUniqueResult {
                entity: E::NAME,
                count: rows.len(),
            }),
        }
    }
}

struct DisplayRestriction<'a>(Option<&'a crate::criteria::Predicate>);

impl std::fmt::Display for DisplayRestriction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(predicate) => write!(f, "{predicate}"),
            None => write!(f, "<all>"),
        }
    }
}
