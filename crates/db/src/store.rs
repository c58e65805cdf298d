//! Committed state: one table of rows per registered entity.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::entity::{Id, Row};
use crate::entity_manager::FlushMode;
use crate::error::{PersistenceError, Result};

/// Address of a row: table name and identity.
pub type RowKey = (&'static str, Id);

/// Behaviour knobs for a store and the persistence contexts opened over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Persistence unit name, reported in logs.
    pub unit_name: String,
    /// Whether `LIKE` comparisons distinguish letter case.
    pub like_case_sensitive: bool,
    /// Default flush mode for new persistence contexts.
    pub flush_mode: FlushMode,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            unit_name: "bookstore".to_string(),
            like_case_sensitive: true,
            flush_mode: FlushMode::Auto,
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<Id, Row>,
    last_id: Id,
}

/// In-memory relational store shared by every persistence context.
///
/// Tables must be registered with [`Store::define_table`] before entities of
/// that kind can be read or written.
#[derive(Debug)]
pub struct Store {
    options: StoreOptions,
    tables: RwLock<HashMap<&'static str, Table>>,
}

impl Store {
    pub fn new(options: StoreOptions) -> Self {
        tracing::info!(
            unit = %options.unit_name,
            like_case_sensitive = options.like_case_sensitive,
            flush_mode = ?options.flush_mode,
            "store created"
        );
        Self {
            options,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Register a table. Registering an existing table is a no-op.
    pub fn define_table(&self, name: &'static str) {
        let mut tables = self.write();
        if !tables.contains_key(name) {
            tables.insert(name, Table::default());
            tracing::debug!(table = name, "table defined");
        }
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn table_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.read().keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Number of committed rows in a table.
    pub fn row_count(&self, table: &'static str) -> Result<usize> {
        let tables = self.read();
        let table = tables
            .get(table)
            .ok_or(PersistenceError::UnknownEntity(table))?;
        Ok(table.rows.len())
    }

    /// Draw the next identity from a table's sequence. Drawn values are never
    /// handed out again, even if the drawing transaction rolls back.
    pub(crate) fn next_id(&self, table: &'static str) -> Result<Id> {
        let mut tables = self.write();
        let table = tables
            .get_mut(table)
            .ok_or(PersistenceError::UnknownEntity(table))?;
        let id = table
            .last_id
            .checked_add(1)
            .ok_or_else(|| PersistenceError::illegal_argument("identity sequence exhausted"))?;
        table.last_id = id;
        Ok(id)
    }

    /// Advance a table's sequence past a caller-assigned identity.
    pub(crate) fn reserve_id(&self, table: &'static str, id: Id) -> Result<()> {
        let mut tables = self.write();
        let table = tables
            .get_mut(table)
            .ok_or(PersistenceError::UnknownEntity(table))?;
        table.last_id = table.last_id.max(id);
        Ok(())
    }

    pub(crate) fn get(&self, key: RowKey) -> Result<Option<Row>> {
        let (table, id) = key;
        let tables = self.read();
        let table = tables
            .get(table)
            .ok_or(PersistenceError::UnknownEntity(table))?;
        Ok(table.rows.get(&id).cloned())
    }

    pub(crate) fn scan(&self, table: &'static str) -> Result<BTreeMap<Id, Row>> {
        let tables = self.read();
        let table = tables
            .get(table)
            .ok_or(PersistenceError::UnknownEntity(table))?;
        Ok(table.rows.clone())
    }

    /// Apply a batch of row writes atomically. `None` deletes the row.
    pub(crate) fn apply(&self, changes: &BTreeMap<RowKey, Option<Row>>) -> Result<usize> {
        let mut tables = self.write();

        if let Some(((missing, _), _)) = changes
            .iter()
            .find(|((table, _), _)| !tables.contains_key(table))
        {
            return Err(PersistenceError::UnknownEntity(*missing));
        }

        for (&(table, id), change) in changes {
            let Some(table) = tables.get_mut(table) else {
                continue;
            };
            match change {
                Some(row) => {
                    table.rows.insert(id, row.clone());
                }
                None => {
                    table.rows.remove(&id);
                }
            }
        }

        Ok(changes.len())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<&'static str, Table>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<&'static str, Table>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: Id, title: &str) -> Row {
        match json!({ "id": id, "title": title }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn unknown_tables_are_rejected() {
        let store = Store::default();
        assert!(matches!(
            store.next_id("book"),
            Err(PersistenceError::UnknownEntity("book"))
        ));
        assert!(matches!(
            store.row_count("book"),
            Err(PersistenceError::UnknownEntity("book"))
        ));
    }

    #[test]
    fn sequences_are_per_table_and_monotonic() {
        let store = Store::default();
        store.define_table("book");
        store.define_table("category");

        assert_eq!(store.next_id("book").unwrap(), 1);
        assert_eq!(store.next_id("book").unwrap(), 2);
        assert_eq!(store.next_id("category").unwrap(), 1);

        store.reserve_id("book", 10).unwrap();
        assert_eq!(store.next_id("book").unwrap(), 11);
    }

    #[test]
    fn exhausted_sequence_is_an_error() {
        let store = Store::default();
        store.define_table("book");
        store.reserve_id("book", Id::MAX).unwrap();

        for _ in 0..2 {
            assert!(matches!(
                store.next_id("book"),
                Err(PersistenceError::IllegalArgument(_))
            ));
        }
        assert_eq!(store.row_count("book").unwrap(), 0);
    }

    #[test]
    fn apply_writes_and_deletes_rows() {
        let store = Store::default();
        store.define_table("book");

        let mut changes = BTreeMap::new();
        changes.insert(("book", 1), Some(row(1, "Dune")));
        changes.insert(("book", 2), Some(row(2, "Emma")));
        assert_eq!(store.apply(&changes).unwrap(), 2);
        assert_eq!(store.row_count("book").unwrap(), 2);

        let mut changes = BTreeMap::new();
        changes.insert(("book", 1), None);
        store.apply(&changes).unwrap();

        assert!(store.get(("book", 1)).unwrap().is_none());
        assert_eq!(store.get(("book", 2)).unwrap(), Some(row(2, "Emma")));
    }

    #[test]
    fn apply_is_all_or_nothing_on_unknown_tables() {
        let store = Store::default();
        store.define_table("book");

        let mut changes = BTreeMap::new();
        changes.insert(("book", 1), Some(row(1, "Dune")));
        changes.insert(("shelf", 1), Some(row(1, "A")));

        assert!(store.apply(&changes).is_err());
        assert_eq!(store.row_count("book").unwrap(), 0);
    }

    #[test]
    fn defining_a_table_twice_keeps_rows() {
        let store = Store::default();
        store.define_table("book");
        let mut changes = BTreeMap::new();
        changes.insert(("book", 1), Some(row(1, "Dune")));
        store.apply(&changes).unwrap();

        store.define_table("book");
        assert_eq!(store.row_count("book").unwrap(), 1);
        assert_eq!(store.table_names(), vec!["book"]);
    }
}
