use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{PersistenceError, Result};

/// Surrogate identity shared by every table.
pub type Id = i64;

/// Stored form of an entity: its serialized attributes.
pub type Row = serde_json::Map<String, Value>;

/// Attribute holding the surrogate identity in every row.
pub const ID_ATTRIBUTE: &str = "id";

/// A type persisted in its own table and identified by a generated [`Id`].
///
/// Implementors serialize to a JSON object whose keys are the entity's
/// attributes; [`Entity::ATTRIBUTES`] lists the ones criteria queries may
/// reference.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table name, also used in log fields and error messages.
    const NAME: &'static str;

    /// Queryable attributes, `id` included.
    const ATTRIBUTES: &'static [&'static str];

    fn id(&self) -> Option<Id>;

    fn set_id(&mut self, id: Id);
}

pub(crate) fn to_row<E: Entity>(entity: &E) -> Result<Row> {
    let value = serde_json::to_value(entity).map_err(|source| PersistenceError::Mapping {
        entity: E::NAME,
        source,
    })?;

    match value {
        Value::Object(row) => Ok(row),
        other => Err(PersistenceError::illegal_argument(format!(
            "entity '{}' must serialize to an object, got {other}",
            E::NAME
        ))),
    }
}

pub(crate) fn from_row<E: Entity>(row: &Row) -> Result<E> {
    serde_json::from_value(Value::Object(row.clone())).map_err(|source| {
        PersistenceError::Mapping {
            entity: E::NAME,
            source,
        }
    })
}

pub(crate) fn row_id(row: &Row) -> Option<Id> {
    row.get(ID_ATTRIBUTE).and_then(Value::as_i64)
}


#[cfg(test)]
mod tests {
    use super::fixtures::Note;
    use super::*;

    #[test]
    fn rows_keep_the_identity_attribute() {
        let mut note = Note::new("draft");
        note.set_id(3);

        let row = to_row(&note).unwrap();
        assert_eq!(row_id(&row), Some(3));
        assert_eq!(row.get("text"), Some(&Value::from("draft")));

        let back: Note = from_row(&row).unwrap();
        assert_eq!(back, note);
    }

    #[test]
    fn transient_rows_have_no_identity() {
        let row = to_row(&Note::new("draft")).unwrap();
        assert_eq!(row_id(&row), None);
    }
}
