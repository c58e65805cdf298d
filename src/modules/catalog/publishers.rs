use bookstore_db::{
    invoke, CriteriaQuery, EntityManager, Id, Predicate, Propagation, Result,
};

use super::models::Publisher;

#[derive(Debug, Clone, Copy, Default)]
pub struct PublisherService;

impl PublisherService {
    pub const fn new() -> Self {
        Self
    }

    pub fn save_publisher(&self, em: &mut EntityManager, mut publisher: Publisher) -> Result<Publisher> {
        invoke(em, Propagation::Mandatory, "save_publisher", move |em| {
            em.persist(&mut publisher)?;
            tracing::info!(publisher_id = ?publisher.id, name = %publisher.name, "publisher saved");
            Ok(publisher)
        })
    }

    /// The publisher with `publisher_id`. Unlike the other lookups this is
    /// strict: no match is [`bookstore_db::PersistenceError::NoResult`], and
    /// like any failure it dooms the caller's transaction.
    pub fn find_publisher_by_id(&self, em: &mut EntityManager, publisher_id: Id) -> Result<Publisher> {
        invoke(em, Propagation::Mandatory, "find_publisher_by_id", |em| {
            em.create_query(
                CriteriaQuery::<Publisher>::new().filter(Predicate::equal("id", publisher_id)),
            )
            .get_single_result()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::tests::catalog_store;
    use bookstore_db::{PersistenceError, TransactionStatus};

    #[test]
    fn saved_publisher_is_found_by_id() {
        let mut em = EntityManager::new(catalog_store());
        em.begin().unwrap();
        let saved = PublisherService
            .save_publisher(&mut em, Publisher::new("O'Reilly"))
            .unwrap();
        let id = saved.id.unwrap();

        let found = PublisherService.find_publisher_by_id(&mut em, id).unwrap();
        assert_eq!(found, saved);
        em.commit().unwrap();
    }

    #[test]
    fn missing_publisher_dooms_the_caller_transaction() {
        let store = catalog_store();
        let mut em = EntityManager::new(store.clone());
        em.begin().unwrap();
        PublisherService
            .save_publisher(&mut em, Publisher::new("Apress"))
            .unwrap();

        assert!(matches!(
            PublisherService.find_publisher_by_id(&mut em, 7),
            Err(PersistenceError::NoResult { entity: "publisher" })
        ));
        assert_eq!(
            em.transaction().map(|t| t.status()),
            Some(TransactionStatus::MarkedRollback)
        );
        assert!(matches!(em.commit(), Err(PersistenceError::RollbackOnly(_))));
        assert_eq!(store.row_count("publisher").unwrap(), 0);
    }

    #[test]
    fn lookup_requires_a_transaction() {
        let mut em = EntityManager::new(catalog_store());
        assert!(matches!(
            PublisherService.find_publisher_by_id(&mut em, 1),
            Err(PersistenceError::TransactionRequired { .. })
        ));
    }
}
