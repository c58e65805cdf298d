use bookstore_db::{
    invoke, CriteriaQuery, EntityManager, Id, PersistenceError, Predicate, Propagation, Result,
};

use super::models::Category;

/// Category management facade over the category forest.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryService;

impl CategoryService {
    pub const fn new() -> Self {
        Self
    }

    /// Persist a category and return its generated identity. The row is
    /// flushed and re-read before returning, so the identity is usable before
    /// the caller commits.
    ///
    /// A parent, when given, must already exist; since the new category gets a
    /// fresh identity this keeps the parent relation acyclic.
    pub fn save_category(&self, em: &mut EntityManager, mut category: Category) -> Result<Id> {
        invoke(em, Propagation::Mandatory, "save_category", move |em| {
            if let Some(parent_id) = category.parent_id {
                if em.find::<Category>(parent_id)?.is_none() {
                    return Err(PersistenceError::IllegalArgument(format!(
                        "parent category {parent_id} does not exist"
                    )));
                }
            }

            em.persist(&mut category)?;
            em.flush()?;
            em.refresh(&mut category)?;

            let id = category.id.ok_or_else(|| {
                PersistenceError::IllegalArgument("category has no identity after flush".into())
            })?;
            tracing::info!(category_id = id, name = %category.name, "category saved");
            Ok(id)
        })
    }

    /// Look a category up. A missing id is rejected before the store is
    /// touched.
    pub fn find_category_by_id(
        &self,
        em: &mut EntityManager,
        category_id: Option<Id>,
    ) -> Result<Option<Category>> {
        invoke(em, Propagation::Supports, "find_category_by_id", |em| {
            let category_id = category_id.ok_or_else(|| {
                PersistenceError::IllegalArgument("category id must not be null".into())
            })?;
            em.find::<Category>(category_id)
        })
    }

    /// Categories without a parent.
    pub fn get_root_categories(&self, em: &mut EntityManager) -> Result<Vec<Category>> {
        invoke(em, Propagation::Mandatory, "get_root_categories", |em| {
            em.create_query(CriteriaQuery::<Category>::new().filter(Predicate::is_null("parent_id")))
                .get_result_list()
        })
    }

    /// Direct children of `parent_id`; empty when it has none or does not
    /// exist.
    pub fn get_children_categories(
        &self,
        em: &mut EntityManager,
        parent_id: Id,
    ) -> Result<Vec<Category>> {
        invoke(em, Propagation::Mandatory, "get_children_categories", |em| {
            em.create_query(
                CriteriaQuery::<Category>::new().filter(Predicate::equal("parent_id", parent_id)),
            )
            .get_result_list()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::tests::catalog_store;
    use bookstore_db::TransactionStatus;

    #[test]
    fn saved_identity_is_visible_before_commit() {
        let mut em = EntityManager::new(catalog_store());
        em.begin().unwrap();

        let id = CategoryService
            .save_category(&mut em, Category::root("Fiction"))
            .unwrap();
        let found = CategoryService
            .find_category_by_id(&mut em, Some(id))
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Fiction");
        em.commit().unwrap();
    }

    #[test]
    fn null_id_is_rejected_and_marks_the_transaction() {
        let mut em = EntityManager::new(catalog_store());
        assert!(matches!(
            CategoryService.find_category_by_id(&mut em, None),
            Err(PersistenceError::IllegalArgument(_))
        ));

        em.begin().unwrap();
        assert!(CategoryService.find_category_by_id(&mut em, None).is_err());
        assert_eq!(
            em.transaction().map(|t| t.status()),
            Some(TransactionStatus::MarkedRollback)
        );
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut em = EntityManager::new(catalog_store());
        em.begin().unwrap();
        assert!(matches!(
            CategoryService.save_category(&mut em, Category::child_of("Orphan", 42)),
            Err(PersistenceError::IllegalArgument(_))
        ));
    }

    #[test]
    fn hierarchy_queries_require_a_transaction() {
        let mut em = EntityManager::new(catalog_store());
        assert!(matches!(
            CategoryService.get_root_categories(&mut em),
            Err(PersistenceError::TransactionRequired { .. })
        ));
        assert!(matches!(
            CategoryService.get_children_categories(&mut em, 1),
            Err(PersistenceError::TransactionRequired { .. })
        ));
    }

    #[test]
    fn childless_category_yields_an_empty_list() {
        let mut em = EntityManager::new(catalog_store());
        em.begin().unwrap();
        let leaf = CategoryService
            .save_category(&mut em, Category::root("Poetry"))
            .unwrap();

        assert!(CategoryService
            .get_children_categories(&mut em, leaf)
            .unwrap()
            .is_empty());
        assert!(CategoryService
            .get_children_categories(&mut em, 999)
            .unwrap()
            .is_empty());
    }
}
