//! Persistence layer for the bookstore catalog.
//!
//! A shared in-memory [`Store`] holds committed rows; callers open an
//! [`EntityManager`] per unit of work, demarcate transactions on it and run
//! service operations through [`propagation::invoke`].

pub mod criteria;
pub mod entity;
pub mod entity_manager;
pub mod error;
pub mod like;
pub mod propagation;
pub mod store;
pub mod transaction;

pub use criteria::{CriteriaQuery, Order, Predicate};
pub use entity::{Entity, Id, Row};
pub use entity_manager::{EntityManager, FlushMode, TypedQuery};
pub use error::{PersistenceError, Result};
pub use propagation::{invoke, Propagation};
pub use store::{Store, StoreOptions};
pub use transaction::{Transaction, TransactionStatus};
