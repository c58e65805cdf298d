//! Bookstore application library
//!
//! Catalog modules plus the bootstrap that wires them to the store, the
//! module registry and the HTTP server.

pub mod bootstrap;
pub mod modules;

pub use modules::catalog::{
    Book, BookService, Category, CategoryService, Publisher, PublisherService,
};
