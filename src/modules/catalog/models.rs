use bookstore_db::{Entity, Id};
use serde::{Deserialize, Serialize};

/// A book of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Generated identity; `None` until the book is persisted
    #[serde(default)]
    pub id: Option<Id>,
    /// Title of the book, searched with `LIKE` patterns
    pub title: String,
    /// Author of the book
    pub author: String,
    /// ISBN-13 of the edition
    pub isbn: String,
    /// Year of publication
    #[serde(default)]
    pub publication_year: Option<i32>,
    /// Identity of the publisher
    #[serde(default)]
    pub publisher_id: Option<Id>,
    /// Identity of the category the book is shelved under
    #[serde(default)]
    pub category_id: Option<Id>,
}

impl Book {
    pub fn new(title: impl Into<String>, author: impl Into<String>, isbn: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            author: author.into(),
            isbn: isbn.into(),
            publication_year: None,
            publisher_id: None,
            category_id: None,
        }
    }
}

impl Entity for Book {
    const NAME: &'static str = "book";
    const ATTRIBUTES: &'static [&'static str] = &[
        "id",
        "title",
        "author",
        "isbn",
        "publication_year",
        "publisher_id",
        "category_id",
    ];

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
}

/// A node of the category forest. The parent is referenced by identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: Option<Id>,
    pub name: String,
    /// Parent category; `None` for a root
    #[serde(default)]
    pub parent_id: Option<Id>,
}

impl Category {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            parent_id: None,
        }
    }

    pub fn child_of(name: impl Into<String>, parent_id: Id) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::root(name)
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl Entity for Category {
    const NAME: &'static str = "category";
    const ATTRIBUTES: &'static [&'static str] = &["id", "name", "parent_id"];

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publisher {
    #[serde(default)]
    pub id: Option<Id>,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
}

impl Publisher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            country: None,
        }
    }
}

impl Entity for Publisher {
    const NAME: &'static str = "publisher";
    const ATTRIBUTES: &'static [&'static str] = &["id", "name", "country"];

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
}

/// Tables owned by the catalog module.
pub const CATALOG_TABLES: &[&str] = &[Book::NAME, Category::NAME, Publisher::NAME];
