//! HTTP surface of the catalog, mounted under `/api/catalog`.
//!
//! Handlers own the transaction boundary for the operations that must run
//! inside one; the search and single-category lookup run without one and
//! the book update starts its own.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bookstore_db::{like, EntityManager, Id};
use bookstore_http::error::AppError;
use serde::Deserialize;
use serde_json::{json, Value};

use super::models::{Book, Category, Publisher};
use super::CatalogState;

pub fn router(state: CatalogState) -> Router {
    Router::new()
        .route("/books", get(search_books).post(create_book))
        .route(
            "/books/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/categories", get(root_categories).post(create_category))
        .route("/categories/{id}", get(get_category))
        .route("/categories/{id}/children", get(child_categories))
        .route("/publishers", post(create_publisher))
        .route("/publishers/{id}", get(get_publisher))
        .with_state(state)
}

/// Run `work` inside a transaction begun and committed here. A failure rolls
/// the transaction back before the error is returned.
fn in_transaction<T>(
    state: &CatalogState,
    work: impl FnOnce(&mut EntityManager) -> bookstore_db::Result<T>,
) -> Result<T, AppError> {
    let mut em = state.entity_manager();
    em.begin()?;
    match work(&mut em) {
        Ok(value) => {
            em.commit()?;
            Ok(value)
        }
        Err(error) => {
            if em.has_active_transaction() {
                if let Err(rollback_error) = em.rollback() {
                    tracing::error!(
                        cause = %error,
                        error = %rollback_error,
                        "rollback after failed request failed"
                    );
                }
            }
            Err(error.into())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BookSearch {
    /// `LIKE` pattern matched against the title
    pub title: Option<String>,
    /// Plain word the title must contain; wildcards in it are literal
    pub q: Option<String>,
}

impl BookSearch {
    fn pattern(self) -> String {
        match (self.title, self.q) {
            (Some(title), _) => title,
            (None, Some(word)) => like::contains(&word),
            (None, None) => "%".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BookInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub isbn: String,
    pub publication_year: Option<i32>,
    pub publisher_id: Option<Id>,
    pub category_id: Option<Id>,
}

impl BookInput {
    fn into_book(self, id: Option<Id>) -> Result<Book, AppError> {
        let mut details = Vec::new();
        for (field, value) in [
            ("title", &self.title),
            ("author", &self.author),
            ("isbn", &self.isbn),
        ] {
            if value.trim().is_empty() {
                details.push(json!({ "field": field, "error": "required" }));
            }
        }
        if !details.is_empty() {
            return Err(AppError::validation(details, "book is incomplete"));
        }

        Ok(Book {
            id,
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            publication_year: self.publication_year,
            publisher_id: self.publisher_id,
            category_id: self.category_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryInput {
    #[serde(default)]
    pub name: String,
    pub parent_id: Option<Id>,
}

#[derive(Debug, Deserialize)]
pub struct PublisherInput {
    #[serde(default)]
    pub name: String,
    pub country: Option<String>,
}

fn require_name(name: &str, what: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation(
            vec![json!({ "field": "name", "error": "required" })],
            format!("{what} name is required"),
        ));
    }
    Ok(())
}

async fn search_books(
    State(state): State<CatalogState>,
    Query(search): Query<BookSearch>,
) -> Result<Json<Vec<Book>>, AppError> {
    let pattern = search.pattern();
    let books = state
        .books
        .find_by_criteria(&mut state.entity_manager(), &pattern)?;
    tracing::debug!(%pattern, matches = books.len(), "book search");
    Ok(Json(books))
}

async fn create_book(
    State(state): State<CatalogState>,
    Json(input): Json<BookInput>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let book = input.into_book(None)?;
    let saved = in_transaction(&state, |em| state.books.save_book(em, book))?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn get_book(
    State(state): State<CatalogState>,
    Path(id): Path<Id>,
) -> Result<Json<Book>, AppError> {
    in_transaction(&state, |em| state.books.find_book_by_id(em, id))?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("book {id} does not exist")))
}

async fn update_book(
    State(state): State<CatalogState>,
    Path(id): Path<Id>,
    Json(input): Json<BookInput>,
) -> Result<Json<Book>, AppError> {
    let book = input.into_book(Some(id))?;
    let updated = state
        .books
        .update_book(&mut state.entity_manager(), &book)?;
    Ok(Json(updated))
}

async fn delete_book(
    State(state): State<CatalogState>,
    Path(id): Path<Id>,
) -> Result<StatusCode, AppError> {
    in_transaction(&state, |em| {
        let book = state.books.find_book_by_id(em, id)?;
        state.books.delete_book(em, book.as_ref())
    })?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_category(
    State(state): State<CatalogState>,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_name(&input.name, "category")?;
    let category = Category {
        id: None,
        name: input.name,
        parent_id: input.parent_id,
    };
    let id = in_transaction(&state, |em| state.categories.save_category(em, category))?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn root_categories(
    State(state): State<CatalogState>,
) -> Result<Json<Vec<Category>>, AppError> {
    let roots = in_transaction(&state, |em| state.categories.get_root_categories(em))?;
    Ok(Json(roots))
}

async fn get_category(
    State(state): State<CatalogState>,
    Path(id): Path<Id>,
) -> Result<Json<Category>, AppError> {
    state
        .categories
        .find_category_by_id(&mut state.entity_manager(), Some(id))?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("category {id} does not exist")))
}

async fn child_categories(
    State(state): State<CatalogState>,
    Path(id): Path<Id>,
) -> Result<Json<Vec<Category>>, AppError> {
    let children = in_transaction(&state, |em| {
        state.categories.get_children_categories(em, id)
    })?;
    Ok(Json(children))
}

async fn create_publisher(
    State(state): State<CatalogState>,
    Json(input): Json<PublisherInput>,
) -> Result<(StatusCode, Json<Publisher>), AppError> {
    require_name(&input.name, "publisher")?;
    let publisher = Publisher {
        id: None,
        name: input.name,
        country: input.country,
    };
    let saved = in_transaction(&state, |em| state.publishers.save_publisher(em, publisher))?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn get_publisher(
    State(state): State<CatalogState>,
    Path(id): Path<Id>,
) -> Result<Json<Publisher>, AppError> {
    let publisher = in_transaction(&state, |em| state.publishers.find_publisher_by_id(em, id))?;
    Ok(Json(publisher))
}
