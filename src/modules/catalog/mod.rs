//! Catalog module: books, categories and publishers.

pub mod books;
pub mod categories;
pub mod models;
pub mod publishers;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use bookstore_db::{EntityManager, Store};
use bookstore_kernel::{InitCtx, Module};
use serde_json::json;

pub use books::BookService;
pub use categories::CategoryService;
pub use models::{Book, Category, Publisher};
pub use publishers::PublisherService;

/// Shared handle given to the catalog routes.
#[derive(Clone)]
pub struct CatalogState {
    pub store: Arc<Store>,
    pub books: BookService,
    pub categories: CategoryService,
    pub publishers: PublisherService,
}

impl CatalogState {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            books: BookService::new(),
            categories: CategoryService::new(),
            publishers: PublisherService::new(),
        }
    }

    /// Open a fresh persistence context with no transaction.
    pub fn entity_manager(&self) -> EntityManager {
        EntityManager::new(self.store.clone())
    }
}

pub struct CatalogModule {
    state: CatalogState,
}

impl CatalogModule {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            state: CatalogState::new(store),
        }
    }
}

#[async_trait]
impl Module for CatalogModule {
    fn name(&self) -> &'static str {
        "catalog"
    }

    fn entities(&self) -> Vec<&'static str> {
        models::CATALOG_TABLES.to_vec()
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            unit = %ctx.settings.persistence.unit_name,
            "catalog module initialized"
        );

        if ctx.settings.catalog.seed_demo_data {
            let summary = seed::seed_demo_catalog(&self.state.store)
                .context("failed to seed the demo catalog")?;
            tracing::info!(
                module = self.name(),
                books = summary.books,
                categories = summary.categories,
                publishers = summary.publishers,
                "demo catalog loaded"
            );
        }
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "catalog module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "catalog services shutting down");
        Ok(())
    }
}

/// Create a new instance of the catalog module
pub fn create_module(store: Arc<Store>) -> Arc<dyn Module> {
    Arc::new(CatalogModule::new(store))
}

fn error_responses() -> serde_json::Value {
    let error = |description: &str| {
        let mut response = json_body(json!({ "$ref": "#/components/schemas/ErrorResponse" }));
        response["description"] = json!(description);
        response
    };
    json!({
        "400": error("Malformed request or illegal argument"),
        "404": error("No matching entity"),
        "409": error("Conflicting or non-unique entity")
    })
}

fn json_body(schema: serde_json::Value) -> serde_json::Value {
    json!({ "content": { "application/json": { "schema": schema } } })
}

fn id_parameter() -> serde_json::Value {
    json!([{ "name": "id", "in": "path", "required": true, "schema": { "type": "integer" } }])
}

fn openapi_fragment() -> serde_json::Value {
    let book = json!({ "$ref": "#/components/schemas/Book" });
    let books = json!({ "type": "array", "items": { "$ref": "#/components/schemas/Book" } });
    let category = json!({ "$ref": "#/components/schemas/Category" });
    let categories = json!({ "type": "array", "items": { "$ref": "#/components/schemas/Category" } });
    let publisher = json!({ "$ref": "#/components/schemas/Publisher" });

    let ok = |description: &str, schema: serde_json::Value| {
        let mut response = json_body(schema);
        response["description"] = json!(description);
        response
    };
    let with_errors = |mut responses: serde_json::Value| {
        if let (Some(target), Some(errors)) =
            (responses.as_object_mut(), error_responses().as_object())
        {
            for (status, response) in errors {
                target.insert(status.clone(), response.clone());
            }
        }
        responses
    };

    json!({
        "paths": {
            "/books": {
                "get": {
                    "summary": "Search books by title",
                    "tags": ["Books"],
                    "parameters": [
                        { "name": "title", "in": "query", "schema": { "type": "string" },
                          "description": "LIKE pattern, e.g. %Java%" },
                        { "name": "q", "in": "query", "schema": { "type": "string" },
                          "description": "Word the title must contain" }
                    ],
                    "responses": with_errors(json!({ "200": ok("Matching books", books.clone()) }))
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": json_body(json!({ "$ref": "#/components/schemas/BookInput" })),
                    "responses": with_errors(json!({ "201": ok("Created book", book.clone()) }))
                }
            },
            "/books/{id}": {
                "parameters": id_parameter(),
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "responses": with_errors(json!({ "200": ok("The book", book.clone()) }))
                },
                "put": {
                    "summary": "Update a book",
                    "tags": ["Books"],
                    "requestBody": json_body(json!({ "$ref": "#/components/schemas/BookInput" })),
                    "responses": with_errors(json!({ "200": ok("Updated book", book.clone()) }))
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "responses": with_errors(json!({ "204": { "description": "Deleted" } }))
                }
            },
            "/categories": {
                "get": {
                    "summary": "List root categories",
                    "tags": ["Categories"],
                    "responses": with_errors(json!({ "200": ok("Root categories", categories.clone()) }))
                },
                "post": {
                    "summary": "Create a category",
                    "tags": ["Categories"],
                    "requestBody": json_body(json!({ "$ref": "#/components/schemas/CategoryInput" })),
                    "responses": with_errors(json!({ "201": ok("Identity of the new category",
                        json!({ "type": "object", "properties": { "id": { "type": "integer" } } })) }))
                }
            },
            "/categories/{id}": {
                "parameters": id_parameter(),
                "get": {
                    "summary": "Get a category",
                    "tags": ["Categories"],
                    "responses": with_errors(json!({ "200": ok("The category", category) }))
                }
            },
            "/categories/{id}/children": {
                "parameters": id_parameter(),
                "get": {
                    "summary": "List child categories",
                    "tags": ["Categories"],
                    "responses": with_errors(json!({ "200": ok("Child categories", categories) }))
                }
            },
            "/publishers": {
                "post": {
                    "summary": "Create a publisher",
                    "tags": ["Publishers"],
                    "requestBody": json_body(json!({ "$ref": "#/components/schemas/PublisherInput" })),
                    "responses": with_errors(json!({ "201": ok("Created publisher", publisher.clone()) }))
                }
            },
            "/publishers/{id}": {
                "parameters": id_parameter(),
                "get": {
                    "summary": "Get a publisher",
                    "tags": ["Publishers"],
                    "responses": with_errors(json!({ "200": ok("The publisher", publisher) }))
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "isbn": { "type": "string" },
                        "publication_year": { "type": "integer" },
                        "publisher_id": { "type": "integer" },
                        "category_id": { "type": "integer" }
                    },
                    "required": ["id", "title", "author", "isbn"]
                },
                "BookInput": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "isbn": { "type": "string" },
                        "publication_year": { "type": "integer" },
                        "publisher_id": { "type": "integer" },
                        "category_id": { "type": "integer" }
                    },
                    "required": ["title", "author", "isbn"]
                },
                "Category": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "name": { "type": "string" },
                        "parent_id": { "type": "integer" }
                    },
                    "required": ["id", "name"]
                },
                "CategoryInput": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "parent_id": { "type": "integer" }
                    },
                    "required": ["name"]
                },
                "Publisher": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "name": { "type": "string" },
                        "country": { "type": "string" }
                    },
                    "required": ["id", "name"]
                },
                "PublisherInput": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "country": { "type": "string" }
                    },
                    "required": ["name"]
                }
            }
        }
    })
}
