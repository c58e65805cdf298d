//! Application wiring: store, module registry, lifecycle and HTTP server.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use bookstore_db::Store;
use bookstore_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// A started application: every module initialized and running.
pub struct Application {
    pub settings: Settings,
    pub store: Arc<Store>,
    pub registry: ModuleRegistry,
}

impl Application {
    /// Build the store, install module schemas, then run `init` and `start`
    /// on every module.
    pub async fn start(settings: Settings) -> anyhow::Result<Self> {
        let store = Arc::new(Store::new(settings.persistence.store_options()));

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, store.clone());
        registry.install_schema(&store);

        let ctx = InitCtx {
            settings: &settings,
            store: &store,
        };
        registry.init_modules(&ctx).await?;
        registry.start_modules(&ctx).await?;

        tracing::info!(
            modules = registry.module_count(),
            tables = ?store.table_names(),
            "bookstore application started"
        );

        Ok(Self {
            settings,
            store,
            registry,
        })
    }

    pub fn router(&self) -> Router {
        bookstore_http::build_router(&self.registry, &self.settings)
    }

    /// Stop every module in reverse registration order.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.registry.stop_modules().await?;
        tracing::info!("bookstore application stopped");
        Ok(())
    }
}

/// Serve until Ctrl-C, then stop the modules.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let app = Application::start(settings).await?;

    let served = bookstore_http::start_server(&app.registry, &app.settings, shutdown_signal())
        .await
        .context("bookstore HTTP server failed");

    let stopped = app.shutdown().await;
    served.and(stopped)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for the shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn seeded_application_serves_the_catalog() {
        let mut settings = Settings::default();
        settings.catalog.seed_demo_data = true;
        let app = Application::start(settings).await.unwrap();

        let response = app
            .router()
            .oneshot(
                Request::get("/api/catalog/books?title=%25Java%25")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let books: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(books.as_array().unwrap().len(), 3);

        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn openapi_lists_catalog_paths() {
        let app = Application::start(Settings::default()).await.unwrap();
        let document = bookstore_http::router::merged_openapi(&app.registry);
        assert!(document["paths"]["/api/catalog/books/{id}"].is_object());
        assert!(document["components"]["schemas"]["Book"].is_object());
    }
}
