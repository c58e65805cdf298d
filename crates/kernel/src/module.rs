use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookstore_db::Store;

/// What a module sees while it is brought up
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
    /// Shared store every persistence context of the module opens against
    pub store: &'a Arc<Store>,
}

/// A unit of the application: tables, HTTP routes and a lifecycle.
///
/// The registry drives `entities` → `init` → `start` in registration order
/// and `stop` in reverse.
#[async_trait]
pub trait Module: Sync + Send {
    /// Name used in logs and as the mount point `/api/{name}`
    fn name(&self) -> &'static str;

    /// Tables this module persists to. They are registered with the store
    /// before any module is initialized.
    fn entities(&self) -> Vec<&'static str> {
        vec![]
    }

    /// Prepare the module; the store already knows every table
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes relative to the module's mount point
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment with `paths` and `components.schemas`; paths are
    /// prefixed with the mount point when merged
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Called once every module is initialized
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Tear the module down at shutdown
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
