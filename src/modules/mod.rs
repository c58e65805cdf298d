pub mod catalog;

use std::sync::Arc;

use bookstore_db::Store;
use bookstore_kernel::ModuleRegistry;

/// Register all application modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, store: Arc<Store>) {
    registry.register(catalog::create_module(store));
}
