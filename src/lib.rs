pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod i18n;
pub mod middleware;
pub mod models;
pub mod store;
pub mod sync;
pub mod urls;

// Re-export commonly used items for tests
pub use config::Settings;
pub use middleware::{Decision, ViewPermissionLayer};
pub use store::{PermissionStore, SqlitePermissionStore};
pub use sync::{sync_app, SyncMode, SyncOptions, SyncReport};
pub use urls::{UrlConf, ViewDescriptor};
