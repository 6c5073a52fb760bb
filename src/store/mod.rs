//! Permission storage seam.
//!
//! The synchronizer and the access middleware only talk to a
//! [`PermissionStore`]; [`SqlitePermissionStore`] is the implementation
//! backed by the crate's migrations.

mod sqlite;

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::permission::{ContentType, Permission};
use crate::models::user::User;

pub use sqlite::SqlitePermissionStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("content type '{app_label}.{model}' does not exist")]
    ContentTypeNotFound { app_label: String, model: String },
    #[error("content type '{app_label}.{model}' is registered {count} times")]
    MultipleContentTypes {
        app_label: String,
        model: String,
        count: usize,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn content_type(&self, app_label: &str, model: &str) -> Result<ContentType, StoreError>;

    /// All records with exactly this codename; more than one is an invariant
    /// violation the caller has to decide about.
    async fn permissions_by_codename(
        &self,
        content_type: &ContentType,
        codename: &str,
    ) -> Result<Vec<Permission>, StoreError>;

    /// Records whose codename starts with `prefix`, compared literally.
    async fn permissions_with_prefix(
        &self,
        content_type: &ContentType,
        prefix: &str,
    ) -> Result<Vec<Permission>, StoreError>;

    async fn create_permission(
        &self,
        content_type: &ContentType,
        codename: &str,
        name: &str,
    ) -> Result<Permission, StoreError>;

    async fn rename_permission(&self, id: i64, name: &str) -> Result<(), StoreError>;

    async fn delete_permission(&self, id: i64) -> Result<(), StoreError>;

    async fn delete_permissions_with_prefix(
        &self,
        content_type: &ContentType,
        prefix: &str,
    ) -> Result<u64, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// `app_label.codename` strings granted to the user directly or via groups.
    async fn user_permission_codes(&self, user_id: Uuid) -> Result<HashSet<String>, StoreError>;
}
