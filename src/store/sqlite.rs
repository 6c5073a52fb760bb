use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{PermissionStore, StoreError};
use crate::models::permission::{ContentType, DbPermission, Permission};
use crate::models::user::{DbUser, User};

const PERMISSION_COLUMNS: &str = "id, content_type_id, codename, name, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct SqlitePermissionStore {
    pool: SqlitePool,
}

impl SqlitePermissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers `app_label.model` if it is not known yet and returns it.
    pub async fn register_content_type(&self, app_label: &str, model: &str) -> Result<ContentType, StoreError> {
        sqlx::query("INSERT OR IGNORE INTO content_types (app_label, model) VALUES (?, ?)")
            .bind(app_label)
            .bind(model)
            .execute(&self.pool)
            .await?;

        self.content_type(app_label, model).await
    }

    pub async fn create_user(&self, username: &str, is_active: bool, is_superuser: bool) -> Result<User, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query("INSERT INTO users (id, username, is_active, is_superuser, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(username)
            .bind(is_active)
            .bind(is_superuser)
            .bind(now)
            .execute(&self.pool)
            .await?;

        self.find_user(id)
            .await?
            .ok_or_else(|| StoreError::Database(sqlx::Error::RowNotFound))
    }

    pub async fn create_group(&self, name: &str) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO groups (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn add_user_to_group(&self, user_id: Uuid, group_id: i64) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?, ?)")
            .bind(user_id.to_string())
            .bind(group_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn grant_user_permission(&self, user_id: Uuid, permission_id: i64) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO user_permissions (user_id, permission_id) VALUES (?, ?)")
            .bind(user_id.to_string())
            .bind(permission_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn grant_group_permission(&self, group_id: i64, permission_id: i64) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO group_permissions (group_id, permission_id) VALUES (?, ?)")
            .bind(group_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for SqlitePermissionStore {
    async fn content_type(&self, app_label: &str, model: &str) -> Result<ContentType, StoreError> {
        let mut rows = sqlx::query_as::<_, ContentType>(
            "SELECT id, app_label, model FROM content_types WHERE app_label = ? AND model = ?",
        )
        .bind(app_label)
        .bind(model)
        .fetch_all(&self.pool)
        .await?;

        match rows.len() {
            0 => Err(StoreError::ContentTypeNotFound {
                app_label: app_label.to_string(),
                model: model.to_string(),
            }),
            1 => Ok(rows.remove(0)),
            count => Err(StoreError::MultipleContentTypes {
                app_label: app_label.to_string(),
                model: model.to_string(),
                count,
            }),
        }
    }

    async fn permissions_by_codename(
        &self,
        content_type: &ContentType,
        codename: &str,
    ) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query_as::<_, DbPermission>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE content_type_id = ? AND codename = ? ORDER BY id"
        ))
        .bind(content_type.id)
        .bind(codename)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn permissions_with_prefix(
        &self,
        content_type: &ContentType,
        prefix: &str,
    ) -> Result<Vec<Permission>, StoreError> {
        // substr keeps `%` and `_` in prefixes literal
        let rows = sqlx::query_as::<_, DbPermission>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions \
             WHERE content_type_id = ? AND substr(codename, 1, length(?)) = ? ORDER BY codename, id"
        ))
        .bind(content_type.id)
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn create_permission(
        &self,
        content_type: &ContentType,
        codename: &str,
        name: &str,
    ) -> Result<Permission, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO permissions (content_type_id, codename, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(content_type.id)
        .bind(codename)
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Permission {
            id: result.last_insert_rowid(),
            content_type_id: content_type.id,
            codename: codename.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn rename_permission(&self, id: i64, name: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE permissions SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_permission(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM permissions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_permissions_with_prefix(
        &self,
        content_type: &ContentType,
        prefix: &str,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM permissions WHERE content_type_id = ? AND substr(codename, 1, length(?)) = ?",
        )
        .bind(content_type.id)
        .bind(prefix)
        .bind(prefix)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, DbUser>(
            "SELECT id, username, is_active, is_superuser, created_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn user_permission_codes(&self, user_id: Uuid) -> Result<HashSet<String>, StoreError> {
        let codes = sqlx::query_scalar::<_, String>(
            "SELECT ct.app_label || '.' || p.codename FROM permissions p \
             JOIN content_types ct ON ct.id = p.content_type_id \
             JOIN user_permissions up ON up.permission_id = p.id \
             WHERE up.user_id = ? \
             UNION \
             SELECT ct.app_label || '.' || p.codename FROM permissions p \
             JOIN content_types ct ON ct.id = p.content_type_id \
             JOIN group_permissions gp ON gp.permission_id = p.id \
             JOIN user_groups ug ON ug.group_id = gp.group_id \
             WHERE ug.user_id = ?",
        )
        .bind(user_id.to_string())
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(codes.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqlitePermissionStore {
        // one connection, otherwise every connection gets its own in-memory db
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        SqlitePermissionStore::new(pool)
    }

    #[tokio::test]
    async fn user_content_type_is_seeded() {
        let store = store().await;
        let ct = store.content_type("auth", "user").await.unwrap();
        assert_eq!(ct.model, "user");

        let missing = store.content_type("accounts", "member").await;
        assert!(matches!(missing, Err(StoreError::ContentTypeNotFound { .. })));
    }

    #[tokio::test]
    async fn registering_content_type_is_idempotent() {
        let store = store().await;
        let first = store.register_content_type("accounts", "member").await.unwrap();
        let again = store.register_content_type("accounts", "member").await.unwrap();
        assert_eq!(first, again);
        assert_eq!(store.content_type("accounts", "member").await.unwrap().id, first.id);

        let seeded = store.register_content_type("auth", "user").await.unwrap();
        assert_eq!(seeded.app_label, "auth");
    }

    #[tokio::test]
    async fn prefix_match_is_literal() {
        let store = store().await;
        let ct = store.content_type("auth", "user").await.unwrap();
        store.create_permission(&ct, "access_view_blog.views.a", "a").await.unwrap();
        store.create_permission(&ct, "access_viewXblog.views.b", "b").await.unwrap();

        let found = store.permissions_with_prefix(&ct, "access_view_blog.").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].codename, "access_view_blog.views.a");

        let deleted = store.delete_permissions_with_prefix(&ct, "access_view_").await.unwrap();
        assert_eq!(deleted, 1);
    }

    #[tokio::test]
    async fn codes_include_direct_and_group_grants() {
        let store = store().await;
        let ct = store.content_type("auth", "user").await.unwrap();
        let direct = store.create_permission(&ct, "access_view_a.views.x", "x").await.unwrap();
        let via_group = store.create_permission(&ct, "access_view_a.views.y", "y").await.unwrap();
        store.create_permission(&ct, "access_view_a.views.z", "z").await.unwrap();

        let user = store.create_user("ada", true, false).await.unwrap();
        let group = store.create_group("editors").await.unwrap();
        store.grant_user_permission(user.id, direct.id).await.unwrap();
        store.grant_group_permission(group, via_group.id).await.unwrap();
        store.add_user_to_group(user.id, group).await.unwrap();

        let codes = store.user_permission_codes(user.id).await.unwrap();
        assert_eq!(codes.len(), 2);
        assert!(codes.contains("auth.access_view_a.views.x"));
        assert!(codes.contains("auth.access_view_a.views.y"));
    }

    #[tokio::test]
    async fn deleting_permission_drops_grants() {
        let store = store().await;
        let ct = store.content_type("auth", "user").await.unwrap();
        let perm = store.create_permission(&ct, "access_view_a.views.x", "x").await.unwrap();
        let user = store.create_user("ada", true, false).await.unwrap();
        store.grant_user_permission(user.id, perm.id).await.unwrap();

        store.delete_permission(perm.id).await.unwrap();
        assert!(store.user_permission_codes(user.id).await.unwrap().is_empty());
        assert_eq!(store.find_user(user.id).await.unwrap().map(|u| u.username), Some("ada".into()));
    }
}
