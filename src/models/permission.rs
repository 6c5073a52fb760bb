use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The model a permission is anchored to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ContentType {
    pub id: i64,
    pub app_label: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: i64,
    pub content_type_id: i64,
    pub codename: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPermission {
    pub id: i64,
    pub content_type_id: i64,
    pub codename: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPermission> for Permission {
    fn from(db: DbPermission) -> Self {
        Permission {
            id: db.id,
            content_type_id: db.content_type_id,
            codename: db.codename,
            name: db.name,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
