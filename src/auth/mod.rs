//! Request principal and the permission check used by the access middleware.

pub mod jwt;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::errors::AppError;
use crate::models::user::User;
use crate::store::{PermissionStore, StoreError};

/// The principal attached to a request by an authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestUser {
    Anonymous,
    Authenticated(User),
}

impl RequestUser {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, RequestUser::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            RequestUser::Authenticated(user) => Some(user),
            RequestUser::Anonymous => None,
        }
    }

    /// Username for log lines.
    pub fn label(&self) -> &str {
        match self {
            RequestUser::Authenticated(user) => &user.username,
            RequestUser::Anonymous => "AnonymousUser",
        }
    }

    /// `perm` is `app_label.codename`.
    ///
    /// Inactive users hold nothing, active superusers hold everything,
    /// everyone else holds their direct and group grants.
    pub async fn has_perm<S>(&self, store: &S, perm: &str) -> Result<bool, StoreError>
    where
        S: PermissionStore + ?Sized,
    {
        let Some(user) = self.user() else {
            return Ok(false);
        };
        if !user.is_active {
            return Ok(false);
        }
        if user.is_superuser {
            return Ok(true);
        }

        let codes = store.user_permission_codes(user.id).await?;
        Ok(codes.contains(perm))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestUser>()
            .cloned()
            .ok_or_else(|| AppError::configuration("no authentication layer attached a user to the request"))
    }
}
