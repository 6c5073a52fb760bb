use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use super::RequestUser;
use crate::errors::AppError;
use crate::store::PermissionStore;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours,
        }
    }

    pub fn encode(&self, user_id: Uuid) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<JwtConfig>,
    pub store: Arc<dyn PermissionStore>,
}

impl AuthState {
    pub fn new(jwt: JwtConfig, store: Arc<dyn PermissionStore>) -> Self {
        Self {
            jwt: Arc::new(jwt),
            store,
        }
    }
}

/// Attaches a [`RequestUser`] to every request.
///
/// Requests without a usable bearer token continue as anonymous; rejecting
/// them is the access layer's job. Use with `axum::middleware::from_fn_with_state`,
/// outside of the view permission layer.
pub async fn authenticate(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = {
        let token = request
            .headers()
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        match token.map(|token| auth.jwt.decode(token)) {
            None => None,
            Some(Ok(claims)) => Some(claims),
            Some(Err(err)) => {
                tracing::debug!(error = %err, "ignoring unusable bearer token");
                None
            }
        }
    };

    let user = match claims {
        None => RequestUser::Anonymous,
        Some(claims) => match auth.store.find_user(claims.sub).await? {
            Some(user) => RequestUser::Authenticated(user),
            None => {
                tracing::debug!(user_id = %claims.sub, "token subject no longer exists");
                RequestUser::Anonymous
            }
        },
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
