//! Per-view access control layer.
//!
//! For every request the layer resolves the target view, derives its
//! permission codename and, when such a permission exists, requires the
//! request's principal to hold it. Views without a permission record are
//! open: protection is opt-in per view.
//!
//! The layer must sit inside an authentication layer that attaches a
//! [`RequestUser`] (see [`crate::auth::jwt::authenticate`]).

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use crate::auth::RequestUser;
use crate::config::{Settings, ViewNaming};
use crate::errors::{AppError, AppResult};
use crate::store::PermissionStore;
use crate::urls::UrlConf;

/// Outcome of a single access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No route matched; not this layer's concern.
    Unresolved,
    /// The view is in the ignore list.
    Ignored { view_name: String },
    /// No permission record exists for the view.
    Unprotected { view_name: String },
    /// More than one record carries the codename; fails open.
    Ambiguous { view_name: String, count: usize },
    Granted { view_name: String },
    Denied { view_name: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Denied { .. })
    }
}

pub struct ViewPermissionGuard {
    urlconf: Arc<UrlConf>,
    store: Arc<dyn PermissionStore>,
    settings: Arc<Settings>,
}

impl ViewPermissionGuard {
    pub fn new(urlconf: Arc<UrlConf>, store: Arc<dyn PermissionStore>, settings: Arc<Settings>) -> Self {
        Self {
            urlconf,
            store,
            settings,
        }
    }

    /// Runs the access check for `path`. `user` is `None` when nothing
    /// upstream attached a principal, which is a wiring error.
    pub async fn check(&self, path: &str, user: Option<&RequestUser>) -> AppResult<Decision> {
        let Some(user) = user else {
            error!("view permission layer needs an authentication layer in front of it");
            return Err(AppError::configuration(
                "view permission layer must be placed after the authentication layer",
            ));
        };

        let model = &self.settings.user_model;
        let content_type = self.store.content_type(&model.app_label, &model.model).await.map_err(|err| {
            error!(error = %err, "failed to find user content type");
            AppError::from(err)
        })?;

        let Some(resolved) = self.urlconf.resolve(path) else {
            warn!(path = %path, "path could not be resolved, not enforcing view permission");
            return Ok(Decision::Unresolved);
        };

        let view_name = match self.settings.view_naming {
            ViewNaming::Class => resolved.view.identity(),
            ViewNaming::Callable => resolved.view.callable_identity(),
        };

        if self.settings.is_ignored(&view_name) {
            debug!(view = %view_name, "view is in the ignore list, not enforcing view permission");
            return Ok(Decision::Ignored { view_name });
        }

        let codename = self.settings.perm_codename(&view_name);
        let perms = self.store.permissions_by_codename(&content_type, &codename).await?;

        match perms.len() {
            0 => {
                debug!(codename = %codename, "permission does not exist, not enforcing view permission");
                return Ok(Decision::Unprotected { view_name });
            }
            1 => {}
            count => {
                error!(
                    content_type = %format!("{}.{}", content_type.app_label, content_type.model),
                    codename = %codename,
                    count,
                    "duplicate view permissions, not enforcing view permission"
                );
                return Ok(Decision::Ambiguous { view_name, count });
            }
        }

        let perm = format!("{}.{}", content_type.app_label, codename);
        if user.has_perm(self.store.as_ref(), &perm).await? {
            Ok(Decision::Granted { view_name })
        } else {
            debug!(
                user = %user.label(),
                view = %view_name,
                permission = %perm,
                "access to view denied"
            );
            Ok(Decision::Denied { view_name })
        }
    }
}

#[derive(Clone)]
pub struct ViewPermissionLayer {
    guard: Arc<ViewPermissionGuard>,
}

impl ViewPermissionLayer {
    pub fn new(urlconf: Arc<UrlConf>, store: Arc<dyn PermissionStore>, settings: Arc<Settings>) -> Self {
        Self {
            guard: Arc::new(ViewPermissionGuard::new(urlconf, store, settings)),
        }
    }

    pub fn guard(&self) -> &ViewPermissionGuard {
        &self.guard
    }
}

impl<S> Layer<S> for ViewPermissionLayer {
    type Service = ViewPermissionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ViewPermissionMiddleware {
            inner,
            guard: self.guard.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ViewPermissionMiddleware<S> {
    inner: S,
    guard: Arc<ViewPermissionGuard>,
}

impl<S> Service<Request<Body>> for ViewPermissionMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let guard = self.guard.clone();
        // take the service that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            // no borrow of `req` may live across the await, the body is not Sync
            let path = req.uri().path().to_string();
            let user = req.extensions().get::<RequestUser>().cloned();
            let decision = guard.check(&path, user.as_ref()).await;

            match decision {
                Ok(decision) if decision.is_allowed() => inner.call(req).await,
                Ok(_) => Ok(AppError::permission_denied().into_response()),
                Err(err) => Ok(err.into_response()),
            }
        })
    }
}
