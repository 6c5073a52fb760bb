//! Routing tree model.
//!
//! A [`UrlConf`] is an ordered list of [`UrlNode`]s. Leaves bind a route
//! template to a [`ViewDescriptor`]; includes nest a sub-tree under a route
//! prefix. The tree is always passed explicitly to whoever needs it, and can
//! be built in code or loaded from a JSON file:
//!
//! ```json
//! [
//!   {"kind": "include", "route": "blog", "namespace": "blog", "patterns": [
//!     {"kind": "view", "route": "", "name": "post-list",
//!      "view": {"module": "blog.views", "name": "view",
//!               "view_class": {"module": "blog.views", "name": "PostList"}}},
//!     {"kind": "view", "route": ":id", "name": "post-detail",
//!      "view": {"module": "blog.views", "name": "post_detail"}}
//!   ]}
//! ]
//! ```

mod pattern;
pub mod resolve;
pub mod walk;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use pattern::RouteTemplate;
pub use resolve::{resolve, ResolverMatch};
pub use walk::{app_views, belongs_to_app, enumerate_views};

#[derive(Debug, thiserror::Error)]
pub enum UrlConfError {
    #[error("invalid route '{route}': {reason}")]
    InvalidRoute { route: String, reason: String },
    #[error("failed to read url configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed url configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// The class a class-based handler was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewClass {
    pub module: String,
    pub name: String,
}

/// Everything the naming logic needs to know about a view callable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewDescriptor {
    pub module: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_class: Option<ViewClass>,
    /// Human readable name used in permission display names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_name: Option<String>,
}

impl ViewDescriptor {
    pub fn function(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            view_class: None,
            translated_name: None,
        }
    }

    /// A handler produced from a view class; the callable itself is the
    /// generic `view` closure living in the class's module.
    pub fn class_based(module: impl Into<String>, class_name: impl Into<String>) -> Self {
        let module = module.into();
        Self {
            view_class: Some(ViewClass {
                module: module.clone(),
                name: class_name.into(),
            }),
            module,
            name: "view".to_string(),
            translated_name: None,
        }
    }

    pub fn with_translated_name(mut self, name: impl Into<String>) -> Self {
        self.translated_name = Some(name.into());
        self
    }

    /// Dotted identity: the bound class when there is one, else the callable.
    pub fn identity(&self) -> String {
        match &self.view_class {
            Some(class) => format!("{}.{}", class.module, class.name),
            None => self.callable_identity(),
        }
    }

    pub fn callable_identity(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    pub fn display_name(&self) -> String {
        self.translated_name.clone().unwrap_or_else(|| self.identity())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlPattern {
    pub route: RouteTemplate,
    pub view: ViewDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlResolver {
    pub route: RouteTemplate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub patterns: Vec<UrlNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UrlNode {
    View(UrlPattern),
    Include(UrlResolver),
}

impl UrlNode {
    pub fn with_name(mut self, url_name: impl Into<String>) -> Self {
        if let UrlNode::View(pattern) = &mut self {
            pattern.name = Some(url_name.into());
        }
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        if let UrlNode::Include(resolver) = &mut self {
            resolver.namespace = Some(namespace.into());
        }
        self
    }
}

/// Leaf node binding `route` to `view`.
pub fn path(route: &str, view: ViewDescriptor) -> Result<UrlNode, UrlConfError> {
    Ok(UrlNode::View(UrlPattern {
        route: RouteTemplate::parse(route)?,
        view,
        name: None,
    }))
}

/// Resolver node nesting `patterns` under the `route` prefix.
pub fn include(route: &str, patterns: Vec<UrlNode>) -> Result<UrlNode, UrlConfError> {
    Ok(UrlNode::Include(UrlResolver {
        route: RouteTemplate::parse(route)?,
        namespace: None,
        patterns,
    }))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlConf {
    patterns: Vec<UrlNode>,
}

impl UrlConf {
    pub fn new(patterns: Vec<UrlNode>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[UrlNode] {
        &self.patterns
    }

    pub fn from_json_str(raw: &str) -> Result<Self, UrlConfError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, UrlConfError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| UrlConfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let conf = Self::from_json_str(&raw)?;
        tracing::debug!(path = %path.display(), roots = conf.patterns.len(), "url configuration loaded");
        Ok(conf)
    }

    pub fn views(&self) -> Vec<ViewDescriptor> {
        enumerate_views(&self.patterns)
    }

    pub fn resolve(&self, path: &str) -> Option<ResolverMatch> {
        resolve(&self.patterns, path)
    }
}
