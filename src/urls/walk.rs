//! View enumeration over a routing tree.

use std::collections::HashMap;

use super::{UrlNode, ViewDescriptor};

/// Every distinct view reachable from `nodes`, sorted by identity.
///
/// A view mounted under several routes is reported once, keyed by its
/// identity. The first descriptor found wins, except that a later
/// `translated_name` fills in one the first descriptor lacks.
pub fn enumerate_views(nodes: &[UrlNode]) -> Vec<ViewDescriptor> {
    let mut seen = HashMap::new();
    let mut views = Vec::new();
    collect(nodes, &mut seen, &mut views);

    views.sort_by_cached_key(ViewDescriptor::identity);
    views
}

fn collect(nodes: &[UrlNode], seen: &mut HashMap<String, usize>, views: &mut Vec<ViewDescriptor>) {
    for node in nodes {
        match node {
            UrlNode::View(pattern) => {
                let view = &pattern.view;
                let identity = view.identity();
                match seen.get(&identity).copied() {
                    Some(index) => {
                        let known = &mut views[index];
                        if known.translated_name.is_none() {
                            known.translated_name = view.translated_name.clone();
                        }
                    }
                    None => {
                        seen.insert(identity, views.len());
                        views.push(view.clone());
                    }
                }
            }
            UrlNode::Include(resolver) => collect(&resolver.patterns, seen, views),
        }
    }
}

/// `blog` owns `blog.views.x` but not `blogroll.views.x`.
pub fn belongs_to_app(view_name: &str, app: &str) -> bool {
    match view_name.strip_prefix(app) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

pub fn app_views<'a>(views: &'a [ViewDescriptor], app: &str) -> Vec<&'a ViewDescriptor> {
    views
        .iter()
        .filter(|view| belongs_to_app(&view.identity(), app))
        .collect()
}
