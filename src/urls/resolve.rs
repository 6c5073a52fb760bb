use super::pattern::split_segments;
use super::{UrlNode, ViewDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverMatch {
    pub view: ViewDescriptor,
    pub url_name: Option<String>,
    pub namespaces: Vec<String>,
    pub params: Vec<(String, String)>,
}

/// Resolves a request path to the first view whose route matches it.
///
/// Anything after `?` or `#` is ignored.
pub fn resolve(nodes: &[UrlNode], path: &str) -> Option<ResolverMatch> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = split_segments(path).collect();
    let mut params = Vec::new();
    let mut namespaces = Vec::new();

    descend(nodes, &segments, &mut params, &mut namespaces)
}

fn descend(
    nodes: &[UrlNode],
    segments: &[&str],
    params: &mut Vec<(String, String)>,
    namespaces: &mut Vec<String>,
) -> Option<ResolverMatch> {
    for node in nodes {
        match node {
            UrlNode::View(pattern) => {
                let mark = params.len();
                match pattern.route.match_prefix(segments, params) {
                    Some(rest) if rest.is_empty() => {
                        return Some(ResolverMatch {
                            view: pattern.view.clone(),
                            url_name: pattern.name.clone(),
                            namespaces: namespaces.clone(),
                            params: params.clone(),
                        });
                    }
                    _ => params.truncate(mark),
                }
            }
            UrlNode::Include(resolver) => {
                let mark = params.len();
                let Some(rest) = resolver.route.match_prefix(segments, params) else {
                    continue;
                };

                if let Some(namespace) = &resolver.namespace {
                    namespaces.push(namespace.clone());
                }
                if let Some(found) = descend(&resolver.patterns, rest, params, namespaces) {
                    return Some(found);
                }
                if resolver.namespace.is_some() {
                    namespaces.pop();
                }
                params.truncate(mark);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::urls::{include, path, UrlConf};

    fn conf() -> UrlConf {
        UrlConf::new(vec![
            path("", ViewDescriptor::function("home.views", "index")).unwrap(),
            include(
                "blog",
                vec![
                    path("", ViewDescriptor::class_based("blog.views", "PostList"))
                        .unwrap()
                        .with_name("post-list"),
                    path("drafts", ViewDescriptor::function("blog.views", "drafts")).unwrap(),
                    path(":slug", ViewDescriptor::function("blog.views", "post_detail"))
                        .unwrap()
                        .with_name("post-detail"),
                ],
            )
            .unwrap()
            .with_namespace("blog"),
            include(
                ":lang",
                vec![path("about", ViewDescriptor::function("pages.views", "about")).unwrap()],
            )
            .unwrap(),
        ])
    }

    #[test]
    fn resolves_nested_param_route() {
        let found = conf().resolve("/blog/hello-world/").unwrap();
        assert_eq!(found.view.identity(), "blog.views.post_detail");
        assert_eq!(found.url_name.as_deref(), Some("post-detail"));
        assert_eq!(found.namespaces, vec!["blog".to_string()]);
        assert_eq!(found.params, vec![("slug".to_string(), "hello-world".to_string())]);
    }

    #[test]
    fn first_declared_match_wins() {
        let found = conf().resolve("/blog/drafts").unwrap();
        assert_eq!(found.view.identity(), "blog.views.drafts");
    }

    #[test]
    fn root_and_query_string() {
        assert_eq!(conf().resolve("/").unwrap().view.identity(), "home.views.index");
        let found = conf().resolve("/blog/?page=2").unwrap();
        assert_eq!(found.view.identity(), "blog.views.PostList");
    }

    #[test]
    fn backtracks_out_of_failed_include() {
        let found = conf().resolve("/fa/about").unwrap();
        assert_eq!(found.view.identity(), "pages.views.about");
        assert!(found.namespaces.is_empty());
        assert_eq!(found.params, vec![("lang".to_string(), "fa".to_string())]);
    }

    #[test]
    fn unmatched_path_is_none() {
        assert!(conf().resolve("/blog/2024/01").is_none());
        assert!(conf().resolve("/fa/contact").is_none());
    }
}
