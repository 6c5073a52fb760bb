use std::fmt;

use serde::{Deserialize, Serialize};

use super::UrlConfError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard(String),
}

/// A parsed route template in axum path syntax (`posts/:id`, `static/*path`).
///
/// Empty segments are dropped, so leading and trailing slashes carry no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RouteTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    pub fn parse(route: &str) -> Result<Self, UrlConfError> {
        let invalid = |reason: &str| UrlConfError::InvalidRoute {
            route: route.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = split_segments(route).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (idx, part) in parts.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("parameter segment needs a name"));
                }
                Segment::Param(name.to_string())
            } else if let Some(name) = part.strip_prefix('*') {
                if name.is_empty() {
                    return Err(invalid("wildcard segment needs a name"));
                }
                if idx + 1 != parts.len() {
                    return Err(invalid("wildcard must be the last segment"));
                }
                Segment::Wildcard(name.to_string())
            } else {
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: route.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches the template against the front of `path`, pushing captured
    /// parameters and returning the unconsumed tail. Captures are rolled back
    /// on failure.
    pub(crate) fn match_prefix<'p>(
        &self,
        path: &'p [&'p str],
        params: &mut Vec<(String, String)>,
    ) -> Option<&'p [&'p str]> {
        let mark = params.len();
        let mut rest = path;

        for segment in &self.segments {
            match segment {
                Segment::Wildcard(name) => {
                    params.push((name.clone(), rest.join("/")));
                    return Some(&[]);
                }
                Segment::Literal(expected) => match rest.split_first() {
                    Some((head, tail)) if head == expected => rest = tail,
                    _ => {
                        params.truncate(mark);
                        return None;
                    }
                },
                Segment::Param(name) => match rest.split_first() {
                    Some((head, tail)) => {
                        params.push((name.clone(), head.to_string()));
                        rest = tail;
                    }
                    None => {
                        params.truncate(mark);
                        return None;
                    }
                },
            }
        }

        Some(rest)
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for RouteTemplate {
    type Error = UrlConfError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RouteTemplate> for String {
    fn from(value: RouteTemplate) -> Self {
        value.raw
    }
}

pub(crate) fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}
