//! Path pattern segments.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use waypoint_core::{decode_component, encode_component, ParseError, RouteError};

/// Param name under which a wildcard stores the matched remainder.
pub const WILDCARD_PARAM: &str = "*";

/// One slash-delimited component of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text (percent-decoded), compared against the decoded path component.
    Static(String),
    /// Named parameter absorbing one non-empty component.
    Param(String),
    /// Absorbs every remaining component. Only valid last.
    Wildcard,
}

impl Segment {
    /// Specificity rank: lower is more specific.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Static(_) => 0,
            Self::Param(_) => 1,
            Self::Wildcard => 2,
        }
    }

    /// Whether this is a static segment.
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }
}

/// Strip leading and trailing slashes.
pub fn trim_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Parse a path pattern into segments.
pub fn parse_segments(pattern: &str) -> Result<Vec<Segment>, ParseError> {
    let trimmed = trim_path(pattern);
    if trimmed.starts_with('.') {
        return Err(ParseError::Relative(pattern.to_string()));
    }
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let parts: Vec<&str> = trimmed.split('/').collect();
    let mut names = HashSet::new();
    let mut segments = Vec::with_capacity(parts.len());

    for (i, part) in parts.iter().enumerate() {
        let segment = if part.is_empty() {
            return Err(ParseError::EmptySegment(pattern.to_string()));
        } else if *part == WILDCARD_PARAM {
            if i != parts.len() - 1 {
                return Err(ParseError::WildcardNotLast(pattern.to_string()));
            }
            Segment::Wildcard
        } else if let Some(name) = part.strip_prefix(':') {
            if name.is_empty() {
                return Err(ParseError::UnnamedParam(pattern.to_string()));
            }
            if !names.insert(name.to_string()) {
                return Err(ParseError::DuplicateParam {
                    pattern: pattern.to_string(),
                    name: name.to_string(),
                });
            }
            Segment::Param(name.to_string())
        } else {
            Segment::Static(decode_component(part))
        };
        segments.push(segment);
    }

    Ok(segments)
}

/// Order two patterns by specificity. `Less` means `a` is more specific.
///
/// Segments are compared position by position. When one pattern ends where
/// the other continues with only a trailing wildcard, the exact pattern wins;
/// otherwise the longer pattern is more specific.
pub fn compare_specificity(a: &[Segment], b: &[Segment]) -> Ordering {
    for (sa, sb) in a.iter().zip(b.iter()) {
        match sa.rank().cmp(&sb.rank()) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    match a.len().cmp(&b.len()) {
        Ordering::Equal => Ordering::Equal,
        Ordering::Less => {
            if b.len() == a.len() + 1 && b[a.len()] == Segment::Wildcard {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        Ordering::Greater => {
            if a.len() == b.len() + 1 && a[b.len()] == Segment::Wildcard {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
    }
}

fn path_components(path: &str) -> Vec<&str> {
    let trimmed = trim_path(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Match a concrete path against segments, extracting decoded params.
pub fn match_segments(segments: &[Segment], path: &str) -> Option<BTreeMap<String, String>> {
    let components = path_components(path);
    let mut params = BTreeMap::new();

    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Static(value) => {
                let component = components.get(i)?;
                if decode_component(component) != *value {
                    return None;
                }
            }
            Segment::Param(name) => {
                let component = components.get(i)?;
                if component.is_empty() {
                    return None;
                }
                params.insert(name.clone(), decode_component(component));
            }
            Segment::Wildcard => {
                let rest: Vec<String> = components
                    .get(i..)
                    .unwrap_or_default()
                    .iter()
                    .map(|c| decode_component(c))
                    .collect();
                params.insert(WILDCARD_PARAM.to_string(), rest.join("/"));
                return Some(params);
            }
        }
    }

    if components.len() == segments.len() {
        Some(params)
    } else {
        None
    }
}

/// Build a concrete, percent-encoded path from segments and param values.
pub fn fill_segments(
    segments: &[Segment],
    params: &BTreeMap<String, String>,
) -> Result<String, RouteError> {
    let mut parts = Vec::with_capacity(segments.len());

    for segment in segments {
        match segment {
            Segment::Static(value) => parts.push(encode_component(value)),
            Segment::Param(name) => {
                let value = params.get(name).ok_or_else(|| {
                    RouteError::InvalidPathParams(format!("no value for path param '{}'", name))
                })?;
                if value.is_empty() {
                    return Err(RouteError::InvalidPathParams(format!(
                        "empty value for path param '{}'",
                        name
                    )));
                }
                parts.push(encode_component(value));
            }
            Segment::Wildcard => {
                if let Some(rest) = params.get(WILDCARD_PARAM) {
                    parts.extend(
                        rest.split('/')
                            .filter(|p| !p.is_empty())
                            .map(encode_component),
                    );
                }
            }
        }
    }

    Ok(format!("/{}", parts.join("/")))
}
