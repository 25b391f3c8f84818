//! Navigation error taxonomy.

use std::sync::Arc;

/// Result type for navigation operations.
pub type RouteResult<T> = Result<T, RouteError>;

/// Malformed route definitions. Fatal at registration time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Relative path pattern not allowed: '{0}'")]
    Relative(String),

    #[error("Empty segment in pattern '{0}'")]
    EmptySegment(String),

    #[error("Unnamed parameter in pattern '{0}'")]
    UnnamedParam(String),

    #[error("Wildcard must be the last segment in '{0}'")]
    WildcardNotLast(String),

    #[error("Duplicate parameter '{name}' in pattern '{pattern}'")]
    DuplicateParam { pattern: String, name: String },

    #[error("Route with path '{0}' cannot be the default not-found route")]
    PathedNotFound(String),
}

/// Errors raised while resolving, loading or dispatching a navigation.
///
/// Cloneable because a single load result is shared by every caller that
/// attached to the same in-flight request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouteError {
    /// Path params or query could not be serialized into a URL.
    #[error("Invalid path params: {0}")]
    InvalidPathParams(String),

    /// No route matched, or a hook declared the target missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transient connectivity failure; retried once by the loader.
    #[error("App offline: {0}")]
    Offline(String),

    /// A route's cache dependencies were not a mapping.
    #[error("Invalid cache dependencies: {0}")]
    InvalidCacheDeps(String),

    /// Malformed route pattern.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Arbitrary loader or hook failure.
    #[error(transparent)]
    Failed(Arc<anyhow::Error>),
}

impl RouteError {
    /// Wrap an arbitrary error.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Self::Failed(Arc::new(err.into()))
    }

    /// Create a failure from a message.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self::Failed(Arc::new(anyhow::anyhow!("{}", message)))
    }

    /// Whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this is a transient offline error.
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline(_))
    }
}

impl From<anyhow::Error> for RouteError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_is_cloneable() {
        let err = RouteError::msg("boom");
        let cloned = err.clone();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(cloned.to_string(), "boom");
    }

    #[test]
    fn test_parse_error_converts() {
        let err: RouteError = ParseError::Relative("./a".into()).into();
        assert!(matches!(err, RouteError::Parse(_)));
        assert!(err.to_string().contains("./a"));
    }

    #[test]
    fn test_predicates() {
        assert!(RouteError::NotFound("/x".into()).is_not_found());
        assert!(RouteError::Offline("down".into()).is_offline());
        assert!(!RouteError::msg("x").is_offline());
    }
}
