//! Error view dispatch for failed navigations.

use waypoint_core::RouteError;

/// What to show when a navigation stage fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewDispatch {
    /// Mount the route's not-found view.
    NotFound(String),
    /// Mount the route's error view.
    Error(String),
    /// No view declared; hand the error to the host.
    Raise,
}

impl ViewDispatch {
    /// The view to mount, if any.
    pub fn view(&self) -> Option<&str> {
        match self {
            Self::NotFound(view) | Self::Error(view) => Some(view),
            Self::Raise => None,
        }
    }
}

/// Pick the view for an error.
///
/// Not-found errors go to the not-found view and everything else to the
/// error view. There is no fallback between the two.
pub fn dispatch_error(
    error: &RouteError,
    not_found_view: Option<&str>,
    error_view: Option<&str>,
) -> ViewDispatch {
    let dispatch = if error.is_not_found() {
        not_found_view.map(|v| ViewDispatch::NotFound(v.to_string()))
    } else {
        error_view.map(|v| ViewDispatch::Error(v.to_string()))
    };

    match dispatch {
        Some(dispatch) => dispatch,
        None => {
            tracing::debug!(error = %error, "no view declared for navigation error");
            ViewDispatch::Raise
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_goes_to_not_found_view() {
        let err = RouteError::NotFound("/x".into());
        assert_eq!(
            dispatch_error(&err, Some("Missing"), Some("Oops")),
            ViewDispatch::NotFound("Missing".into())
        );
    }

    #[test]
    fn test_other_errors_go_to_error_view() {
        let err = RouteError::msg("boom");
        assert_eq!(
            dispatch_error(&err, Some("Missing"), Some("Oops")),
            ViewDispatch::Error("Oops".into())
        );
    }

    #[test]
    fn test_no_cross_fallback() {
        let err = RouteError::NotFound("/x".into());
        assert_eq!(dispatch_error(&err, None, Some("Oops")), ViewDispatch::Raise);

        let err = RouteError::msg("boom");
        assert_eq!(dispatch_error(&err, Some("Missing"), None), ViewDispatch::Raise);
    }

    #[test]
    fn test_view_accessor() {
        assert_eq!(ViewDispatch::Error("E".into()).view(), Some("E"));
        assert_eq!(ViewDispatch::Raise.view(), None);
    }
}
