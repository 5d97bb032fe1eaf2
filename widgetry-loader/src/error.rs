use std::sync::Arc;
use widgetry_base::{RequestId, WidgetClassPath};

#[derive(Debug, Clone)]
pub enum WidgetLoaderError {
    // Rejected before anything happened, no side effects
    InvalidRequester,
    InvalidResource,
    InvalidCount,
    RequesterGone(RequestId),
    LoadFailure(String),
    ClassNotFound(WidgetClassPath),
    ClassNotResident(WidgetClassPath),
    Uninitialized(WidgetClassPath),
    NotFound(RequestId),
    PoolNotFound(WidgetClassPath),
    IoError(Arc<std::io::Error>),
    JsonError(Arc<serde_json::Error>),
}

impl WidgetLoaderError {
    /// True for errors caused by bad arguments, which are reported without any side effects.
    pub fn is_invalid_argument(&self) -> bool {
        match self {
            WidgetLoaderError::InvalidRequester
            | WidgetLoaderError::InvalidResource
            | WidgetLoaderError::InvalidCount => true,
            _ => false,
        }
    }
}

impl std::error::Error for WidgetLoaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            WidgetLoaderError::IoError(ref e) => Some(&**e),
            WidgetLoaderError::JsonError(ref e) => Some(&**e),
            _ => None,
        }
    }
}

impl core::fmt::Display for WidgetLoaderError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            WidgetLoaderError::InvalidRequester => {
                write!(fmt, "the requester is null or no longer alive")
            }
            WidgetLoaderError::InvalidResource => write!(fmt, "the widget class reference is not set"),
            WidgetLoaderError::InvalidCount => write!(fmt, "count must be greater than zero"),
            WidgetLoaderError::RequesterGone(id) => {
                write!(fmt, "the requester of request {} no longer exists", id)
            }
            WidgetLoaderError::LoadFailure(ref e) => write!(fmt, "{}", e),
            WidgetLoaderError::ClassNotFound(ref path) => {
                write!(fmt, "widget class {} was not found", path)
            }
            WidgetLoaderError::ClassNotResident(ref path) => {
                write!(fmt, "widget class {} is not loaded", path)
            }
            WidgetLoaderError::Uninitialized(ref path) => write!(
                fmt,
                "cannot create a widget of class {} before a creation context is set",
                path
            ),
            WidgetLoaderError::NotFound(id) => write!(fmt, "request {} was never issued", id),
            WidgetLoaderError::PoolNotFound(ref path) => {
                write!(fmt, "there is no pool for widget class {}", path)
            }
            WidgetLoaderError::IoError(ref e) => write!(fmt, "{}", e),
            WidgetLoaderError::JsonError(ref e) => write!(fmt, "{}", e),
        }
    }
}

impl From<&str> for WidgetLoaderError {
    fn from(str: &str) -> Self {
        WidgetLoaderError::LoadFailure(str.to_string())
    }
}

impl From<String> for WidgetLoaderError {
    fn from(string: String) -> Self {
        WidgetLoaderError::LoadFailure(string)
    }
}

impl From<std::io::Error> for WidgetLoaderError {
    fn from(error: std::io::Error) -> Self {
        WidgetLoaderError::IoError(Arc::new(error))
    }
}

impl From<serde_json::Error> for WidgetLoaderError {
    fn from(error: serde_json::Error) -> Self {
        WidgetLoaderError::JsonError(Arc::new(error))
    }
}

pub type WidgetLoaderResult<T> = Result<T, WidgetLoaderError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invalid_argument_grouping() {
        assert!(WidgetLoaderError::InvalidRequester.is_invalid_argument());
        assert!(WidgetLoaderError::InvalidResource.is_invalid_argument());
        assert!(WidgetLoaderError::InvalidCount.is_invalid_argument());
        assert!(!WidgetLoaderError::NotFound(RequestId(3)).is_invalid_argument());
        assert!(!WidgetLoaderError::from("boom").is_invalid_argument());
    }

    #[test]
    fn io_errors_keep_their_source() {
        use std::error::Error;
        let error: WidgetLoaderError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing manifest").into();
        assert!(error.source().is_some());
        assert_eq!(error.to_string(), "missing manifest");
    }
}
