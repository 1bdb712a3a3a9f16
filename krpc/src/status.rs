use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Error, ErrorKind, Result};

/// Outcome of a method invocation or a registry operation.
///
/// A failed status is forwarded unchanged by every layer between the handler
/// and the transport. It converts to and from [`Result<()>`] so handlers can
/// compose with `?`:
///
/// ```rust
/// # use krpc::{Error, Status};
/// fn check(n: u64) -> krpc::Result<()> {
///     if n == 0 {
///         return Err(Error::invalid_argument("zero"));
///     }
///     Ok(())
/// }
///
/// let status: Status = check(0).into();
/// assert!(!status.ok());
/// assert_eq!(status.message(), "zero");
/// ```
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Ok,
    Failed(Error),
}

impl Status {
    #[must_use]
    pub fn failed(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self::Failed(Error::new(kind, msg))
    }

    #[must_use]
    pub fn ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Failure kind, `None` for a successful status.
    #[must_use]
    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            Self::Ok => None,
            Self::Failed(err) => Some(&err.kind),
        }
    }

    /// Failure message, empty for a successful status.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Ok => "",
            Self::Failed(err) => &err.msg,
        }
    }

    /// # Errors
    ///
    /// Returns the carried error if the status is not ok.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Ok => Ok(()),
            Self::Failed(err) => Err(err),
        }
    }
}

impl From<Error> for Status {
    fn from(value: Error) -> Self {
        Self::Failed(value)
    }
}

impl From<Result<()>> for Status {
    fn from(value: Result<()>) -> Self {
        match value {
            Ok(()) => Self::Ok,
            Err(err) => Self::Failed(err),
        }
    }
}

impl From<Status> for Result<()> {
    fn from(value: Status) -> Self {
        value.into_result()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "Ok"),
            Self::Failed(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        let status = Status::default();
        assert!(status.ok());
        assert_eq!(status.kind(), None);
        assert_eq!(status.message(), "");
        assert_eq!(status.to_string(), "Ok");

        let status = Status::failed(ErrorKind::NotFound, "no such service: Foo");
        assert!(!status.ok());
        assert_eq!(status.kind(), Some(&ErrorKind::NotFound));
        assert_eq!(status.message(), "no such service: Foo");
        assert_eq!(status.to_string(), "NotFound: no such service: Foo");
        assert_eq!(
            status,
            Status::Failed(Error::not_found("no such service: Foo"))
        );
    }

    #[test]
    fn test_forward_through_result() {
        fn inner() -> Status {
            Status::failed(ErrorKind::InvalidArgument, "bad")
        }

        fn outer() -> Result<()> {
            inner().into_result()?;
            Ok(())
        }

        let status: Status = outer().into();
        assert_eq!(status, inner());
    }
}
