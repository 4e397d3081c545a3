use std::{error::Error as StdError, fmt};

/// `Result` with this crate's [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for sitefilters' filters and their host context.
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// An error annotated with where it happened, e.g., "in filter `sort`".
    /// Displayed as the inner error, then the note on its own line.
    Wrapped {
        /// Where the inner error happened.
        note: String,
        /// The annotated error.
        inner: Box<Error>,
    },
    /// A filter was invoked with arguments it cannot work with, e.g., `sort`
    /// on `null` or an unknown `nils` order.
    Argument {
        /// What was wrong with the invocation.
        message: String,
    },
    /// A date filter was given a value that cannot be read as a date.
    InvalidDate {
        /// The offending value, in its display form.
        input: String,
    },
    /// Any other failure, like a malformed expression or a value that
    /// failed to serialize, with the underlying error if there is one.
    ///
    /// [`MessageExt`] turns a foreign `Result` or an `Option` into this.
    Other {
        /// What failed.
        message: String,
        /// The underlying error, if any.
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wrapped { note, inner } => write!(f, "{inner}\n{note}"),
            Self::Argument { message } => f.write_str(message),
            Self::InvalidDate { input } => {
                write!(f, "Invalid Date: '{input}' is not a valid datetime.")
            }
            Self::Other {
                message,
                source: Some(source),
            } => write!(f, "{message}: {source}"),
            Self::Other { message, .. } => f.write_str(message),
        }
    }
}

/// Builds an [`Error::Other`] from a format string, optionally with an
/// underlying error given as `@source, ...`.
///
/// # Examples
///
/// ```rust
/// # use sitefilters_filter_types::{Error, other};
/// let error = other!("expected {} arguments, found {}", 2, 3);
///
/// assert!(matches!(error, Error::Other { source: None, .. }));
/// assert_eq!(error.to_string(), "expected 2 arguments, found 3");
///
/// let source = "12x".parse::<i64>().unwrap_err();
/// let error = other!(@source, "bad count `{}`", "12x");
///
/// assert!(matches!(error, Error::Other { source: Some(..), .. }));
/// assert!(error.to_string().starts_with("bad count `12x`: "));
/// ```
#[macro_export]
macro_rules! other {
    (@Option: $err:expr, $($tt:tt)*) => {
        $crate::Error::Other {
            message: format!($($tt)*),
            source: $err,
        }
    };

    (@$err:expr, $($tt:tt)*) => {
        $crate::other!(@Option:Some(Box::new($err)), $($tt)*)
    };

    ($($tt:tt)*) => {
        $crate::other!(@Option: None, $($tt)*)
    };
}

/// `return Err(other!(...))`.
#[macro_export]
macro_rules! bail {
    ($($tt:tt)*) => {
        return Err($crate::other!($($tt)*))
    };
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Wrapped { inner, .. } => Some(&**inner),
            Self::Other {
                source: Some(source),
                ..
            } => Some(&**source),
            _ => None,
        }
    }
}

impl Error {
    /// Creates a new [`Error`] with the given `message`.
    #[inline]
    #[must_use]
    pub fn message(message: String) -> Self {
        Self::Other {
            message,
            source: None,
        }
    }

    /// Creates an `Argument` variant with the given `message`.
    #[inline]
    #[must_use]
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }

    /// Creates an `InvalidDate` variant for the given offending `input`.
    #[inline]
    #[must_use]
    pub fn invalid_date(input: impl fmt::Display) -> Self {
        Self::InvalidDate {
            input: input.to_string(),
        }
    }

    /// Wrap `self` into a `Wrapped` variant with the given `note`.
    #[inline]
    #[must_use]
    pub fn wrap(self, note: String) -> Self {
        Self::Wrapped {
            note,
            inner: Box::new(self),
        }
    }

    /// Creates an `Other` variant with the given `message` and `source`.
    #[inline]
    #[must_use]
    pub fn other(message: String, source: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        Self::Other {
            message,
            source: Some(source),
        }
    }

    /// Returns the innermost error, skipping any `Wrapped` notes.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Wrapped { inner, .. } => inner.root(),
            other => other,
        }
    }
}

/// Attaches a message to a foreign error or a missing value, turning it
/// into an [`Error::Other`].
pub trait MessageExt {
    type Wrapped: Sized;

    /// Keeps `Ok` and `Some`.  An `Err` becomes the source of the new error;
    /// `None` has no source.
    #[allow(clippy::missing_errors_doc)]
    fn msg<D: fmt::Display>(self, message: D) -> Self::Wrapped;

    /// Like [`MessageExt::msg`], building the message only on failure.
    #[allow(clippy::missing_errors_doc)]
    fn with_msg<D, F>(self, message: F) -> Self::Wrapped
    where
        D: fmt::Display,
        F: FnOnce() -> D;
}

impl<T, E: StdError + Send + Sync + 'static> MessageExt for core::result::Result<T, E> {
    type Wrapped = Result<T>;

    fn msg<D: fmt::Display>(self, message: D) -> Self::Wrapped {
        self.with_msg(|| message)
    }

    fn with_msg<D, F>(self, message: F) -> Self::Wrapped
    where
        D: fmt::Display,
        F: FnOnce() -> D,
    {
        self.map_err(|source| Error::other(message().to_string(), Box::new(source)))
    }
}

impl<T> MessageExt for Option<T> {
    type Wrapped = Result<T>;

    fn msg<D: fmt::Display>(self, message: D) -> Self::Wrapped {
        self.with_msg(|| message)
    }

    fn with_msg<D, F>(self, message: F) -> Self::Wrapped
    where
        D: fmt::Display,
        F: FnOnce() -> D,
    {
        self.ok_or_else(|| Error::message(message().to_string()))
    }
}

/// Adds a note, like the filter that failed, to the error of a [`Result`].
pub trait WrapExt<T> {
    /// Wraps an `Err` into [`Error::Wrapped`] with `message` as the note.
    #[allow(clippy::missing_errors_doc)]
    fn wrap<D: fmt::Display>(self, message: D) -> Result<T>;

    /// Like [`WrapExt::wrap`], building the note only on failure.
    #[allow(clippy::missing_errors_doc)]
    fn wrap_with<D, F>(self, message: F) -> Result<T>
    where
        D: fmt::Display,
        F: FnOnce() -> D;
}

impl<T> WrapExt<T> for Result<T> {
    fn wrap<D: fmt::Display>(self, message: D) -> Result<T> {
        self.wrap_with(|| message)
    }

    fn wrap_with<D, F>(self, message: F) -> Result<T>
    where
        D: fmt::Display,
        F: FnOnce() -> D,
    {
        self.map_err(|e| e.wrap(message().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, MessageExt, WrapExt};

    #[test]
    fn test_wrapped_display() {
        let err: super::Result<()> = Err(Error::argument("Cannot sort a null object."));
        let err = err.wrap("in filter `sort`").expect_err("should stay an error");

        assert_eq!(err.to_string(), "Cannot sort a null object.\nin filter `sort`");
        assert!(matches!(err.root(), Error::Argument { .. }));
    }

    #[test]
    fn test_invalid_date_display() {
        assert_eq!(
            Error::invalid_date("\"tomorrowish\"").to_string(),
            "Invalid Date: '\"tomorrowish\"' is not a valid datetime."
        );
    }

    #[test]
    fn test_msg_keeps_source() {
        let err = "x".parse::<i64>().msg("bad count").expect_err("not a number");
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("bad count: "));
    }

    #[test]
    fn test_msg_option() {
        let err = None::<()>.msg("no such binding").expect_err("None should error");
        assert!(matches!(err, Error::Other { source: None, .. }));
        assert_eq!(err.to_string(), "no such binding");
    }
}
