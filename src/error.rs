//! Failures raised while handling a request.
//!
//! Everything raised between the dispatcher and a handler is an [`Error`]. It is propagated with
//! `?` through every middleware and recovered only by the error translator, which turns it into a
//! [`Response`][crate::response::Response].
//!
//! ```
//! use fournil::{HttpError, Request};
//!
//! async fn show(req: Request) -> fournil::Result<String> {
//!     let id: i64 = req.params().get("id")?;
//!     if id != 1 {
//!         return Err(HttpError::not_found().with_description("No user").into());
//!     }
//!     Ok(String::from("root"))
//! }
//! ```
use std::{backtrace::Backtrace, fmt};

mod http_error;

pub use http_error::HttpError;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A [`Result`][std::result::Result] with [`Err`] variant of [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The peer went away before the exchange completed.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("peer disconnected")]
pub struct Disconnected;

/// A failure raised while handling a request.
pub enum Error {
    /// A status coded failure, translated as is.
    Http(HttpError),
    /// Any other failure, translated into `500 Internal Server Error`.
    Unhandled(Unhandled),
    /// The host reported that the client disconnected, nothing can be written anymore.
    Disconnected(Disconnected),
}

impl Error {
    /// Wrap any error as an unhandled failure.
    pub fn new<E: Into<BoxError>>(error: E) -> Self {
        Error::Unhandled(Unhandled::new(error.into()))
    }

    /// Create an unhandled failure from a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Error::new(message.to_string())
    }

    /// Returns the status code this failure is translated into.
    pub fn status(&self) -> ::http::StatusCode {
        match self {
            Error::Http(http) => http.status(),
            Error::Unhandled(_) => ::http::StatusCode::INTERNAL_SERVER_ERROR,
            // nginx convention for a client that closed the connection
            Error::Disconnected(_) => ::http::StatusCode::from_u16(499)
                .unwrap_or(::http::StatusCode::BAD_REQUEST),
        }
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Error::Disconnected(_))
    }

    /// Returns the inner [`HttpError`], if any.
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Error::Http(http) => Some(http),
            _ => None,
        }
    }
}

/// Any error converts into [`Error`].
///
/// [`HttpError`] and [`Disconnected`] keep their own kind, everything else is unhandled.
impl<E> From<E> for Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        let boxed: BoxError = Box::new(error);
        let boxed = match boxed.downcast::<HttpError>() {
            Ok(http) => return Error::Http(*http),
            Err(boxed) => boxed,
        };
        match boxed.downcast::<Disconnected>() {
            Ok(disconnected) => Error::Disconnected(*disconnected),
            Err(boxed) => Error::Unhandled(Unhandled::new(boxed)),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Http(http) => http.fmt(f),
            Error::Unhandled(unhandled) => unhandled.fmt(f),
            Error::Disconnected(disconnected) => disconnected.fmt(f),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Http(http) => f.debug_tuple("Http").field(http).finish(),
            Error::Unhandled(unhandled) => f.debug_tuple("Unhandled").field(unhandled).finish(),
            Error::Disconnected(_) => f.write_str("Disconnected"),
        }
    }
}

// ===== Unhandled =====

/// A failure that is not an [`HttpError`].
///
/// The backtrace is captured when the failure is wrapped, it is only ever shown to clients in
/// debug mode.
pub struct Unhandled {
    inner: BoxError,
    backtrace: Backtrace,
}

impl Unhandled {
    fn new(inner: BoxError) -> Self {
        Self {
            inner,
            backtrace: Backtrace::force_capture(),
        }
    }

    /// Returns the wrapped error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.inner
    }

    /// Render the error chain followed by the captured backtrace.
    pub fn trace(&self) -> String {
        use fmt::Write;

        let mut out = format!("{}", self.inner);
        let mut source = self.inner.source();
        while let Some(cause) = source {
            let _ = write!(out, "\ncaused by: {cause}");
            source = cause.source();
        }
        let _ = write!(out, "\nstack backtrace:\n{}", self.backtrace);
        out
    }
}

impl fmt::Display for Unhandled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl fmt::Debug for Unhandled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Unhandled").field("inner", &self.inner).finish_non_exhaustive()
    }
}
