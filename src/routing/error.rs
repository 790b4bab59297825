/// Errors raised while compiling a route pattern.
///
/// These are fatal at setup, they never reach request handling.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("parameter {name:?} appears more than once in {pattern:?}")]
    DuplicateParam { name: String, pattern: String },
    #[error("unknown converter {0:?}")]
    UnknownConverter(String),
    #[error("converter {converter:?} does not accept argument {argument:?}")]
    UnknownArgument { converter: String, argument: String },
    #[error("invalid argument {argument:?} for converter {converter:?}: {reason}")]
    InvalidArgument {
        converter: String,
        argument: String,
        reason: String,
    },
    #[error("malformed segment {0:?}")]
    Malformed(String),
    #[error("parameter {0:?} consumes the rest of the path and must be the last segment")]
    GreedyNotLast(String),
}

/// A path segment does not satisfy its converter.
///
/// This is not fatal, the router treats it as a non match.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct Reject(pub String);

impl Reject {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Errors from reading a bound path parameter.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("missing route parameter {0:?}")]
    Missing(String),
    #[error("route parameter {name:?} is not a {expected}")]
    Type { name: String, expected: &'static str },
}

/// Errors from building a url for a named route.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("no route named {0:?}")]
    UnknownRoute(String),
    #[error("missing value for parameter {0:?}")]
    Missing(String),
    #[error("value for parameter {name:?} rejected: {reject}")]
    Rejected { name: String, reject: Reject },
}
