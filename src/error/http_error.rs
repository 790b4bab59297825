use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header::ALLOW};
use std::{borrow::Cow, fmt};

/// A status coded failure.
///
/// Carries a status code, a short name, an optional human description and optional headers that
/// are added to the translated response.
#[derive(Debug, Clone)]
pub struct HttpError {
    status: StatusCode,
    name: Cow<'static, str>,
    description: Option<Cow<'static, str>>,
    headers: HeaderMap,
}

impl HttpError {
    /// Create new `HttpError` with the default name and description of `status`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            name: Cow::Borrowed(status.canonical_reason().unwrap_or("Unknown Error")),
            description: default_description(status).map(Cow::Borrowed),
            headers: HeaderMap::new(),
        }
    }

    /// `405 Method Not Allowed` with an `Allow` header listing `allowed`.
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        let mut me = Self::new(StatusCode::METHOD_NOT_ALLOWED);
        if let Ok(value) = HeaderValue::from_str(&allow) {
            me.headers.insert(ALLOW, value);
        }
        me
    }

    /// Replace the short name.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the description.
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Remove the description.
    pub fn without_description(mut self) -> Self {
        self.description = None;
        self
    }

    /// Append a header to the translated response.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The description a client sees when descriptions are hidden.
    pub fn generic_description(&self) -> &'static str {
        default_description(self.status).unwrap_or(GENERIC_DESCRIPTION)
    }
}

macro_rules! status_error {
    ($($name:ident $status:ident;)*) => {
        impl HttpError {
            $(
                #[doc = concat!("`", stringify!($status), "` failure.")]
                pub fn $name() -> Self {
                    Self::new(StatusCode::$status)
                }
            )*
        }
    };
}

status_error! {
    bad_request BAD_REQUEST;
    unauthorized UNAUTHORIZED;
    payment_required PAYMENT_REQUIRED;
    forbidden FORBIDDEN;
    not_found NOT_FOUND;
    not_acceptable NOT_ACCEPTABLE;
    request_timeout REQUEST_TIMEOUT;
    conflict CONFLICT;
    gone GONE;
    length_required LENGTH_REQUIRED;
    precondition_failed PRECONDITION_FAILED;
    payload_too_large PAYLOAD_TOO_LARGE;
    uri_too_long URI_TOO_LONG;
    unsupported_media_type UNSUPPORTED_MEDIA_TYPE;
    unprocessable_entity UNPROCESSABLE_ENTITY;
    too_many_requests TOO_MANY_REQUESTS;
    internal_server_error INTERNAL_SERVER_ERROR;
    not_implemented NOT_IMPLEMENTED;
    bad_gateway BAD_GATEWAY;
    service_unavailable SERVICE_UNAVAILABLE;
    gateway_timeout GATEWAY_TIMEOUT;
}

impl std::error::Error for HttpError {}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HTTP Exception: {} {}", self.status.as_u16(), self.name)?;
        if let Some(description) = &self.description {
            write!(f, ": {description}")?;
        }
        Ok(())
    }
}

const GENERIC_DESCRIPTION: &str = "An error occurred while processing the request";

fn default_description(status: StatusCode) -> Option<&'static str> {
    let description = match status.as_u16() {
        400 => "Bad request syntax or unsupported method",
        401 => "No permission -- see authorization schemes",
        402 => "No payment -- see charging schemes",
        403 => "Request forbidden -- authorization will not help",
        404 => "Nothing matches the given URI",
        405 => "Specified method is invalid for this resource",
        406 => "URI not available in preferred format",
        407 => "You must authenticate with this proxy before proceeding",
        408 => "Request timed out; try again later",
        409 => "Request conflict",
        410 => "URI no longer exists and has been permanently removed",
        411 => "Client must specify Content-Length",
        412 => "Precondition in headers is false",
        413 => "Entity is too large",
        414 => "URI is too long",
        415 => "Entity body in unsupported format",
        416 => "Cannot satisfy request range",
        417 => "Expect condition could not be satisfied",
        422 => "The request was well-formed but contains semantic errors",
        428 => "The origin server requires the request to be conditional",
        429 => "The user has sent too many requests in a given amount of time",
        431 => "The server is unwilling to process the request because its header fields are too large",
        500 => "Server got itself in trouble",
        501 => "Server does not support this operation",
        502 => "Invalid responses from another server/proxy",
        503 => "The server cannot process the request due to a high load",
        504 => "The gateway server did not receive a timely response",
        505 => "Cannot fulfill request",
        _ => return None,
    };
    Some(description)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_follow_status() {
        let err = HttpError::not_found();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.name(), "Not Found");
        assert_eq!(err.description(), Some("Nothing matches the given URI"));
        assert_eq!(
            err.to_string(),
            "HTTP Exception: 404 Not Found: Nothing matches the given URI"
        );
    }

    #[test]
    fn method_not_allowed_lists_methods() {
        let err = HttpError::method_not_allowed(&[Method::GET, Method::POST]);
        assert_eq!(err.status(), 405);
        assert_eq!(err.headers()[ALLOW], "GET, POST");
    }

    #[test]
    fn unknown_status_has_generic_description() {
        let err = HttpError::new(StatusCode::IM_A_TEAPOT).without_description();
        assert_eq!(err.description(), None);
        assert_eq!(err.generic_description(), GENERIC_DESCRIPTION);
    }
}
