//! HTTP response
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header::CONTENT_LENGTH};

mod helper;
mod into_response;

pub use helper::{Empty, File, Html, Json, Redirect, Text};

/// A type that can be converted into response.
///
/// This trait is used as request handler return type.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

/// A type that can be overlaid onto an already coerced response.
///
/// Used in tuples after the body, `(body, StatusCode::CREATED, [("x-id", "1")])`.
pub trait IntoResponseParts {
    fn into_response_parts(self, res: Response) -> Response;
}

/// How the body of a [`Response`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Plain,
    Html,
    Json,
    Empty,
    Redirect,
    File,
    /// Bytes handed over as is.
    Raw,
}

/// An HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    kind: ResponseKind,
    failure: Option<String>,
}

impl Response {
    /// Create `200 OK` response with raw body.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self::with_kind(ResponseKind::Raw, body)
    }

    pub(crate) fn with_kind(kind: ResponseKind, body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.into(),
            kind,
            failure: None,
        }
    }

    /// A coercion that could not produce a response.
    ///
    /// Never written as is, the dispatcher hands `reason` to the error translator.
    pub(crate) fn failed(reason: String) -> Self {
        let mut res = Self::empty(StatusCode::INTERNAL_SERVER_ERROR);
        res.failure = Some(reason);
        res
    }

    pub(crate) fn take_failure(&mut self) -> Option<String> {
        self.failure.take()
    }

    /// Create response with empty body.
    pub fn empty(status: StatusCode) -> Self {
        let mut res = Self::with_kind(ResponseKind::Empty, Bytes::new());
        res.status = status;
        res
    }

    // ===== Parts =====

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Split into status, headers and body.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }

    // ===== Emission =====

    /// Prepare the response to be written for a request with `method`.
    ///
    /// Sets `content-length` when absent. Statuses without content and `HEAD` responses lose
    /// their body, the latter keeping the length of what would have been sent.
    pub(crate) fn finalize(&mut self, method: &Method) {
        if !status_has_body(self.status) {
            self.headers.remove(CONTENT_LENGTH);
            self.body = Bytes::new();
            return;
        }
        if !self.headers.contains_key(CONTENT_LENGTH) {
            self.headers.insert(CONTENT_LENGTH, HeaderValue::from(self.body.len()));
        }
        if method == Method::HEAD {
            self.body = Bytes::new();
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(Bytes::new())
    }
}

fn status_has_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}
