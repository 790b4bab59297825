//! HTTP request.
use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, header::CONTENT_TYPE};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::{Error, HttpError},
    lifecycle::Lifecycle,
    routing::{Params, normalize},
};

mod body;

pub use body::{Body, BodySender};

/// An HTTP request.
///
/// Created by the host once per exchange. The path parameters are filled in by the router when
/// the request matches a route.
///
/// Middlewares may change the request before the handler runs through the explicit setters, the
/// body itself can only be read.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Body,
    params: Params,
    extensions: Extensions,
    lifecycle: Lifecycle,
}

impl Request {
    /// Create new `Request` for `target`, a path with optional query string.
    pub fn new(method: Method, target: &str) -> Self {
        Self::builder(method, target).build()
    }

    /// Create new [`RequestBuilder`].
    pub fn builder(method: Method, target: &str) -> RequestBuilder {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, Vec::new()),
        };
        RequestBuilder {
            inner: Request {
                method,
                path: normalize(path).to_owned(),
                query,
                headers: HeaderMap::new(),
                body: Body::empty(),
                params: Params::new(),
                extensions: Extensions::new(),
                lifecycle: Lifecycle::new(),
            },
        }
    }

    // ===== Parts =====

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Returns the path, without trailing `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: &str) {
        self.path = normalize(path).to_owned();
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the first value of header `name` as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the mime type of the body, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        let value = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;
        Some(value.split(';').next().unwrap_or(value).trim())
    }

    /// Returns the first value of query parameter `name`.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Returns every value of query parameter `name`.
    pub fn query_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.query.iter().filter(move |(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Returns every query parameter, in order.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Returns the path parameters bound by the router.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Returns the lifecycle of this exchange.
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    // ===== Body =====

    /// Read the whole body.
    pub async fn bytes(&mut self) -> Result<Bytes, Error> {
        self.body.collect().await
    }

    /// Read the body as UTF-8 text.
    pub async fn text(&mut self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            HttpError::bad_request()
                .with_description("Can't decode body as UTF-8 text")
                .into()
        })
    }

    /// Read the body as JSON.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|_| {
            HttpError::bad_request()
                .with_description("Can't decode body as JSON")
                .into()
        })
    }

    /// Read the next body chunk, see [`Body::chunk`].
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, Error> {
        self.body.chunk().await
    }

    /// Replace the body, whatever was read or cached before is dropped.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = Body::full(body);
    }

    /// Replace the body with `value` as JSON and set `content-type` accordingly.
    pub fn set_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let body = serde_json::to_vec(value)?;
        self.set_body(body);
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(())
    }
}

/// Builds a [`Request`] on the host side.
#[derive(Debug)]
pub struct RequestBuilder {
    inner: Request,
}

impl RequestBuilder {
    /// Append a header, invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.inner.headers.append(name, value);
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.inner.headers = headers;
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.inner.body = body;
        self
    }

    pub fn build(self) -> Request {
        self.inner
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    serde_urlencoded::from_str(query).unwrap_or_default()
}
