//! Typed response helpers.
use std::{ffi::OsStr, io, path::Path};

use bytes::Bytes;
use http::{HeaderValue, StatusCode, header::LOCATION};
use serde::Serialize;

use super::{
    IntoResponse, Response, ResponseKind,
    into_response::{APPLICATION_JSON, TEXT_HTML, TEXT_PLAIN, typed},
};
use crate::error::{Error, HttpError};

/// JSON response helper.
///
/// Response with `Content-Type` of `application/json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

/// HTML response helper.
///
/// Response with `Content-Type` of `text/html; charset=utf-8`, regardless of content.
#[derive(Debug, Clone, Copy, Default)]
pub struct Html<T>(pub T);

/// Plain text response helper.
///
/// Response with `Content-Type` of `text/plain; charset=utf-8`, even when the text looks like
/// html.
#[derive(Debug, Clone, Copy, Default)]
pub struct Text<T>(pub T);

/// HTTP redirect helper.
///
/// Response with `3xx` status code.
#[derive(Debug, Clone)]
pub struct Redirect {
    status: StatusCode,
    location: String,
}

/// Empty response helper, `204 No Content` unless told otherwise.
#[derive(Debug, Clone, Copy)]
pub struct Empty(pub StatusCode);

/// File response helper.
///
/// The content type is guessed from the file extension.
#[derive(Debug, Clone)]
pub struct File {
    content: Bytes,
    content_type: &'static str,
}

// ===== Json =====

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(ok) => typed(ResponseKind::Json, APPLICATION_JSON, ok),
            Err(err) => Response::failed(format!("failed to serialize json response: {err}")),
        }
    }
}

// ===== Html / Text =====

impl<T: Into<Bytes>> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        typed(ResponseKind::Html, TEXT_HTML, self.0)
    }
}

impl<T: Into<Bytes>> IntoResponse for Text<T> {
    fn into_response(self) -> Response {
        typed(ResponseKind::Plain, TEXT_PLAIN, self.0)
    }
}

// ===== Redirect =====

impl Redirect {
    /// By default it will redirect with `307 Temporary Redirect`.
    pub fn new(location: impl Into<String>) -> Redirect {
        Redirect {
            status: StatusCode::TEMPORARY_REDIRECT,
            location: location.into(),
        }
    }

    /// Redirect with custom status code, non `3xx` status are replaced with `307`.
    pub fn with_status(status: StatusCode, location: impl Into<String>) -> Redirect {
        let status = match status.is_redirection() {
            true => status,
            false => StatusCode::TEMPORARY_REDIRECT,
        };
        Redirect { status, location: location.into() }
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        let Ok(location) = HeaderValue::from_str(&self.location) else {
            return Response::failed(format!("invalid redirect location: {:?}", self.location));
        };
        let mut res = Response::with_kind(ResponseKind::Redirect, Bytes::new());
        res.status = self.status;
        res.headers.insert(LOCATION, location);
        res
    }
}

// ===== Empty =====

impl Default for Empty {
    fn default() -> Self {
        Self(StatusCode::NO_CONTENT)
    }
}

impl IntoResponse for Empty {
    fn into_response(self) -> Response {
        Response::empty(self.0)
    }
}

// ===== File =====

impl File {
    /// Read the file at `path`.
    ///
    /// A missing file is `404 Not Found`, any other io failure is unhandled.
    pub async fn open(path: impl AsRef<Path>) -> Result<File, Error> {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(content) => Ok(File {
                content: content.into(),
                content_type: mime_of(path),
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(HttpError::not_found().into()),
            Err(err) => Err(err.into()),
        }
    }

    /// Serve in memory bytes as if read from a file named `name`.
    pub fn from_bytes(name: impl AsRef<Path>, content: impl Into<Bytes>) -> File {
        File {
            content: content.into(),
            content_type: mime_of(name.as_ref()),
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }
}

impl IntoResponse for File {
    fn into_response(self) -> Response {
        typed(
            ResponseKind::File,
            HeaderValue::from_static(self.content_type),
            self.content,
        )
    }
}

fn mime_of(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use http::header::CONTENT_TYPE;

    #[test]
    fn helpers_force_their_kind() {
        let res = Text("<b>bold</b>").into_response();
        assert_eq!(res.kind(), ResponseKind::Plain);

        let res = Html("no tags here").into_response();
        assert_eq!(res.kind(), ResponseKind::Html);

        let res = Redirect::new("/login").into_response();
        assert_eq!(res.status(), 307);
        assert_eq!(res.headers()[LOCATION], "/login");

        let res = Redirect::with_status(StatusCode::OK, "/").into_response();
        assert_eq!(res.status(), 307);

        assert_eq!(Empty::default().into_response().status(), 204);
    }

    #[test]
    fn unserializable_json_is_marked_failed() {
        let map = std::collections::HashMap::from([((1u8, 2u8), 3u8)]);
        let mut res = Json(map).into_response();
        assert_eq!(res.status(), 500);
        let reason = res.take_failure().unwrap();
        assert!(reason.starts_with("failed to serialize json response"));

        let mut res = Json([1, 2]).into_response();
        assert!(res.take_failure().is_none());
    }

    #[test]
    fn file_type_from_extension() {
        let res = File::from_bytes("logo.PNG", &b"\x89PNG"[..]).into_response();
        assert_eq!(res.kind(), ResponseKind::File);
        assert_eq!(res.headers()[CONTENT_TYPE], "image/png");

        let file = File::from_bytes("archive", Bytes::new());
        assert_eq!(file.content_type(), "application/octet-stream");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = File::open("/definitely/not/here.txt").await.unwrap_err();
        assert_eq!(err.status(), 404);
    }
}
