use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    convert::Infallible,
    hash::Hash,
    sync::LazyLock,
};

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::CONTENT_TYPE};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::{IntoResponse, IntoResponseParts, Json, Response, ResponseKind};

use macros::{headers, into_response_tuple, part, res};

pub(crate) const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
pub(crate) const TEXT_HTML: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
pub(crate) const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
const OCTET_STREAM: HeaderValue = HeaderValue::from_static("application/octet-stream");

/// An opening tag followed somewhere by a closing one.
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<\s*\w+[^>]*>.*?<\s*/\s*\w+\s*>").expect("static regex")
});

pub(crate) fn typed(kind: ResponseKind, content_type: HeaderValue, body: impl Into<Bytes>) -> Response {
    let mut res = Response::with_kind(kind, body);
    res.headers.insert(CONTENT_TYPE, content_type);
    res
}

/// Text is classified as html when it contains a tag pair, plain otherwise.
fn text(body: Cow<'static, str>) -> Response {
    let html = HTML_TAG.is_match(&body);
    let body = match body {
        Cow::Borrowed(s) => Bytes::from_static(s.as_bytes()),
        Cow::Owned(s) => Bytes::from(s),
    };
    match html {
        true => typed(ResponseKind::Html, TEXT_HTML, body),
        false => typed(ResponseKind::Plain, TEXT_PLAIN, body),
    }
}

fn display(value: impl ToString) -> Response {
    typed(ResponseKind::Plain, TEXT_PLAIN, value.to_string())
}

fn no_content() -> Response {
    Response::empty(StatusCode::NO_CONTENT)
}

/// Replace every header named in `extra`, keeping all of its values.
fn overlay(headers: &mut HeaderMap, extra: HeaderMap) {
    let mut current = None;
    for (name, value) in extra {
        if let Some(name) = name {
            headers.remove(&name);
            current = Some(name);
        }
        if let Some(name) = &current {
            headers.append(name.clone(), value);
        }
    }
}

// ===== Canonical =====

res!(Response, self => self);
res!(Infallible, self => match self { });
res!(StatusCode, self => Response::empty(self));

// ===== Absence of value =====

res!((), self => no_content());

impl<T: IntoResponse> IntoResponse for Option<T> {
    fn into_response(self) -> Response {
        match self {
            Some(value) => value.into_response(),
            None => no_content(),
        }
    }
}

// ===== Text =====

res!(&'static str, self => text(Cow::Borrowed(self)));
res!(String, self => text(Cow::Owned(self)));
res!(Cow<'static, str>, self => text(self));
res!(Box<str>, self => text(Cow::Owned(self.into())));

// ===== Collections =====

res!(Value, self => Json(self).into_response());

impl<T: Serialize> IntoResponse for Vec<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl<K: Serialize + Eq + Hash, V: Serialize, S> IntoResponse for HashMap<K, V, S> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl<K: Serialize, V: Serialize> IntoResponse for BTreeMap<K, V> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

// ===== Raw bytes =====

res!(Bytes, self => typed(ResponseKind::Raw, OCTET_STREAM, self));
res!(&'static [u8], self => typed(ResponseKind::Raw, OCTET_STREAM, Bytes::from_static(self)));

// ===== Anything else is stringified =====

macro_rules! stringified {
    ($($ty:ty),* $(,)?) => {
        $(res!($ty, self => display(self));)*
    };
}

stringified!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char);

// ===== Parts =====

part!(StatusCode, (self, res) => res.status = self);
part!(HeaderMap, (self, res) => overlay(&mut res.headers, self));

headers! {
    |key: &'static str| HeaderName::from_static(key);
    |val: &'static str| HeaderValue::from_static(val);
}

headers! {
    |key: HeaderName| key;
    |val: &'static str| HeaderValue::from_static(val);
}

headers! {
    |key: HeaderName| key;
    |val: HeaderValue| val;
}

headers! {
    |key: &'static str| HeaderName::from_static(key);
    |val: HeaderValue| val;
}

into_response_tuple!(P1);
into_response_tuple!(P1, P2);
into_response_tuple!(P1, P2, P3);

// ===== Macros =====

mod macros {
    macro_rules! res {
        ($target:ty, $self:ident => $body:expr) => {
            impl IntoResponse for $target {
                fn into_response($self) -> Response {
                    $body
                }
            }
        };
    }

    macro_rules! part {
        ($target:ty, ($self:ident, $res:ident) => $body:expr) => {
            impl IntoResponseParts for $target {
                fn into_response_parts($self, mut $res: Response) -> Response {
                    $body;
                    $res
                }
            }
        };
    }

    /// `from_static` panics on invalid input, static header pairs are checked by the author.
    macro_rules! headers {
        (
            |$h1:ident: $t1:ty| $b1:expr;
            |$h2:ident: $t2:ty| $b2:expr;
        ) => {
            impl<const N: usize> IntoResponseParts for [($t1, $t2); N] {
                fn into_response_parts(self, mut res: Response) -> Response {
                    let mut map = HeaderMap::with_capacity(N);
                    for ($h1, $h2) in self {
                        map.append($b1, $b2);
                    }
                    overlay(&mut res.headers, map);
                    res
                }
            }
        };
    }

    macro_rules! into_response_tuple {
        ($($part:ident),*) => {
            #[allow(non_snake_case)]
            impl<R, $($part),*> IntoResponse for (R, $($part),*)
            where
                R: IntoResponse,
                $($part: IntoResponseParts,)*
            {
                fn into_response(self) -> Response {
                    let (body, $($part),*) = self;
                    let res = body.into_response();
                    $(let res = $part.into_response_parts(res);)*
                    res
                }
            }
        };
    }

    pub(crate) use {headers, into_response_tuple, part, res};
}

#[cfg(test)]
mod test {
    use super::*;
    use http::header::LOCATION;
    use serde_json::json;

    fn content_type(res: &Response) -> &str {
        res.headers()[CONTENT_TYPE].to_str().unwrap()
    }

    #[test]
    fn mapping_is_json() {
        let mut map = HashMap::new();
        map.insert("id", 42);
        let res = map.into_response();
        assert_eq!(res.status(), 200);
        assert_eq!(res.kind(), ResponseKind::Json);
        assert_eq!(content_type(&res), "application/json");
        assert_eq!(res.body(), r#"{"id":42}"#);

        let res = vec![1, 2, 3].into_response();
        assert_eq!(res.kind(), ResponseKind::Json);
        assert_eq!(res.body(), "[1,2,3]");
    }

    #[test]
    fn text_is_classified() {
        let res = "<p>hello</p>".into_response();
        assert_eq!(res.kind(), ResponseKind::Html);
        assert_eq!(content_type(&res), "text/html; charset=utf-8");

        let res = String::from("1 < 2 and 3 > 2").into_response();
        assert_eq!(res.kind(), ResponseKind::Plain);
        assert_eq!(content_type(&res), "text/plain; charset=utf-8");
    }

    #[test]
    fn absence_is_no_content() {
        let res = ().into_response();
        assert_eq!(res.status(), 204);
        assert!(res.body().is_empty());

        let res = None::<String>.into_response();
        assert_eq!(res.status(), 204);
        assert_eq!(res.kind(), ResponseKind::Empty);
    }

    #[test]
    fn other_values_are_stringified() {
        let res = 42u8.into_response();
        assert_eq!(res.kind(), ResponseKind::Plain);
        assert_eq!(res.body(), "42");
        assert_eq!(true.into_response().body(), "true");
    }

    #[test]
    fn tuple_overrides_status_and_headers() {
        let res = (json!({"a": 1}), StatusCode::NOT_FOUND).into_response();
        assert_eq!(res.status(), 404);
        assert_eq!(res.kind(), ResponseKind::Json);

        let res = (
            "moved",
            [(LOCATION, "/new")],
            StatusCode::MOVED_PERMANENTLY,
        )
            .into_response();
        assert_eq!(res.status(), 301);
        assert_eq!(res.headers()[LOCATION], "/new");

        let res = ("plain", [("content-type", "text/csv")]).into_response();
        assert_eq!(content_type(&res), "text/csv");
        assert_eq!(res.headers().get_all(CONTENT_TYPE).iter().count(), 1);

        let res = ((), StatusCode::ACCEPTED).into_response();
        assert_eq!(res.status(), 202);
    }
}
