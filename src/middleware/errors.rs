use futures_util::{FutureExt, future::BoxFuture};
use serde_json::{Map, Value};

use super::{Middleware, Next};
use crate::{
    config::{Config, ErrorFormat},
    error::{Error, HttpError, Result},
    lifecycle::HttpState,
    log,
    request::Request,
    response::{Html, IntoResponse, Json, Response, Text},
    routing::checked,
};

/// Outermost stage, the single place where failures become responses.
///
/// A client disconnect is not translated, it is handed back to the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTranslator;

impl Middleware for ErrorTranslator {
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response>> {
        let lifecycle = req.lifecycle().clone();
        let core = next.core.clone();

        async move {
            // a middleware may answer with a response that failed to coerce
            let err = match next.run(req).await.and_then(checked) {
                Ok(res) => return Ok(res),
                Err(err) => err,
            };
            lifecycle.mark(HttpState::Failed);
            match &err {
                Error::Disconnected(_) => {
                    log::debug!("client disconnected");
                    return Err(err);
                }
                Error::Unhandled(_unhandled) => {
                    log::error!("unhandled failure: {}", _unhandled.trace());
                }
                Error::Http(_) => {}
            }
            let mut res = render_error(&err, core.config());
            super::merge_default_headers(res.headers_mut(), core.config().headers());
            Ok(res)
        }
        .boxed()
    }
}

/// Render `err` as configured.
///
/// Unhandled failures become `500 Internal Server Error`, a trace is included in debug mode for
/// them and for server side [`HttpError`]s.
pub fn render_error(err: &Error, config: &Config) -> Response {
    let fallback;
    let (http, trace) = match err {
        Error::Http(http) => {
            let trace = (config.is_debug() && http.status().is_server_error()).then(|| http.to_string());
            (http, trace)
        }
        Error::Unhandled(unhandled) => {
            fallback = HttpError::internal_server_error();
            (&fallback, config.is_debug().then(|| unhandled.trace()))
        }
        Error::Disconnected(_) => {
            fallback = HttpError::new(err.status());
            (&fallback, None)
        }
    };

    let description = match config.include_error_description() {
        true => http.description(),
        false => Some(http.generic_description()),
    };

    let res = match config.error_format() {
        ErrorFormat::Plain => plain(http, description, trace.as_deref()),
        ErrorFormat::Json => json(http, description, trace),
        ErrorFormat::Html => html(http, description, trace.as_deref()),
    };
    (res, http.status(), http.headers().clone()).into_response()
}

fn plain(http: &HttpError, description: Option<&str>, trace: Option<&str>) -> Response {
    let mut text = http.name().to_owned();
    if let Some(description) = description {
        text.push_str(": ");
        text.push_str(description);
    }
    if let Some(trace) = trace {
        text.push('\n');
        text.push_str(trace);
    }
    Text(text).into_response()
}

fn json(http: &HttpError, description: Option<&str>, trace: Option<String>) -> Response {
    let mut error = Map::new();
    error.insert("status".into(), http.status().as_u16().into());
    error.insert("message".into(), http.name().into());
    if let Some(description) = description {
        error.insert("description".into(), description.into());
    }
    if let Some(trace) = trace {
        error.insert("traceback".into(), trace.into());
    }
    let mut body = Map::new();
    body.insert("error".into(), Value::Object(error));
    Json(Value::Object(body)).into_response()
}

fn html(http: &HttpError, description: Option<&str>, trace: Option<&str>) -> Response {
    let mut html = format!("<h1>{} {}</h1>", http.status().as_u16(), escape(http.name()));
    if let Some(description) = description {
        html.push_str(&format!("\n<h2>{}</h2>", escape(description)));
    }
    if let Some(trace) = trace {
        html.push_str(&format!("\n<pre><code>{}</code></pre>", escape(trace)));
    }
    Html(html).into_response()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::response::ResponseKind;
    use http::{Method, header::ALLOW};

    #[derive(thiserror::Error, Debug)]
    #[error("oven is cold")]
    struct Cold;

    fn body(res: &Response) -> String {
        String::from_utf8(res.body().to_vec()).unwrap()
    }

    #[test]
    fn http_error_keeps_status_and_headers() {
        let err = Error::from(HttpError::method_not_allowed(&[Method::POST]));
        let res = render_error(&err, &Config::new());
        assert_eq!(res.status(), 405);
        assert_eq!(res.headers()[ALLOW], "POST");
        assert_eq!(body(&res), "Method Not Allowed: Specified method is invalid for this resource");
    }

    #[test]
    fn description_can_be_hidden() {
        let err = Error::from(HttpError::not_found().with_description("No user"));
        let res = render_error(&err, &Config::new());
        assert!(body(&res).contains("No user"));

        let config = Config::new().error_include_description(false);
        let res = render_error(&err, &config);
        assert!(!body(&res).contains("No user"));
        assert_eq!(body(&res), "Not Found: Nothing matches the given URI");
    }

    #[test]
    fn trace_only_in_debug() {
        let err = Error::from(Cold);
        let res = render_error(&err, &Config::new());
        assert_eq!(res.status(), 500);
        assert_eq!(body(&res), "Internal Server Error: Server got itself in trouble");

        let res = render_error(&err, &Config::new().debug(true));
        assert_eq!(res.status(), 500);
        assert!(body(&res).contains("oven is cold"));
        assert!(body(&res).contains("stack backtrace:"));
    }

    #[test]
    fn formats() {
        let err = Error::from(HttpError::bad_request().with_description("a < b"));

        let config = Config::new().error_response_type(ErrorFormat::Json);
        let res = render_error(&err, &config);
        assert_eq!(res.kind(), ResponseKind::Json);
        let value: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(value["error"]["status"], 400);
        assert_eq!(value["error"]["message"], "Bad Request");
        assert_eq!(value["error"]["description"], "a < b");
        assert!(value["error"].get("traceback").is_none());

        let config = Config::new().error_response_type(ErrorFormat::Html);
        let res = render_error(&err, &config);
        assert_eq!(res.kind(), ResponseKind::Html);
        assert_eq!(body(&res), "<h1>400 Bad Request</h1>\n<h2>a &lt; b</h2>");
    }
}
