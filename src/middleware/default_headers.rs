use futures_util::{FutureExt, future::BoxFuture};

use http::HeaderMap;

use super::{Middleware, Next};
use crate::{error::Result, request::Request, response::Response};

/// Innermost stage, adds the configured default headers.
///
/// A header the response already has is left untouched, every value of a missing one is added.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHeaders;

impl Middleware for DefaultHeaders {
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response>> {
        let core = next.core.clone();

        async move {
            let mut res = next.run(req).await?;
            merge(res.headers_mut(), core.config().headers());
            Ok(res)
        }
        .boxed()
    }
}

/// Add every header of `defaults` that `headers` lacks.
///
/// Also applied by the error translator, translated failures never pass through this stage.
pub(crate) fn merge(headers: &mut HeaderMap, defaults: &HeaderMap) {
    for name in defaults.keys() {
        if headers.contains_key(name) {
            continue;
        }
        for value in defaults.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }
}
