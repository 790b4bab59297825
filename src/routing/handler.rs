use std::{fmt, sync::Arc};

use futures_util::{FutureExt, future::BoxFuture};
use http::Method;

use crate::{
    error::{Error, Result},
    request::Request,
    response::{IntoResponse, Response},
};

/// A request handler.
///
/// Implemented for every async function or closure taking a [`Request`] and returning either a
/// value that implements [`IntoResponse`], or a [`Result`] of one.
///
/// ```
/// use fournil::{HttpError, Request};
///
/// async fn plain(_: Request) -> &'static str {
///     "ok"
/// }
///
/// async fn fallible(req: Request) -> fournil::Result<String> {
///     let name: String = req.params().get("name")?;
///     if name.is_empty() {
///         return Err(HttpError::bad_request().into());
///     }
///     Ok(name)
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Handle the request, the returned response is already coerced.
    fn call(&self, req: Request) -> BoxFuture<'static, Result<Response>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output: Outcome> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Result<Response>> {
        self(req).map(Outcome::into_result).boxed()
    }
}

/// Return type of a [`Handler`].
pub trait Outcome {
    fn into_result(self) -> Result<Response>;
}

impl<R: IntoResponse> Outcome for R {
    fn into_result(self) -> Result<Response> {
        checked(self.into_response())
    }
}

impl<R, E> Outcome for std::result::Result<R, E>
where
    R: IntoResponse,
    E: Into<Error>,
{
    fn into_result(self) -> Result<Response> {
        match self {
            Ok(value) => checked(value.into_response()),
            Err(err) => Err(err.into()),
        }
    }
}

/// A response whose coercion failed becomes an unhandled failure.
pub(crate) fn checked(mut res: Response) -> Result<Response> {
    match res.take_failure() {
        Some(reason) => Err(Error::msg(reason)),
        None => Ok(res),
    }
}

pub(crate) type BoxHandler = Arc<dyn Handler>;

// ===== MethodRouter =====

/// Verb keyed handlers for one route.
///
/// The allowed methods of the route are exactly the registered verbs. Registering `GET` also
/// answers `HEAD`, unless a `HEAD` handler is registered explicitly.
///
/// ```
/// use fournil::{Request, routing::get};
///
/// async fn list(_: Request) -> &'static str { "[]" }
/// async fn create(_: Request) -> &'static str { "created" }
///
/// let items = get(list).post(create);
/// ```
#[derive(Clone, Default)]
pub struct MethodRouter {
    table: Vec<(Method, BoxHandler)>,
    explicit_head: bool,
}

macro_rules! method_router {
    ($($method:ident $name:ident,)*) => {
        $(
            #[doc = concat!("Create [`MethodRouter`] with `", stringify!($method), "` handler.")]
            pub fn $name<H: Handler>(handler: H) -> MethodRouter {
                MethodRouter::new().on(Method::$method, handler)
            }
        )*

        impl MethodRouter {
            $(
                #[doc = concat!("Add `", stringify!($method), "` handler.")]
                pub fn $name<H: Handler>(self, handler: H) -> Self {
                    self.on(Method::$method, handler)
                }
            )*
        }
    };
}

method_router! {
    GET get,
    POST post,
    PUT put,
    PATCH patch,
    DELETE delete,
    HEAD head,
    OPTIONS options,
}

impl MethodRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add handler for `method`, replacing any previous one.
    pub fn on<H: Handler>(mut self, method: Method, handler: H) -> Self {
        let handler: BoxHandler = Arc::new(handler);
        if method == Method::HEAD {
            self.explicit_head = true;
        }
        if method == Method::GET && !self.explicit_head {
            self.insert(Method::HEAD, handler.clone());
        }
        self.insert(method, handler);
        self
    }

    fn insert(&mut self, method: Method, handler: BoxHandler) {
        match self.table.iter_mut().find(|(m, _)| *m == method) {
            Some(entry) => entry.1 = handler,
            None => self.table.push((method, handler)),
        }
    }

    /// Returns the registered methods, in registration order.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.table.iter().map(|(method, _)| method)
    }

    pub(crate) fn handler(&self, method: &Method) -> Option<&BoxHandler> {
        self.table.iter().find(|(m, _)| m == method).map(|(_, h)| h)
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl fmt::Debug for MethodRouter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.methods()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn ok(_: Request) -> &'static str {
        "ok"
    }

    async fn fail(_: Request) -> Result<String> {
        Err(crate::HttpError::conflict().into())
    }

    #[test]
    fn get_answers_head() {
        let router = get(ok).post(ok);
        assert_eq!(
            router.methods().cloned().collect::<Vec<_>>(),
            [Method::HEAD, Method::GET, Method::POST]
        );

        let router = head(ok).get(ok);
        assert_eq!(router.methods().count(), 2);
        assert!(router.handler(&Method::PUT).is_none());
    }

    #[tokio::test]
    async fn handlers_coerce_their_output() {
        let res = Handler::call(&ok, Request::new(Method::GET, "/")).await.unwrap();
        assert_eq!(res.body(), "ok");

        let err = Handler::call(&fail, Request::new(Method::GET, "/")).await.unwrap_err();
        assert_eq!(err.status(), 409);

        let closure = |req: Request| async move { req.path().to_owned() };
        let res = Handler::call(&closure, Request::new(Method::GET, "/echo")).await.unwrap();
        assert_eq!(res.body(), "/echo");
    }

    #[tokio::test]
    async fn failed_coercion_is_an_error() {
        let bad = |_: Request| async { crate::response::Redirect::new("/a\nb") };
        let err = Handler::call(&bad, Request::new(Method::GET, "/")).await.unwrap_err();
        assert!(matches!(err, Error::Unhandled(_)));
        assert!(err.to_string().starts_with("invalid redirect location"));
    }
}
