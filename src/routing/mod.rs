//! Request routing.
//!
//! Routing is an operation that decide which [handler][Handler] should handle current request.
//!
//! ```
//! use fournil::{App, Request};
//!
//! async fn index(_: Request) -> &'static str {
//!     "Fournil Dev"
//! }
//!
//! let mut app = App::new();
//! app.add_route("/", index, &[], None).unwrap();
//! ```
//!
//! This will response a `GET /` request with `200 OK` response with text body of `Fournil Dev`.
//!
//! # Pattern
//!
//! A route template is split on `/`, each segment is either literal text or a parameter
//! `<name>` or `<name:converter>`. Converters may take arguments, `<id:int(min=1, max=999)>`.
//!
//! | converter | matches                                   | arguments                                             |
//! |-----------|-------------------------------------------|-------------------------------------------------------|
//! | `str`     | one non empty segment (the default)       | `length`, `min_length`, `max_length`, `allow_empty`   |
//! | `int`     | an integer                                | `base`, `signed`, `min`, `max`                        |
//! | `float`   | a decimal number                          | `signed`, `min`, `max`, `allow_infinity`, `allow_nan` |
//! | `path`    | the rest of the path, must be last        | `allow_empty`                                         |
//!
//! A segment rejected by its converter makes the route a non match, the next route is tried.
//!
//! # Order
//!
//! Routes are tried in registration order, the first one matching both path and method wins even
//! if a later one is more literal. When some routes match the path but none the method, the
//! request fails with `405 Method Not Allowed` listing the union of their methods in `Allow`.
//!
//! # Verb keyed handlers
//!
//! [`get`], [`post`] and friends build a [`MethodRouter`], registered with
//! [`App::route`][crate::App::route].
//!
//! ```
//! use fournil::{App, Request, routing::get};
//! # async fn list(_: Request) { }
//! # async fn add(_: Request) { }
//!
//! let mut app = App::new();
//! app.route("/items", get(list).post(add), None).unwrap();
//! ```
mod converter;
mod error;
mod handler;
mod params;
mod pattern;
mod table;

pub use converter::{
    ArgValue, Converter, ConverterArgs, ConverterRegistry, Factory, FloatConverter, IntConverter,
    PathConverter, StrConverter,
};
pub use error::{CompileError, ParamError, Reject, UrlError};
pub use handler::{Handler, MethodRouter, Outcome, delete, get, head, options, patch, post, put};
pub use params::{FromParam, ParamValue, Params};
pub use pattern::{Pattern, Segment};
pub use table::{Route, RouteMatch, RouteTable};

pub(crate) use handler::{BoxHandler, checked};
pub(crate) use pattern::normalize;
pub(crate) use table::Endpoint;
