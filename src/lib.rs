//! HTTP and websocket request handling core.
//!
//! An [`App`] collects routes, middlewares and config, then is sealed into a [`Dispatcher`] that
//! a host server drives once per request.
//!
//! ```no_run
//! use fournil::{App, Config, Request};
//!
//! async fn user(req: Request) -> fournil::Result<serde_json::Value> {
//!     let id: i64 = req.params().get("id")?;
//!     Ok(serde_json::json!({ "id": id }))
//! }
//!
//! # async fn app() -> Result<(), Box<dyn std::error::Error>> {
//! let mut app = App::with_config(Config::from_env()?);
//! app.add_route("/users/<id:int>", user, &[], Some("user"))?;
//!
//! fournil::listen("0.0.0.0:3000", app.seal()?).await?;
//! # Ok(())
//! # }
//! ```
#![warn(missing_debug_implementations)]

mod log;

pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod middleware;
pub mod request;
pub mod response;
pub mod routing;
pub mod testing;
pub mod ws;

#[cfg(feature = "server")]
mod rt;

pub use app::{App, SetupError};
pub use config::{Config, ErrorFormat};
pub use dispatch::{Dispatcher, HttpEmitter};
pub use error::{Error, HttpError, Result};
pub use request::Request;
pub use response::{IntoResponse, Response};

#[cfg(feature = "server")]
pub use rt::listen;
