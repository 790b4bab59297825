//! In memory client for tests.
//!
//! [`TestClient`] drives a sealed [`Dispatcher`] through the same host interface a server uses,
//! without any network.
//!
//! ```
//! use fournil::{App, Request, testing::TestClient};
//!
//! async fn index(_: Request) -> &'static str {
//!     "hello"
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut app = App::new();
//! app.add_route("/", index, &[], None).unwrap();
//! let client = TestClient::new(app.seal().unwrap());
//!
//! let res = client.get("/").await;
//! assert_eq!(res.status(), 200);
//! assert_eq!(res.text(), "hello");
//! # }
//! ```
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    dispatch::{Dispatcher, HttpEmitter},
    error::{Disconnected, Error},
    lifecycle::{HttpState, WsState},
    request::{Body, Request},
    ws::{Message, WsEvent, WsOutbound},
};

/// Client sending requests straight to a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct TestClient {
    dispatcher: Dispatcher,
}

impl TestClient {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Send `req` and record what is emitted.
    ///
    /// A client disconnect yields a [`TestResponse`] with status `499`, no body and
    /// [`TestResponse::is_disconnected`] set.
    pub async fn request(&self, req: Request) -> TestResponse {
        let lifecycle = req.lifecycle().clone();
        let mut recorder = Recorder::default();
        let disconnected = self.dispatcher.serve_http(req, &mut recorder).await.is_err();
        TestResponse {
            status: recorder
                .status
                .unwrap_or_else(|| Error::Disconnected(Disconnected).status()),
            headers: recorder.headers,
            body: recorder.body.freeze(),
            lifecycle: lifecycle.history(),
            disconnected,
        }
    }

    pub async fn get(&self, target: &str) -> TestResponse {
        self.request(Request::new(Method::GET, target)).await
    }

    pub async fn head(&self, target: &str) -> TestResponse {
        self.request(Request::new(Method::HEAD, target)).await
    }

    pub async fn delete(&self, target: &str) -> TestResponse {
        self.request(Request::new(Method::DELETE, target)).await
    }

    pub async fn post(&self, target: &str, body: impl Into<Bytes>) -> TestResponse {
        self.with_body(Method::POST, target, body).await
    }

    pub async fn put(&self, target: &str, body: impl Into<Bytes>) -> TestResponse {
        self.with_body(Method::PUT, target, body).await
    }

    pub async fn patch(&self, target: &str, body: impl Into<Bytes>) -> TestResponse {
        self.with_body(Method::PATCH, target, body).await
    }

    async fn with_body(&self, method: Method, target: &str, body: impl Into<Bytes>) -> TestResponse {
        let req = Request::builder(method, target).body(Body::full(body)).build();
        self.request(req).await
    }

    /// Open a websocket session on `target`, the connect event is already sent.
    ///
    /// The channels hold 16 events each, read outbound events before the handler sends more.
    pub async fn websocket(&self, target: &str) -> WsSession {
        let (events, inbound) = mpsc::channel(16);
        let (outbound_tx, outbound) = mpsc::channel(16);
        let _ = events.send(WsEvent::Connect).await;

        let dispatcher = self.dispatcher.clone();
        let req = Request::new(Method::GET, target);
        let task = tokio::spawn(async move { dispatcher.serve_ws(req, inbound, outbound_tx).await });
        WsSession { events, outbound, task }
    }
}

#[derive(Default)]
struct Recorder {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl HttpEmitter for Recorder {
    async fn start(&mut self, status: StatusCode, headers: &HeaderMap) -> Result<(), Disconnected> {
        self.status = Some(status);
        self.headers = headers.clone();
        Ok(())
    }

    async fn body(&mut self, chunk: Bytes) -> Result<(), Disconnected> {
        self.body.extend_from_slice(&chunk);
        Ok(())
    }
}

/// A response recorded by [`TestClient`].
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    lifecycle: Vec<HttpState>,
    disconnected: bool,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns header `name` as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as text, invalid UTF-8 is replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Returns every state the exchange went through.
    pub fn lifecycle(&self) -> &[HttpState] {
        &self.lifecycle
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

/// Host side of a websocket session opened by [`TestClient::websocket`].
#[derive(Debug)]
pub struct WsSession {
    events: mpsc::Sender<WsEvent>,
    outbound: mpsc::Receiver<WsOutbound>,
    task: JoinHandle<WsState>,
}

impl WsSession {
    /// Deliver a message to the handler, returns false if the session is over.
    pub async fn send(&self, message: impl Into<Message>) -> bool {
        self.events.send(WsEvent::Message(message.into())).await.is_ok()
    }

    /// Wait for the next event emitted by the handler.
    pub async fn recv(&mut self) -> Option<WsOutbound> {
        self.outbound.recv().await
    }

    /// Disconnect abruptly with `code` and wait for the session to end.
    pub async fn disconnect(self, code: u16) -> WsState {
        let _ = self.events.send(WsEvent::Disconnect(code)).await;
        self.task.await.unwrap_or(WsState::Closed)
    }

    /// Wait for the handler to return on its own.
    pub async fn finish(self) -> WsState {
        let WsSession { events, outbound, task } = self;
        let state = task.await.unwrap_or(WsState::Closed);
        drop((events, outbound));
        state
    }
}
