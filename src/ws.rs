//! Websocket routing and sessions.
//!
//! The host drives a session with [`WsEvent`]s and receives [`WsOutbound`]s, both over tokio
//! channels, see [`Dispatcher::serve_ws`].
//!
//! ```text
//! Connecting -> Accepted -> Open -> Closing -> Closed
//!           \-> Rejected
//! ```
//!
//! A handler that returns without accepting rejects the session with `403`, a handler that
//! returns on an open socket closes it with [`close_code::NORMAL`]. Failures after accepting close
//! with [`close_code::SERVER_ERROR`] unless the failure is a [`WsClose`].
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use bytes::Bytes;
use futures_util::{FutureExt, future::BoxFuture};
use http::StatusCode;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::mpsc;

use crate::{
    dispatch::Dispatcher,
    error::{Disconnected, Error, Result},
    lifecycle::WsState,
    log,
    request::Request,
    routing::{Params, Pattern, UrlError},
};

pub mod close_code;

/// A websocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
}

impl Message {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            Message::Binary(_) => None,
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Message::Text(text) => Bytes::from(text),
            Message::Binary(bytes) => bytes,
        }
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Message::Text(value)
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Message::Text(value.to_owned())
    }
}

impl From<Bytes> for Message {
    fn from(value: Bytes) -> Self {
        Message::Binary(value)
    }
}

impl From<Vec<u8>> for Message {
    fn from(value: Vec<u8>) -> Self {
        Message::Binary(value.into())
    }
}

/// Event delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsEvent {
    Connect,
    Message(Message),
    /// The peer went away, with its close code.
    Disconnect(u16),
}

/// Event emitted to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsOutbound {
    Accept,
    Reject(StatusCode),
    Send(Message),
    Close { code: u16, reason: String },
}

/// Close the session with a specific code.
///
/// Returned from a websocket handler, the session is closed with `code` and `reason` instead of
/// [`close_code::SERVER_ERROR`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("websocket closed with {code}: {reason}")]
pub struct WsClose {
    code: u16,
    reason: String,
}

impl WsClose {
    /// Close with `code`, the reason is the code's name and description when known.
    pub fn new(code: u16) -> Self {
        let reason = close_code::describe(code)
            .map(|(name, description)| format!("{name}: {description}"))
            .unwrap_or_default();
        Self { code, reason }
    }

    pub fn with_reason(code: u16, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into() }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// An operation was used in the wrong session state.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("websocket operation not allowed in state {0:?}")]
pub struct InvalidState(pub WsState);

// ===== Handler =====

/// A websocket handler.
///
/// Implemented for every async function or closure taking a [`WebSocket`] and returning
/// [`Result<()>`].
pub trait WsHandler: Send + Sync + 'static {
    fn call(&self, ws: WebSocket) -> BoxFuture<'static, Result<()>>;
}

impl<F, Fut> WsHandler for F
where
    F: Fn(WebSocket) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn call(&self, ws: WebSocket) -> BoxFuture<'static, Result<()>> {
        self(ws).boxed()
    }
}

pub(crate) struct WsRoute {
    pattern: Pattern,
    handler: Arc<dyn WsHandler>,
    name: Option<String>,
}

impl WsRoute {
    pub(crate) fn new(pattern: Pattern, handler: Arc<dyn WsHandler>, name: Option<String>) -> Self {
        Self { pattern, handler, name }
    }
}

/// Websocket routes, matched by path only, first registered wins.
#[derive(Default)]
pub(crate) struct WsRoutes {
    routes: Vec<WsRoute>,
}

impl WsRoutes {
    pub(crate) fn push(&mut self, route: WsRoute) {
        self.routes.push(route);
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }

    pub(crate) fn contains_name(&self, name: &str) -> bool {
        self.routes.iter().any(|e| e.name.as_deref() == Some(name))
    }

    fn find(&self, path: &str) -> Option<(&WsRoute, Params)> {
        self.routes
            .iter()
            .find_map(|route| Some((route, route.pattern.matches(path)?)))
    }

    pub(crate) fn url_for(&self, name: &str, values: &[(&str, &str)]) -> Result<String, UrlError> {
        self.routes
            .iter()
            .find(|e| e.name.as_deref() == Some(name))
            .ok_or_else(|| UrlError::UnknownRoute(name.to_owned()))?
            .pattern
            .build(values)
    }
}

impl fmt::Debug for WsRoutes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|e| e.pattern.template()))
            .finish()
    }
}

// ===== WebSocket =====

/// Handle to one websocket session, given to a [`WsHandler`].
pub struct WebSocket {
    request: Request,
    events: mpsc::Receiver<WsEvent>,
    outbound: mpsc::Sender<WsOutbound>,
    state: Arc<Mutex<WsState>>,
}

impl WebSocket {
    /// Returns the upgrade request, with the bound path parameters.
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &Params {
        self.request.params()
    }

    pub fn state(&self) -> WsState {
        read(&self.state)
    }

    fn expect(&self, expected: WsState) -> Result<()> {
        match self.state() {
            current if current == expected => Ok(()),
            WsState::Closed => Err(Disconnected.into()),
            current => Err(InvalidState(current).into()),
        }
    }

    fn transition(&self, to: WsState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.can_advance(to) {
            *state = to;
        }
    }

    /// The host is gone, the session ends without any further emission.
    fn closed(&self) -> Error {
        write(&self.state, WsState::Closed);
        Disconnected.into()
    }

    async fn emit(&self, event: WsOutbound) -> Result<()> {
        self.outbound.send(event).await.map_err(|_| self.closed())
    }

    /// Accept the session.
    pub async fn accept(&mut self) -> Result<()> {
        self.expect(WsState::Connecting)?;
        self.emit(WsOutbound::Accept).await?;
        self.transition(WsState::Accepted);
        self.transition(WsState::Open);
        log::debug!("websocket {} accepted", self.request.path());
        Ok(())
    }

    /// Refuse the session with `status`.
    pub async fn reject(&mut self, status: StatusCode) -> Result<()> {
        self.expect(WsState::Connecting)?;
        self.emit(WsOutbound::Reject(status)).await?;
        self.transition(WsState::Rejected);
        log::debug!("websocket {} rejected with {status}", self.request.path());
        Ok(())
    }

    /// Wait for the next message.
    ///
    /// A host disconnect closes the session and fails with [`Error::Disconnected`].
    pub async fn receive(&mut self) -> Result<Message> {
        self.expect(WsState::Open)?;
        loop {
            match self.events.recv().await {
                Some(WsEvent::Message(message)) => return Ok(message),
                Some(WsEvent::Connect) => continue,
                Some(WsEvent::Disconnect(_code)) => {
                    log::debug!("websocket {} disconnected with {_code}", self.request.path());
                    return Err(self.closed());
                }
                None => return Err(self.closed()),
            }
        }
    }

    /// Wait for the next text message, a binary one closes with
    /// [`close_code::UNSUPPORTED_DATA`].
    pub async fn receive_text(&mut self) -> Result<String> {
        match self.receive().await? {
            Message::Text(text) => Ok(text),
            Message::Binary(_) => Err(WsClose::new(close_code::UNSUPPORTED_DATA).into()),
        }
    }

    /// Wait for the next message as JSON, an invalid one closes with
    /// [`close_code::INVALID_PAYLOAD`].
    pub async fn receive_json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.receive().await?.into_bytes();
        serde_json::from_slice(&bytes).map_err(|_| WsClose::new(close_code::INVALID_PAYLOAD).into())
    }

    pub async fn send(&mut self, message: impl Into<Message>) -> Result<()> {
        self.expect(WsState::Open)?;
        self.emit(WsOutbound::Send(message.into())).await
    }

    pub async fn send_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.send(text).await
    }

    /// Close the session, a session that was not accepted yet is rejected with `403` instead.
    pub async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        if self.state() == WsState::Connecting {
            return self.reject(StatusCode::FORBIDDEN).await;
        }
        self.expect(WsState::Open)?;
        self.transition(WsState::Closing);
        let reason = reason.to_owned();
        self.emit(WsOutbound::Close { code, reason }).await?;
        self.transition(WsState::Closed);
        log::debug!("websocket {} closed with {code}", self.request.path());
        Ok(())
    }
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("path", &self.request.path())
            .field("state", &self.state())
            .finish()
    }
}

fn read(state: &Mutex<WsState>) -> WsState {
    *state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn write(state: &Mutex<WsState>, to: WsState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = to;
}

// ===== Dispatch =====

impl Dispatcher {
    /// Drive one websocket session.
    ///
    /// Waits for [`WsEvent::Connect`], routes `req` by path and runs the handler. Returns the
    /// final state of the session.
    pub async fn serve_ws(
        &self,
        mut req: Request,
        mut events: mpsc::Receiver<WsEvent>,
        outbound: mpsc::Sender<WsOutbound>,
    ) -> WsState {
        loop {
            match events.recv().await {
                Some(WsEvent::Connect) => break,
                Some(WsEvent::Message(_)) => continue,
                Some(WsEvent::Disconnect(_)) | None => return WsState::Closed,
            }
        }

        let Some((route, params)) = self.core().ws_routes().find(req.path()) else {
            log::debug!("websocket {} not found", req.path());
            let _ = outbound.send(WsOutbound::Reject(StatusCode::NOT_FOUND)).await;
            return WsState::Rejected;
        };
        let handler = route.handler.clone();
        req.set_params(params);

        let state = Arc::new(Mutex::new(WsState::Connecting));
        let ws = WebSocket {
            request: req,
            events,
            outbound: outbound.clone(),
            state: state.clone(),
        };
        let result = WsHandler::call(&*handler, ws).await;

        let failure = match result {
            Ok(()) => None,
            Err(err) if err.is_disconnected() => {
                write(&state, WsState::Closed);
                return WsState::Closed;
            }
            Err(err) => Some(err),
        };

        let end = match read(&state) {
            WsState::Connecting => {
                if let Some(_err) = &failure {
                    log::error!("websocket handler failed before accepting: {_err}");
                }
                let _ = outbound.send(WsOutbound::Reject(StatusCode::FORBIDDEN)).await;
                WsState::Rejected
            }
            WsState::Accepted | WsState::Open => {
                let (code, reason) = match failure {
                    None => (close_code::NORMAL, String::new()),
                    Some(err) => close_for(err, self.config().is_debug()),
                };
                log::debug!("websocket closed with {code}");
                let _ = outbound.send(WsOutbound::Close { code, reason }).await;
                WsState::Closed
            }
            other => {
                if let Some(_err) = &failure {
                    log::error!("websocket handler failed: {_err}");
                }
                other
            }
        };
        write(&state, end);
        end
    }
}

fn close_for(err: Error, debug: bool) -> (u16, String) {
    if let Error::Unhandled(unhandled) = &err {
        if let Some(close) = unhandled.inner().downcast_ref::<WsClose>() {
            return (close.code, close.reason.clone());
        }
        log::error!("websocket handler failed: {}", unhandled.trace());
    }
    let reason = match debug {
        true => err.to_string(),
        false => close_code::describe(close_code::SERVER_ERROR)
            .map(|(_, description)| description.to_owned())
            .unwrap_or_default(),
    };
    (close_code::SERVER_ERROR, reason)
}

#[cfg(test)]
mod test {
    use serde_json::{Value, json};

    use super::*;
    use crate::{App, Config, testing::TestClient};

    async fn echo(mut ws: WebSocket) -> Result<()> {
        ws.accept().await?;
        let room: String = ws.params().get("room")?;
        loop {
            let text = ws.receive_text().await?;
            if text == "bye" {
                return Ok(());
            }
            ws.send(format!("{room}: {text}")).await?;
        }
    }

    async fn json_echo(mut ws: WebSocket) -> Result<()> {
        ws.accept().await?;
        let value: Value = ws.receive_json().await?;
        ws.send_json(&json!({ "got": value })).await
    }

    async fn shy(_: WebSocket) -> Result<()> {
        Ok(())
    }

    async fn faulty(mut ws: WebSocket) -> Result<()> {
        ws.accept().await?;
        Err(Error::msg("oven on fire"))
    }

    fn client(config: Config) -> TestClient {
        let mut app = App::with_config(config);
        app.add_websocket_route("/echo/<room>", echo, Some("echo"))
            .unwrap()
            .add_websocket_route("/json", json_echo, None)
            .unwrap()
            .add_websocket_route("/shy", shy, None)
            .unwrap()
            .add_websocket_route("/faulty", faulty, None)
            .unwrap();
        TestClient::new(app.seal().unwrap())
    }

    fn close_code_of(event: Option<WsOutbound>) -> u16 {
        match event {
            Some(WsOutbound::Close { code, .. }) => code,
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn echo_session() {
        let client = client(Config::new());
        let mut session = client.websocket("/echo/lobby").await;

        assert_eq!(session.recv().await, Some(WsOutbound::Accept));
        assert!(session.send("hi").await);
        assert_eq!(session.recv().await, Some(WsOutbound::Send("lobby: hi".into())));
        assert!(session.send("bye").await);
        assert_eq!(
            session.recv().await,
            Some(WsOutbound::Close { code: close_code::NORMAL, reason: String::new() })
        );
        assert_eq!(session.finish().await, WsState::Closed);
    }

    #[tokio::test]
    async fn unknown_path_is_rejected() {
        let client = client(Config::new());
        let mut session = client.websocket("/nowhere").await;
        assert_eq!(session.recv().await, Some(WsOutbound::Reject(StatusCode::NOT_FOUND)));
        assert_eq!(session.finish().await, WsState::Rejected);
    }

    #[tokio::test]
    async fn never_accepted_is_forbidden() {
        let client = client(Config::new());
        let mut session = client.websocket("/shy").await;
        assert_eq!(session.recv().await, Some(WsOutbound::Reject(StatusCode::FORBIDDEN)));
        assert_eq!(session.finish().await, WsState::Rejected);
    }

    #[tokio::test]
    async fn failure_closes_with_server_error() {
        let client = client(Config::new());
        let mut session = client.websocket("/faulty").await;
        assert_eq!(session.recv().await, Some(WsOutbound::Accept));
        assert_eq!(
            session.recv().await,
            Some(WsOutbound::Close {
                code: close_code::SERVER_ERROR,
                reason: "Internal server error while operating.".into(),
            })
        );
        assert_eq!(session.finish().await, WsState::Closed);

        let client = self::client(Config::new().debug(true));
        let mut session = client.websocket("/faulty").await;
        session.recv().await;
        match session.recv().await {
            Some(WsOutbound::Close { reason, .. }) => assert_eq!(reason, "oven on fire"),
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn payload_errors_keep_their_code() {
        let client = client(Config::new());

        let mut session = client.websocket("/echo/lobby").await;
        session.recv().await;
        session.send(vec![0u8, 1]).await;
        assert_eq!(close_code_of(session.recv().await), close_code::UNSUPPORTED_DATA);

        let mut session = client.websocket("/json").await;
        session.recv().await;
        session.send("{ nope").await;
        assert_eq!(close_code_of(session.recv().await), close_code::INVALID_PAYLOAD);
    }

    #[tokio::test]
    async fn json_round() {
        let client = client(Config::new());
        let mut session = client.websocket("/json").await;
        session.recv().await;
        session.send(r#"[1,"two"]"#).await;
        let Some(WsOutbound::Send(message)) = session.recv().await else {
            panic!("expected a message");
        };
        let value: Value = serde_json::from_str(message.as_text().unwrap()).unwrap();
        assert_eq!(value, json!({ "got": [1, "two"] }));
    }

    #[tokio::test]
    async fn disconnect_closes_silently() {
        let client = client(Config::new());
        let mut session = client.websocket("/echo/lobby").await;
        assert_eq!(session.recv().await, Some(WsOutbound::Accept));
        assert_eq!(session.disconnect(close_code::GOING_AWAY).await, WsState::Closed);
    }

    #[test]
    fn url_for_websocket_route() {
        let client = client(Config::new());
        let url = client.dispatcher().url_for("echo", &[("room", "kitchen")]).unwrap();
        assert_eq!(url, "/echo/kitchen");
    }

    #[test]
    fn close_reason_defaults_to_the_code_description() {
        let close = WsClose::new(close_code::POLICY_VIOLATION);
        assert_eq!(close.code(), 1008);
        assert!(close.reason().starts_with("Close Policy Violation: "));
    }
}
