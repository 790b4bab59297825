use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures_util::{FutureExt, future::BoxFuture};
use http::{Method, StatusCode};
use serde_json::{Value, json};

use crate::{
    App, Config, ErrorFormat, HttpError, Request, Result,
    lifecycle::HttpState::{self, *},
    middleware::{Middleware, Next, Position, from_fn},
    request::Body,
    response::{IntoResponse, Redirect, Response},
    testing::TestClient,
};

#[derive(thiserror::Error, Debug)]
#[error("flour shortage")]
struct Shortage;

async fn user(req: Request) -> Result<Value> {
    let id: i64 = req.params().get("id")?;
    Ok(json!({ "id": id }))
}

async fn missing_user(_: Request) -> Result<()> {
    Err(HttpError::not_found().with_description("No user").into())
}

async fn broken(_: Request) -> Result<String> {
    Err(Shortage.into())
}

async fn created(_: Request) -> (Value, StatusCode) {
    (json!({ "ok": true }), StatusCode::NOT_FOUND)
}

async fn nothing(_: Request) {}

fn client(app: &mut App) -> TestClient {
    TestClient::new(app.seal().unwrap())
}

#[tokio::test]
async fn json_route_with_int_param() {
    let mut app = App::new();
    app.add_route("/users/<id:int>", user, &[Method::GET], None).unwrap();
    let client = client(&mut app);

    let res = client.get("/users/42").await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.json::<Value>().unwrap(), json!({ "id": 42 }));
    assert_eq!(res.lifecycle(), [Received, Routed, Handling, Coerced, Sent]);

    let res = client.get("/users/abc").await;
    assert_eq!(res.status(), 404);
    assert_eq!(res.lifecycle(), [Received, Failed, Sent]);
}

#[tokio::test]
async fn method_not_allowed_has_allow_header() {
    let mut app = App::new();
    app.add_route("/items", nothing, &[Method::POST], None).unwrap();
    let client = client(&mut app);

    let res = client.get("/items").await;
    assert_eq!(res.status(), 405);
    assert_eq!(res.header("allow"), Some("POST"));

    let res = client.post("/items", "").await;
    assert_eq!(res.status(), 204);
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn http_error_description_reaches_the_client() {
    let mut app = App::new();
    app.add_route("/users/<id>", missing_user, &[], None).unwrap();
    let client = client(&mut app);

    let res = client.get("/users/bob").await;
    assert_eq!(res.status(), 404);
    assert!(res.text().contains("No user"));
}

#[tokio::test]
async fn unhandled_failure_trace_only_in_debug() {
    let mut app = App::new();
    app.add_route("/", broken, &[], None).unwrap();
    let res = client(&mut app).get("/").await;
    assert_eq!(res.status(), 500);
    assert_eq!(res.text(), "Internal Server Error: Server got itself in trouble");

    let mut app = App::with_config(Config::new().debug(true));
    app.add_route("/", broken, &[], None).unwrap();
    let res = client(&mut app).get("/").await;
    assert_eq!(res.status(), 500);
    assert!(res.text().contains("flour shortage"));
    assert!(res.text().contains("stack backtrace:"));
}

#[tokio::test]
async fn failed_coercion_goes_through_the_translator() {
    let config = Config::new()
        .error_response_type(ErrorFormat::Json)
        .default_header("server", "fournil")
        .unwrap();
    let mut app = App::with_config(config);
    app.add_route("/map", |_: Request| async {
        HashMap::from([((1u8, 2u8), 3u8)])
    }, &[], None)
    .unwrap()
    .add_route("/go", |_: Request| async { Redirect::new("/bad\nlocation") }, &[], None)
    .unwrap()
    .add_middleware(
        from_fn("Teapot", |req: Request, next: Next| async move {
            if req.path() == "/teapot" {
                return Ok(crate::response::Json(HashMap::from([((0u8, 0u8), 0u8)])).into_response());
            }
            next.run(req).await
        }),
        Position::Last,
    )
    .unwrap();
    let client = client(&mut app);

    for path in ["/map", "/go"] {
        let res = client.get(path).await;
        assert_eq!(res.status(), 500, "{path}");
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.header("server"), Some("fournil"));
        let value: Value = res.json().unwrap();
        assert_eq!(value["error"]["status"], 500);
        assert_eq!(res.lifecycle(), [Received, Routed, Handling, Failed, Sent]);
    }

    let res = client.get("/teapot").await;
    assert_eq!(res.status(), 500);
    assert_eq!(res.json::<Value>().unwrap()["error"]["status"], 500);
    assert_eq!(res.lifecycle(), [Received, Failed, Sent]);
}

#[tokio::test]
async fn tuple_status_wins() {
    let mut app = App::new();
    app.add_route("/", created, &[], None).unwrap();
    let res = client(&mut app).get("/").await;
    assert_eq!(res.status(), 404);
    assert_eq!(res.json::<Value>().unwrap(), json!({ "ok": true }));
}

// ===== Middlewares =====

type Calls = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: &'static str,
    calls: Calls,
}

impl Middleware for Recorder {
    fn name(&self) -> std::borrow::Cow<'static, str> {
        self.name.into()
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response>> {
        async move {
            self.push(self.name.to_owned());
            match next.run(req).await {
                Ok(res) => {
                    if res.headers().contains_key("x-bakery") {
                        self.push(format!("{} after DefaultHeaders", self.name));
                    }
                    Ok(res)
                }
                Err(err) => {
                    self.push(format!("{} got {}", self.name, err.status().as_u16()));
                    Err(err)
                }
            }
        }
        .boxed()
    }
}

impl Recorder {
    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn recorder(name: &'static str, calls: &Calls) -> Recorder {
    Recorder { name, calls: calls.clone() }
}

#[tokio::test]
async fn middleware_order() {
    let calls = Calls::default();
    let handler_calls = calls.clone();

    let config = Config::new().default_header("x-bakery", "fournil").unwrap();
    let mut app = App::with_config(config);
    app.add_route("/", move |_: Request| {
        let calls = handler_calls.clone();
        async move {
            calls.lock().unwrap().push("handler".to_owned());
        }
    }, &[], None)
    .unwrap()
    .add_middleware(recorder("Timing", &calls), Position::Last)
    .unwrap()
    .add_middleware(recorder("Auth", &calls), Position::First)
    .unwrap();

    let dispatcher = app.seal().unwrap();
    assert_eq!(
        dispatcher.middleware_names(),
        ["ErrorTranslator", "Auth", "Timing", "DefaultHeaders"]
    );
    let client = TestClient::new(dispatcher);

    // DefaultHeaders runs between the user middlewares and the handler
    let res = client.get("/").await;
    assert_eq!(res.status(), 204);
    assert_eq!(
        *calls.lock().unwrap(),
        [
            "Auth",
            "Timing",
            "handler",
            "Timing after DefaultHeaders",
            "Auth after DefaultHeaders",
        ]
    );

    // ErrorTranslator wraps every user middleware
    calls.lock().unwrap().clear();
    let res = client.get("/missing").await;
    assert_eq!(res.status(), 404);
    assert_eq!(res.header("x-bakery"), Some("fournil"));
    assert_eq!(*calls.lock().unwrap(), ["Auth", "Timing", "Timing got 404", "Auth got 404"]);
}

#[tokio::test]
async fn middleware_can_rewrite_the_body() {
    let mut app = App::new();
    app.add_route("/echo", |mut req: Request| async move {
        let body: Value = req.json().await?;
        Ok::<_, crate::Error>(body)
    }, &[Method::POST], None)
    .unwrap()
    .add_middleware(
        from_fn("Unwrap", |mut req: Request, next: Next| async move {
            let envelope: Value = req.json().await?;
            req.set_json(&envelope["data"])?;
            next.run(req).await
        }),
        Position::Last,
    )
    .unwrap()
    .add_middleware(
        from_fn("Upper", |mut req: Request, next: Next| async move {
            if req.query("raw").is_some() {
                let text = req.text().await?;
                req.set_body(format!(r#"{{"data":"{}"}}"#, text.to_uppercase()));
            }
            next.run(req).await
        }),
        Position::First,
    )
    .unwrap();
    let client = client(&mut app);

    let res = client.post("/echo", r#"{"data":{"loaf":2}}"#).await;
    assert_eq!(res.json::<Value>().unwrap(), json!({ "loaf": 2 }));

    let res = client.post("/echo?raw", "rye").await;
    assert_eq!(res.json::<Value>().unwrap(), json!("RYE"));
}

#[test]
fn middleware_positions_and_removal() {
    let calls = Calls::default();
    let mut app = App::new();
    app.add_middleware(recorder("A", &calls), Position::Last).unwrap();
    app.add_middleware(recorder("C", &calls), Position::Last).unwrap();
    app.add_middleware(recorder("B", &calls), Position::Before("C".into())).unwrap();
    app.add_middleware(recorder("D", &calls), Position::After("C".into())).unwrap();
    app.add_middleware(recorder("Z", &calls), Position::At(99)).unwrap();
    assert_eq!(app.middleware_names(), ["A", "B", "C", "D", "Z"]);

    app.remove_middleware("B").unwrap();
    assert_eq!(app.middleware_names(), ["A", "C", "D", "Z"]);
    assert!(matches!(
        app.remove_middleware("B"),
        Err(crate::SetupError::UnknownMiddleware(_))
    ));
}

#[tokio::test]
async fn middleware_can_short_circuit() {
    let mut app = App::new();
    app.add_route("/", nothing, &[], None).unwrap();
    app.add_middleware(
        from_fn("Auth", |req: Request, next: Next| async move {
            if req.header("authorization").is_none() {
                return Err(HttpError::unauthorized().into());
            }
            next.run(req).await
        }),
        Position::Last,
    )
    .unwrap();
    app.add_middleware(
        from_fn("Maintenance", |req: Request, next: Next| async move {
            if req.path() == "/down" {
                return Ok(Response::empty(StatusCode::SERVICE_UNAVAILABLE));
            }
            next.run(req).await
        }),
        Position::First,
    )
    .unwrap();
    let client = client(&mut app);

    let res = client.get("/").await;
    assert_eq!(res.status(), 401);

    let req = Request::builder(Method::GET, "/").header("authorization", "token").build();
    let res = client.request(req).await;
    assert_eq!(res.status(), 204);

    let res = client.get("/down").await;
    assert_eq!(res.status(), 503);
    assert_eq!(res.lifecycle(), [Received, Sent]);
}

#[tokio::test]
async fn default_headers_do_not_overwrite() {
    let config = Config::new()
        .default_header("server", "fournil")
        .unwrap()
        .default_header("content-type", "text/x-default")
        .unwrap();
    let mut app = App::with_config(config);
    app.add_route("/", |_: Request| async { "hello" }, &[], None).unwrap();
    let client = client(&mut app);

    let res = client.get("/").await;
    assert_eq!(res.header("server"), Some("fournil"));
    assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));

    let res = client.get("/missing").await;
    assert_eq!(res.status(), 404);
    assert_eq!(res.header("server"), Some("fournil"));
}

// ===== Dispatcher =====

#[tokio::test]
async fn error_format_from_config() {
    let config = Config::new().error_response_type(ErrorFormat::Json);
    let mut app = App::with_config(config);
    let res = client(&mut app).get("/nowhere").await;
    assert_eq!(res.status(), 404);
    let value: Value = res.json().unwrap();
    assert_eq!(value["error"]["status"], 404);
    assert_eq!(value["error"]["message"], "Not Found");
}

#[tokio::test]
async fn head_has_length_but_no_body() {
    let mut app = App::new();
    app.add_route("/", |_: Request| async { "hello" }, &[], None).unwrap();
    let res = client(&mut app).head("/").await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.header("content-length"), Some("5"));
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn method_router_and_body() {
    let mut app = App::new();
    app.route(
        "/echo",
        crate::routing::get(|_: Request| async { "read" }).post(|mut req: Request| async move {
            let body: Value = req.json().await?;
            Ok::<_, crate::Error>(body)
        }),
        None,
    )
    .unwrap();
    let client = client(&mut app);

    assert_eq!(client.get("/echo").await.text(), "read");
    let res = client.post("/echo", r#"{"a":[1,2]}"#).await;
    assert_eq!(res.json::<Value>().unwrap(), json!({ "a": [1, 2] }));

    let res = client.post("/echo", "{").await;
    assert_eq!(res.status(), 400);

    let res = client.put("/echo", "").await;
    assert_eq!(res.status(), 405);
    assert_eq!(res.header("allow"), Some("HEAD, GET, POST"));
}

#[tokio::test]
async fn disconnect_never_reaches_sent() {
    let mut app = App::new();
    app.add_route("/upload", |mut req: Request| async move {
        let body = req.bytes().await?;
        Ok::<_, crate::Error>(body.len().to_string())
    }, &[Method::POST], None)
    .unwrap();
    let client = client(&mut app);

    let (tx, body) = Body::channel(1);
    tokio::spawn(async move {
        tx.send("partial").await.unwrap();
        tx.abort().await;
    });
    let req = Request::builder(Method::POST, "/upload").body(body).build();
    let res = client.request(req).await;

    assert!(res.is_disconnected());
    assert!(res.body().is_empty());
    assert_eq!(res.lifecycle().last(), Some(&HttpState::Failed));
    assert_eq!(res.lifecycle().iter().filter(|state| **state == Failed).count(), 1);
    assert!(!res.lifecycle().contains(&Sent));
}

#[test]
fn sealed_app_rejects_registration() {
    let mut app = App::new();
    app.add_route("/", nothing, &[], Some("index")).unwrap();
    assert!(matches!(
        app.add_route("/other", nothing, &[], Some("index")),
        Err(crate::SetupError::DuplicateName(_))
    ));
    assert!(matches!(
        app.add_route("/<a>/<a>", nothing, &[], None),
        Err(crate::SetupError::Compile { .. })
    ));

    let dispatcher = app.seal().unwrap();
    assert_eq!(dispatcher.url_for("index", &[]).unwrap(), "/");

    assert!(app.is_sealed());
    assert!(matches!(app.add_route("/late", nothing, &[], None), Err(crate::SetupError::Sealed)));
    assert!(matches!(
        app.add_middleware(from_fn("Late", |req, next: Next| next.run(req)), Position::Last),
        Err(crate::SetupError::Sealed)
    ));
    assert!(matches!(app.remove_middleware("Late"), Err(crate::SetupError::Sealed)));
    assert!(app.seal().is_err());
}

#[tokio::test]
async fn custom_converter() {
    use crate::routing::{ConverterArgs, Converter, ParamValue, Reject};

    #[derive(Debug)]
    struct Slug;

    impl Converter for Slug {
        fn convert(&self, raw: &str) -> std::result::Result<ParamValue, Reject> {
            match raw.chars().all(|c| c.is_ascii_lowercase() || c == '-') {
                true => Ok(ParamValue::Str(raw.to_owned())),
                false => Err(Reject::new("not a slug")),
            }
        }
    }

    let mut app = App::new();
    app.register_converter("slug", |_: &mut ConverterArgs| Ok(Slug)).unwrap();
    app.add_route("/posts/<slug:slug>", |req: Request| async move {
        req.params().get::<String>("slug")
    }, &[], None)
    .unwrap();
    let client = client(&mut app);

    assert_eq!(client.get("/posts/hello-world").await.text(), "hello-world");
    assert_eq!(client.get("/posts/Hello").await.status(), 404);
}
