use http::StatusCode;
use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use fournil::{
    App, Request,
    middleware::{Next, Position, from_fn},
    response::{IntoResponse, Response},
};

struct State {
    maintenance: AtomicBool,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let state = Arc::new(State { maintenance: AtomicBool::new(false) });
    let toggle = state.clone();

    let mut app = App::new();
    app.add_route("/", |_: Request| async { "Ok" }, &[], None)
        .and_then(|app| {
            app.add_route(
                "/maintenance",
                move |_: Request| {
                    toggle.maintenance.fetch_not(Ordering::Relaxed);
                    async {}
                },
                &[],
                None,
            )
        })
        .and_then(|app| {
            app.add_middleware(
                from_fn("Maintenance", move |req, next| md(state.clone(), req, next)),
                Position::First,
            )
        })
        .map_err(io::Error::other)?;

    let dispatcher = app.seal().map_err(io::Error::other)?;
    fournil::listen("127.0.0.1:3000", dispatcher).await
}

async fn md(state: Arc<State>, req: Request, next: Next) -> fournil::Result<Response> {
    if req.path() != "/maintenance" && state.maintenance.load(Ordering::Relaxed) {
        return Ok(("Under Maintenance", StatusCode::SERVICE_UNAVAILABLE).into_response());
    }
    next.run(req).await
}
