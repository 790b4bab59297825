//! Entrypoint of the server.
//!
//! Serves HTTP/1 over hyper and tokio, one task per connection. Websocket upgrades are not
//! handled here, a host that supports them drives [`Dispatcher::serve_ws`] itself.
use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use std::{convert::Infallible, fmt, io};
use tokio::net::{TcpListener, ToSocketAddrs};

use crate::{
    dispatch::Dispatcher,
    log,
    request::{Body, Request},
};

/// Start server using hyper and tokio.
pub async fn listen(
    addr: impl ToSocketAddrs + fmt::Display + Clone,
    dispatcher: Dispatcher,
) -> io::Result<()> {
    let tcp = match TcpListener::bind(addr.clone()).await {
        Ok(ok) => ok,
        Err(err) => {
            return Err(io::Error::new(
                err.kind(),
                format!("failed to bind \"{addr}\" :{err}"),
            ));
        }
    };
    log::info!("listening on {addr}");

    loop {
        match tcp.accept().await {
            Ok((stream, _)) => {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let dispatcher = dispatcher.clone();
                        async move { Ok::<_, Infallible>(handle(&dispatcher, req).await) }
                    });
                    if let Err(_err) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        log::error!("{_err}");
                    }
                });
            }
            Err(_err) => {
                log::error!("failed to connect peer: {_err}");
            }
        }
    }
}

async fn handle(dispatcher: &Dispatcher, req: hyper::Request<Incoming>) -> hyper::Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let target = parts.uri.path_and_query().map_or("/", |e| e.as_str());

    let Ok(path) = urlencoding::decode(parts.uri.path()) else {
        return empty(StatusCode::BAD_REQUEST);
    };

    let mut req = Request::builder(parts.method, target)
        .headers(parts.headers)
        .body(Body::hyper(body))
        .build();
    req.set_path(&path);

    match dispatcher.dispatch(req).await {
        Ok(res) => {
            let (status, headers, body) = res.into_parts();
            let mut res = hyper::Response::new(Full::new(body));
            *res.status_mut() = status;
            *res.headers_mut() = headers;
            res
        }
        // the connection is gone, this response is never written
        Err(_) => empty(StatusCode::BAD_REQUEST),
    }
}

fn empty(status: StatusCode) -> hyper::Response<Full<Bytes>> {
    let mut res = hyper::Response::new(Full::new(Bytes::new()));
    *res.status_mut() = status;
    res
}
