use fournil::{
    App, Request,
    routing::{ParamValue, get},
};
use std::io;

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let mut app = App::new();
    app.route("/users/<id:int>/<name:str(max_length=16)>", get(extract), None)
        .and_then(|app| app.route("/files/<rest:path>", get(extract2), Some("file")))
        .map_err(io::Error::other)?;

    let dispatcher = app.seal().map_err(io::Error::other)?;
    println!("{:?}", dispatcher.url_for("file", &[("rest", "a/b.txt")]));
    fournil::listen("0.0.0.0:3000", dispatcher).await
}

async fn extract(req: Request) -> fournil::Result<String> {
    let id: i32 = req.params().get("id")?;
    let name: String = req.params().get("name")?;
    Ok(format!("{id} {name}"))
}

async fn extract2(req: Request) -> String {
    let params = req.params();
    dbg!(params.value("rest").map(ParamValue::to_string))
        .unwrap_or_default()
}
