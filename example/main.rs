use http::Method;
use serde::{Deserialize, Serialize};
use std::{
    io,
    sync::{Arc, Mutex},
};
use fournil::{
    App, Config, HttpError, Request,
    response::{Json, Redirect},
    routing::get,
};

type Db = Arc<Mutex<Vec<Task>>>;

#[tokio::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(io::Error::other)?;
    let db = Db::default();
    let mut app = App::with_config(config);
    routes(&mut app, db).map_err(io::Error::other)?;

    let dispatcher = app.seal().map_err(io::Error::other)?;
    fournil::listen("0.0.0.0:3000", dispatcher).await
}

fn routes(app: &mut App, db: Db) -> Result<(), fournil::SetupError> {
    let list_db = db.clone();
    let add_db = db.clone();
    app.add_route("/", |_: Request| async { Redirect::new("/tasks") }, &[], Some("index"))?
        .route(
            "/tasks",
            get(move |_: Request| {
                let db = list_db.clone();
                async move { list(db) }
            })
            .post(move |req: Request| add(add_db.clone(), req)),
            Some("tasks"),
        )?
        .add_route(
            "/tasks/<id:int(min=0)>",
            move |req: Request| show(db.clone(), req),
            &[Method::GET],
            Some("task"),
        )?;
    Ok(())
}

// ===== Routes =====

#[derive(Clone, Serialize)]
struct Task {
    id: usize,
    name: String,
}

#[derive(Deserialize)]
struct TaskAdd {
    name: String,
}

fn list(db: Db) -> Json<Vec<Task>> {
    let tasks = db.lock().unwrap_or_else(|e| e.into_inner());
    Json(tasks.clone())
}

async fn add(db: Db, mut req: Request) -> fournil::Result<Json<Task>> {
    let TaskAdd { name } = req.json().await?;
    let mut tasks = db.lock().unwrap_or_else(|e| e.into_inner());
    let task = Task { id: tasks.len(), name };
    tasks.push(task.clone());
    Ok(Json(task))
}

async fn show(db: Db, req: Request) -> fournil::Result<Json<Task>> {
    let id: usize = req.params().get("id")?;
    let tasks = db.lock().unwrap_or_else(|e| e.into_inner());
    match tasks.get(id) {
        Some(task) => Ok(Json(task.clone())),
        None => Err(HttpError::not_found().with_description("No task").into()),
    }
}
