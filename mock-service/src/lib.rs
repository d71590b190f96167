//! Mock of the project/model read API.
use axum::{
    debug_handler,
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics::counter;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Shared state of a mock server. Clones share the same data.
#[derive(Clone, Default)]
pub struct MockState {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    projects: RwLock<Map<String, Value>>,
    delay: RwLock<Duration>,
    broken: AtomicBool,
    hits: Mutex<Vec<String>>,
}

impl MockState {
    /// State serving `count` projects named `project-0`, `project-1`, ...
    pub fn with_projects(count: usize) -> Self {
        let state = Self::default();
        state.set_projects((0..count).map(|i| format!("project-{i}")));
        state
    }

    pub fn set_projects<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let projects = ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                let project = project_json(&id);
                (id, project)
            })
            .collect();
        *self.inner.projects.write().unwrap_or_else(PoisonError::into_inner) = projects;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.inner.delay.write().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// While broken, `/project/` answers 200 with a body that is not JSON.
    pub fn set_broken(&self, broken: bool) {
        self.inner.broken.store(broken, Ordering::Relaxed);
    }

    /// Every path requested so far, in order.
    pub fn hits(&self) -> Vec<String> {
        self.inner.hits.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn hit_count(&self, path: &str) -> usize {
        self.hits().iter().filter(|hit| *hit == path).count()
    }

    pub fn clear_hits(&self) {
        self.inner.hits.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn delay(&self) -> Duration {
        *self.inner.delay.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, path: &str) {
        self.inner
            .hits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
    }
}

pub fn router(state: MockState) -> Router {
    Router::new()
        .route("/project/", get(projects))
        .route("/project/:project/", get(project))
        .route("/project/:project/models/", get(models))
        .layer(middleware::from_fn_with_state(state.clone(), record_hit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(addr: SocketAddr, state: MockState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    serve(listener, state).await
}

pub async fn serve(listener: TcpListener, state: MockState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Serves `state` on an ephemeral localhost port in the background.
pub async fn spawn(state: MockState) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = serve(listener, state).await {
            tracing::error!("Mock service stopped: {err}");
        }
    });
    Ok(addr)
}

async fn record_hit(State(state): State<MockState>, request: Request, next: Next) -> Response {
    counter!("mock-service.requests").increment(1);
    state.record(request.uri().path());

    let delay = state.delay();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    next.run(request).await
}

#[debug_handler]
async fn projects(State(state): State<MockState>) -> Response {
    if state.inner.broken.load(Ordering::Relaxed) {
        debug!("Serving broken project listing");
        return ([(header::CONTENT_TYPE, "application/json")], "<html>oops").into_response();
    }

    let projects = state
        .inner
        .projects
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    Json(projects).into_response()
}

#[debug_handler]
async fn project(
    State(state): State<MockState>,
    Path(project): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorMessage>)> {
    let found = state
        .inner
        .projects
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&project)
        .cloned();
    match found {
        Some(found) => {
            let mut single = Map::new();
            single.insert(project, found);
            Ok(Json(Value::Object(single)))
        }
        None => Err(not_found(&project)),
    }
}

#[debug_handler]
async fn models(
    State(state): State<MockState>,
    Path(project): Path<String>,
) -> Result<Json<Vec<Model>>, (StatusCode, Json<ErrorMessage>)> {
    let known = state
        .inner
        .projects
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(&project);
    if !known {
        return Err(not_found(&project));
    }

    let models = (0..3)
        .map(|i| Model {
            id: format!("{project}-model-{i}"),
            scoped_id: i.to_string(),
            parameters: json!({}),
            output_parameters: json!({}),
            files: vec![Asset {
                tag: "output".to_string(),
                file: format!("{project}/model-{i}.csv"),
            }],
        })
        .collect();
    Ok(Json(models))
}

#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Model {
    pub id: String,
    pub scoped_id: String,
    pub parameters: Value,
    pub output_parameters: Value,
    pub files: Vec<Asset>,
}

#[derive(Debug, Serialize)]
pub struct Asset {
    pub tag: String,
    pub file: String,
}

fn not_found(project: &str) -> (StatusCode, Json<ErrorMessage>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorMessage {
            message: format!("Project {project} not found."),
        }),
    )
}

fn project_json(id: &str) -> Value {
    json!({
        "creation_date": "2024-01-01",
        "project_name": id,
        "variable_metadata": [],
        "output_metadata": [],
        "assets": {},
        "deleted": false,
        "metadata": {
            "captions": {},
            "description": { "slug": id, "text": format!("Mock project {id}") },
            "human_name": id,
        },
    })
}
