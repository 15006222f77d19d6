use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use bal_core::models::{BaseLocale, BaseLocaleId, Habilitation};
use bal_core::{Engine, TaskQueue};
use chrono::Utc;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    queue: TaskQueue,
    engine: Engine,
}

impl AppState {
    pub const fn new(queue: TaskQueue, engine: Engine) -> Self {
        Self { queue, engine }
    }
}

pub fn app_router(state: AppState) -> Router {
    let base_locales = Router::new()
        .route("/{id}/sync/exec", post(exec_sync))
        .route("/{id}/sync/pause", post(pause_sync))
        .route("/{id}/sync/resume", post(resume_sync))
        .route("/{id}/habilitation", post(create_habilitation));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v2/bases-locales", base_locales)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

fn parse_id(raw: &str) -> Result<BaseLocaleId, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("invalid BaseLocale id '{raw}'")))
}

/// Publish now, serialized with the reconciliation tasks
async fn exec_sync(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BaseLocale>, AppError> {
    let id = parse_id(&id)?;
    let base_locale = state.queue.publish(id).await?;
    tracing::info!(endpoint = "sync_exec", bal_id = %id, "BaseLocale published");
    Ok(Json(base_locale))
}

async fn pause_sync(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BaseLocale>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(state.engine.pause_sync(&id).await?))
}

async fn resume_sync(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BaseLocale>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(state.engine.resume_sync(&id).await?))
}

async fn create_habilitation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Habilitation>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(state.engine.create_habilitation(&id).await?))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bal_core::config::EngineConfig;
    use bal_core::models::BaseLocaleStatus;
    use bal_core::DatabaseService;
    use reqwest::StatusCode;
    use serde_json::Value;
    use tokio::sync::broadcast;

    use super::*;

    struct TestServer {
        base_url: String,
        db: DatabaseService,
        client: reqwest::Client,
        _shutdown: broadcast::Sender<()>,
    }

    impl TestServer {
        async fn start() -> Self {
            // Unreachable depot: these tests only cover paths that never call it
            let map = HashMap::from([
                ("API_DEPOT_URL", "http://127.0.0.1:9"),
                ("API_DEPOT_CLIENT_SECRET", "secret"),
            ]);
            let config =
                EngineConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
                    .unwrap();
            let db = DatabaseService::open_in_memory().await.unwrap();
            let engine = Engine::from_config(db.clone(), &config).unwrap();

            let (shutdown, _) = broadcast::channel(1);
            let (queue, _worker) = TaskQueue::start(engine.clone(), shutdown.subscribe());
            let router = app_router(AppState::new(queue, engine));

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let address = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });

            Self {
                base_url: format!("http://{address}"),
                db,
                client: reqwest::Client::new(),
                _shutdown: shutdown,
            }
        }

        async fn seed(&self, status: BaseLocaleStatus) -> BaseLocaleId {
            let mut bal = BaseLocale::new("BAL", "54084", "Nancy").unwrap();
            bal.status = status;
            self.db.create_base_locale(&bal).await.unwrap();
            bal.id
        }

        async fn post(&self, path: &str) -> (StatusCode, Value) {
            let response = self
                .client
                .post(format!("{}{path}", self.base_url))
                .send()
                .await
                .unwrap();
            let status = response.status();
            (status, response.json().await.unwrap())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn healthz_reports_ok() {
        let server = TestServer::start().await;

        let body: Value = server
            .client
            .get(format!("{}/healthz", server.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].as_i64().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_id_is_a_bad_request() {
        let server = TestServer::start().await;

        let (status, body) = server.post("/v2/bases-locales/not-an-id/sync/exec").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("not-an-id"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_base_locale_is_not_found() {
        let server = TestServer::start().await;
        let id = BaseLocaleId::new();

        let (status, _) = server
            .post(&format!("/v2/bases-locales/{id}/sync/exec"))
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn demo_exec_fails_precondition() {
        let server = TestServer::start().await;
        let id = server.seed(BaseLocaleStatus::Demo).await;

        let (status, body) = server
            .post(&format!("/v2/bases-locales/{id}/sync/exec"))
            .await;

        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(body["error"], "sync not possible for demo BAL");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn demo_habilitation_fails_precondition() {
        let server = TestServer::start().await;
        let id = server.seed(BaseLocaleStatus::Demo).await;

        let (status, body) = server
            .post(&format!("/v2/bases-locales/{id}/habilitation"))
            .await;

        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(body["error"], "habilitation not possible for demo BAL");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pause_requires_a_published_base_locale() {
        let server = TestServer::start().await;
        let id = server.seed(BaseLocaleStatus::Draft).await;

        let (status, body) = server
            .post(&format!("/v2/bases-locales/{id}/sync/pause"))
            .await;

        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(body["error"], "BAL has never been published");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pause_and_resume_flip_the_flag() {
        let server = TestServer::start().await;
        let id = server.seed(BaseLocaleStatus::Draft).await;
        server.db.mark_published(&id, "rev-1", 0).await.unwrap();

        let (status, body) = server
            .post(&format!("/v2/bases-locales/{id}/sync/pause"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sync"]["isPaused"], true);

        let (status, body) = server
            .post(&format!("/v2/bases-locales/{id}/sync/resume"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sync"]["isPaused"], false);
    }
}
