use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use bal_core::api_depot::{ApiDepotClient, ApiDepotConfig, ApiError, RevisionApi};
use bal_core::models::{RevisionContext, RevisionExtras};

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: Option<String>,
    authorization: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

#[derive(Debug, Default)]
struct FakeServer {
    requests: Mutex<Vec<Recorded>>,
    flaky_attempts: AtomicUsize,
}

impl FakeServer {
    fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path == path)
            .cloned()
            .collect()
    }
}

fn revision(id: &str, commune: &str) -> Value {
    json!({
        "_id": id,
        "codeCommune": commune,
        "status": "published",
        "current": true,
        "files": [{"type": "bal", "hash": "abc"}],
        "publishedAt": "2024-03-01T10:00:00.000Z"
    })
}

async fn depot(State(server): State<Arc<FakeServer>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap().to_vec();
    let header_value = |name: header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
    };
    server.requests.lock().unwrap().push(Recorded {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(ToString::to_string),
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body,
    });

    match (parts.method.as_str(), parts.uri.path()) {
        ("GET", "/communes/54084/current-revision") => {
            if server.flaky_attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return (StatusCode::SERVICE_UNAVAILABLE, "upstream busy").into_response();
            }
            Json(revision("rev-1", "54084")).into_response()
        }
        ("GET", "/current-revisions") => Json(json!([revision("rev-1", "54084")])).into_response(),
        ("POST", "/communes/54084/revisions") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "boom"})),
        )
            .into_response(),
        ("PUT", "/revisions/rev-1/files/bal") => StatusCode::NO_CONTENT.into_response(),
        ("POST", "/revisions/rev-1/publish") => Json(revision("rev-1", "54084")).into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"error": "Not Found"}))).into_response(),
    }
}

async fn start() -> (Arc<FakeServer>, ApiDepotClient) {
    let server = Arc::new(FakeServer::default());
    let app = Router::new().fallback(depot).with_state(server.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = ApiDepotConfig {
        retry_base: Duration::from_millis(1),
        ..ApiDepotConfig::new(format!("http://{address}/"), "s3cret")
    };
    (server, ApiDepotClient::new(&config).unwrap())
}

#[tokio::test]
async fn current_revision_is_retried_after_unavailable() {
    let (server, client) = start().await;

    let revision = client.get_current_revision("54084").await.unwrap().unwrap();

    assert_eq!(revision.id, "rev-1");
    assert_eq!(revision.bal_file_hash(), Some("abc"));
    let requests = server.requests_to("/communes/54084/current-revision");
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|request| request.authorization.as_deref() == Some("Token s3cret")));
}

#[tokio::test]
async fn missing_current_revision_is_none() {
    let (server, client) = start().await;

    let revision = client.get_current_revision("57463").await.unwrap();

    assert_eq!(revision, None);
    assert_eq!(server.requests_to("/communes/57463/current-revision").len(), 1);
}

#[tokio::test]
async fn current_revisions_send_the_cursor() {
    let (server, client) = start().await;
    let since = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();

    let revisions = client.get_current_revisions(since).await.unwrap();

    assert_eq!(revisions.len(), 1);
    let requests = server.requests_to("/current-revisions");
    assert_eq!(
        requests[0].query.as_deref(),
        Some("publishedSince=2024-03-01T10%3A00%3A00.000Z")
    );
}

#[tokio::test]
async fn create_revision_is_not_replayed() {
    let (server, client) = start().await;
    let context = RevisionContext {
        nom_complet: None,
        organisation: None,
        extras: RevisionExtras {
            bal_id: "bal-1".to_string(),
        },
    };

    let error = client.create_revision("54084", &context).await.unwrap_err();

    assert!(matches!(
        error,
        ApiError::Service { status: 500, ref message } if message == "boom"
    ));
    let requests = server.requests_to("/communes/54084/revisions");
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["context"]["extras"]["balId"], "bal-1");
}

#[tokio::test]
async fn upload_puts_csv_bytes() {
    let (server, client) = start().await;

    client
        .upload_file("rev-1", b"cle_interop;numero\r\n")
        .await
        .unwrap();

    let requests = server.requests_to("/revisions/rev-1/files/bal");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::PUT);
    assert_eq!(requests[0].content_type.as_deref(), Some("text/csv"));
    assert_eq!(requests[0].body, b"cle_interop;numero\r\n".to_vec());
}

#[tokio::test]
async fn publish_sends_habilitation_id() {
    let (server, client) = start().await;

    let published = client.publish_revision("rev-1", "hab-1").await.unwrap();

    assert!(published.current);
    let requests = server.requests_to("/revisions/rev-1/publish");
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body, json!({"habilitationId": "hab-1"}));
}
