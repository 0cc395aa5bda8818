#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tribute_adapter::proxy::MAX_UPSTREAM_BODY_BYTES;
use tribute_adapter::{build_router, ProxyConfig};
use tribute_contracts::RecordId;
use tribute_engines::{
    DeleteOutcome, HttpTributeStore, HttpTributeStoreConfig, RemoteTributeStore,
};
use tribute_os::{NoopWallView, SnapshotSource, WallSynchronizer};
use tribute_storage::{IdentityProvider, MemorySlotStore, RecordCache};

/// Stand-in for the spreadsheet web app behind the proxy.
#[derive(Default)]
struct FakeSheet {
    rows: Mutex<Vec<Value>>,
    next_id: Mutex<i64>,
    seen: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakeSheet {
    fn last_seen(&self) -> Option<(String, Vec<u8>)> {
        self.seen.lock().unwrap().last().cloned()
    }
}

async fn sheet_handler(
    State(sheet): State<Arc<FakeSheet>>,
    method: Method,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    sheet
        .seen
        .lock()
        .unwrap()
        .push((method.as_str().to_string(), body.to_vec()));
    match method {
        Method::GET => {
            let rows = sheet.rows.lock().unwrap().clone();
            (StatusCode::OK, Json(json!({"status": "success", "data": rows})))
        }
        Method::POST => {
            let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"status": "error", "message": "body is not json"})),
                );
            };
            if let Some(delete_id) = payload.get("deleteId") {
                let mut rows = sheet.rows.lock().unwrap();
                let before = rows.len();
                rows.retain(|row| {
                    row.get("id") != Some(delete_id) || row.get("uuid") != payload.get("uuid")
                });
                if rows.len() < before {
                    return (StatusCode::OK, Json(json!({"status": "deleted"})));
                }
                return (
                    StatusCode::OK,
                    Json(json!({"status": "error", "message": "not found"})),
                );
            }
            let id = {
                let mut next = sheet.next_id.lock().unwrap();
                *next += 1;
                *next
            };
            let mut row = payload;
            row["id"] = json!(id);
            sheet.rows.lock().unwrap().push(row);
            (StatusCode::OK, Json(json!({"status": "success", "id": id})))
        }
        _ => (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({"status": "error", "message": "unsupported method"})),
        ),
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn spawn_sheet() -> (Arc<FakeSheet>, SocketAddr) {
    let sheet = Arc::new(FakeSheet::default());
    let app = Router::new()
        .route("/exec", any(sheet_handler))
        .with_state(sheet.clone());
    (sheet, serve(app).await)
}

async fn spawn_proxy(target_url: String) -> SocketAddr {
    let config = ProxyConfig {
        target_url,
        bind: "127.0.0.1:0".parse().unwrap(),
        route: "/tributes".to_string(),
        timeout_ms: 2_000,
    };
    serve(build_router(&config)).await
}

struct RawResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

async fn send_raw(addr: SocketAddr, method: &str, path: &str, body: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();
    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    let mut lines = head.lines();
    let status = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    RawResponse {
        status,
        headers,
        body: body.to_string(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_proxy_wiring_01_get_relays_upstream_body_and_drops_request_body() {
    let (sheet, sheet_addr) = spawn_sheet().await;
    sheet
        .rows
        .lock()
        .unwrap()
        .push(json!({"id": 7, "name": "Ann", "message": "hello", "uuid": "u1", "ts": 1}));
    let proxy = spawn_proxy(format!("http://{sheet_addr}/exec")).await;

    let response = send_raw(proxy, "GET", "/tributes", r#"{"ignored":true}"#).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(response.json()["data"][0]["id"], json!(7));

    let (method, body) = sheet.last_seen().unwrap();
    assert_eq!(method, "GET");
    assert!(body.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_proxy_wiring_02_post_body_is_forwarded_verbatim() {
    let (sheet, sheet_addr) = spawn_sheet().await;
    let proxy = spawn_proxy(format!("http://{sheet_addr}/exec")).await;
    let payload = r#"{"name":"Ann","relation":"Friend","message":"hi","uuid":"u1","ts":1700000000000}"#;

    let response = send_raw(proxy, "POST", "/tributes", payload).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));
    assert_eq!(response.json(), json!({"status": "success", "id": 1}));

    let (method, body) = sheet.last_seen().unwrap();
    assert_eq!(method, "POST");
    assert_eq!(body, payload.as_bytes());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_proxy_wiring_03_upstream_error_status_is_answered_as_ok_with_its_body() {
    let (_sheet, sheet_addr) = spawn_sheet().await;
    let proxy = spawn_proxy(format!("http://{sheet_addr}/exec")).await;

    let response = send_raw(proxy, "PUT", "/tributes", "{}").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));
    assert_eq!(response.json()["message"], json!("unsupported method"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_proxy_wiring_04_unreachable_upstream_gives_error_envelope() {
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let proxy = spawn_proxy(format!("http://{dead}/exec")).await;

    let response = send_raw(proxy, "GET", "/tributes", "").await;
    assert_eq!(response.status, 500);
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));
    let body = response.json();
    assert_eq!(body["status"], json!("error"));
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_proxy_wiring_05_health_reports_target() {
    let proxy = spawn_proxy("http://127.0.0.1:9/exec".to_string()).await;
    let response = send_raw(proxy, "GET", "/healthz", "").await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.json(),
        json!({"status": "ok", "target": "http://127.0.0.1:9/exec"})
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_proxy_wiring_06_wall_round_trip_through_proxy() {
    let (sheet, sheet_addr) = spawn_sheet().await;
    let proxy = spawn_proxy(format!("http://{sheet_addr}/exec")).await;
    let endpoint = format!("http://{proxy}/tributes");

    let outcome = tokio::task::spawn_blocking(move || {
        let slots = Arc::new(MemorySlotStore::new());
        let client_id = IdentityProvider::new(slots.clone())
            .get_or_create_client_id()
            .unwrap();
        let remote: Arc<dyn RemoteTributeStore> =
            Arc::new(HttpTributeStore::new(HttpTributeStoreConfig::new(endpoint)));
        let sync = WallSynchronizer::new(
            Some(remote),
            RecordCache::new(slots),
            client_id,
            Arc::new(NoopWallView),
        );

        let empty = sync.load();
        assert_eq!(empty.source, SnapshotSource::Remote);
        assert!(empty.records.is_empty());

        let posted = sync.submit("Ann", "Friend", "We miss you").unwrap();
        assert_eq!(posted.id, Some(RecordId::Number(1)));

        let loaded = sync.load();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].message, "We miss you");
        assert!(loaded.markup.contains("tribute-delete"));

        sync.delete(&RecordId::Number(1)).unwrap()
    })
    .await
    .unwrap();

    assert_eq!(outcome.removed, 1);
    assert_eq!(outcome.remote, Some(DeleteOutcome::Confirmed));
    assert!(sheet.rows.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_proxy_wiring_07_oversized_upstream_body_is_an_error_not_a_truncated_relay() {
    let oversized = vec![b'x'; MAX_UPSTREAM_BODY_BYTES as usize + 1024 * 1024];
    let app = Router::new().route(
        "/exec",
        any(move || {
            let body = oversized.clone();
            async move { body }
        }),
    );
    let upstream = serve(app).await;
    let proxy = spawn_proxy(format!("http://{upstream}/exec")).await;

    let response = send_raw(proxy, "GET", "/tributes", "").await;
    assert_eq!(response.status, 500);
    let body = response.json();
    assert_eq!(body["status"], json!("error"));
    assert!(body["error"].as_str().unwrap().contains("exceeds"));
}
