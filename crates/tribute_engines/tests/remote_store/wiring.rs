#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header, StatusCode},
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tribute_contracts::{ClientId, NewTributePayload, RecordId, TributeDraft, TributeTimestamp};
use tribute_engines::{
    DeleteOutcome, HttpTributeStore, HttpTributeStoreConfig, RemoteStoreError, RemoteTributeStore,
};

#[derive(Default)]
struct Upstream {
    posted: Mutex<Vec<Value>>,
}

async fn echo_ack(State(upstream): State<Arc<Upstream>>, Json(body): Json<Value>) -> Json<Value> {
    let is_delete = body.get("deleteId").is_some();
    upstream.posted.lock().unwrap().push(body);
    if is_delete {
        Json(json!({"status": "deleted", "data": []}))
    } else {
        Json(json!({"status": "success", "id": 42, "data": []}))
    }
}

async fn spawn_upstream() -> (Arc<Upstream>, SocketAddr) {
    let upstream = Arc::new(Upstream::default());
    let app = Router::new()
        .route(
            "/html",
            any(|| async {
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "text/html")],
                    "<html><body>Sign in</body></html>",
                )
            }),
        )
        .route(
            "/no-id",
            any(|| async { Json(json!({"status": "success"})) }),
        )
        .route(
            "/boom",
            any(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "internal") }),
        )
        .route(
            "/refuses",
            any(|| async { Json(json!({"status": "error", "message": "quota exceeded"})) }),
        )
        .route("/echo", any(echo_ack))
        .with_state(upstream.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (upstream, addr)
}

fn store_at(addr: SocketAddr, path: &str) -> HttpTributeStore {
    let mut config = HttpTributeStoreConfig::new(format!("http://{addr}{path}"));
    config.timeout_ms = 2_000;
    HttpTributeStore::new(config)
}

fn payload() -> NewTributePayload {
    TributeDraft::v1("Ann", "Friend", "Rest easy")
        .unwrap()
        .into_payload(&ClientId::new("abc").unwrap(), TributeTimestamp::EpochMillis(1))
}

fn owner() -> ClientId {
    ClientId::new("abc").unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_remote_wiring_01_html_body_is_malformed_everywhere() {
    let (_upstream, addr) = spawn_upstream().await;
    tokio::task::spawn_blocking(move || {
        let store = store_at(addr, "/html");
        assert!(matches!(
            store.list(),
            Err(RemoteStoreError::MalformedResponse(_))
        ));
        assert!(matches!(
            store.create(&payload()),
            Err(RemoteStoreError::MalformedResponse(_))
        ));
        assert!(matches!(
            store.delete(&RecordId::Number(1), &owner()),
            DeleteOutcome::Unconfirmed(RemoteStoreError::MalformedResponse(_))
        ));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_remote_wiring_02_success_without_id_is_malformed() {
    let (_upstream, addr) = spawn_upstream().await;
    tokio::task::spawn_blocking(move || {
        let err = store_at(addr, "/no-id").create(&payload()).unwrap_err();
        assert!(matches!(err, RemoteStoreError::MalformedResponse(_)));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_remote_wiring_03_http_500_is_rejected_with_status() {
    let (_upstream, addr) = spawn_upstream().await;
    tokio::task::spawn_blocking(move || {
        let store = store_at(addr, "/boom");
        for err in [store.list().unwrap_err(), store.create(&payload()).unwrap_err()] {
            assert!(matches!(
                err,
                RemoteStoreError::Rejected {
                    http_status: Some(500),
                    ..
                }
            ));
        }
        assert!(!store.delete(&RecordId::Number(1), &owner()).is_confirmed());
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_remote_wiring_04_failure_envelope_is_rejected_and_delete_unconfirmed() {
    let (_upstream, addr) = spawn_upstream().await;
    tokio::task::spawn_blocking(move || {
        let store = store_at(addr, "/refuses");
        assert_eq!(
            store.list().unwrap_err(),
            RemoteStoreError::Rejected {
                http_status: None,
                reason: "quota exceeded".to_string(),
            }
        );
        assert_eq!(
            store.delete(&RecordId::Number(1), &owner()),
            DeleteOutcome::Unconfirmed(RemoteStoreError::Rejected {
                http_status: None,
                reason: "quota exceeded".to_string(),
            })
        );
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_remote_wiring_05_acks_carrying_data_arrays_still_count() {
    let (upstream, addr) = spawn_upstream().await;
    tokio::task::spawn_blocking(move || {
        let store = store_at(addr, "/echo");
        assert_eq!(store.create(&payload()).unwrap(), RecordId::Number(42));
        assert_eq!(
            store.delete(&RecordId::Text("42".to_string()), &owner()),
            DeleteOutcome::Confirmed
        );
    })
    .await
    .unwrap();

    let posted = upstream.posted.lock().unwrap().clone();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[0]["uuid"], json!("abc"));
    assert_eq!(posted[0]["ts"], json!(1));
    assert_eq!(posted[1], json!({"deleteId": "42", "uuid": "abc"}));
}
