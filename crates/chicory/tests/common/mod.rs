//! In-process mock of the automation backend for integration tests.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl CannedResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    responses: Arc<Mutex<HashMap<String, CannedResponse>>>,
    health_failures: Arc<AtomicU32>,
    health_probes: Arc<AtomicU32>,
}

pub struct MockBackend {
    pub url: String,
    state: MockState,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

async fn handle(State(state): State<MockState>, method: Method, uri: Uri, body: Bytes) -> impl IntoResponse {
    let path = uri.path().to_string();

    if method == Method::GET && path == "/health" {
        state.health_probes.fetch_add(1, Ordering::SeqCst);
        let remaining = state.health_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            state.health_failures.fetch_sub(1, Ordering::SeqCst);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, "text/plain")],
                "starting".to_string(),
            );
        }
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"status":"ok"}"#.to_string(),
        );
    }

    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.requests.lock().unwrap().push((path.clone(), json));

    let canned = state.responses.lock().unwrap().get(&path).cloned();
    match canned {
        Some(c) => {
            if !c.delay.is_zero() {
                tokio::time::sleep(c.delay).await;
            }
            (
                StatusCode::from_u16(c.status).unwrap(),
                [(header::CONTENT_TYPE, "application/json")],
                c.body,
            )
        }
        None => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"success":true}"#.to_string(),
        ),
    }
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn respond(&self, path: &str, response: CannedResponse) {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(path.to_string(), response);
    }

    pub fn fail_health(&self, times: u32) {
        self.state.health_failures.store(times, Ordering::SeqCst);
    }

    pub fn health_probes(&self) -> u32 {
        self.state.health_probes.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|(p, _)| p).collect()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}
