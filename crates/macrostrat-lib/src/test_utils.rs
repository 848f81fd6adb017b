//! Test utilities for gateway testing.
//!
//! [`MockUpstream`] is a local stand-in for the Macrostrat API and tile server.
//! Paths mirror the real services under `/api` and `/tiles`. Every request
//! URI (path and query) is recorded. Tile scale selects the tile behavior:
//! `small` answers 404, `tiny` answers 200 with an empty body, everything else
//! serves a PNG.

use std::net::TcpListener as StdTcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::runtime::Builder;
use tokio::sync::oneshot;

use crate::GatewayConfig;

/// Body served for every PNG tile.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Clone)]
struct MockState {
    fail_api: bool,
    requests: Arc<Mutex<Vec<String>>>,
}

/// Handle for a running mock upstream; the server stops on drop.
pub struct MockUpstream {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl MockUpstream {
    /// Serve canned envelopes for every known route.
    pub fn start() -> Self {
        Self::spawn(false)
    }

    /// Every `/api` request answers 503 Service Unavailable.
    pub fn start_failing() -> Self {
        Self::spawn(true)
    }

    fn spawn(fail_api: bool) -> Self {
        let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind mock upstream");
        listener
            .set_nonblocking(true)
            .expect("mock upstream listener nonblocking");
        let addr = listener.local_addr().expect("mock upstream address");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            fail_api,
            requests: Arc::clone(&requests),
        };
        let app = Router::new().fallback(handle).with_state(state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let join = thread::spawn(move || {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("mock upstream runtime");
            runtime.block_on(async move {
                let listener =
                    tokio::net::TcpListener::from_std(listener).expect("mock upstream listener");
                let _ = axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown_rx.await;
                    })
                    .await;
            });
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }

    /// Gateway configuration whose roots point at this server.
    pub fn config(&self) -> GatewayConfig {
        GatewayConfig::with_endpoints(
            &format!("{}/api", self.base_url),
            &format!("{}/tiles", self.base_url),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Recorded request URIs in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Address with nothing listening on it.
pub fn unreachable_config() -> GatewayConfig {
    let addr = {
        let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind unused port");
        listener.local_addr().expect("unused port address")
    };
    GatewayConfig::with_endpoints(&format!("http://{addr}/api"), &format!("http://{addr}/tiles"))
}

async fn handle(State(state): State<MockState>, uri: Uri) -> Response {
    if let Ok(mut requests) = state.requests.lock() {
        requests.push(uri.to_string());
    }

    let path = uri.path();
    let query = uri.query().unwrap_or_default();

    if let Some(tile) = path.strip_prefix("/tiles/") {
        return tile_response(tile);
    }
    if state.fail_api {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if query.contains("slow=") {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    match path {
        "/api/units" => Json(envelope(units_data(), None)).into_response(),
        "/api/geologic_units/map" => {
            Json(envelope(map_units_data(), Some(map_refs()))).into_response()
        }
        "/api/columns" => Json(envelope(json!([{"col_id": 488, "col_name": "Boulder"}]), None))
            .into_response(),
        "/api/defs/autocomplete" | "/api/defs/minerals" | "/api/v2/defs/intervals" => {
            Json(envelope(json!([{"path": path, "query": query}]), None)).into_response()
        }
        p if p.starts_with("/api/defs/") => {
            Json(envelope(json!([{"path": p, "query": query}]), None)).into_response()
        }
        _ => (StatusCode::NOT_FOUND, "no such route").into_response(),
    }
}

fn tile_response(tile: &str) -> Response {
    if tile.starts_with("small/") {
        return StatusCode::NOT_FOUND.into_response();
    }
    if tile.starts_with("tiny/") {
        return ([(header::CONTENT_TYPE, "image/png")], Vec::<u8>::new()).into_response();
    }
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES.to_vec()).into_response()
}

fn envelope(data: Value, refs: Option<Value>) -> Value {
    let mut success = json!({"v": 2, "license": "CC-BY 4.0", "data": data});
    if let Some(refs) = refs {
        success["refs"] = refs;
    }
    json!({ "success": success })
}

fn units_data() -> Value {
    json!([
        {
            "unit_id": 1,
            "unit_name": "Pierre Shale",
            "b_age": 83.6,
            "t_age": 68.0,
            "lith": [{"name": "shale", "prop": 1.0}]
        },
        {
            "unit_id": 2,
            "unit_name": "Fox Hills Sandstone",
            "b_age": 68.0,
            "t_age": 66.5
        }
    ])
}

fn map_units_data() -> Value {
    json!([
        {
            "map_id": 10,
            "source_id": 7,
            "name": "Dakota Group",
            "b_age": 113.0,
            "t_age": 100.5,
            "lith": "sandstone",
            "descrip": "Resistant ridge-forming sandstone"
        },
        {
            "map_id": 11,
            "source_id": 99,
            "name": "Quaternary alluvium"
        }
    ])
}

fn map_refs() -> Value {
    json!({"7": "Colorado Geological Survey (2005) Geologic map of Boulder County"})
}
