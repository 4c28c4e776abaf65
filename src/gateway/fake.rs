//! In-process stand-in for an Ecowitt gateway, used by tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use tokio::sync::RwLock;

struct FakeState {
    response: RwLock<(StatusCode, String)>,
    delay: RwLock<Duration>,
    hits: AtomicUsize,
}

pub struct FakeGateway {
    url: String,
    state: Arc<FakeState>,
}

impl FakeGateway {
    /// Bind to an ephemeral port and serve `/get_livedata_info`
    pub async fn start() -> Self {
        let state = Arc::new(FakeState {
            response: RwLock::new((StatusCode::OK, r#"{"ch_soil": []}"#.to_string())),
            delay: RwLock::new(Duration::ZERO),
            hits: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/get_livedata_info", get(livedata))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub async fn respond(&self, status: StatusCode, body: String) {
        *self.state.response.write().await = (status, body);
    }

    /// Hold every response for `delay` before answering
    pub async fn set_delay(&self, delay: Duration) {
        *self.state.delay.write().await = delay;
    }

    /// Serve a payload with the given `(channel, name, humidity)` entries
    pub async fn set_channels(&self, channels: &[(u32, &str, &str)]) {
        let ch_soil: Vec<_> = channels
            .iter()
            .map(|(channel, name, humidity)| {
                serde_json::json!({
                    "channel": channel.to_string(),
                    "name": name,
                    "battery": "5",
                    "humidity": humidity,
                })
            })
            .collect();
        let body = serde_json::json!({ "ch_soil": ch_soil }).to_string();
        self.respond(StatusCode::OK, body).await;
    }
}

async fn livedata(State(state): State<Arc<FakeState>>) -> (StatusCode, String) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let delay = *state.delay.read().await;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    state.response.read().await.clone()
}
