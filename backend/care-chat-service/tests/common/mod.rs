#![allow(dead_code)]

use care_chat_service::{
    build_router,
    config::Config,
    identity::JwtIdentityResolver,
    models::{UserIdentity, UserRole},
    state::AppState,
    store::{MemoryConversationStore, SharedStore},
};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::{tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestApp {
    pub base: String,
    pub ws_base: String,
    pub state: AppState,
    pub client: reqwest::Client,
    tokens: JwtIdentityResolver,
}

/// Users 1 (patient), 2 (physician), 3 (pharmacy) exist.
pub async fn start_app() -> TestApp {
    let store: SharedStore = Arc::new(MemoryConversationStore::with_users([
        UserIdentity::new(1, UserRole::Patient),
        UserIdentity::new(2, UserRole::Physician),
        UserIdentity::new(3, UserRole::Pharmacy),
    ]));

    let mut config = Config::test_defaults();
    config.upload_dir =
        std::env::temp_dir().join(format!("care-chat-it-{}", uuid::Uuid::new_v4()));

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.public_base_url = format!("http://{addr}");

    let tokens = JwtIdentityResolver::new(&config.jwt_secret, store.clone());
    let state = AppState::new(config, store);
    let app = build_router(state.clone());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    TestApp {
        base: format!("http://{addr}"),
        ws_base: format!("ws://{addr}"),
        state,
        client: reqwest::Client::new(),
        tokens,
    }
}

impl TestApp {
    pub fn token(&self, user_id: i64) -> String {
        self.tokens
            .issue_token(user_id, chrono::Duration::minutes(10))
            .unwrap()
    }

    pub fn get(&self, user_id: i64, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base))
            .bearer_auth(self.token(user_id))
    }

    pub fn post(&self, user_id: i64, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base))
            .bearer_auth(self.token(user_id))
    }

    pub fn patch(&self, user_id: i64, path: &str) -> reqwest::RequestBuilder {
        self.client
            .patch(format!("{}{path}", self.base))
            .bearer_auth(self.token(user_id))
    }

    /// Open a live session for `user_id` and wait until it is registered.
    pub async fn connect(&self, user_id: i64) -> WsClient {
        let url = format!("{}/ws?token={}", self.ws_base, self.token(user_id));
        let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        for _ in 0..200 {
            if self.state.registry.is_online(user_id) {
                return stream;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("user {user_id} never came online");
    }
}

/// Next text frame as JSON, skipping control frames.
pub async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        match frame {
            WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
