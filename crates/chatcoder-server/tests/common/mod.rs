#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use chatcoder_api::AppState;
use chatcoder_db::SharedStore;
use chatcoder_server::config::Config;

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const ACCESS_TOKEN: &str = "chat-all-us1";

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub client: reqwest::Client,
}

pub fn config_with(pairs: &[(&str, &str)]) -> Config {
    let pairs: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .or_else(|| match key {
                "CHATCODER_STORE" => Some("memory".into()),
                "CHATCODER_JWT_SECRET" => Some("e2e-test-secret".into()),
                _ => None,
            })
    })
    .unwrap()
}

pub async fn spawn() -> TestServer {
    spawn_with(config_with(&[])).await
}

pub async fn spawn_with(config: Config) -> TestServer {
    let state = chatcoder_server::build_state(&config).unwrap();
    serve(state, &config).await
}

/// Default config over a caller-supplied store.
pub async fn spawn_with_store(store: SharedStore) -> TestServer {
    let config = config_with(&[]);
    let state = chatcoder_server::state_with_store(&config, store);
    serve(state, &config).await
}

async fn serve(state: AppState, config: &Config) -> TestServer {
    let app = chatcoder_server::router(state.clone(), config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        state,
        client: reqwest::Client::new(),
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    pub async fn post_credentials(
        &self,
        path: &str,
        username: &str,
        password: &str,
        token: &str,
    ) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&json!({ "username": username, "password": password, "token": token }))
            .send()
            .await
            .unwrap()
    }

    /// Register and return the bearer token.
    pub async fn register(&self, username: &str) -> String {
        let resp = self
            .post_credentials("/api/auth/register", username, "password123", ACCESS_TOKEN)
            .await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn connect(&self, token: &str) -> Ws {
        let (ws, _) = connect_async(format!("{}?token={}", self.ws_url(), token))
            .await
            .unwrap();
        ws
    }

    /// Connect and consume the initial `ready` and `online-count` events.
    pub async fn connect_ready(&self, token: &str) -> Ws {
        let mut ws = self.connect(token).await;
        assert_eq!(next_event(&mut ws).await["type"], "ready");
        assert_eq!(next_event(&mut ws).await["type"], "online-count");
        ws
    }

    pub async fn get_messages(&self, query: &str) -> Vec<Value> {
        let resp = self
            .client
            .get(self.url(&format!("/api/messages{}", query)))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }
}

/// Next text frame as JSON. Panics after 5 s of silence.
pub async fn next_event(ws: &mut Ws) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Skip events until one of the given type arrives.
pub async fn wait_for(ws: &mut Ws, kind: &str) -> Value {
    loop {
        let event = next_event(ws).await;
        if event["type"] == kind {
            return event;
        }
    }
}

pub async fn send_message(ws: &mut Ws, content: &str) {
    let frame = json!({ "type": "send-message", "data": { "content": content } });
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}
