#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Request, State},
    Json, Router,
};
use chrono::Utc;
use gateway_service::{
    app_module::AppState,
    app_router::gateway_router,
    routing::{build_client, Forwarder, RouteDefinition, RouteTable},
    security::{AccessRuleSet, AuthorityMapper, CorsPolicy, SharedSecretKeySource, TokenValidator},
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

pub const SECRET: &[u8] = b"storefront-test-secret";

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn record(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind backend");
    let addr: SocketAddr = listener.local_addr().expect("backend addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("backend server");
    });
    format!("http://{addr}")
}

/// Backend that answers every request with a JSON description of what it
/// received.
pub async fn spawn_echo_backend() -> (String, Hits) {
    async fn echo(State(hits): State<Hits>, request: Request) -> Json<Value> {
        hits.record();
        let (parts, body) = request.into_parts();
        let headers: Map<String, Value> = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    Value::String(value.to_str().unwrap_or_default().to_string()),
                )
            })
            .collect();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

        Json(json!({
            "method": parts.method.as_str(),
            "uri": parts.uri.to_string(),
            "headers": headers,
            "body": String::from_utf8_lossy(&body),
        }))
    }

    let hits = Hits::default();
    let router = Router::new().fallback(echo).with_state(hits.clone());
    (serve(router).await, hits)
}

/// Backend that accepts connections and never answers.
pub async fn spawn_silent_backend() -> String {
    async fn stall() -> &'static str {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        "too late"
    }
    serve(Router::new().fallback(stall)).await
}

/// Raw backend that sends headers promising more body than it delivers, then
/// holds the connection open.
pub async fn spawn_stalling_body_backend() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind backend");
    let addr: SocketAddr = listener.local_addr().expect("backend addr");
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial")
                    .await;
                tokio::time::sleep(Duration::from_secs(3600)).await;
            });
        }
    });
    format!("http://{addr}")
}

pub fn storefront_routes(products: &str, purchases: &str, auth: &str) -> Vec<RouteDefinition> {
    vec![
        RouteDefinition::new("auth", "/api/auth/**", auth),
        RouteDefinition::new("products", "/api/products/**", products),
        RouteDefinition::new("purchases", "/api/purchases/**", purchases),
    ]
}

pub struct GatewayBuilder {
    routes: Vec<RouteDefinition>,
    timeout: Duration,
    origins: Vec<String>,
}

impl GatewayBuilder {
    pub fn new(routes: Vec<RouteDefinition>) -> Self {
        Self {
            routes,
            timeout: Duration::from_secs(5),
            origins: vec!["*".to_string()],
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn origins(mut self, origins: &[&str]) -> Self {
        self.origins = origins.iter().map(|origin| origin.to_string()).collect();
        self
    }

    pub fn build(self) -> Router {
        let state = AppState::new(
            RouteTable::new(self.routes).expect("routes"),
            AccessRuleSet::storefront_defaults().expect("access rules"),
            TokenValidator::new(
                Arc::new(SharedSecretKeySource::new(SECRET)),
                AuthorityMapper::default(),
            ),
            Forwarder::new(build_client(), self.timeout),
            CorsPolicy::storefront(self.origins),
        );
        gateway_router(state)
    }
}

/// Gateway with every storefront route pointing at `backend`.
pub fn gateway_for(backend: &str) -> Router {
    GatewayBuilder::new(storefront_routes(backend, backend, backend)).build()
}

pub fn mint_token(subject: &str, scope: &str, expires_in_secs: i64) -> String {
    mint_token_with(
        Header::new(Algorithm::HS256),
        json!({
            "sub": subject,
            "scope": scope,
            "exp": Utc::now().timestamp() + expires_in_secs,
        }),
        SECRET,
    )
}

pub fn mint_token_with(header: Header, claims: Value, secret: &[u8]) -> String {
    encode(&header, &claims, &EncodingKey::from_secret(secret)).expect("token")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
