//! Shared harness for the end-to-end tests in `tests/`: the full router
//! over the in-memory store, with a mailer that records instead of sending.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_adapters::{build_router, AppState, DialogHub, Metrics};
use async_trait::async_trait;
use auth_adapters::{Argon2PasswordHasher, JwtTokenService, RandomConfirmHash};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use domains::{Email, Mailer, Result};
use serde_json::{json, Value};
use services::{
    AccountService, AccountSettings, ChannelOutbox, DialogService, MessageService, OutboxWorker,
};
use storage_adapters::MemoryStore;
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"integration-test-signing-secret";
pub const PASSWORD: &str = "secret";

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub hub: Arc<DialogHub>,
    pub mailer: Arc<RecordingMailer>,
    pub tokens: Arc<JwtTokenService>,
}

/// Must be called inside a tokio runtime: the outbox worker is spawned.
pub fn spawn_app(settings: AccountSettings) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(DialogHub::new());
    let mailer = Arc::new(RecordingMailer::default());
    let tokens = Arc::new(JwtTokenService::new(TEST_SECRET, chrono::Duration::hours(1)));

    let (outbox, rx) = ChannelOutbox::channel();
    let outbox = Arc::new(outbox);
    tokio::spawn(OutboxWorker::new(mailer.clone(), hub.clone()).run(rx));

    let accounts = AccountService::new(
        store.clone(),
        Arc::new(Argon2PasswordHasher::new()),
        Arc::new(RandomConfirmHash),
        tokens.clone(),
        outbox.clone(),
        settings,
    );
    let dialogs = DialogService::new(store.clone(), store.clone(), store.clone(), outbox.clone());
    let messages = MessageService::new(store.clone(), store.clone(), outbox);

    let router = build_router(AppState {
        accounts: Arc::new(accounts),
        dialogs: Arc::new(dialogs),
        messages: Arc::new(messages),
        tokens: tokens.clone(),
        hub: hub.clone(),
        metrics: Arc::new(Metrics::new()),
    });

    TestApp {
        router,
        store,
        hub,
        mailer,
        tokens,
    }
}

impl TestApp {
    /// Status and body; non-JSON bodies come back as a JSON string.
    pub async fn call(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(request(Method::GET, uri, token, None)).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(request(Method::POST, uri, token, Some(body))).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(request(Method::DELETE, uri, token, None)).await
    }

    /// Waits for the outbox worker to deliver the `n`th e-mail (1-based).
    pub async fn wait_for_email(&self, n: usize) -> Email {
        for _ in 0..200 {
            if let Some(email) = self.mailer.sent().get(n - 1) {
                return email.clone();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no email #{n} was delivered");
    }

    pub async fn register(&self, email: &str, fullname: &str) -> (StatusCode, Value) {
        self.post(
            "/user/register",
            None,
            json!({ "email": email, "fullname": fullname, "password": PASSWORD }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/user/login",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Registers and logs in, returning `(user id, token)`.
    pub async fn signed_up(&self, email: &str, fullname: &str) -> (String, String) {
        let (status, user) = self.register(email, fullname).await;
        assert_eq!(status, StatusCode::OK, "register failed: {user}");
        let (status, login) = self.login(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "login failed: {login}");
        (
            user["id"].as_str().unwrap_or_default().to_string(),
            login["token"].as_str().unwrap_or_default().to_string(),
        )
    }
}

pub fn request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("token", token);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}

/// The `hash` query parameter of the verification link in an e-mail body.
pub fn verify_hash(email: &Email) -> Option<String> {
    let start = email.body.find("hash=")? + "hash=".len();
    let hash: String = email.body[start..]
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect();
    Some(hash).filter(|h| !h.is_empty())
}
