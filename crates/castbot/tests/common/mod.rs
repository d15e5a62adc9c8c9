//! Dashboard router over a throwaway ledger and a recording gateway

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use castbot::api::auth::StaticTokenAuthenticator;
use castbot::api::{router, AppState};
use castcore::dispatch::BroadcastDispatcher;
use castcore::gateway::{BotInfo, GatewayError, MessagingGateway, ReplyKeyboard};
use castcore::storage::recipients::{create_recipient, NewRecipient};
use castcore::storage::{create_pool, DbConnection, DbPool, Recipient};

pub const TOKEN: &str = "dashboard-test-token";

/// Records sends as `(recipient, text)`; photos can be made to fail.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<(String, String)>>,
    photos: Mutex<Vec<(String, String)>>,
    fail_photos: bool,
}

impl RecordingGateway {
    pub fn failing_photos() -> Self {
        Self {
            fail_photos: true,
            ..Default::default()
        }
    }

    pub fn texts(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn photos(&self) -> Vec<(String, String)> {
        self.photos.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_text(&self, recipient: &str, text: &str, _keyboard: &ReplyKeyboard) -> Result<(), GatewayError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_photo(
        &self,
        recipient: &str,
        photo_url: &str,
        _caption: &str,
        _keyboard: &ReplyKeyboard,
    ) -> Result<(), GatewayError> {
        if self.fail_photos {
            return Err(GatewayError::Request("wrong file identifier".to_string()));
        }
        self.photos
            .lock()
            .unwrap()
            .push((recipient.to_string(), photo_url.to_string()));
        Ok(())
    }

    async fn bot_info(&self) -> Result<BotInfo, GatewayError> {
        Ok(BotInfo {
            id: 42,
            username: Some("cast_test_bot".to_string()),
            first_name: "Cast".to_string(),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: Arc<DbPool>,
    pub dispatcher: BroadcastDispatcher,
    pub gateway: Arc<RecordingGateway>,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_gateway(RecordingGateway::default())
    }

    pub fn with_gateway(gateway: RecordingGateway) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("dashboard.sqlite");
        let pool = Arc::new(create_pool(path.to_str().expect("utf-8 path")).expect("create pool"));
        let gateway = Arc::new(gateway);
        let dispatcher = BroadcastDispatcher::new(pool.clone(), gateway.clone())
            .with_delay(Duration::ZERO)
            .with_serialization(false);
        let auth = Arc::new(StaticTokenAuthenticator::new(TOKEN));
        let router = router(AppState::new(pool.clone(), dispatcher.clone(), auth));

        Self {
            router,
            pool,
            dispatcher,
            gateway,
            _dir: dir,
        }
    }

    pub fn conn(&self) -> DbConnection {
        self.pool.get().expect("pooled connection")
    }

    pub fn recipient(&self, handle: &str) -> Recipient {
        create_recipient(
            &self.conn(),
            &NewRecipient {
                telegram_id: handle.to_string(),
                first_name: Some(format!("User {}", handle)),
                ..Default::default()
            },
        )
        .expect("create recipient")
    }

    /// Authenticated request; returns the status and the parsed JSON body
    /// (`Null` when empty).
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, body, Some(TOKEN)).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, None).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    /// Waits for every spawned dispatch run.
    pub async fn settle(&self) {
        self.dispatcher.shutdown().await;
    }
}
