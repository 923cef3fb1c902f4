#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use std::time::Duration;
use story_service::config::{
    CorsConfig, GeminiSettings, GenerationSettings, SessionConfig, StoryConfig,
};
use story_service::services::{GenerationClient, InMemorySessionStore, SessionStore};
use story_service::startup::{build_router, AppState};
use tower::ServiceExt;

pub const TEST_MODEL: &str = "gemini-test";
pub const TEST_API_KEY: &str = "test-api-key";

/// Configuration that never reads the process environment.
pub fn test_config(api_base: &str) -> StoryConfig {
    StoryConfig {
        common: CoreConfig {
            port: 0,
            environment: "test".to_string(),
        },
        session: SessionConfig {
            secret: Secret::new("test-session-secret".to_string()),
        },
        gemini: GeminiSettings {
            api_key: Secret::new(TEST_API_KEY.to_string()),
            model: TEST_MODEL.to_string(),
            api_base: api_base.to_string(),
        },
        generation: GenerationSettings::default(),
        cors: CorsConfig {
            allowed_origin: "http://localhost:3000".to_string(),
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemorySessionStore>,
}

impl TestApp {
    pub fn with_client(generator: Arc<dyn GenerationClient>) -> Self {
        let store = Arc::new(InMemorySessionStore::new());
        let state = AppState {
            config: test_config("http://127.0.0.1:1"),
            generator,
            session_store: store.clone() as Arc<dyn SessionStore>,
        };
        let router = build_router(state).expect("Failed to build router");

        TestApp { router, store }
    }

    pub async fn post_json(&self, uri: &str, body: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        TestResponse {
            status,
            cookie: headers
                .get(header::SET_COOKIE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(';').next())
                .map(|v| v.to_string()),
            headers,
            body: bytes.to_vec(),
        }
    }

    /// Poll the caller's log until it holds `expected` entries.
    ///
    /// Entries are appended off the response path, so a read straight after a
    /// generation may race the recorder.
    pub async fn wait_for_logs(&self, cookie: &str, expected: usize) -> serde_json::Value {
        let mut last = serde_json::Value::Null;
        for _ in 0..50 {
            let response = self.get("/api/logs", Some(cookie)).await;
            assert_eq!(response.status, StatusCode::OK);
            last = response.json();
            if last.as_array().map(|a| a.len()) == Some(expected) {
                return last;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session log never reached {} entries: {}", expected, last);
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub cookie: Option<String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}
