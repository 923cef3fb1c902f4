//! End-to-end tests against a served application.
//!
//! The Gemini API is replaced by a wiremock server; requests go over real
//! TCP so the session cookie round-trips through reqwest.

mod common;

use common::{test_config, TEST_MODEL};
use futures::future::join_all;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use story_service::services::generation::gemini::GeminiConfig;
use story_service::services::{GeminiClient, InMemorySessionStore, MockGenerationClient};
use story_service::startup::Application;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn spawn(app: Application) -> String {
    let port = app.port();
    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://127.0.0.1:{}", port)
}

/// Spawn the application wired to a real Gemini client pointed at `api_base`.
async fn spawn_with_gemini(api_base: &str) -> String {
    let config = test_config(api_base);
    let gemini = GeminiClient::new(GeminiConfig::new(&config.gemini, &config.generation))
        .expect("Failed to build Gemini client");
    let app = Application::build_with(
        config,
        Arc::new(gemini),
        Arc::new(InMemorySessionStore::new()),
    )
    .await
    .expect("Failed to build application");
    spawn(app).await
}

fn session_cookie(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("session cookie should be issued")
        .to_string()
}

#[tokio::test]
async fn health_check_returns_ok() {
    let config = test_config("http://127.0.0.1:1");
    let app = Application::build_with(
        config,
        Arc::new(MockGenerationClient::new()),
        Arc::new(InMemorySessionStore::new()),
    )
    .await
    .expect("Failed to build application");
    let base = spawn(app).await;

    let response = Client::new()
        .get(format!("{}/health", base))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "story-service");
}

#[tokio::test]
async fn generation_round_trip_is_logged_for_the_session() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/models/{}:generateContent", TEST_MODEL)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": "there was a dragon." }] } }]
        })))
        .mount(&gemini)
        .await;

    let base = spawn_with_gemini(&gemini.uri()).await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/generate", base))
        .json(&json!({ "prompt": "Once upon a time", "length": 150 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let cookie = session_cookie(&response);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "text": "there was a dragon." }));

    let mut logs = Value::Null;
    for _ in 0..50 {
        logs = client
            .get(format!("{}/api/logs", base))
            .header(COOKIE, &cookie)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if logs.as_array().map(|l| l.len()) == Some(1) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(logs[0]["prompt"], "Once upon a time");
    assert_eq!(logs[0]["output"], "there was a dragon.");
    assert_eq!(logs[0]["length"], 150);
}

#[tokio::test]
async fn concurrent_sessions_each_get_their_own_cookie() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/models/{}:generateContent", TEST_MODEL)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
        })))
        .mount(&gemini)
        .await;

    let base = spawn_with_gemini(&gemini.uri()).await;
    let client = Client::new();

    let responses = join_all((0..5).map(|n| {
        client
            .post(format!("{}/api/generate", base))
            .json(&json!({ "prompt": format!("story {}", n) }))
            .send()
    }))
    .await;

    let mut cookies: Vec<String> = responses
        .iter()
        .map(|r| {
            let r = r.as_ref().expect("request failed");
            assert_eq!(r.status(), 200);
            session_cookie(r)
        })
        .collect();
    cookies.sort();
    cookies.dedup();
    assert_eq!(cookies.len(), 5);
}

#[tokio::test]
async fn vendor_block_surfaces_as_500_over_http() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/models/{}:generateContent", TEST_MODEL)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "promptFeedback": { "blockReason": "SAFETY" } })),
        )
        .mount(&gemini)
        .await;

    let base = spawn_with_gemini(&gemini.uri()).await;

    let response = Client::new()
        .post(format!("{}/api/generate", base))
        .json(&json!({ "prompt": "Something forbidden." }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("SAFETY"));
    assert!(body.get("text").is_none());
}
