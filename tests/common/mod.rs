//! Shared helpers for the HTTP-level tests. Everything runs in degraded
//! mode on the volatile store, so no database is needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use newsdesk::{
    app::build_app,
    auth::password::PasswordHasher,
    config::{AppConfig, DatabaseConfig, HashingConfig, JwtConfig, RateLimitConfig},
    state::AppState,
};
use serde_json::Value;
use tower::ServiceExt;

pub fn test_config(max_attempts: u32) -> AppConfig {
    AppConfig {
        jwt: JwtConfig {
            secret: "test-secret-key-for-testing-only".into(),
            issuer: "newsdesk-test".into(),
            audience: "newsdesk-test-readers".into(),
            ttl_minutes: 5,
        },
        database: DatabaseConfig {
            url: None,
            connect_timeout_secs: 1,
            health_interval_secs: 1,
        },
        rate_limit: RateLimitConfig {
            window_ms: 60_000,
            max_attempts,
        },
        hashing: HashingConfig {
            memory_kib: 8,
            iterations: 1,
        },
        trust_proxy: true,
        development: false,
    }
}

pub fn test_state(max_attempts: u32) -> AppState {
    AppState::in_memory(test_config(max_attempts), PasswordHasher::fast_insecure())
}

pub fn test_app(state: &AppState) -> Router {
    build_app(state.clone())
}

/// Sends one request and returns status plus parsed JSON body.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    client: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", client);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let request = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn register(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/auth/register",
        None,
        email,
        Some(serde_json::json!({ "email": email, "password": password })),
    )
    .await
}

/// Flips one character in the signature part of a JWT.
pub fn tamper(token: &str) -> String {
    let mut bytes = token.as_bytes().to_vec();
    let i = bytes.len() - 2;
    bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
    String::from_utf8(bytes).unwrap()
}
