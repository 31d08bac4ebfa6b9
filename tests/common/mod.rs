//! Shared harness: a gateway whose providers all point at one wiremock server.

#![allow(dead_code)]

use ai_gateway::config::{Config, Credentials};
use ai_gateway::gateway::Gateway;
use ai_gateway::server::build_router;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::MockServer;

pub const BOUNDARY: &str = "aigw-test-boundary";

pub fn all_credentials() -> Credentials {
    Credentials {
        huggingface: Some("hf-test".to_string()),
        gemini: Some("gemini-test".to_string()),
        openrouter: Some("or-test".to_string()),
    }
}

pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.providers.huggingface_url = server.uri();
    config.providers.gemini_url = server.uri();
    config.providers.openrouter_url = server.uri();
    config.providers.warmup_delay_ms = 1;
    config.providers.timeout_secs = 5;
    config
}

pub fn router(server: &MockServer, credentials: Credentials) -> Router {
    let config = config_for(server);
    let gateway = Gateway::from_config(&config, &credentials).unwrap();
    build_router(Arc::new(gateway), config.server.max_upload_bytes)
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> Reply {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    Reply {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Multipart request with one `file` part and optional text fields.
pub fn post_file(
    uri: &str,
    filename: &str,
    content_type: &str,
    bytes: &[u8],
    fields: &[(&str, &str)],
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            BOUNDARY, filename, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// OpenRouter-style completion body.
pub fn completion(content: &str) -> Value {
    serde_json::json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
}

/// Gemini `generateContent` body.
pub fn gemini_text(text: &str) -> Value {
    serde_json::json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }] })
}

/// OpenRouter-style SSE stream of content deltas.
pub fn openrouter_sse(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        let chunk = serde_json::json!({ "choices": [{ "delta": { "content": fragment } }] });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}
