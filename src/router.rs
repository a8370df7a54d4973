use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::coerce::{coerce, into_model_response};
use crate::errors::ChatError;
use crate::models::{ChatRequest, ChatResponse};
use crate::ollama::OllamaClient;
use crate::prompt::compose;
use crate::validation::validate;

pub struct RouterState {
  pub started_at: Instant,
  pub gateway: OllamaClient,
}

pub fn app(state: RouterState) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/v1/ide/chat", post(chat))
    .route("/debug/raw", post(debug_raw))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .with_state(Arc::new(state))
}

pub async fn run_router(listener: TcpListener, state: RouterState) -> anyhow::Result<()> {
  axum::serve(listener, app(state))
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if tokio::signal::ctrl_c().await.is_ok() {
    info!("shutdown requested");
  }
}

async fn health(State(state): State<Arc<RouterState>>) -> Json<serde_json::Value> {
  let uptime = state.started_at.elapsed().as_millis();
  Json(serde_json::json!({
    "status": "ok",
    "version": env!("CARGO_PKG_VERSION"),
    "uptime_ms": uptime,
    "model": state.gateway.model()
  }))
}

async fn debug_raw(body: Bytes) -> Json<serde_json::Value> {
  debug!(body = %String::from_utf8_lossy(&body), "raw request body");
  Json(serde_json::json!({ "ok": true }))
}

async fn chat(
  State(state): State<Arc<RouterState>>,
  Json(req): Json<ChatRequest>,
) -> Json<ChatResponse> {
  Json(handle(&state.gateway, &req).await)
}

/// Runs one chat turn. Every failure becomes a degraded response with no ops.
pub async fn handle(gateway: &OllamaClient, req: &ChatRequest) -> ChatResponse {
  let request_id = uuid::Uuid::new_v4();
  let span = info_span!("chat", %request_id, mode = %req.mode);

  async {
    match run_pipeline(gateway, req).await {
      Ok(response) => {
        info!(ops = response.ops.len(), "chat turn completed");
        response
      }
      Err(err) => {
        warn!(category = err.category(), error = %err, "chat turn failed");
        ChatResponse::degraded(format!("Model call failed: {}", err.category()))
      }
    }
  }
  .instrument(span)
  .await
}

async fn run_pipeline(gateway: &OllamaClient, req: &ChatRequest) -> Result<ChatResponse, ChatError> {
  let messages = compose(req);
  let payload = gateway.invoke(&messages).await?;
  validate(&payload)?;
  let response = into_model_response(payload)?;
  Ok(ChatResponse {
    reply: response.reply,
    code_tree: response.code_tree,
    ops: coerce(response.ops),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::GatewayConfig;
  use crate::models::{FileOp, Message, OpKind};
  use httpmock::prelude::*;
  use serde_json::{json, Value};
  use std::time::Duration;

  fn gateway(server: &MockServer, timeout: Duration) -> OllamaClient {
    OllamaClient::new(&GatewayConfig {
      chat_url: server.url("/api/chat"),
      model: "test-model".to_string(),
      timeout,
    })
    .expect("client builds")
  }

  fn request(project_root: Option<&str>) -> ChatRequest {
    ChatRequest {
      mode: "scaffold".to_string(),
      project_root: project_root.map(str::to_string),
      messages: vec![Message {
        role: Some("user".to_string()),
        content: Some("create a hello world".to_string()),
      }],
    }
  }

  async fn backend_returning(server: &MockServer, content: Value) {
    server
      .mock_async(move |when, then| {
        when.method(POST).path("/api/chat");
        then
          .status(200)
          .json_body(json!({ "message": { "role": "assistant", "content": content } }));
      })
      .await;
  }

  fn assert_degraded(response: &ChatResponse, category: &str) {
    assert!(response.ops.is_empty());
    assert!(response.code_tree.is_empty());
    assert!(
      response.reply.contains(category),
      "reply {:?} should name {category}",
      response.reply
    );
  }

  #[tokio::test]
  async fn well_formed_reply_becomes_file_ops() {
    let server = MockServer::start_async().await;
    backend_returning(
      &server,
      json!({
        "reply": "Created hello world.",
        "code_tree": "hello.txt",
        "ops": [{ "op": "create_file", "path": "hello.txt", "language": "text", "content": "Hello, world!\n" }]
      }),
    )
    .await;

    let response = handle(&gateway(&server, Duration::from_secs(5)), &request(None)).await;
    assert_eq!(response.reply, "Created hello world.");
    assert_eq!(response.code_tree, "hello.txt");
    assert_eq!(
      response.ops,
      vec![FileOp {
        op: OpKind::CreateFile,
        path: "hello.txt".to_string(),
        language: Some("text".to_string()),
        content: Some("Hello, world!\n".to_string()),
      }]
    );
  }

  #[tokio::test]
  async fn traversal_path_rejects_the_whole_reply() {
    let server = MockServer::start_async().await;
    backend_returning(
      &server,
      json!({
        "reply": "ok",
        "code_tree": "hello.txt",
        "ops": [
          { "op": "create_file", "path": "hello.txt", "language": "text", "content": "hi" },
          { "op": "update_file", "path": "../etc/passwd", "language": null, "content": "root::0:0" }
        ]
      }),
    )
    .await;

    let response = handle(&gateway(&server, Duration::from_secs(5)), &request(None)).await;
    assert_degraded(&response, "ValidationError");
  }

  #[tokio::test]
  async fn malformed_replies_degrade() {
    let cases = [
      json!({ "reply": "ok", "ops": [] }),
      json!({ "reply": "ok", "code_tree": "", "ops": [], "extra": 1 }),
      json!({ "reply": 5, "code_tree": "", "ops": [] }),
      json!({ "reply": "ok", "code_tree": "", "ops": [{ "op": "rename", "path": "a", "language": null, "content": null }] }),
      json!({ "reply": "ok", "code_tree": "", "ops": [{ "op": "create_dir", "path": "a" }] }),
    ];
    for content in cases {
      let server = MockServer::start_async().await;
      backend_returning(&server, content).await;
      let response = handle(&gateway(&server, Duration::from_secs(5)), &request(None)).await;
      assert_degraded(&response, "ValidationError");
    }
  }

  #[tokio::test]
  async fn unparseable_content_degrades() {
    let server = MockServer::start_async().await;
    backend_returning(&server, json!("Sure! Here is your project:")).await;
    let response = handle(&gateway(&server, Duration::from_secs(5)), &request(None)).await;
    assert_degraded(&response, "MalformedPayloadError");
  }

  #[tokio::test]
  async fn backend_failure_degrades() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(503).body("overloaded");
      })
      .await;
    let response = handle(&gateway(&server, Duration::from_secs(5)), &request(None)).await;
    assert_degraded(&response, "BackendError");
    assert!(!response.reply.contains("overloaded"));
  }

  #[tokio::test]
  async fn timeout_degrades_to_transport_failure() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(POST).path("/api/chat");
        then
          .status(200)
          .delay(Duration::from_millis(1500))
          .json_body(json!({ "message": { "content": { "reply": "", "code_tree": "", "ops": [] } } }));
      })
      .await;

    let started = Instant::now();
    let response = handle(&gateway(&server, Duration::from_millis(100)), &request(None)).await;
    assert_degraded(&response, "TransportError");
    assert!(started.elapsed() < Duration::from_millis(1500));
  }

  #[tokio::test]
  async fn project_root_hint_reaches_the_backend() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when
          .method(POST)
          .path("/api/chat")
          .body_contains("project_root=proj");
        then.status(200).json_body(json!({
          "message": { "content": { "reply": "ok", "code_tree": "", "ops": [] } }
        }));
      })
      .await;

    let response = handle(&gateway(&server, Duration::from_secs(5)), &request(Some("proj"))).await;
    mock.assert_async().await;
    assert_eq!(response.reply, "ok");
    assert!(response.ops.is_empty());
  }

  async fn serve(state: RouterState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
      let _ = axum::serve(listener, app(state)).await;
    });
    format!("http://{addr}")
  }

  fn state_for(server: &MockServer) -> RouterState {
    RouterState {
      started_at: Instant::now(),
      gateway: gateway(server, Duration::from_secs(5)),
    }
  }

  #[tokio::test]
  async fn health_route_reports_model() {
    let server = MockServer::start_async().await;
    let base = serve(state_for(&server)).await;

    let resp = reqwest::get(format!("{base}/health")).await.expect("health request");
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.expect("health json");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime_ms"].is_u64());
  }

  #[tokio::test]
  async fn debug_raw_route_acknowledges_any_body() {
    let server = MockServer::start_async().await;
    let base = serve(state_for(&server)).await;

    let resp = reqwest::Client::new()
      .post(format!("{base}/debug/raw"))
      .body("not even json")
      .send()
      .await
      .expect("debug request");
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.expect("debug json");
    assert_eq!(body, json!({ "ok": true }));
  }

  #[tokio::test]
  async fn chat_route_answers_200_with_degraded_body_on_backend_failure() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(500).body("boom");
      })
      .await;
    let base = serve(state_for(&server)).await;

    let resp = reqwest::Client::new()
      .post(format!("{base}/v1/ide/chat"))
      .json(&request(None))
      .send()
      .await
      .expect("chat request");
    assert_eq!(resp.status().as_u16(), 200);
    let body: ChatResponse = resp.json().await.expect("chat response json");
    assert_degraded(&body, "BackendError");
  }

  #[tokio::test]
  async fn routes_allow_cross_origin_callers() {
    let server = MockServer::start_async().await;
    let base = serve(state_for(&server)).await;

    let resp = reqwest::Client::new()
      .get(format!("{base}/health"))
      .header(reqwest::header::ORIGIN, "http://localhost:63342")
      .send()
      .await
      .expect("health request");
    let allow = resp
      .headers()
      .get(reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN)
      .expect("cors header");
    assert_eq!(allow, "*");
  }

  #[tokio::test]
  async fn chat_route_rejects_bodies_that_are_not_chat_requests() {
    let server = MockServer::start_async().await;
    let base = serve(state_for(&server)).await;

    let resp = reqwest::Client::new()
      .post(format!("{base}/v1/ide/chat"))
      .json(&json!({ "messages": "nope" }))
      .send()
      .await
      .expect("chat request");
    assert!(resp.status().is_client_error());
  }

  #[tokio::test]
  async fn chat_route_always_answers_with_a_chat_response() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(500);
      })
      .await;
    let state = Arc::new(RouterState {
      started_at: Instant::now(),
      gateway: gateway(&server, Duration::from_secs(5)),
    });

    let Json(response) = chat(State(state), Json(request(None))).await;
    assert_degraded(&response, "BackendError");
  }
}
