use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::errors::ChatError;
use crate::models::ChatMessage;
use crate::schema::model_response_schema;

const TEMPERATURE: f64 = 0.2;

#[derive(Serialize)]
struct OllamaOptions {
  temperature: f64,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
  model: &'a str,
  stream: bool,
  messages: &'a [ChatMessage],
  format: Value,
  options: OllamaOptions,
}

/// Structured-output client for Ollama's `/api/chat`.
#[derive(Clone)]
pub struct OllamaClient {
  client: Client,
  chat_url: String,
  model: String,
}

impl OllamaClient {
  pub fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self {
      client,
      chat_url: config.chat_url.clone(),
      model: config.model.clone(),
    })
  }

  pub fn model(&self) -> &str {
    &self.model
  }

  fn payload<'a>(&'a self, messages: &'a [ChatMessage]) -> OllamaChatRequest<'a> {
    OllamaChatRequest {
      model: &self.model,
      stream: false,
      messages,
      format: model_response_schema(),
      options: OllamaOptions {
        temperature: TEMPERATURE,
      },
    }
  }

  /// Sends one schema-constrained chat turn and returns the reply as a JSON
  /// object. The object's shape is not checked here.
  pub async fn invoke(&self, messages: &[ChatMessage]) -> Result<Value, ChatError> {
    debug!(
      url = %self.chat_url,
      model = %self.model,
      messages = messages.len(),
      last_role = messages.last().map(|m| m.role().as_str()).unwrap_or("none"),
      "calling model backend"
    );

    let resp = self
      .client
      .post(&self.chat_url)
      .json(&self.payload(messages))
      .send()
      .await
      .map_err(ChatError::Transport)?;

    if !resp.status().is_success() {
      let status = resp.status();
      let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "model backend request failed".to_string());
      return Err(ChatError::Backend { status, body });
    }

    let body = resp.text().await.map_err(ChatError::Transport)?;
    let data: Value = serde_json::from_str(&body)
      .map_err(|err| ChatError::MalformedPayload(format!("backend body is not JSON: {err}")))?;
    normalize_content(&data["message"]["content"])
  }
}

/// Ollama may hand back `message.content` as an object or as JSON text.
pub fn normalize_content(content: &Value) -> Result<Value, ChatError> {
  let decoded = match content {
    Value::Object(_) => content.clone(),
    Value::String(text) => serde_json::from_str(text)
      .map_err(|err| ChatError::MalformedPayload(format!("content is not valid JSON: {err}")))?,
    Value::Null => return Err(ChatError::MalformedPayload("reply has no message content".to_string())),
    other => {
      return Err(ChatError::MalformedPayload(format!(
        "unexpected content type: {}",
        json_type(other)
      )))
    }
  };

  if decoded.is_object() {
    Ok(decoded)
  } else {
    Err(ChatError::MalformedPayload(format!(
      "content decoded to {}, expected an object",
      json_type(&decoded)
    )))
  }
}

fn json_type(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
