use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  System,
  User,
  Assistant,
}

impl Role {
  /// Case-insensitive; anything unrecognized is treated as `user`.
  pub fn normalize(raw: &str) -> Role {
    match raw.trim().to_ascii_lowercase().as_str() {
      "system" => Role::System,
      "assistant" => Role::Assistant,
      _ => Role::User,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Role::System => "system",
      Role::User => "user",
      Role::Assistant => "assistant",
    }
  }
}

/// Message as the editor sends it. Either field may be missing or null.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Message {
  #[serde(default)]
  pub role: Option<String>,
  #[serde(default)]
  pub content: Option<String>,
}

/// Normalized message forwarded to the model backend.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
  role: Role,
  content: String,
}

impl ChatMessage {
  pub fn new(role: Role, content: impl Into<String>) -> Self {
    Self {
      role,
      content: content.into(),
    }
  }

  pub fn role(&self) -> Role {
    self.role
  }

  pub fn content(&self) -> &str {
    &self.content
  }
}

impl From<&Message> for ChatMessage {
  fn from(msg: &Message) -> Self {
    ChatMessage::new(
      Role::normalize(msg.role.as_deref().unwrap_or("")),
      msg.content.clone().unwrap_or_default(),
    )
  }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatRequest {
  pub mode: String,
  #[serde(default)]
  pub project_root: Option<String>,
  pub messages: Vec<Message>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
  CreateDir,
  CreateFile,
  UpdateFile,
  DeletePath,
}

impl OpKind {
  pub const ALL: [OpKind; 4] = [
    OpKind::CreateDir,
    OpKind::CreateFile,
    OpKind::UpdateFile,
    OpKind::DeletePath,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OpKind::CreateDir => "create_dir",
      OpKind::CreateFile => "create_file",
      OpKind::UpdateFile => "update_file",
      OpKind::DeletePath => "delete_path",
    }
  }

  pub fn parse(raw: &str) -> Option<OpKind> {
    OpKind::ALL.into_iter().find(|kind| kind.as_str() == raw)
  }
}

/// One operation as the model produced it, after validation has passed.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OperationRecord {
  pub op: OpKind,
  pub path: String,
  pub language: Option<String>,
  pub content: Option<String>,
}

/// The model's reply body once it has passed validation.
#[derive(Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ModelResponse {
  pub reply: String,
  pub code_tree: String,
  pub ops: Vec<OperationRecord>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileOp {
  pub op: OpKind,
  pub path: String,
  pub language: Option<String>,
  pub content: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatResponse {
  pub reply: String,
  pub code_tree: String,
  pub ops: Vec<FileOp>,
}

impl ChatResponse {
  pub fn degraded(reply: impl Into<String>) -> Self {
    Self {
      reply: reply.into(),
      code_tree: String::new(),
      ops: Vec::new(),
    }
  }
}
