use reqwest::StatusCode;
use thiserror::Error;

use crate::validation::ValidationError;

/// Everything that can go wrong between composing a prompt and trusting its reply.
#[derive(Error, Debug)]
pub enum ChatError {
  #[error("model backend unreachable: {0}")]
  Transport(#[source] reqwest::Error),

  #[error("model backend returned {status}: {body}")]
  Backend { status: StatusCode, body: String },

  #[error("model reply is not a JSON object: {0}")]
  MalformedPayload(String),

  #[error("model reply rejected: {0}")]
  Validation(#[from] ValidationError),
}

impl ChatError {
  pub fn category(&self) -> &'static str {
    match self {
      ChatError::Transport(_) => "TransportError",
      ChatError::Backend { .. } => "BackendError",
      ChatError::MalformedPayload(_) => "MalformedPayloadError",
      ChatError::Validation(_) => "ValidationError",
    }
  }
}
