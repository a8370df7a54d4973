use serde_json::Value;

use crate::errors::ChatError;
use crate::models::{FileOp, ModelResponse, OperationRecord};

/// Types a payload that has already passed `validation::validate`.
pub fn into_model_response(payload: Value) -> Result<ModelResponse, ChatError> {
  serde_json::from_value(payload).map_err(|err| ChatError::MalformedPayload(err.to_string()))
}

pub fn coerce(ops: Vec<OperationRecord>) -> Vec<FileOp> {
  ops
    .into_iter()
    .map(|record| FileOp {
      op: record.op,
      path: record.path,
      language: record.language,
      content: record.content,
    })
    .collect()
}
