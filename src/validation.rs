use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::OpKind;
use crate::schema::{OPERATION_KEYS, TOP_LEVEL_KEYS};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
  #[error("response must be a JSON object")]
  NotAnObject,

  #[error("missing field: {0}")]
  MissingField(&'static str),

  #[error("unexpected field: {0}")]
  UnexpectedField(String),

  #[error("{0} must be a string")]
  NotAString(&'static str),

  #[error("ops must be an array")]
  OpsNotArray,

  #[error("ops[{index}] must be an object")]
  OpNotAnObject { index: usize },

  #[error("ops[{index}] missing {key}")]
  OpMissingField { index: usize, key: &'static str },

  #[error("ops[{index}] has unexpected field: {key}")]
  OpUnexpectedField { index: usize, key: String },

  #[error("ops[{index}].op invalid: {value}")]
  InvalidOpKind { index: usize, value: Value },

  #[error("ops[{index}].path must be a non-empty string")]
  InvalidPath { index: usize },

  #[error("ops[{index}].path must be relative: {path}")]
  AbsolutePath { index: usize, path: String },

  #[error("ops[{index}].path must not contain a scheme: {path}")]
  SchemeInPath { index: usize, path: String },

  #[error("ops[{index}].path must not contain '..': {path}")]
  ParentTraversal { index: usize, path: String },

  #[error("ops[{index}].{key} must be a string or null")]
  NotStringOrNull { index: usize, key: &'static str },
}

/// Checks a decoded model reply against the response schema and path-safety
/// rules. Stops at the first violation; the payload is never modified.
pub fn validate(payload: &Value) -> Result<(), ValidationError> {
  let obj = payload.as_object().ok_or(ValidationError::NotAnObject)?;
  check_keys(obj, &TOP_LEVEL_KEYS).map_err(ValidationError::MissingField)?;
  if let Some(extra) = unexpected_key(obj, &TOP_LEVEL_KEYS) {
    return Err(ValidationError::UnexpectedField(extra));
  }

  if !obj["reply"].is_string() {
    return Err(ValidationError::NotAString("reply"));
  }
  if !obj["code_tree"].is_string() {
    return Err(ValidationError::NotAString("code_tree"));
  }

  let ops = obj["ops"].as_array().ok_or(ValidationError::OpsNotArray)?;
  for (index, op) in ops.iter().enumerate() {
    validate_op(index, op)?;
  }
  Ok(())
}

fn validate_op(index: usize, op: &Value) -> Result<(), ValidationError> {
  let record = op.as_object().ok_or(ValidationError::OpNotAnObject { index })?;
  check_keys(record, &OPERATION_KEYS)
    .map_err(|key| ValidationError::OpMissingField { index, key })?;
  if let Some(key) = unexpected_key(record, &OPERATION_KEYS) {
    return Err(ValidationError::OpUnexpectedField { index, key });
  }

  let kind = &record["op"];
  if kind.as_str().and_then(OpKind::parse).is_none() {
    return Err(ValidationError::InvalidOpKind {
      index,
      value: kind.clone(),
    });
  }

  let path = match record["path"].as_str() {
    Some(p) if !p.is_empty() => p,
    _ => return Err(ValidationError::InvalidPath { index }),
  };
  check_path(index, path)?;

  for key in ["language", "content"] {
    let value = &record[key];
    if !(value.is_null() || value.is_string()) {
      return Err(ValidationError::NotStringOrNull { index, key });
    }
  }
  Ok(())
}

/// Rejects anything that could resolve outside the project root.
pub fn check_path(index: usize, path: &str) -> Result<(), ValidationError> {
  if path.starts_with('/') || path.starts_with('\\') || has_drive_prefix(path) {
    return Err(ValidationError::AbsolutePath {
      index,
      path: path.to_string(),
    });
  }
  if path.contains("://") {
    return Err(ValidationError::SchemeInPath {
      index,
      path: path.to_string(),
    });
  }
  if path.split(['/', '\\']).any(|segment| segment == "..") {
    return Err(ValidationError::ParentTraversal {
      index,
      path: path.to_string(),
    });
  }
  Ok(())
}

/// `C:`, `C:/...` or `C:\...`; a colon later in a plain name is left alone.
fn has_drive_prefix(path: &str) -> bool {
  match path.as_bytes() {
    [drive, b':'] => drive.is_ascii_alphabetic(),
    [drive, b':', b'/' | b'\\', ..] => drive.is_ascii_alphabetic(),
    _ => false,
  }
}

fn check_keys(obj: &Map<String, Value>, keys: &[&'static str]) -> Result<(), &'static str> {
  match keys.iter().find(|key| !obj.contains_key(**key)) {
    Some(missing) => Err(*missing),
    None => Ok(()),
  }
}

fn unexpected_key(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
  obj.keys().find(|key| !keys.contains(&key.as_str())).cloned()
}
