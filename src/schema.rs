use serde_json::{json, Value};

use crate::models::OpKind;

pub const SCHEMA_VERSION: &str = "codeops.v1";

pub const TOP_LEVEL_KEYS: [&str; 3] = ["reply", "code_tree", "ops"];
pub const OPERATION_KEYS: [&str; 4] = ["op", "path", "language", "content"];

/// JSON Schema sent to the backend as the structured-output constraint.
pub fn model_response_schema() -> Value {
  let kinds: Vec<&str> = OpKind::ALL.iter().map(|kind| kind.as_str()).collect();
  json!({
    "type": "object",
    "additionalProperties": false,
    "required": TOP_LEVEL_KEYS,
    "properties": {
      "reply": { "type": "string" },
      "code_tree": { "type": "string" },
      "ops": {
        "type": "array",
        "items": {
          "type": "object",
          "additionalProperties": false,
          "required": OPERATION_KEYS,
          "properties": {
            "op": { "type": "string", "enum": kinds },
            "path": { "type": "string" },
            "language": { "type": ["string", "null"] },
            "content": { "type": ["string", "null"] }
          }
        }
      }
    }
  })
}

/// Compact serialization embedded in the system prompt.
pub fn schema_json() -> String {
  model_response_schema().to_string()
}
